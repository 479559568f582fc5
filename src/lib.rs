pub mod api;
pub mod core;
pub mod db;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod retrieval;
pub mod utils;
pub mod vector;

pub use crate::utils::{safe_truncate, safe_truncate_ellipsis};

pub use crate::core::config::GraphRagConfig;
pub use crate::core::error::{GraphRagError, Result};
pub use crate::db::{GraphClient, GraphClientError};
pub use crate::graph::{KnowledgeNode, Relationship, RetrievalHit};
pub use crate::llm::embeddings::{EmbeddingGenerator, EmbeddingProvider};
pub use crate::retrieval::orchestrator::RetrievalOrchestrator;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

pub const DEFAULT_COMPLETION_MODEL: &str = "llama3.1:8b";

pub const DEFAULT_GRAPH_PORT: u16 = 6969;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

pub const DEFAULT_CACHE_SIZE: usize = 1000;

pub const DEFAULT_CACHE_TTL: u64 = 300;
