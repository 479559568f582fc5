pub mod models;
pub mod store;

pub use models::{
    KnowledgeNode, Relationship, RetrievalHit, ScoredNode, sanitize_relationship_type,
};
pub use store::{GraphStore, GraphStoreError, HelixGraphStore};
