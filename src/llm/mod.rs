pub mod embeddings;
pub mod factory;
pub mod providers;

pub use embeddings::{EmbeddingError, EmbeddingGenerator, EmbeddingProvider};
pub use factory::{CompletionProviderFactory, EmbeddingProviderFactory};
pub use providers::{ChatTurn, CompletionError, CompletionMetadata, CompletionProvider};
