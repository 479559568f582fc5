pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{ChatTurn, CompletionError, CompletionMetadata, CompletionProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
