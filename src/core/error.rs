use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Retrieval-path upstream failures (vector index, graph store) are
/// degraded to empty results before they can reach this type; what does
/// surface here maps directly to a user-visible status at the API edge.
#[derive(Error, Debug)]
pub enum GraphRagError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GraphRagError>;
