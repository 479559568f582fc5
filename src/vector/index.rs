use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A single ranked match from the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Entry shape for the ingestion path.
#[derive(Debug, Clone, Serialize)]
pub struct VectorEntry {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Nearest-neighbor search over stored embeddings.
///
/// Returning fewer than `top_k` matches is normal, not an error; the
/// caller treats transport failures as degraded-empty, so this trait
/// never needs to encode that policy itself.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, VectorIndexError>;

    async fn upsert(&self, entries: &[VectorEntry]) -> Result<(), VectorIndexError>;
}

/// JSON-over-HTTP vector index client.
pub struct HttpVectorIndex {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpVectorIndex {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let base_url = base_url.into();
        debug!("HttpVectorIndex initialized for {}", base_url);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    entries: &'a [VectorEntry],
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, VectorIndexError> {
        let response = self
            .request("/query")
            .json(&QueryRequest { vector, top_k })
            .send()
            .await?
            .error_for_status()
            .map_err(VectorIndexError::Http)?
            .json::<QueryResponse>()
            .await?;

        debug!("Vector query returned {} matches", response.matches.len());
        Ok(response.matches)
    }

    async fn upsert(&self, entries: &[VectorEntry]) -> Result<(), VectorIndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        self.request("/upsert")
            .json(&UpsertRequest { entries })
            .send()
            .await?
            .error_for_status()
            .map_err(VectorIndexError::Http)?;

        debug!("Upserted {} vector entries", entries.len());
        Ok(())
    }
}
