use std::time::Duration;

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum GraphClientError {
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}

/// Thin wrapper around the HelixDB client.
///
/// Every query is a single scoped request; no connection is held across
/// await points, so a failing call can never leak one. Transient errors
/// are retried with exponential backoff; not-found responses are
/// surfaced immediately since retrying them cannot help.
pub struct GraphClient {
    inner: HelixDB,
    base_url: String,
    max_retries: u32,
}

impl GraphClient {
    pub fn new(host: &str, port: u16, max_retries: u32) -> Self {
        let endpoint = format!("http://{host}");
        let base_url = format!("http://{host}:{port}");
        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(port), None);

        debug!("GraphClient created for {}", base_url);
        Self {
            inner,
            base_url,
            max_retries,
        }
    }

    pub async fn execute_query<T, P>(
        &self,
        query_name: &str,
        params: &P,
    ) -> Result<T, GraphClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries.max(1) {
            match self.inner.query::<P, T>(query_name, params).await {
                Ok(result) => {
                    debug!("Query {} succeeded (attempt {})", query_name, attempt);
                    return Ok(result);
                }
                Err(e) => {
                    let message = e.to_string();
                    if is_not_found(&message) {
                        return Err(GraphClientError::NotFound(message));
                    }
                    debug!(
                        "Query {} failed (attempt {}/{}): {}",
                        query_name,
                        attempt,
                        self.max_retries,
                        message
                    );
                    last_error = message;
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
            }
        }

        Err(GraphClientError::RetryExhausted(
            self.max_retries,
            last_error,
        ))
    }

    pub async fn execute_query_no_retry<T, P>(
        &self,
        query_name: &str,
        params: &P,
    ) -> Result<T, GraphClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        self.inner
            .query::<P, T>(query_name, params)
            .await
            .map_err(|e| {
                let message = e.to_string();
                if is_not_found(&message) {
                    GraphClientError::NotFound(message)
                } else {
                    GraphClientError::Query(message)
                }
            })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// HelixDB reports missing nodes through its error text rather than a
// dedicated variant.
fn is_not_found(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("not found") || lowered.contains("no value")
}
