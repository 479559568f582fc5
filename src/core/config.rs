use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{GraphRagError, Result};
use crate::{
    DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GRAPH_PORT, DEFAULT_OLLAMA_URL,
};

/// Process configuration. Built once at startup and handed to the
/// service constructors; nothing reads the environment after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRagConfig {
    pub graph_host: String,
    pub graph_port: u16,
    pub timeout: u64,
    pub max_retries: u32,

    pub vector_url: String,
    pub vector_api_key: Option<String>,
    pub vector_top_k: usize,

    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimensions: usize,

    pub completion_provider: String,
    pub completion_model: String,
    pub completion_api_key: Option<String>,
    pub completion_base_url: Option<String>,
    pub completion_temperature: f64,

    pub retrieval_strategy: String,
    pub seed_limit: usize,
    pub related_limit: usize,
    pub context_budget_chars: usize,
    pub store_timeout_ms: u64,
    pub embed_timeout_ms: u64,
    pub uniform_self_exclusion: bool,

    pub bind_addr: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl GraphRagConfig {
    pub fn new(graph_host: &str, graph_port: u16) -> Self {
        Self {
            graph_host: graph_host.to_string(),
            graph_port,
            timeout: 30,
            max_retries: 3,

            vector_url: "http://localhost:8600".to_string(),
            vector_api_key: None,
            vector_top_k: 10,

            embedding_provider: "ollama".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_api_key: None,
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,

            completion_provider: "ollama".to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_api_key: None,
            completion_base_url: None,
            completion_temperature: 0.3,

            retrieval_strategy: "graph-expanded".to_string(),
            seed_limit: 5,
            related_limit: 5,
            context_budget_chars: 6000,
            store_timeout_ms: 2000,
            embed_timeout_ms: 5000,
            uniform_self_exclusion: false,

            bind_addr: "127.0.0.1:8080".to_string(),
            rate_limit_max_requests: 30,
            rate_limit_window_secs: 60,
        }
    }

    pub fn graph_base_url(&self) -> String {
        format!("http://{}:{}", self.graph_host, self.graph_port)
    }

    pub fn from_env() -> Self {
        let mut config = Self::new(
            &std::env::var("GRAPHRAG_GRAPH_HOST").unwrap_or_else(|_| "localhost".to_string()),
            std::env::var("GRAPHRAG_GRAPH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_GRAPH_PORT),
        );

        if let Ok(url) = std::env::var("GRAPHRAG_VECTOR_URL") {
            config.vector_url = url;
        }
        if let Ok(key) = std::env::var("GRAPHRAG_VECTOR_API_KEY") {
            config.vector_api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("GRAPHRAG_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }
        if let Ok(model) = std::env::var("GRAPHRAG_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(url) = std::env::var("GRAPHRAG_EMBEDDING_URL") {
            config.embedding_url = url;
        }
        if let Ok(key) = std::env::var("GRAPHRAG_EMBEDDING_API_KEY") {
            config.embedding_api_key = Some(key);
        }
        if let Ok(dims) = std::env::var("GRAPHRAG_EMBEDDING_DIMENSIONS") {
            if let Ok(dims) = dims.parse() {
                config.embedding_dimensions = dims;
            }
        }
        if let Ok(provider) = std::env::var("GRAPHRAG_COMPLETION_PROVIDER") {
            config.completion_provider = provider;
        }
        if let Ok(model) = std::env::var("GRAPHRAG_COMPLETION_MODEL") {
            config.completion_model = model;
        }
        if let Ok(key) = std::env::var("GRAPHRAG_COMPLETION_API_KEY") {
            config.completion_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("GRAPHRAG_COMPLETION_BASE_URL") {
            config.completion_base_url = Some(url);
        }
        if let Ok(strategy) = std::env::var("GRAPHRAG_RETRIEVAL_STRATEGY") {
            config.retrieval_strategy = strategy;
        }
        if let Ok(addr) = std::env::var("GRAPHRAG_BIND_ADDR") {
            config.bind_addr = addr;
        }

        config
    }

    /// Reject configurations that can only fail at request time.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimensions == 0 {
            return Err(GraphRagError::Config(
                "embedding_dimensions must be non-zero".to_string(),
            ));
        }
        if self.context_budget_chars == 0 {
            return Err(GraphRagError::Config(
                "context_budget_chars must be non-zero".to_string(),
            ));
        }
        for (name, value) in [
            ("vector_url", &self.vector_url),
            ("embedding_url", &self.embedding_url),
        ] {
            Url::parse(value)
                .map_err(|e| GraphRagError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        if let Some(base) = &self.completion_base_url {
            Url::parse(base).map_err(|e| {
                GraphRagError::Config(format!("completion_base_url is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }
}

impl Default for GraphRagConfig {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_GRAPH_PORT)
    }
}
