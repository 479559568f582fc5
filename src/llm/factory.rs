use std::sync::Arc;

use super::embeddings::EmbeddingGenerator;
use super::providers::base::CompletionProvider;
use super::providers::ollama::OllamaProvider;
use super::providers::openai::OpenAiProvider;
use crate::core::config::GraphRagConfig;
use crate::core::error::{GraphRagError, Result};
use crate::{DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL, DEFAULT_OLLAMA_URL};

pub struct CompletionProviderFactory;

impl CompletionProviderFactory {
    pub fn from_config(config: &GraphRagConfig) -> Result<Arc<dyn CompletionProvider>> {
        match config.completion_provider.as_str() {
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                config
                    .completion_base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_OLLAMA_URL),
                config.completion_model.clone(),
                config.completion_temperature,
            ))),
            "openai" => Ok(Arc::new(OpenAiProvider::new(
                config.completion_api_key.clone().ok_or_else(|| {
                    GraphRagError::Config(
                        "completion_api_key is required for the openai provider".to_string(),
                    )
                })?,
                config.completion_model.clone(),
                config.completion_base_url.as_deref(),
                config.completion_temperature,
            ))),
            other => Err(GraphRagError::Config(format!(
                "Unknown completion provider: {other}. Supported: ollama, openai"
            ))),
        }
    }
}

pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn from_config(config: &GraphRagConfig) -> Result<EmbeddingGenerator> {
        EmbeddingGenerator::new(
            &config.embedding_provider,
            config.embedding_model.clone(),
            config.embedding_url.clone(),
            config.embedding_api_key.clone(),
            config.timeout,
            DEFAULT_CACHE_SIZE,
            DEFAULT_CACHE_TTL,
        )
        .map_err(|e| GraphRagError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_completion_provider() {
        let config = GraphRagConfig::default();
        let provider = CompletionProviderFactory::from_config(&config).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let mut config = GraphRagConfig::default();
        config.completion_provider = "openai".to_string();
        config.completion_api_key = None;
        assert!(CompletionProviderFactory::from_config(&config).is_err());
    }

    #[test]
    fn test_unknown_completion_provider_is_config_error() {
        let mut config = GraphRagConfig::default();
        config.completion_provider = "mystery".to_string();
        assert!(matches!(
            CompletionProviderFactory::from_config(&config),
            Err(GraphRagError::Config(_))
        ));
    }

    #[test]
    fn test_embedding_factory_from_default_config() {
        let config = GraphRagConfig::default();
        let generator = EmbeddingProviderFactory::from_config(&config).unwrap();
        assert_eq!(generator.model(), crate::DEFAULT_EMBEDDING_MODEL);
    }
}
