use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use graphrag::api::{AppState, FixedWindowLimiter, api_routes};
use graphrag::core::config::GraphRagConfig;
use graphrag::db::GraphClient;
use graphrag::graph::{GraphStore, HelixGraphStore};
use graphrag::llm::embeddings::EmbeddingProvider;
use graphrag::llm::factory::{CompletionProviderFactory, EmbeddingProviderFactory};
use graphrag::retrieval::config::RetrievalConfig;
use graphrag::retrieval::orchestrator::RetrievalOrchestrator;
use graphrag::vector::{HttpVectorIndex, VectorIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphrag=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = GraphRagConfig::from_env();
    config.validate()?;

    let client = Arc::new(GraphClient::new(
        &config.graph_host,
        config.graph_port,
        config.max_retries,
    ));
    let graph: Arc<dyn GraphStore> =
        Arc::new(HelixGraphStore::new(client, config.embedding_dimensions));
    let vector: Arc<dyn VectorIndex> = Arc::new(HttpVectorIndex::new(
        config.vector_url.clone(),
        config.vector_api_key.clone(),
        config.timeout,
    ));
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(EmbeddingProviderFactory::from_config(&config)?);
    let completion = CompletionProviderFactory::from_config(&config)?;

    let orchestrator = Arc::new(RetrievalOrchestrator::new(
        embedder,
        vector,
        graph,
        completion,
        RetrievalConfig::from_config(&config),
    ));
    let limiter = Arc::new(FixedWindowLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));

    let app = api_routes(AppState {
        orchestrator,
        limiter,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("graphrag-server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
