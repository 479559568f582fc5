use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use graphrag::core::config::GraphRagConfig;
use graphrag::db::GraphClient;
use graphrag::graph::{GraphStore, HelixGraphStore};
use graphrag::ingest::{IngestBatch, Ingestor};
use graphrag::llm::embeddings::EmbeddingProvider;
use graphrag::llm::factory::EmbeddingProviderFactory;
use graphrag::vector::{HttpVectorIndex, VectorIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphrag=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: graphrag-seed <batch.json>")?;

    let config = GraphRagConfig::from_env();
    config.validate()?;

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read batch file {path}"))?;
    let batch: IngestBatch =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse batch file {path}"))?;

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

    let ingestor = Ingestor::new(embedder, graph, vector);

    info!("Seeding from {}", path);
    let report = ingestor.run(batch).await;

    // Per-item failures are part of the report, not an exit code; a
    // partially applied batch is accepted as eventually consistent.
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
