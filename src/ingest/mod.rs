use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::graph::{GraphStore, GraphStoreError, KnowledgeNode, Relationship};
use crate::llm::embeddings::EmbeddingProvider;
use crate::utils::safe_truncate;
use crate::vector::{VectorEntry, VectorIndex};

/// One node to seed, before its embedding exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestBatch {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub nodes_created: usize,
    pub nodes_failed: usize,
    pub vector_upserts_failed: usize,
    pub relationships_created: usize,
    pub relationships_failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Offline seeding: embed and upsert nodes into the graph store and the
/// vector index, then apply relationships.
///
/// Seeding is eventually consistent by design. Every item is its own
/// operation; a failing one is logged and counted, and the batch keeps
/// going. Re-running a batch is safe since node writes are upserts.
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorIndex>,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            graph,
            vector,
        }
    }

    pub async fn run(&self, batch: IngestBatch) -> IngestReport {
        let started_at = Utc::now();
        let mut report = IngestReport {
            nodes_created: 0,
            nodes_failed: 0,
            vector_upserts_failed: 0,
            relationships_created: 0,
            relationships_failed: 0,
            started_at,
            finished_at: started_at,
        };

        info!(
            "Ingesting batch: {} nodes, {} relationships",
            batch.nodes.len(),
            batch.relationships.len()
        );

        for record in &batch.nodes {
            match self.ingest_node(record).await {
                Ok(upserted_to_vector) => {
                    report.nodes_created += 1;
                    if !upserted_to_vector {
                        report.vector_upserts_failed += 1;
                    }
                }
                Err(e) => {
                    warn!("Failed to ingest node {}: {}", record.id, e);
                    report.nodes_failed += 1;
                }
            }
        }

        for record in &batch.relationships {
            let rel = Relationship {
                source: record.source.clone(),
                target: record.target.clone(),
                rel_type: record.rel_type.clone(),
                weight: record.weight,
            };
            match self.graph.add_relationship(&rel).await {
                Ok(created) => {
                    report.relationships_created += 1;
                    info!(
                        "Created relationship {} -[{}]-> {}",
                        created.source, created.rel_type, created.target
                    );
                }
                Err(GraphStoreError::NotFound(msg)) => {
                    warn!(
                        "Skipping relationship {} -> {}: {}",
                        record.source, record.target, msg
                    );
                    report.relationships_failed += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to create relationship {} -> {}: {}",
                        record.source, record.target, e
                    );
                    report.relationships_failed += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Ingestion finished: {}/{} nodes, {}/{} relationships",
            report.nodes_created,
            batch.nodes.len(),
            report.relationships_created,
            batch.relationships.len()
        );
        report
    }

    // Returns whether the vector upsert succeeded; a node that reached
    // the graph but not the index is still usable for graph retrieval.
    async fn ingest_node(&self, record: &NodeRecord) -> Result<bool, String> {
        let embedding = self
            .embedder
            .embed(&record.content)
            .await
            .map_err(|e| format!("embedding failed: {e}"))?;

        let node = KnowledgeNode {
            id: record.id.clone(),
            content: record.content.clone(),
            node_type: record.node_type.clone(),
            embedding,
        };

        self.graph
            .add_node(&node)
            .await
            .map_err(|e| format!("graph upsert failed: {e}"))?;

        let entry = VectorEntry {
            id: node.id.clone(),
            content: node.content.clone(),
            embedding: node.embedding.clone(),
        };
        let vector_ok = match self.vector.upsert(std::slice::from_ref(&entry)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Vector upsert failed for node {}: {}",
                    safe_truncate(&node.id, 24),
                    e
                );
                false
            }
        };

        Ok(vector_ok)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::graph::ScoredNode;
    use crate::llm::embeddings::EmbeddingError;
    use crate::vector::{VectorIndexError, VectorMatch};

    struct FakeEmbedder {
        fail_on: Option<String>,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.fail_on.as_deref() == Some(text) {
                return Err(EmbeddingError::InvalidResponse("boom".to_string()));
            }
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    #[derive(Default)]
    struct FakeGraphStore {
        nodes: Mutex<HashMap<String, KnowledgeNode>>,
        relationships: Mutex<Vec<Relationship>>,
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn add_node(&self, node: &KnowledgeNode) -> Result<KnowledgeNode, GraphStoreError> {
            // Upsert semantics: same id overwrites.
            self.nodes.lock().insert(node.id.clone(), node.clone());
            Ok(node.clone())
        }

        async fn add_relationship(
            &self,
            rel: &Relationship,
        ) -> Result<Relationship, GraphStoreError> {
            let nodes = self.nodes.lock();
            if !nodes.contains_key(&rel.source) || !nodes.contains_key(&rel.target) {
                return Err(GraphStoreError::NotFound(format!(
                    "{} -> {}",
                    rel.source, rel.target
                )));
            }
            drop(nodes);
            self.relationships.lock().push(rel.clone());
            Ok(rel.clone())
        }

        async fn find_related(
            &self,
            _node_id: &str,
            _limit: usize,
        ) -> Result<Vec<KnowledgeNode>, GraphStoreError> {
            Ok(Vec::new())
        }

        async fn find_similar(
            &self,
            _embedding: &[f32],
            _limit: usize,
            _exclude_id: Option<&str>,
        ) -> Result<Vec<ScoredNode>, GraphStoreError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeVectorIndex {
        entries: Mutex<Vec<VectorEntry>>,
    }

    #[async_trait]
    impl VectorIndex for FakeVectorIndex {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<VectorMatch>, VectorIndexError> {
            Ok(Vec::new())
        }

        async fn upsert(&self, entries: &[VectorEntry]) -> Result<(), VectorIndexError> {
            self.entries.lock().extend(entries.iter().cloned());
            Ok(())
        }
    }

    fn record(id: &str, content: &str) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            content: content.to_string(),
            node_type: "concept".to_string(),
        }
    }

    #[tokio::test]
    async fn test_batch_ingests_nodes_and_relationships() {
        let graph = Arc::new(FakeGraphStore::default());
        let vector = Arc::new(FakeVectorIndex::default());
        let ingestor = Ingestor::new(
            Arc::new(FakeEmbedder { fail_on: None }),
            graph.clone(),
            vector.clone(),
        );

        let batch = IngestBatch {
            nodes: vec![record("1", "graphrag"), record("2", "embeddings")],
            relationships: vec![RelationshipRecord {
                source: "1".to_string(),
                target: "2".to_string(),
                rel_type: "USES".to_string(),
                weight: 0.8,
            }],
        };

        let report = ingestor.run(batch).await;
        assert_eq!(report.nodes_created, 2);
        assert_eq!(report.relationships_created, 1);
        assert_eq!(report.nodes_failed, 0);
        assert_eq!(graph.nodes.lock().len(), 2);
        assert_eq!(vector.entries.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_node_does_not_abort_batch() {
        let graph = Arc::new(FakeGraphStore::default());
        let ingestor = Ingestor::new(
            Arc::new(FakeEmbedder {
                fail_on: Some("unembeddable".to_string()),
            }),
            graph.clone(),
            Arc::new(FakeVectorIndex::default()),
        );

        let batch = IngestBatch {
            nodes: vec![record("1", "unembeddable"), record("2", "fine content")],
            relationships: Vec::new(),
        };

        let report = ingestor.run(batch).await;
        assert_eq!(report.nodes_created, 1);
        assert_eq!(report.nodes_failed, 1);
        assert!(graph.nodes.lock().contains_key("2"));
    }

    #[tokio::test]
    async fn test_relationship_with_missing_endpoint_is_skipped() {
        let graph = Arc::new(FakeGraphStore::default());
        let ingestor = Ingestor::new(
            Arc::new(FakeEmbedder { fail_on: None }),
            graph.clone(),
            Arc::new(FakeVectorIndex::default()),
        );

        let batch = IngestBatch {
            nodes: vec![record("1", "graphrag")],
            relationships: vec![
                RelationshipRecord {
                    source: "1".to_string(),
                    target: "missing".to_string(),
                    rel_type: "USES".to_string(),
                    weight: 0.5,
                },
            ],
        };

        let report = ingestor.run(batch).await;
        assert_eq!(report.relationships_created, 0);
        assert_eq!(report.relationships_failed, 1);
    }

    #[tokio::test]
    async fn test_reingesting_same_id_is_idempotent() {
        let graph = Arc::new(FakeGraphStore::default());
        let ingestor = Ingestor::new(
            Arc::new(FakeEmbedder { fail_on: None }),
            graph.clone(),
            Arc::new(FakeVectorIndex::default()),
        );

        let batch = IngestBatch {
            nodes: vec![record("1", "graphrag"), record("1", "graphrag")],
            relationships: Vec::new(),
        };

        let report = ingestor.run(batch).await;
        assert_eq!(report.nodes_created, 2);
        assert_eq!(report.nodes_failed, 0);
        assert_eq!(graph.nodes.lock().len(), 1);
    }
}
