use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::models::{KnowledgeNode, Relationship, ScoredNode, sanitize_relationship_type};
use crate::db::{GraphClient, GraphClientError};
use crate::utils::safe_truncate;

#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Storage boundary for the knowledge graph.
///
/// Implementations must be safe for concurrent use; every operation is
/// a single scoped round trip against the backing store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotent upsert: writing the same id again overwrites and is
    /// never an error.
    async fn add_node(&self, node: &KnowledgeNode) -> Result<KnowledgeNode, GraphStoreError>;

    /// Create a typed edge. Both endpoints must already exist; missing
    /// ones are reported as [`GraphStoreError::NotFound`], never
    /// auto-created.
    async fn add_relationship(&self, rel: &Relationship)
    -> Result<Relationship, GraphStoreError>;

    /// Direct outgoing neighbors in store order. Unknown ids and nodes
    /// without outgoing edges both yield an empty list.
    async fn find_related(
        &self,
        node_id: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeNode>, GraphStoreError>;

    /// Graph-wide cosine similarity search, ranked descending, with an
    /// optional id to exclude from the result set.
    async fn find_similar(
        &self,
        embedding: &[f32],
        limit: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<ScoredNode>, GraphStoreError>;
}

/// [`GraphStore`] backed by HelixDB named queries.
pub struct HelixGraphStore {
    client: Arc<GraphClient>,
    dimensions: usize,
}

impl HelixGraphStore {
    pub fn new(client: Arc<GraphClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

fn map_client_error(e: GraphClientError) -> GraphStoreError {
    match e {
        GraphClientError::NotFound(msg) => GraphStoreError::NotFound(msg),
        other => GraphStoreError::Unavailable(other.to_string()),
    }
}

#[derive(Deserialize)]
struct NodeRow {
    id: String,
    content: String,
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    embedding: Vec<f32>,
}

impl From<NodeRow> for KnowledgeNode {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            node_type: row.node_type,
            embedding: row.embedding,
        }
    }
}

#[async_trait]
impl GraphStore for HelixGraphStore {
    async fn add_node(&self, node: &KnowledgeNode) -> Result<KnowledgeNode, GraphStoreError> {
        if node.embedding.len() != self.dimensions {
            return Err(GraphStoreError::Validation(format!(
                "embedding for node {} has {} dimensions, index is configured for {}",
                node.id,
                node.embedding.len(),
                self.dimensions
            )));
        }

        #[derive(Serialize)]
        struct Params<'a> {
            id: &'a str,
            content: &'a str,
            node_type: &'a str,
            embedding: &'a [f32],
        }

        self.client
            .execute_query::<serde_json::Value, _>(
                "upsertKnowledgeNode",
                &Params {
                    id: &node.id,
                    content: &node.content,
                    node_type: &node.node_type,
                    embedding: &node.embedding,
                },
            )
            .await
            .map_err(map_client_error)?;

        debug!("Upserted node {}", safe_truncate(&node.id, 24));
        Ok(node.clone())
    }

    async fn add_relationship(
        &self,
        rel: &Relationship,
    ) -> Result<Relationship, GraphStoreError> {
        let rel_type = sanitize_relationship_type(&rel.rel_type);

        #[derive(Serialize)]
        struct Params<'a> {
            source_id: &'a str,
            target_id: &'a str,
            rel_type: &'a str,
            weight: f32,
        }

        self.client
            .execute_query_no_retry::<serde_json::Value, _>(
                "addRelationship",
                &Params {
                    source_id: &rel.source,
                    target_id: &rel.target,
                    rel_type: &rel_type,
                    weight: rel.weight,
                },
            )
            .await
            .map_err(|e| match e {
                GraphClientError::NotFound(_) => GraphStoreError::NotFound(format!(
                    "relationship endpoint missing: {} -> {}",
                    rel.source, rel.target
                )),
                other => GraphStoreError::Unavailable(other.to_string()),
            })?;

        debug!(
            "Created relationship {} -[{}]-> {}",
            safe_truncate(&rel.source, 24),
            rel_type,
            safe_truncate(&rel.target, 24)
        );
        Ok(Relationship {
            rel_type,
            ..rel.clone()
        })
    }

    async fn find_related(
        &self,
        node_id: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeNode>, GraphStoreError> {
        #[derive(Serialize)]
        struct Params<'a> {
            node_id: &'a str,
            limit: usize,
        }

        #[derive(Deserialize)]
        struct RelatedResult {
            #[serde(default)]
            related: Vec<NodeRow>,
        }

        let result = self
            .client
            .execute_query::<RelatedResult, _>("findRelatedNodes", &Params { node_id, limit })
            .await;

        match result {
            Ok(r) => Ok(r.related.into_iter().map(KnowledgeNode::from).collect()),
            // A node with no presence in the graph has no neighbors.
            Err(GraphClientError::NotFound(_)) => Ok(Vec::new()),
            Err(other) => Err(GraphStoreError::Unavailable(other.to_string())),
        }
    }

    async fn find_similar(
        &self,
        embedding: &[f32],
        limit: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<ScoredNode>, GraphStoreError> {
        #[derive(Serialize)]
        struct Params<'a> {
            query_vector: &'a [f32],
            limit: usize,
            exclude_id: Option<&'a str>,
        }

        #[derive(Deserialize)]
        struct ScoredRow {
            #[serde(flatten)]
            node: NodeRow,
            #[serde(default)]
            score: f64,
        }

        #[derive(Deserialize)]
        struct SimilarResult {
            #[serde(default)]
            nodes: Vec<ScoredRow>,
        }

        let result = self
            .client
            .execute_query::<SimilarResult, _>(
                "findSimilarNodes",
                &Params {
                    query_vector: embedding,
                    limit,
                    exclude_id,
                },
            )
            .await
            .map_err(map_client_error)?;

        Ok(result
            .nodes
            .into_iter()
            .map(|row| ScoredNode {
                node: row.node.into(),
                score: row.score,
            })
            .collect())
    }
}
