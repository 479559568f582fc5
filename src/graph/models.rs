use serde::{Deserialize, Serialize};

/// A unit of knowledge in the graph. Written by the seeding path, read
/// by every retrieval request, never mutated in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Directed, typed, weighted edge between two existing nodes.
///
/// `weight` is advisory ranking metadata in `[0, 1]`; it is stored as
/// given, with no normalization across a node's outgoing edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub weight: f32,
}

/// A node returned by similarity search together with its score.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: KnowledgeNode,
    pub score: f64,
}

/// Ephemeral per-query result. `hops` is the graph distance from the
/// query: 0 for direct matches, 1 for one-hop neighbors.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub node: KnowledgeNode,
    pub score: f64,
    pub hops: u32,
}

/// Restrict a relationship type to the identifier alphabet the graph
/// store accepts: every character outside `[A-Za-z0-9_]` becomes `_`,
/// then the whole value is upper-cased. The sanitized value is only
/// ever passed as a query parameter, never spliced into query text.
pub fn sanitize_relationship_type(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
