use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::core::config::GraphRagConfig;

/// How a request gathers context: plain vector retrieval, or vector
/// retrieval plus knowledge-graph expansion. One orchestrator serves
/// both; the strategy is configuration, not a separate code path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, Default,
)]
#[strum(serialize_all = "kebab-case")]
pub enum RetrievalStrategy {
    VectorOnly,
    #[default]
    GraphExpanded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub strategy: RetrievalStrategy,
    /// Seed nodes fetched by graph similarity search.
    pub seed_limit: usize,
    /// One-hop neighbors fetched per seed.
    pub related_limit: usize,
    pub vector_top_k: usize,
    /// Upper bound on the assembled context, in characters.
    pub context_budget_chars: usize,
    /// Per-call timeout for vector index and graph store calls.
    pub store_timeout_ms: u64,
    /// Timeout for the embedding call. Unlike store timeouts this one
    /// is fatal to the request.
    pub embed_timeout_ms: u64,
    /// Apply the self-exclusion id to the vector path as well as the
    /// graph path. Off by default, matching the graph-only behavior
    /// this system started from.
    pub uniform_self_exclusion: bool,
    /// Score assigned to one-hop neighbors, which arrive without a
    /// similarity score of their own.
    pub related_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: RetrievalStrategy::GraphExpanded,
            seed_limit: 5,
            related_limit: 5,
            vector_top_k: 10,
            context_budget_chars: 6000,
            store_timeout_ms: 2000,
            embed_timeout_ms: 5000,
            uniform_self_exclusion: false,
            related_score: 0.5,
        }
    }
}

impl RetrievalConfig {
    pub fn from_config(config: &GraphRagConfig) -> Self {
        let strategy = RetrievalStrategy::from_str(&config.retrieval_strategy).unwrap_or_else(|_| {
            warn!(
                "Unknown retrieval strategy '{}', falling back to graph-expanded",
                config.retrieval_strategy
            );
            RetrievalStrategy::GraphExpanded
        });

        Self {
            strategy,
            seed_limit: config.seed_limit,
            related_limit: config.related_limit,
            vector_top_k: config.vector_top_k,
            context_budget_chars: config.context_budget_chars,
            store_timeout_ms: config.store_timeout_ms,
            embed_timeout_ms: config.embed_timeout_ms,
            uniform_self_exclusion: config.uniform_self_exclusion,
            ..Default::default()
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            RetrievalStrategy::from_str("vector-only").unwrap(),
            RetrievalStrategy::VectorOnly
        );
        assert_eq!(
            RetrievalStrategy::from_str("graph-expanded").unwrap(),
            RetrievalStrategy::GraphExpanded
        );
        assert!(RetrievalStrategy::from_str("hybrid").is_err());
    }

    #[test]
    fn test_unknown_strategy_falls_back() {
        let mut config = GraphRagConfig::default();
        config.retrieval_strategy = "hybrid".to_string();
        let retrieval = RetrievalConfig::from_config(&config);
        assert_eq!(retrieval.strategy, RetrievalStrategy::GraphExpanded);
    }

    #[test]
    fn test_knobs_carried_over() {
        let mut config = GraphRagConfig::default();
        config.seed_limit = 8;
        config.context_budget_chars = 1234;
        let retrieval = RetrievalConfig::from_config(&config);
        assert_eq!(retrieval.seed_limit, 8);
        assert_eq!(retrieval.context_budget_chars, 1234);
    }
}
