use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::config::RetrievalConfig;
use crate::graph::{GraphStore, RetrievalHit};
use crate::utils::safe_truncate;

/// Multi-hop context retrieval over the knowledge graph.
///
/// Seeds come from embedding similarity (`hops = 0`); each seed is then
/// expanded by exactly one hop of outgoing relationships (`hops = 1`).
/// Deeper traversal is deliberately not offered: relevance decays
/// faster than another round trip is worth.
pub struct GraphContextExpander {
    store: Arc<dyn GraphStore>,
    config: RetrievalConfig,
}

impl GraphContextExpander {
    pub fn new(store: Arc<dyn GraphStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    /// Retrieve seeds and their one-hop neighborhood for a query
    /// embedding.
    ///
    /// The result is ordered seeds-first (in similarity order), then
    /// neighbors in the order their parent seeds were processed, with
    /// ids deduplicated so that a node seen as both seed and neighbor
    /// keeps its seed entry.
    ///
    /// Failures never escape: an unreachable similarity search yields
    /// an empty expansion, and a failing neighbor lookup skips only
    /// that seed.
    pub async fn expand(
        &self,
        query_embedding: &[f32],
        exclude_id: Option<&str>,
    ) -> Vec<RetrievalHit> {
        let timeout = self.config.store_timeout();

        let seeds = match tokio::time::timeout(
            timeout,
            self.store
                .find_similar(query_embedding, self.config.seed_limit, exclude_id),
        )
        .await
        {
            Ok(Ok(seeds)) => seeds,
            Ok(Err(e)) => {
                warn!("Graph similarity search failed, skipping graph context: {}", e);
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    "Graph similarity search timed out after {:?}, skipping graph context",
                    timeout
                );
                return Vec::new();
            }
        };

        if seeds.is_empty() {
            debug!("Graph similarity search returned no seeds");
            return Vec::new();
        }

        let seed_ids: Vec<String> = seeds.iter().map(|s| s.node.id.clone()).collect();
        let mut seen: HashSet<String> = seed_ids.iter().cloned().collect();

        let mut hits: Vec<RetrievalHit> = seeds
            .into_iter()
            .map(|seed| RetrievalHit {
                node: seed.node,
                score: seed.score,
                hops: 0,
            })
            .collect();

        let expansions = join_all(seed_ids.iter().map(|id| {
            tokio::time::timeout(
                timeout,
                self.store.find_related(id, self.config.related_limit),
            )
        }))
        .await;

        for (seed_id, expansion) in seed_ids.iter().zip(expansions) {
            let neighbors = match expansion {
                Ok(Ok(neighbors)) => neighbors,
                Ok(Err(e)) => {
                    warn!(
                        "One-hop expansion failed for seed {}: {}",
                        safe_truncate(seed_id, 24),
                        e
                    );
                    continue;
                }
                Err(_) => {
                    warn!(
                        "One-hop expansion timed out for seed {} after {:?}",
                        safe_truncate(seed_id, 24),
                        timeout
                    );
                    continue;
                }
            };

            for neighbor in neighbors {
                if seen.insert(neighbor.id.clone()) {
                    hits.push(RetrievalHit {
                        node: neighbor,
                        score: self.config.related_score,
                        hops: 1,
                    });
                }
            }
        }

        debug!(
            "Graph expansion produced {} hits ({} seeds)",
            hits.len(),
            seed_ids.len()
        );
        hits
    }
}
