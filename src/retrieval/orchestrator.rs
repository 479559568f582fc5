use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::assembler::{ContextAssembler, ContextBlock};
use super::config::{RetrievalConfig, RetrievalStrategy};
use super::expander::GraphContextExpander;
use crate::core::error::{GraphRagError, Result};
use crate::graph::{GraphStore, KnowledgeNode, RetrievalHit};
use crate::llm::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::llm::providers::{ChatTurn, CompletionMetadata, CompletionProvider};
use crate::utils::safe_truncate;
use crate::vector::VectorIndex;

/// Where a request currently is. Only the embedding step can reach
/// `Failed` from inside retrieval; every later retrieval step degrades
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalPhase {
    Embedding,
    Retrieving,
    Assembling,
    PromptReady,
    Completed,
    Failed,
}

impl fmt::Display for RetrievalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::PromptReady => "prompt_ready",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A completed answer together with the context that produced it.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub content: String,
    pub context: ContextBlock,
    pub metadata: CompletionMetadata,
}

/// Coordinates one request end to end: embed the query, run the vector
/// and graph retrieval paths concurrently, merge, assemble, prompt,
/// complete.
///
/// The contract is best-effort context, always answer: any retrieval
/// store failing (or timing out) degrades that path to empty results.
/// Only an embedding or completion failure fails the request.
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    vector: Arc<dyn VectorIndex>,
    expander: GraphContextExpander,
    assembler: ContextAssembler,
    completion: Arc<dyn CompletionProvider>,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector: Arc<dyn VectorIndex>,
        graph: Arc<dyn GraphStore>,
        completion: Arc<dyn CompletionProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vector,
            expander: GraphContextExpander::new(graph, config.clone()),
            assembler: ContextAssembler::new(config.context_budget_chars),
            completion,
            config,
        }
    }

    /// Answer a user question against the retrieved context.
    ///
    /// `history` is the full message list as received; the question
    /// itself must be its last user-visible content.
    pub async fn answer(&self, query: &str, history: &[ChatTurn]) -> Result<ChatAnswer> {
        let context = self.retrieve_context(query, None).await?;
        let system_prompt = build_system_prompt(&context, query.trim());
        debug!(
            phase = %RetrievalPhase::PromptReady,
            context_entries = context.node_ids.len(),
            "prompt ready"
        );

        let (content, metadata) = self
            .completion
            .complete(&system_prompt, history)
            .await
            .map_err(|e| {
                error!(phase = %RetrievalPhase::Failed, "Completion call failed: {}", e);
                GraphRagError::UpstreamUnavailable(format!("completion provider: {e}"))
            })?;

        debug!(phase = %RetrievalPhase::Completed, "answer ready");
        Ok(ChatAnswer {
            content,
            context,
            metadata,
        })
    }

    /// Run the retrieval pipeline up to the assembled context block.
    ///
    /// `origin_id` names the node the query originated from, when there
    /// is one; it is excluded from graph similarity results, and from
    /// vector results too when `uniform_self_exclusion` is set.
    pub async fn retrieve_context(
        &self,
        query: &str,
        origin_id: Option<&str>,
    ) -> Result<ContextBlock> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GraphRagError::InvalidInput("empty query".to_string()));
        }

        debug!(phase = %RetrievalPhase::Embedding, "embedding query: {}", safe_truncate(query, 50));
        let embedding = self.embed_query(query).await?;

        debug!(phase = %RetrievalPhase::Retrieving, strategy = %self.config.strategy, "querying stores");
        let hits = match self.config.strategy {
            RetrievalStrategy::VectorOnly => self.vector_hits(&embedding, origin_id).await,
            RetrievalStrategy::GraphExpanded => {
                // Independent read-only paths, no data dependency:
                // run them concurrently and join before assembly.
                let (graph_hits, vector_hits) = tokio::join!(
                    self.expander.expand(&embedding, origin_id),
                    self.vector_hits(&embedding, origin_id),
                );
                merge_hits(graph_hits, vector_hits)
            }
        };

        debug!(phase = %RetrievalPhase::Assembling, hits = hits.len(), "assembling context");
        Ok(self.assembler.assemble(&hits))
    }

    // No query vector means no retrieval is possible, so unlike the
    // store calls this one is fatal, timeout included.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let timeout = self.config.embed_timeout();
        match tokio::time::timeout(timeout, self.embedder.embed(query)).await {
            Ok(Ok(embedding)) => Ok(embedding),
            Ok(Err(EmbeddingError::EmptyText)) => {
                Err(GraphRagError::InvalidInput("empty query".to_string()))
            }
            Ok(Err(e)) => {
                error!(phase = %RetrievalPhase::Failed, "Embedding call failed: {}", e);
                Err(GraphRagError::UpstreamUnavailable(format!(
                    "embedding provider: {e}"
                )))
            }
            Err(_) => {
                error!(phase = %RetrievalPhase::Failed, "Embedding call timed out after {:?}", timeout);
                Err(GraphRagError::UpstreamUnavailable(
                    "embedding provider timed out".to_string(),
                ))
            }
        }
    }

    async fn vector_hits(&self, embedding: &[f32], origin_id: Option<&str>) -> Vec<RetrievalHit> {
        let timeout = self.config.store_timeout();
        let matches = match tokio::time::timeout(
            timeout,
            self.vector.query(embedding, self.config.vector_top_k),
        )
        .await
        {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!("Vector query failed, degrading to empty results: {}", e);
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    "Vector query timed out after {:?}, degrading to empty results",
                    timeout
                );
                return Vec::new();
            }
        };

        let excluded = if self.config.uniform_self_exclusion {
            origin_id
        } else {
            None
        };

        matches
            .into_iter()
            .filter(|m| Some(m.id.as_str()) != excluded)
            .map(|m| RetrievalHit {
                node: KnowledgeNode {
                    id: m.id,
                    content: m.content,
                    node_type: "document".to_string(),
                    embedding: Vec::new(),
                },
                score: m.score,
                hops: 0,
            })
            .collect()
    }
}

/// Merge the two retrieval paths with a fixed, timing-independent
/// precedence: graph-expanded hits first (seeds, then neighbors), then
/// vector hits that did not already appear in the graph results.
fn merge_hits(graph_hits: Vec<RetrievalHit>, vector_hits: Vec<RetrievalHit>) -> Vec<RetrievalHit> {
    let mut seen: HashSet<String> = graph_hits.iter().map(|h| h.node.id.clone()).collect();
    let mut merged = graph_hits;
    for hit in vector_hits {
        if seen.insert(hit.node.id.clone()) {
            merged.push(hit);
        }
    }
    merged
}

/// Embed the context block and the question into the completion system
/// prompt. An empty block is rendered as an explicit instruction to
/// answer from general knowledge.
fn build_system_prompt(context: &ContextBlock, question: &str) -> String {
    if context.is_empty() {
        format!(
            "You are a helpful assistant. No relevant background context was \
             retrieved for this question; there is insufficient context, so \
             answer from general knowledge.\n\
             -----\n\
             Question: {question}\n\
             -----"
        )
    } else {
        format!(
            "You are a helpful assistant that answers questions using the \
             documents below.\n\
             START CONTEXT\n\
             {}\n\
             END CONTEXT\n\
             -----\n\
             Question: {question}\n\
             -----",
            context.text
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::graph::{GraphStoreError, Relationship, ScoredNode};
    use crate::llm::providers::CompletionError;
    use crate::vector::{VectorEntry, VectorIndexError, VectorMatch};

    fn node(id: &str, content: &str) -> KnowledgeNode {
        KnowledgeNode {
            id: id.to_string(),
            content: content.to_string(),
            node_type: "concept".to_string(),
            embedding: vec![0.0; 3],
        }
    }

    struct FakeEmbedder {
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    #[derive(Default)]
    struct FakeVectorIndex {
        matches: Vec<VectorMatch>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl VectorIndex for FakeVectorIndex {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
        ) -> std::result::Result<Vec<VectorMatch>, VectorIndexError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(VectorIndexError::InvalidResponse(
                    "index offline".to_string(),
                ));
            }
            Ok(self.matches.clone())
        }

        async fn upsert(
            &self,
            _entries: &[VectorEntry],
        ) -> std::result::Result<(), VectorIndexError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeGraphStore {
        seeds: Vec<ScoredNode>,
        related: Vec<(String, KnowledgeNode)>,
        fail: bool,
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn add_node(
            &self,
            node: &KnowledgeNode,
        ) -> std::result::Result<KnowledgeNode, GraphStoreError> {
            Ok(node.clone())
        }

        async fn add_relationship(
            &self,
            rel: &Relationship,
        ) -> std::result::Result<Relationship, GraphStoreError> {
            Ok(rel.clone())
        }

        async fn find_related(
            &self,
            node_id: &str,
            _limit: usize,
        ) -> std::result::Result<Vec<KnowledgeNode>, GraphStoreError> {
            Ok(self
                .related
                .iter()
                .filter(|(parent, _)| parent == node_id)
                .map(|(_, n)| n.clone())
                .collect())
        }

        async fn find_similar(
            &self,
            _embedding: &[f32],
            _limit: usize,
            _exclude_id: Option<&str>,
        ) -> std::result::Result<Vec<ScoredNode>, GraphStoreError> {
            if self.fail {
                return Err(GraphStoreError::Unavailable("store offline".to_string()));
            }
            Ok(self.seeds.clone())
        }
    }

    struct FakeCompletion {
        seen_prompt: Mutex<Option<String>>,
    }

    impl FakeCompletion {
        fn new() -> Self {
            Self {
                seen_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeCompletion {
        async fn complete(
            &self,
            system_prompt: &str,
            _history: &[ChatTurn],
        ) -> std::result::Result<(String, CompletionMetadata), CompletionError> {
            *self.seen_prompt.lock() = Some(system_prompt.to_string());
            Ok(("the answer".to_string(), CompletionMetadata::default()))
        }

        fn provider_name(&self) -> &str {
            "fake"
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn orchestrator(
        vector: FakeVectorIndex,
        graph: FakeGraphStore,
        completion: Arc<FakeCompletion>,
        config: RetrievalConfig,
    ) -> (RetrievalOrchestrator, Arc<FakeEmbedder>) {
        let embedder = Arc::new(FakeEmbedder::new());
        let orchestrator = RetrievalOrchestrator::new(
            embedder.clone(),
            Arc::new(vector),
            Arc::new(graph),
            completion,
            config,
        );
        (orchestrator, embedder)
    }

    #[tokio::test]
    async fn test_all_stores_down_still_answers() {
        let vector = FakeVectorIndex {
            fail: true,
            ..Default::default()
        };
        let graph = FakeGraphStore {
            fail: true,
            ..Default::default()
        };
        let completion = Arc::new(FakeCompletion::new());
        let (orchestrator, _) = orchestrator(
            vector,
            graph,
            completion.clone(),
            RetrievalConfig::default(),
        );

        let answer = orchestrator
            .answer("what is graphrag?", &[ChatTurn::user("what is graphrag?")])
            .await
            .unwrap();

        assert_eq!(answer.content, "the answer");
        assert!(answer.context.is_empty());
        let prompt = completion.seen_prompt.lock().clone().unwrap();
        assert!(prompt.contains("general knowledge"));
    }

    #[tokio::test]
    async fn test_seed_content_precedes_neighbor_content() {
        let graph = FakeGraphStore {
            seeds: vec![ScoredNode {
                node: node("a", "seed content about graphs"),
                score: 0.9,
            }],
            related: vec![("a".to_string(), node("b", "neighbor content about vectors"))],
            ..Default::default()
        };
        let completion = Arc::new(FakeCompletion::new());
        let (orchestrator, _) = orchestrator(
            FakeVectorIndex::default(),
            graph,
            completion.clone(),
            RetrievalConfig::default(),
        );

        let answer = orchestrator
            .answer("graphs", &[ChatTurn::user("graphs")])
            .await
            .unwrap();

        assert_eq!(answer.context.node_ids, vec!["a", "b"]);
        let prompt = completion.seen_prompt.lock().clone().unwrap();
        let seed_pos = prompt.find("seed content").unwrap();
        let neighbor_pos = prompt.find("neighbor content").unwrap();
        assert!(seed_pos < neighbor_pos);
    }

    #[tokio::test]
    async fn test_vector_timeout_leaves_graph_results_intact() {
        let vector = FakeVectorIndex {
            matches: vec![VectorMatch {
                id: "v1".to_string(),
                content: "vector only content".to_string(),
                score: 0.7,
            }],
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let graph = FakeGraphStore {
            seeds: vec![ScoredNode {
                node: node("a", "graph content"),
                score: 0.9,
            }],
            ..Default::default()
        };
        let mut config = RetrievalConfig::default();
        config.store_timeout_ms = 50;

        let completion = Arc::new(FakeCompletion::new());
        let (orchestrator, _) = orchestrator(vector, graph, completion, config);

        let context = orchestrator
            .retrieve_context("graphs", None)
            .await
            .unwrap();

        assert_eq!(context.node_ids, vec!["a"]);
        assert!(context.text.contains("graph content"));
        assert!(!context.text.contains("vector only content"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_embedding() {
        let completion = Arc::new(FakeCompletion::new());
        let (orchestrator, embedder) = orchestrator(
            FakeVectorIndex::default(),
            FakeGraphStore::default(),
            completion,
            RetrievalConfig::default(),
        );

        let err = orchestrator
            .answer("   ", &[ChatTurn::user("   ")])
            .await
            .unwrap_err();

        assert!(matches!(err, GraphRagError::InvalidInput(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vector_duplicate_of_graph_hit_deduplicated() {
        let vector = FakeVectorIndex {
            matches: vec![
                VectorMatch {
                    id: "a".to_string(),
                    content: "duplicate of seed".to_string(),
                    score: 0.95,
                },
                VectorMatch {
                    id: "v1".to_string(),
                    content: "fresh vector content".to_string(),
                    score: 0.6,
                },
            ],
            ..Default::default()
        };
        let graph = FakeGraphStore {
            seeds: vec![ScoredNode {
                node: node("a", "seed content"),
                score: 0.9,
            }],
            ..Default::default()
        };
        let completion = Arc::new(FakeCompletion::new());
        let (orchestrator, _) = orchestrator(
            vector,
            graph,
            completion,
            RetrievalConfig::default(),
        );

        let context = orchestrator
            .retrieve_context("graphs", None)
            .await
            .unwrap();

        assert_eq!(context.node_ids, vec!["a", "v1"]);
        assert!(context.text.contains("seed content"));
        assert!(!context.text.contains("duplicate of seed"));
    }

    #[tokio::test]
    async fn test_vector_only_strategy_skips_graph() {
        let vector = FakeVectorIndex {
            matches: vec![VectorMatch {
                id: "v1".to_string(),
                content: "vector content".to_string(),
                score: 0.8,
            }],
            ..Default::default()
        };
        // A graph store that would fail loudly if consulted.
        let graph = FakeGraphStore {
            fail: true,
            ..Default::default()
        };
        let mut config = RetrievalConfig::default();
        config.strategy = RetrievalStrategy::VectorOnly;

        let completion = Arc::new(FakeCompletion::new());
        let (orchestrator, _) = orchestrator(vector, graph, completion, config);

        let context = orchestrator
            .retrieve_context("vectors", None)
            .await
            .unwrap();

        assert_eq!(context.node_ids, vec!["v1"]);
    }

    #[test]
    fn test_prompt_embeds_context_markers() {
        let block = ContextBlock {
            text: "document text".to_string(),
            node_ids: vec!["a".to_string()],
            dropped: 0,
        };
        let prompt = build_system_prompt(&block, "what is this?");
        assert!(prompt.contains("START CONTEXT"));
        assert!(prompt.contains("document text"));
        assert!(prompt.contains("what is this?"));
    }
}
