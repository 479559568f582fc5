use std::collections::HashSet;

use tracing::debug;

use crate::graph::RetrievalHit;

const ENTRY_SEPARATOR: &str = "\n\n";

/// The assembled, size-bounded text handed to the prompt template.
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    pub text: String,
    /// Ids of the hits that made it into `text`, in order.
    pub node_ids: Vec<String>,
    /// Hits removed to satisfy the size budget.
    pub dropped: usize,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}

/// Merges retrieval hits into a single context block under a character
/// budget.
pub struct ContextAssembler {
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    /// Deduplicate by node id (first occurrence wins), then enforce the
    /// budget by removing whole entries, lowest priority first: the
    /// highest hop count goes first, ties broken by lowest score. A
    /// document is either present in full or absent; content is never
    /// cut mid-string. An empty input produces an empty block, which is
    /// a valid outcome, not an error.
    pub fn assemble(&self, hits: &[RetrievalHit]) -> ContextBlock {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut kept: Vec<&RetrievalHit> = hits
            .iter()
            .filter(|hit| seen.insert(hit.node.id.as_str()))
            .collect();

        let mut dropped = 0;
        while !kept.is_empty() && total_chars(&kept) > self.budget_chars {
            kept.remove(lowest_priority_index(&kept));
            dropped += 1;
        }

        if dropped > 0 {
            debug!(
                "Context budget {} exceeded, dropped {} hits, kept {}",
                self.budget_chars,
                dropped,
                kept.len()
            );
        }

        let text = kept
            .iter()
            .map(|hit| hit.node.content.as_str())
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR);

        ContextBlock {
            text,
            node_ids: kept.iter().map(|hit| hit.node.id.clone()).collect(),
            dropped,
        }
    }
}

fn total_chars(kept: &[&RetrievalHit]) -> usize {
    let content: usize = kept
        .iter()
        .map(|hit| hit.node.content.chars().count())
        .sum();
    let separators = ENTRY_SEPARATOR.len() * kept.len().saturating_sub(1);
    content + separators
}

fn lowest_priority_index(kept: &[&RetrievalHit]) -> usize {
    let mut worst = 0;
    for (i, hit) in kept.iter().enumerate().skip(1) {
        let current = kept[worst];
        if hit.hops > current.hops || (hit.hops == current.hops && hit.score < current.score) {
            worst = i;
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KnowledgeNode;

    fn hit(id: &str, content: &str, score: f64, hops: u32) -> RetrievalHit {
        RetrievalHit {
            node: KnowledgeNode {
                id: id.to_string(),
                content: content.to_string(),
                node_type: "concept".to_string(),
                embedding: Vec::new(),
            },
            score,
            hops,
        }
    }

    #[test]
    fn test_empty_input_is_valid() {
        let block = ContextAssembler::new(100).assemble(&[]);
        assert!(block.is_empty());
        assert_eq!(block.text, "");
        assert_eq!(block.dropped, 0);
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let hits = vec![
            hit("a", "seed copy", 0.9, 0),
            hit("b", "other", 0.7, 0),
            hit("a", "vector copy", 0.6, 0),
        ];
        let block = ContextAssembler::new(1000).assemble(&hits);
        assert_eq!(block.node_ids, vec!["a", "b"]);
        assert!(block.text.contains("seed copy"));
        assert!(!block.text.contains("vector copy"));
    }

    #[test]
    fn test_order_preserved() {
        let hits = vec![
            hit("a", "first", 0.9, 0),
            hit("b", "second", 0.5, 1),
        ];
        let block = ContextAssembler::new(1000).assemble(&hits);
        assert!(block.text.find("first").unwrap() < block.text.find("second").unwrap());
    }

    #[test]
    fn test_budget_never_exceeded() {
        let hits = vec![
            hit("a", &"x".repeat(40), 0.9, 0),
            hit("b", &"y".repeat(40), 0.8, 1),
            hit("c", &"z".repeat(40), 0.7, 1),
        ];
        let block = ContextAssembler::new(90).assemble(&hits);
        assert!(block.text.chars().count() <= 90);
    }

    #[test]
    fn test_highest_hops_dropped_first() {
        let hits = vec![
            hit("a", &"a".repeat(40), 0.2, 0),
            hit("b", &"b".repeat(40), 0.9, 1),
        ];
        // Only one entry fits. The hop-1 hit goes despite its higher
        // score.
        let block = ContextAssembler::new(50).assemble(&hits);
        assert_eq!(block.node_ids, vec!["a"]);
        assert_eq!(block.dropped, 1);
    }

    #[test]
    fn test_lowest_score_breaks_hop_ties() {
        let hits = vec![
            hit("a", &"a".repeat(40), 0.9, 1),
            hit("b", &"b".repeat(40), 0.3, 1),
            hit("c", &"c".repeat(40), 0.6, 1),
        ];
        let block = ContextAssembler::new(90).assemble(&hits);
        assert_eq!(block.node_ids, vec!["a", "c"]);
        assert_eq!(block.dropped, 1);
    }

    #[test]
    fn test_oversized_single_entry_dropped_not_cut() {
        let hits = vec![hit("a", &"long".repeat(100), 0.9, 0)];
        let block = ContextAssembler::new(50).assemble(&hits);
        assert!(block.is_empty());
        assert_eq!(block.dropped, 1);
    }
}
