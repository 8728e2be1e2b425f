//! Context expansion: stitch a match together with its neighbors.
//!
//! For a match, collect every chunk of the same source sorted by position,
//! locate the match among them (exact text first, token-overlap fallback),
//! and join the window `[anchor - 1, anchor + 1]` with blank lines.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::types::{ExpandedPassage, RetrievedMatch};
use docsage_core::{Chunk, Result, RetrievalConfig, SiblingLookupKind};
use docsage_store::SimilarityIndex;

pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// How sibling chunks of a match are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SiblingLookup {
    /// The index's source → rows map.
    #[default]
    Direct,
    /// A broad similarity query seeded with the match's own vector, filtered
    /// to the match's source. Only sees siblings within the `fetch_k` nearest.
    OverFetch { fetch_k: usize },
}

impl SiblingLookup {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        match config.sibling_lookup {
            SiblingLookupKind::Direct => Self::Direct,
            SiblingLookupKind::OverFetch => Self::OverFetch {
                fetch_k: config.over_fetch_k,
            },
        }
    }
}

pub struct ContextExpander {
    index: Arc<SimilarityIndex>,
    lookup: SiblingLookup,
}

impl ContextExpander {
    pub fn new(index: Arc<SimilarityIndex>, lookup: SiblingLookup) -> Self {
        Self { index, lookup }
    }

    /// Expand one match. Never fails for lack of siblings; the passage then
    /// carries the unexpanded chunk text and a `note`.
    pub fn expand(&self, m: &RetrievedMatch) -> Result<ExpandedPassage> {
        let siblings = self.siblings(m)?;
        if siblings.is_empty() {
            warn!(
                "No sibling chunks found for {} position {}; returning match unexpanded",
                m.chunk.source, m.chunk.position
            );
            return Ok(passage(
                m,
                m.chunk.text.clone(),
                1,
                Some("no sibling chunks found; returned unexpanded".into()),
            ));
        }

        let mut note = None;
        let anchor = match siblings.iter().position(|c| c.text == m.chunk.text) {
            Some(i) => i,
            None => {
                let (i, score) = best_token_overlap(&siblings, &m.chunk.text);
                warn!(
                    "No exact text match in {}; anchored on position {} by token overlap {:.3}",
                    m.chunk.source, siblings[i].position, score
                );
                note = Some(format!(
                    "anchor located by token overlap (jaccard {:.3})",
                    score
                ));
                i
            }
        };

        let window = neighbor_window(anchor, siblings.len());
        let joined = window.len();
        let text = siblings[window]
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);
        debug!(
            "Expanded {} position {} with {} chunks",
            m.chunk.source, m.chunk.position, joined
        );
        Ok(passage(m, text, joined, note))
    }

    /// Chunks sharing the match's source, sorted by position.
    ///
    /// Over-fetch falls back to the direct map when the similarity query
    /// finds nothing, e.g. for a row whose stored vector is zero.
    fn siblings(&self, m: &RetrievedMatch) -> Result<Vec<&Chunk>> {
        let source = m.chunk.source.as_str();
        let SiblingLookup::OverFetch { fetch_k } = self.lookup else {
            return Ok(self.direct_siblings(source));
        };

        let mut chunks: Vec<&Chunk> = match self.index.row_vector(m.row) {
            Some(vector) => self
                .index
                .search(vector, fetch_k)?
                .into_iter()
                .filter_map(|hit| self.index.record(hit.row))
                .filter(|c| c.source == source)
                .collect(),
            None => Vec::new(),
        };
        if chunks.is_empty() {
            debug!(
                "Over-fetch found no siblings for {} position {}; using direct lookup",
                source, m.chunk.position
            );
            return Ok(self.direct_siblings(source));
        }
        chunks.sort_by_key(|c| c.position);
        Ok(chunks)
    }

    fn direct_siblings(&self, source: &str) -> Vec<&Chunk> {
        self.index
            .siblings(source)
            .iter()
            .filter_map(|&row| self.index.record(row))
            .collect()
    }
}

fn passage(
    m: &RetrievedMatch,
    expanded_text: String,
    chunks_joined: usize,
    note: Option<String>,
) -> ExpandedPassage {
    ExpandedPassage {
        source: m.chunk.source.clone(),
        page: m.chunk.page,
        position: m.chunk.position,
        expanded_text,
        relevance_score: m.relevance_score,
        chunks_joined,
        note,
    }
}

/// Window of at most one predecessor and one successor around `anchor`.
pub fn neighbor_window(anchor: usize, len: usize) -> Range<usize> {
    anchor.saturating_sub(1)..(anchor + 2).min(len)
}

/// Jaccard similarity of lowercase whitespace-delimited token sets.
/// Two empty texts score 0.
pub fn jaccard(a: &str, b: &str) -> f32 {
    let a = token_set(a);
    let b = token_set(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Index and score of the best-overlapping chunk; ties go to the earliest.
/// `chunks` must be non-empty.
fn best_token_overlap(chunks: &[&Chunk], text: &str) -> (usize, f32) {
    let mut best = (0, f32::MIN);
    for (i, chunk) in chunks.iter().enumerate() {
        let score = jaccard(&chunk.text, text);
        if score > best.1 {
            best = (i, score);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{hashing_index, texts_of};

    fn match_for(index: &SimilarityIndex, row: usize) -> RetrievedMatch {
        RetrievedMatch {
            chunk: index.record(row).unwrap().clone(),
            row,
            distance: 0.25,
            relevance_score: 0.75,
        }
    }

    #[test]
    fn test_neighbor_window_bounds() {
        assert_eq!(neighbor_window(0, 5), 0..2);
        assert_eq!(neighbor_window(2, 5), 1..4);
        assert_eq!(neighbor_window(4, 5), 3..5);
        assert_eq!(neighbor_window(0, 1), 0..1);
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard("", ""), 0.0);
        assert_eq!(jaccard("The cat", "the CAT"), 1.0);
        assert!((jaccard("a b c", "b c d") - 0.5).abs() < 1e-6);
        assert_eq!(jaccard("a", "b"), 0.0);
    }

    #[tokio::test]
    async fn test_first_middle_last_windows() {
        let index = hashing_index(&[("doc.pdf", &["one", "two", "three", "four"])]).await;
        let expander = ContextExpander::new(index.clone(), SiblingLookup::Direct);

        let first = expander.expand(&match_for(&index, 0)).unwrap();
        assert_eq!(first.expanded_text, "one\n\ntwo");
        assert_eq!(first.chunks_joined, 2);
        assert!(first.note.is_none());

        let middle = expander.expand(&match_for(&index, 1)).unwrap();
        assert_eq!(middle.expanded_text, "one\n\ntwo\n\nthree");
        assert_eq!(middle.chunks_joined, 3);

        let last = expander.expand(&match_for(&index, 3)).unwrap();
        assert_eq!(last.expanded_text, "three\n\nfour");
        assert_eq!(last.position, 3);
        assert_eq!(last.relevance_score, 0.75);
    }

    #[tokio::test]
    async fn test_single_chunk_source() {
        let index = hashing_index(&[("solo.pdf", &["only chunk"]), ("x.pdf", &["a", "b"])]).await;
        let expander = ContextExpander::new(index.clone(), SiblingLookup::Direct);
        let p = expander.expand(&match_for(&index, 0)).unwrap();
        assert_eq!(p.expanded_text, "only chunk");
        assert_eq!(p.chunks_joined, 1);
    }

    #[tokio::test]
    async fn test_sources_do_not_mix() {
        let index = hashing_index(&[("a.pdf", &["a0", "a1"]), ("b.pdf", &["b0", "b1"])]).await;
        let expander = ContextExpander::new(index.clone(), SiblingLookup::Direct);
        let p = expander.expand(&match_for(&index, 2)).unwrap();
        assert_eq!(p.source, "b.pdf");
        assert_eq!(p.expanded_text, "b0\n\nb1");
    }

    #[tokio::test]
    async fn test_altered_match_anchors_by_token_overlap() {
        let texts = [
            "intro to the manual",
            "press the red button to start the pump",
            "wait for the green light before opening",
            "closing remarks",
        ];
        let index = hashing_index(&[("pump.pdf", &texts)]).await;
        let expander = ContextExpander::new(index.clone(), SiblingLookup::Direct);

        let mut m = match_for(&index, 1);
        m.chunk.text = "press the blue button to start the pump".into();
        let p = expander.expand(&m).unwrap();
        assert_eq!(
            p.expanded_text,
            [texts[0], texts[1], texts[2]].join(PASSAGE_SEPARATOR)
        );
        assert!(p.note.unwrap().contains("token overlap"));
    }

    #[tokio::test]
    async fn test_duplicate_texts_anchor_on_first() {
        let index = hashing_index(&[("dup.pdf", &["same", "other", "same", "tail"])]).await;
        let expander = ContextExpander::new(index.clone(), SiblingLookup::Direct);
        let p = expander.expand(&match_for(&index, 2)).unwrap();
        assert_eq!(p.expanded_text, "same\n\nother");
    }

    #[tokio::test]
    async fn test_unknown_source_returns_unexpanded_with_note() {
        let index = hashing_index(&[("a.pdf", &["a0", "a1"])]).await;
        let expander = ContextExpander::new(index.clone(), SiblingLookup::Direct);
        let mut m = match_for(&index, 0);
        m.chunk.source = "gone.pdf".into();
        let p = expander.expand(&m).unwrap();
        assert_eq!(p.expanded_text, "a0");
        assert_eq!(p.chunks_joined, 1);
        assert!(p.note.is_some());
    }

    #[tokio::test]
    async fn test_over_fetch_agrees_with_direct_on_small_corpus() {
        let index = hashing_index(&[
            ("a.pdf", &["rust ownership", "borrow checker", "lifetimes explained"]),
            ("b.pdf", &["python typing", "async await", "generators"]),
        ])
        .await;
        let direct = ContextExpander::new(index.clone(), SiblingLookup::Direct);
        let over = ContextExpander::new(index.clone(), SiblingLookup::OverFetch { fetch_k: 100 });
        for row in 0..index.len() {
            let m = match_for(&index, row);
            assert_eq!(direct.expand(&m).unwrap(), over.expand(&m).unwrap());
        }
        assert_eq!(texts_of(&index, "b.pdf").len(), 3);
    }

    #[tokio::test]
    async fn test_over_fetch_expands_zero_vector_row() {
        // punctuation-only text hashes to a zero vector
        let index = hashing_index(&[("table.pdf", &["alpha beta", "--- * ---", "gamma delta"])]).await;
        assert!(index.row_vector(1).unwrap().iter().all(|&x| x == 0.0));

        let direct = ContextExpander::new(index.clone(), SiblingLookup::Direct);
        let over = ContextExpander::new(index.clone(), SiblingLookup::OverFetch { fetch_k: 100 });
        let m = match_for(&index, 1);

        let p = over.expand(&m).unwrap();
        assert_eq!(p.expanded_text, "alpha beta\n\n--- * ---\n\ngamma delta");
        assert!(p.note.is_none());
        assert_eq!(p, direct.expand(&m).unwrap());
    }

    #[test]
    fn test_lookup_from_config() {
        let mut config = RetrievalConfig::default();
        assert_eq!(SiblingLookup::from_config(&config), SiblingLookup::Direct);
        config.sibling_lookup = SiblingLookupKind::OverFetch;
        config.over_fetch_k = 42;
        assert_eq!(
            SiblingLookup::from_config(&config),
            SiblingLookup::OverFetch { fetch_k: 42 }
        );
    }
}
