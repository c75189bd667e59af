//! Query-time aggregation.
//!
//! Issues one similarity query, deduplicates near-identical fragments, ranks
//! them deterministically, and compresses the survivors into a response
//! bounded by a token budget. Many retrieved fragments collapse into one
//! answer sized for a calling agent's context window.
//!
//! Ranking order: score descending, then framework priority tier ascending,
//! then sequence index ascending, then chunk id — a total order, so repeated
//! queries against an unchanged store return fragments in the same order.

use std::collections::{BTreeMap, HashSet};

use crate::chunk::{truncate_chars, CHARS_PER_TOKEN};
use crate::error::PipelineError;
use crate::models::{Fragment, QueryResult};
use crate::store::VectorStore;

/// Fragments whose token-set overlap reaches this threshold are considered
/// near-identical and deduplicated.
const DEDUP_OVERLAP: f64 = 0.9;

/// Answer a question from the store within a bounded response size.
///
/// `StoreUnavailable` propagates — there is no fallback for similarity
/// search. Zero retrieved fragments is a valid outcome and yields an empty
/// result, not an error.
pub async fn answer(
    store: &dyn VectorStore,
    question: &str,
    top_k: usize,
    max_response_tokens: usize,
    priority_tiers: &BTreeMap<String, u8>,
) -> Result<QueryResult, PipelineError> {
    if question.trim().is_empty() {
        return Ok(QueryResult::empty());
    }

    let fragments = store.query(question, None, top_k).await?;
    if fragments.is_empty() {
        return Ok(QueryResult::empty());
    }

    let mut ranked = dedup_fragments(fragments);
    rank_fragments(&mut ranked, priority_tiers);
    Ok(compress(ranked, max_response_tokens))
}

/// Drop fragments that duplicate an already-kept one: same chunk id, same
/// content hash, or near-identical text.
fn dedup_fragments(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut kept: Vec<Fragment> = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let duplicate = kept.iter().any(|k| {
            k.chunk_id == fragment.chunk_id
                || (!k.hash.is_empty() && k.hash == fragment.hash)
                || token_overlap(&k.text, &fragment.text) >= DEDUP_OVERLAP
        });
        if !duplicate {
            kept.push(fragment);
        }
    }
    kept
}

/// Jaccard similarity over lowercase word sets.
fn token_overlap(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let set_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn rank_fragments(fragments: &mut [Fragment], priority_tiers: &BTreeMap<String, u8>) {
    fragments.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let tier_a = priority_tiers.get(&a.framework).copied().unwrap_or(u8::MAX);
                let tier_b = priority_tiers.get(&b.framework).copied().unwrap_or(u8::MAX);
                tier_a.cmp(&tier_b)
            })
            .then_with(|| a.sequence_index.cmp(&b.sequence_index))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

/// Greedily include fragments in rank order until the budget is exhausted,
/// truncating the last included fragment rather than omitting it silently.
fn compress(ranked: Vec<Fragment>, max_response_tokens: usize) -> QueryResult {
    let budget_chars = max_response_tokens * CHARS_PER_TOKEN;
    let separator = "\n\n";

    let mut included: Vec<Fragment> = Vec::new();
    let mut summary = String::new();

    for mut fragment in ranked {
        let prefix = format!("[{}] ", fragment.framework);
        let block = format!("{}{}", prefix, fragment.text);
        let sep_len = if summary.is_empty() { 0 } else { separator.len() };
        let remaining = budget_chars.saturating_sub(summary.len() + sep_len);

        // A slot that cannot hold the label plus any fragment text is no
        // slot at all; stop rather than emit an empty attribution.
        if remaining <= prefix.len() {
            break;
        }

        if block.len() <= remaining {
            if !summary.is_empty() {
                summary.push_str(separator);
            }
            summary.push_str(&block);
            included.push(fragment);
        } else {
            // The highest-ranked material always makes it in, cut to fit.
            let cut = truncate_chars(&block, remaining);
            let text = cut.get(prefix.len()..).map(str::trim_start).unwrap_or_default();
            if text.is_empty() {
                break;
            }
            fragment.text = text.to_string();
            if !summary.is_empty() {
                summary.push_str(separator);
            }
            summary.push_str(&cut);
            included.push(fragment);
            break;
        }
    }

    QueryResult {
        fragments: included,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{chunk_id, Chunk, ChunkMetadata, SourceType};
    use crate::store::{MemoryStore, VectorStore};
    use chrono::Utc;
    use sha2::{Digest, Sha256};

    fn fragment(framework: &str, index: usize, text: &str, score: f64) -> Fragment {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Fragment {
            chunk_id: chunk_id(framework, index),
            text: text.to_string(),
            hash: format!("{:x}", hasher.finalize()),
            score,
            framework: framework.to_string(),
            sequence_index: index,
        }
    }

    fn tiers(pairs: &[(&str, u8)]) -> BTreeMap<String, u8> {
        pairs.iter().map(|(n, p)| (n.to_string(), *p)).collect()
    }

    #[test]
    fn ranking_by_score_then_tier_then_index() {
        let tiers = tiers(&[("Redis", 1), ("Vite", 2)]);
        let mut fragments = vec![
            fragment("Vite", 0, "vite build output", 0.8),
            fragment("Redis", 3, "redis replication", 0.8),
            fragment("Redis", 1, "redis persistence", 0.8),
            fragment("Vite", 0, "vite dev server", 0.9),
        ];
        rank_fragments(&mut fragments, &tiers);

        let order: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "vite dev server",     // highest score
                "redis persistence",   // score tie: tier 1 before tier 2, index 1 first
                "redis replication",
                "vite build output",
            ]
        );
    }

    #[test]
    fn ranking_is_stable_across_calls() {
        let tiers = tiers(&[("Redis", 1)]);
        let make = || {
            vec![
                fragment("Redis", 2, "gamma", 0.5),
                fragment("Redis", 0, "alpha", 0.5),
                fragment("Redis", 1, "beta", 0.5),
            ]
        };
        let mut a = make();
        let mut b = make();
        rank_fragments(&mut a, &tiers);
        rank_fragments(&mut b, &tiers);
        let ids_a: Vec<_> = a.iter().map(|f| f.chunk_id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|f| f.chunk_id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a[0], chunk_id("Redis", 0));
    }

    #[test]
    fn dedup_drops_same_hash() {
        let fragments = vec![
            fragment("Redis", 0, "identical text", 0.9),
            fragment("Django", 4, "identical text", 0.7),
        ];
        let kept = dedup_fragments(fragments);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].framework, "Redis");
    }

    #[test]
    fn dedup_drops_high_overlap() {
        let fragments = vec![
            fragment("Redis", 0, "the cache eviction policy controls memory", 0.9),
            fragment("Redis", 5, "cache eviction policy controls the memory", 0.7),
            fragment("Django", 0, "template rendering is entirely unrelated", 0.6),
        ];
        let kept = dedup_fragments(fragments);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].framework, "Django");
    }

    #[test]
    fn compress_respects_token_budget() {
        let long = "word ".repeat(200).trim_end().to_string();
        let ranked = vec![
            fragment("Redis", 0, &long, 0.9),
            fragment("Redis", 1, &long, 0.8),
        ];
        let budget_tokens = 50; // 200 chars
        let result = compress(ranked, budget_tokens);
        assert!(result.summary.len() <= budget_tokens * CHARS_PER_TOKEN);
        // The highest-ranked fragment is included (truncated), not omitted.
        assert_eq!(result.fragments.len(), 1);
        assert_eq!(result.fragments[0].chunk_id, chunk_id("Redis", 0));
        assert!(result.summary.starts_with("[Redis]"));
    }

    #[test]
    fn compress_truncates_last_included_fragment_only() {
        let ranked = vec![
            fragment("Redis", 0, "short first fragment", 0.9),
            fragment("Redis", 1, &"filler ".repeat(100), 0.8),
        ];
        let result = compress(ranked, 20); // 80 chars
        assert!(result.summary.len() <= 80);
        assert_eq!(result.fragments.len(), 2);
        // First survives whole; second was cut to fit.
        assert_eq!(result.fragments[0].text, "short first fragment");
        assert!(result.fragments[1].text.len() < 700);
    }

    #[test]
    fn compress_skips_slots_too_small_for_any_text() {
        let ranked = vec![fragment("Redis", 0, "persistence matters", 0.9)];
        // 4 chars, smaller than the "[Redis] " label itself.
        let result = compress(ranked, 1);
        assert!(result.fragments.is_empty());
        assert!(result.summary.is_empty());
    }

    #[test]
    fn compress_never_emits_empty_attribution() {
        // Multibyte framework name with a budget barely past the label.
        let ranked = vec![fragment("Café", 0, "brewing documentation text", 0.9)];
        let result = compress(ranked, 3);
        assert!(result.summary.len() <= 12);
        for frag in &result.fragments {
            assert!(!frag.text.is_empty());
        }
    }

    #[tokio::test]
    async fn empty_store_yields_empty_result_not_error() {
        let store = MemoryStore::new();
        let result = answer(&store, "anything at all", 4, 100, &BTreeMap::new())
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.summary.is_empty());
    }

    #[tokio::test]
    async fn answer_is_deterministic_for_fixed_store() {
        let store = MemoryStore::new();
        let texts = [
            "redis persistence with append only files",
            "redis replication across nodes",
            "redis eviction policies for caches",
        ];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut hasher = Sha256::new();
                hasher.update(text.as_bytes());
                Chunk {
                    id: chunk_id("Redis", i),
                    text: text.to_string(),
                    hash: format!("{:x}", hasher.finalize()),
                    metadata: ChunkMetadata {
                        framework: "Redis".to_string(),
                        source_type: SourceType::Local,
                        loaded_at: Utc::now(),
                        sequence_index: i,
                    },
                }
            })
            .collect();
        store.upsert(&chunks).await.unwrap();

        let tiers = tiers(&[("Redis", 1)]);
        let a = answer(&store, "redis persistence", 4, 200, &tiers).await.unwrap();
        let b = answer(&store, "redis persistence", 4, 200, &tiers).await.unwrap();
        assert_eq!(a.summary, b.summary);
        let ids_a: Vec<_> = a.fragments.iter().map(|f| f.chunk_id.clone()).collect();
        let ids_b: Vec<_> = b.fragments.iter().map(|f| f.chunk_id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
