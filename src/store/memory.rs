//! In-memory [`VectorStore`] implementation for tests and backendless runs.
//!
//! Chunks live in a `BTreeMap` behind `std::sync::RwLock`. Similarity is
//! approximated by query-term overlap, which is deterministic and good
//! enough to exercise ranking, dedup, and bounding logic without an
//! embedding backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::{Chunk, Fragment};

use super::{CollectionStats, VectorStore};

#[derive(Default)]
pub struct MemoryStore {
    chunks: RwLock<BTreeMap<String, Chunk>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> PipelineError {
        PipelineError::StoreUnavailable("memory store lock poisoned".to_string())
    }
}

/// Fraction of query terms present in the chunk text, in [0, 1].
fn term_overlap(query_terms: &[String], text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let matches = query_terms
        .iter()
        .filter(|t| text_lower.contains(t.as_str()))
        .count();
    matches as f64 / query_terms.len() as f64
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), PipelineError> {
        let mut stored = self.chunks.write().map_err(|_| Self::lock_err())?;
        for chunk in chunks {
            stored.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError> {
        let mut stored = self.chunks.write().map_err(|_| Self::lock_err())?;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        framework: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Fragment>, PipelineError> {
        let query_terms: Vec<String> = text
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();

        let stored = self.chunks.read().map_err(|_| Self::lock_err())?;
        let mut fragments: Vec<Fragment> = stored
            .values()
            .filter(|chunk| framework.map_or(true, |fw| chunk.metadata.framework == fw))
            .map(|chunk| Fragment {
                chunk_id: chunk.id.clone(),
                text: chunk.text.clone(),
                hash: chunk.hash.clone(),
                score: term_overlap(&query_terms, &chunk.text),
                framework: chunk.metadata.framework.clone(),
                sequence_index: chunk.metadata.sequence_index,
            })
            .collect();

        fragments.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        fragments.truncate(limit);
        Ok(fragments)
    }

    async fn collection_stats(&self) -> Result<CollectionStats, PipelineError> {
        let stored = self.chunks.read().map_err(|_| Self::lock_err())?;
        let mut stats = CollectionStats {
            total_chunks: stored.len(),
            ..CollectionStats::default()
        };
        for chunk in stored.values() {
            *stats
                .frameworks
                .entry(chunk.metadata.framework.clone())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }
}
