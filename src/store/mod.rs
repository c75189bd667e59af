//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the boundary to the embedding/search backend:
//! chunk upserts keyed by stable identifiers, metadata-filtered similarity
//! queries, and collection statistics. Two implementations ship here — the
//! Chroma-style HTTP backend used in production and an in-memory store for
//! tests and backendless runs.
//!
//! The adapter performs no locking of its own. Concurrent upserts from
//! different frameworks never conflict because their chunk ids are disjoint;
//! queries running alongside upserts may observe partially-loaded state.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::models::{Chunk, Fragment};

pub use http::HttpVectorStore;
pub use memory::MemoryStore;

/// Fresh counts against the backing collection, never a cached estimate.
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub total_chunks: usize,
    /// Chunk count per framework name.
    pub frameworks: BTreeMap<String, usize>,
}

/// Abstract embedding/search backend.
///
/// All failures surface as [`PipelineError::StoreUnavailable`]; finer-grained
/// backend errors carry no actionable distinction for callers of this
/// pipeline.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-overwrite chunks keyed by their identifiers. Idempotent:
    /// identical ids are last-write-wins on content and metadata.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), PipelineError>;

    /// Remove chunks by identifier. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError>;

    /// Similarity query, optionally filtered to one framework's chunks.
    /// Returns fragments ranked by descending score.
    async fn query(
        &self,
        text: &str,
        framework: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Fragment>, PipelineError>;

    /// Count what the collection currently holds.
    async fn collection_stats(&self) -> Result<CollectionStats, PipelineError>;
}
