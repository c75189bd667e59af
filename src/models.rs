//! Core data models used throughout docbridge.
//!
//! These types represent the framework specs, raw documents, chunks, and
//! results that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identity of one documentation source. Defined in the TOML config as a
/// `[[frameworks]]` table and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameworkSpec {
    /// Unique key; also the `framework` metadata value on every stored chunk.
    pub name: String,
    /// Canonical documentation URL for the remote extraction provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Local file or directory fallback.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Priority tier; lower tiers load first.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub description: String,
}

fn default_priority() -> u8 {
    2
}

/// Which provider produced a raw document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Remote,
    Local,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Remote => write!(f, "remote"),
            SourceType::Local => write!(f, "local"),
        }
    }
}

/// Unparsed content as returned by a fetch. Consumed exactly once by
/// normalization and then discarded; never persisted.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub framework: String,
    pub source_type: SourceType,
    /// MIME-ish content type used to pick the parser ("text/markdown",
    /// "text/html", "application/pdf", "text/plain").
    pub content_type: String,
    pub body: RawBody,
    pub fetched_at: DateTime<Utc>,
}

/// Body payload of a [`RawDocument`]. PDF sources arrive as bytes; everything
/// else is already UTF-8 text.
#[derive(Debug, Clone)]
pub enum RawBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl RawBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RawBody::Text(t) => t.trim().is_empty(),
            RawBody::Bytes(b) => b.is_empty(),
        }
    }
}

/// The atomic unit of storage: a bounded text span plus addressing metadata.
///
/// The id is derived from the framework name and sequence index, so
/// re-loading a framework overwrites the same records (upsert semantics)
/// instead of appending duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// SHA-256 of `text`, used for near-duplicate detection at query time.
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// Metadata record stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub framework: String,
    pub source_type: SourceType,
    pub loaded_at: DateTime<Utc>,
    pub sequence_index: usize,
}

/// Chunk-id slug for a framework display name: lowercased with whitespace
/// collapsed to `-` ("Python 3.12" → "python-3.12"). Distinct frameworks
/// must have distinct slugs; config validation enforces this.
pub fn framework_slug(framework: &str) -> String {
    framework
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Build the stable chunk identifier for (framework, sequence index).
pub fn chunk_id(framework: &str, sequence_index: usize) -> String {
    format!("{}:{}", framework_slug(framework), sequence_index)
}

/// Outcome of loading one framework.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub framework: String,
    pub chunks_loaded: usize,
    pub success: bool,
    /// Description of the failure, when `success` is false.
    pub error: Option<String>,
    /// True when the remote fetch failed and the local path served the load.
    pub fallback_used: bool,
}

impl LoadResult {
    pub fn ok(framework: &str, chunks_loaded: usize, fallback_used: bool) -> Self {
        Self {
            framework: framework.to_string(),
            chunks_loaded,
            success: true,
            error: None,
            fallback_used,
        }
    }

    pub fn failed(framework: &str, error: String) -> Self {
        Self {
            framework: framework.to_string(),
            chunks_loaded: 0,
            success: false,
            error: Some(error),
            fallback_used: false,
        }
    }
}

/// Aggregate outcome of a bulk load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub results: Vec<LoadResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True when the run stopped early due to cancellation.
    pub cancelled: bool,
}

impl LoadSummary {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn total_chunks(&self) -> usize {
        self.results.iter().map(|r| r.chunks_loaded).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0 && !self.cancelled
    }
}

/// Persisted summary of what the store currently holds. Rebuilt wholesale on
/// every index run from a fresh count against the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub total_frameworks: usize,
    pub total_chunks: usize,
    /// Chunk count per framework, sorted by framework name.
    pub frameworks: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

/// One retrieved fragment from a similarity query.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub chunk_id: String,
    pub text: String,
    pub hash: String,
    /// Similarity score, higher is better.
    pub score: f64,
    pub framework: String,
    pub sequence_index: usize,
}

/// Ranked, deduplicated answer to one question.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub fragments: Vec<Fragment>,
    /// Compressed rendering of the fragments, bounded by the token budget.
    pub summary: String,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            fragments: Vec::new(),
            summary: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
