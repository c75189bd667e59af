//! Pipeline error taxonomy.
//!
//! Every failure mode the loading and query paths can produce maps onto one
//! of these variants. The bulk loader catches and records per-framework
//! errors; [`PipelineError::StoreUnavailable`] is the one condition treated
//! as fatal by query-time callers, since no fallback exists for similarity
//! search.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Remote fetch was requested but no provider credential is configured.
    #[error("remote provider credential missing (set the {0} environment variable)")]
    CredentialMissing(String),

    /// The remote documentation provider returned an error or was unreachable.
    /// Single attempt, no retry here; the bulk loader decides what to do next.
    #[error("remote fetch failed for '{framework}'{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    FetchError {
        framework: String,
        /// Upstream HTTP status, when the provider answered at all.
        status: Option<u16>,
        detail: String,
    },

    /// A configured local documentation path does not exist or is empty.
    #[error("documentation source not found: {0}")]
    SourceNotFound(String),

    /// Raw content could not be parsed into chunks. Aborts that document's
    /// chunking entirely; the normalizer never silently drops content.
    #[error("failed to parse {content_type} content: {detail}")]
    ParseError {
        content_type: String,
        detail: String,
    },

    /// The vector store backend is unreachable or rejected the request.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PipelineError {
    /// True when the bulk loader should try the local fallback for this
    /// framework (remote-side failures only).
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::CredentialMissing(_) | PipelineError::FetchError { .. }
        )
    }
}
