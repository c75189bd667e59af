//! Bulk-load progress reporting.
//!
//! Emits per-framework progress during `docb load` so operators can see what
//! is being fetched and how much is left. Progress goes to **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

use crate::models::LoadResult;

/// A single progress event from the bulk loader.
#[derive(Clone, Debug)]
pub enum LoadProgressEvent {
    /// A framework load has been dispatched: n-th of total.
    Started {
        framework: String,
        n: usize,
        total: usize,
    },
    /// A framework load finished (success or recorded failure).
    Finished { result: LoadResult },
}

/// Reports load progress. Implementations write to stderr (human or JSON).
pub trait LoadProgressReporter: Send + Sync {
    fn report(&self, event: LoadProgressEvent);
}

/// Human-friendly progress: "load [3/17] Redis ..." / "load Redis ok (42 chunks)".
pub struct StderrProgress;

impl LoadProgressReporter for StderrProgress {
    fn report(&self, event: LoadProgressEvent) {
        let line = match &event {
            LoadProgressEvent::Started {
                framework,
                n,
                total,
            } => format!("load [{}/{}] {} ...\n", n, total, framework),
            LoadProgressEvent::Finished { result } => {
                if result.success {
                    let via = if result.fallback_used {
                        " via local fallback"
                    } else {
                        ""
                    };
                    format!(
                        "load {} ok ({} chunks{})\n",
                        result.framework, result.chunks_loaded, via
                    )
                } else {
                    format!(
                        "load {} failed: {}\n",
                        result.framework,
                        result.error.as_deref().unwrap_or("unknown error")
                    )
                }
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl LoadProgressReporter for JsonProgress {
    fn report(&self, event: LoadProgressEvent) {
        let obj = match &event {
            LoadProgressEvent::Started {
                framework,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "framework": framework,
                "n": n,
                "total": total,
            }),
            LoadProgressEvent::Finished { result } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "framework": result.framework,
                "success": result.success,
                "chunks_loaded": result.chunks_loaded,
                "fallback_used": result.fallback_used,
                "error": result.error,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl LoadProgressReporter for NoProgress {
    fn report(&self, _event: LoadProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn LoadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
