//! Bulk loading orchestration.
//!
//! Drives fetch → normalize → store for every configured framework, in
//! priority-tier order with declaration order preserved within a tier.
//! Frameworks inside one tier may load in parallel up to a bounded
//! concurrency limit; tiers themselves run strictly in sequence.
//!
//! The defining property of this pipeline is partial-failure tolerance: one
//! framework's failure is caught and recorded as a failed [`LoadResult`],
//! never propagated to abort the batch. When a remote fetch fails and the
//! framework has a local path configured, exactly one local fallback attempt
//! is made before giving up.
//!
//! Chunks are buffered in memory and committed with a single upsert per
//! framework, so a document that fails normalization writes nothing at all,
//! and cancellation never leaves a framework half-applied.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::models::{chunk_id, FrameworkSpec, LoadResult, LoadSummary, RawDocument};
use crate::normalize::normalize;
use crate::progress::{LoadProgressEvent, LoadProgressReporter};
use crate::store::VectorStore;

pub struct BulkLoader {
    fetcher: Arc<Fetcher>,
    store: Arc<dyn VectorStore>,
    max_tokens: usize,
    concurrency: usize,
    cancel: CancellationToken,
}

impl BulkLoader {
    pub fn new(
        fetcher: Fetcher,
        store: Arc<dyn VectorStore>,
        max_tokens: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            store,
            max_tokens,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Token callers can use to request cooperative cancellation. The loader
    /// finishes in-flight frameworks and stops dispatching new ones.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load every framework, optionally restricted to one priority tier.
    ///
    /// Returns a summary with one [`LoadResult`] per attempted framework, in
    /// (priority, declaration) order regardless of completion order.
    pub async fn load_all(
        &self,
        specs: &[FrameworkSpec],
        priority_filter: Option<u8>,
        progress: Arc<dyn LoadProgressReporter>,
    ) -> LoadSummary {
        let started_at = Utc::now();

        let mut ordered: Vec<FrameworkSpec> = specs
            .iter()
            .filter(|s| priority_filter.map_or(true, |p| s.priority == p))
            .cloned()
            .collect();
        // Stable sort keeps declaration order within a tier.
        ordered.sort_by_key(|s| s.priority);

        // Prior per-framework counts, for trimming stale trailing chunks on
        // shrink. A cold or unreachable store just means nothing to trim.
        let prior_counts = self
            .store
            .collection_stats()
            .await
            .map(|stats| stats.frameworks)
            .unwrap_or_default();

        let total = ordered.len();
        let mut slots: Vec<Option<LoadResult>> = vec![None; total];
        let mut cancelled = false;

        let mut tiers: Vec<(u8, Vec<(usize, FrameworkSpec)>)> = Vec::new();
        for (position, spec) in ordered.into_iter().enumerate() {
            match tiers.last_mut() {
                Some((tier, members)) if *tier == spec.priority => {
                    members.push((position, spec));
                }
                _ => tiers.push((spec.priority, vec![(position, spec)])),
            }
        }

        // Task id → (result slot, framework name), so a panicked task can
        // still be reported as that framework's failure.
        let mut task_meta: HashMap<tokio::task::Id, (usize, String)> = HashMap::new();

        'tiers: for (_, members) in tiers {
            let semaphore = Arc::new(Semaphore::new(self.concurrency));
            let mut tasks: JoinSet<(usize, LoadResult)> = JoinSet::new();

            for (position, spec) in members {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    drain(&mut tasks, &task_meta, &mut slots, progress.as_ref()).await;
                    break 'tiers;
                }

                // Throttle dispatch so the cancellation check above sits
                // between actual starts, not just between spawns.
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break 'tiers,
                };

                progress.report(LoadProgressEvent::Started {
                    framework: spec.name.clone(),
                    n: position + 1,
                    total,
                });

                let fetcher = Arc::clone(&self.fetcher);
                let store = Arc::clone(&self.store);
                let max_tokens = self.max_tokens;
                let prior = prior_counts.get(&spec.name).copied().unwrap_or(0);

                let framework = spec.name.clone();
                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    let result = load_one(&fetcher, store.as_ref(), &spec, max_tokens, prior).await;
                    (position, result)
                });
                task_meta.insert(handle.id(), (position, framework));
            }

            drain(&mut tasks, &task_meta, &mut slots, progress.as_ref()).await;
        }

        LoadSummary {
            results: slots.into_iter().flatten().collect(),
            started_at,
            finished_at: Utc::now(),
            cancelled,
        }
    }
}

async fn drain(
    tasks: &mut JoinSet<(usize, LoadResult)>,
    task_meta: &HashMap<tokio::task::Id, (usize, String)>,
    slots: &mut [Option<LoadResult>],
    progress: &dyn LoadProgressReporter,
) {
    while let Some(joined) = tasks.join_next().await {
        let (position, result) = match joined {
            Ok(pair) => pair,
            // A panic inside a load task (e.g. from a parsing library) is
            // recorded as that framework's failure, never dropped.
            Err(join_err) => match task_meta.get(&join_err.id()) {
                Some((position, framework)) => (
                    *position,
                    LoadResult::failed(framework, format!("load task panicked: {}", join_err)),
                ),
                None => continue,
            },
        };
        progress.report(LoadProgressEvent::Finished {
            result: result.clone(),
        });
        slots[position] = Some(result);
    }
}

/// Load a single framework: fetch (with at most one local fallback),
/// normalize, and commit the buffered chunk set in one upsert.
async fn load_one(
    fetcher: &Fetcher,
    store: &dyn VectorStore,
    spec: &FrameworkSpec,
    max_tokens: usize,
    prior_count: usize,
) -> LoadResult {
    let (doc, fallback_used) = match fetch_with_fallback(fetcher, spec).await {
        Ok(pair) => pair,
        Err(e) => return LoadResult::failed(&spec.name, e.to_string()),
    };

    let chunks = match normalize(&doc, max_tokens) {
        Ok(chunks) => chunks,
        Err(e) => return LoadResult::failed(&spec.name, e.to_string()),
    };

    if let Err(e) = store.upsert(&chunks).await {
        return LoadResult::failed(&spec.name, e.to_string());
    }

    // Upserts overwrite by id; a shrunk re-load additionally needs trailing
    // ids from the previous load removed so the stored set matches exactly.
    if prior_count > chunks.len() {
        let stale: Vec<String> = (chunks.len()..prior_count)
            .map(|i| chunk_id(&spec.name, i))
            .collect();
        if let Err(e) = store.delete(&stale).await {
            return LoadResult::failed(&spec.name, e.to_string());
        }
    }

    LoadResult::ok(&spec.name, chunks.len(), fallback_used)
}

/// Resolve the fetch source: remote when a URL is configured, with exactly
/// one local fallback attempt on remote failure; otherwise straight local.
async fn fetch_with_fallback(
    fetcher: &Fetcher,
    spec: &FrameworkSpec,
) -> Result<(RawDocument, bool), PipelineError> {
    match (&spec.url, &spec.path) {
        (Some(_), maybe_path) => match fetcher.fetch(spec).await {
            Ok(doc) => Ok((doc, false)),
            Err(e) if e.is_remote_failure() => match maybe_path {
                Some(path) => fetcher.fetch_local(path, &spec.name).map(|doc| (doc, true)),
                None => Err(e),
            },
            Err(e) => Err(e),
        },
        (None, Some(path)) => fetcher.fetch_local(path, &spec.name).map(|doc| (doc, false)),
        (None, None) => Err(PipelineError::SourceNotFound(format!(
            "framework '{}' has no url or path configured",
            spec.name
        ))),
    }
}

/// Framework name → priority tier, used by query-time ranking.
pub fn priority_map(specs: &[FrameworkSpec]) -> BTreeMap<String, u8> {
    specs
        .iter()
        .map(|s| (s.name.clone(), s.priority))
        .collect()
}

/// Print the post-run summary the way the CLI reports it.
pub fn print_summary(summary: &LoadSummary) {
    println!("load summary");
    println!(
        "  attempted: {}  succeeded: {}  failed: {}",
        summary.attempted(),
        summary.succeeded(),
        summary.failed()
    );
    println!("  total chunks: {}", summary.total_chunks());
    for result in &summary.results {
        if result.success {
            let via = if result.fallback_used {
                " (local fallback)"
            } else {
                ""
            };
            println!(
                "  ok   {:<20} {} chunks{}",
                result.framework, result.chunks_loaded, via
            );
        } else {
            println!(
                "  FAIL {:<20} {}",
                result.framework,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if summary.cancelled {
        println!("  (cancelled before all frameworks were attempted)");
    }
}
