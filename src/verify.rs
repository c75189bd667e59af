//! Post-load verification.
//!
//! Confirms, per framework, that at least one chunk is retrievable and
//! reports counts. Verification produces a report, never a failure: a
//! framework absent from the store (or a store that cannot be queried) is
//! reported unreachable, not raised as an error.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::store::VectorStore;

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub chunk_count: usize,
    pub reachable: bool,
}

/// Verify each named framework with a lightweight name-seeded query.
///
/// `reachable` is true only when the framework has stored chunks and the
/// probe query succeeded against the backend.
pub async fn verify_frameworks(
    store: &dyn VectorStore,
    names: &[String],
) -> BTreeMap<String, VerifyReport> {
    let counts = store
        .collection_stats()
        .await
        .map(|stats| stats.frameworks)
        .unwrap_or_default();

    let mut reports = BTreeMap::new();
    for name in names {
        let chunk_count = counts.get(name).copied().unwrap_or(0);
        let probe = format!("{} documentation", name);
        let query_ok = store.query(&probe, Some(name), 1).await.is_ok();

        reports.insert(
            name.clone(),
            VerifyReport {
                chunk_count,
                reachable: query_ok && chunk_count > 0,
            },
        );
    }
    reports
}

/// Print the verification report the way the CLI shows it.
pub fn print_report(reports: &BTreeMap<String, VerifyReport>) {
    println!("{:<24} {:>8}  REACHABLE", "FRAMEWORK", "CHUNKS");
    for (name, report) in reports {
        println!(
            "{:<24} {:>8}  {}",
            name,
            report.chunk_count,
            if report.reachable { "yes" } else { "no" }
        );
    }
}

/// True when every framework in the report verified as reachable.
pub fn all_reachable(reports: &BTreeMap<String, VerifyReport>) -> bool {
    reports.values().all(|r| r.reachable)
}
