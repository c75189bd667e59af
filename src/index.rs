//! Index manifest building.
//!
//! Produces the operational summary of what the store holds: framework
//! count, chunk totals, and per-framework breakdowns. Counts are recomputed
//! fresh from the vector store on every build — a previously written
//! manifest is never consulted — and the manifest file is overwritten
//! wholesale, never patched.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

use crate::error::PipelineError;
use crate::models::IndexManifest;
use crate::store::VectorStore;

/// Build a manifest from a fresh count against the vector store.
pub async fn build_manifest(store: &dyn VectorStore) -> Result<IndexManifest, PipelineError> {
    let stats = store.collection_stats().await?;
    Ok(IndexManifest {
        total_frameworks: stats.frameworks.len(),
        total_chunks: stats.total_chunks,
        frameworks: stats.frameworks,
        generated_at: Utc::now(),
    })
}

/// Overwrite the manifest JSON at its well-known path.
pub fn write_manifest(manifest: &IndexManifest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create manifest directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
    Ok(())
}

/// Print the manifest summary the way the CLI shows it.
pub fn print_manifest(manifest: &IndexManifest, path: &Path) {
    println!("documentation index");
    println!("  frameworks: {}", manifest.total_frameworks);
    println!("  chunks:     {}", manifest.total_chunks);
    for (name, count) in &manifest.frameworks {
        println!("  {:<24} {:>8}", name, count);
    }
    println!("  written to: {}", path.display());
}
