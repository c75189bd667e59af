//! # docbridge CLI (`docb`)
//!
//! The `docb` binary drives the documentation pipeline: bulk loading,
//! verification, index building, and ad-hoc queries.
//!
//! ## Usage
//!
//! ```bash
//! docb --config ./config/docbridge.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docb load` | Load every configured framework into the vector store |
//! | `docb load --tier 1` | Load only one priority tier |
//! | `docb verify` | Check that each framework's chunks are retrievable |
//! | `docb index` | Rebuild the manifest JSON from fresh store counts |
//! | `docb query "<question>"` | Ask the aggregator a question |
//! | `docb all` | Load, verify, and index in one run |
//!
//! Exit code is 0 only on full success; any framework that failed to load or
//! verify makes the command exit non-zero.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docbridge::config::{self, Config};
use docbridge::fetch::Fetcher;
use docbridge::loader::{self, BulkLoader};
use docbridge::progress::ProgressMode;
use docbridge::store::{HttpVectorStore, MemoryStore, VectorStore};
use docbridge::{index, query, verify};

/// docbridge CLI — load framework documentation into a shared vector store
/// and serve token-bounded answers from it.
#[derive(Parser)]
#[command(
    name = "docb",
    about = "docbridge — framework documentation ingestion and retrieval for AI agents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docbridge.toml")]
    config: PathBuf,

    /// Progress output on stderr: auto, off, human, or json.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load framework documentation into the vector store.
    ///
    /// Frameworks load in priority-tier order, declaration order within a
    /// tier. A framework's failure is recorded and never aborts the rest.
    Load {
        /// Only load frameworks in this priority tier.
        #[arg(long)]
        tier: Option<u8>,

        /// Shorthand for `--tier 1`.
        #[arg(long, conflicts_with = "tier")]
        priority_only: bool,
    },

    /// Verify that each configured framework is retrievable from the store.
    Verify,

    /// Rebuild the documentation index manifest from fresh store counts.
    Index,

    /// Ask the aggregator a question against the loaded documentation.
    Query {
        question: String,

        /// Override the configured similarity query limit.
        #[arg(long)]
        top_k: Option<usize>,

        /// Override the configured response token budget.
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Load, verify, and index in one run.
    All,
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        _ => Ok(Arc::new(HttpVectorStore::new(&config.store)?)),
    }
}

fn progress_mode(flag: &str) -> anyhow::Result<ProgressMode> {
    match flag {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "off" => Ok(ProgressMode::Off),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        other => anyhow::bail!("Unknown progress mode: {}. Use auto, off, human, or json.", other),
    }
}

async fn run_load(
    config: &Config,
    store: Arc<dyn VectorStore>,
    tier: Option<u8>,
    mode: ProgressMode,
) -> anyhow::Result<bool> {
    let fetcher = Fetcher::new(config.provider.clone());
    let bulk = BulkLoader::new(
        fetcher,
        store,
        config.chunking.max_tokens,
        config.load.concurrency,
    );

    // Ctrl-C requests cooperative cancellation: the in-flight frameworks
    // finish their buffered commit, then the run stops.
    let cancel = bulk.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let summary = bulk
        .load_all(&config.frameworks, tier, mode.reporter().into())
        .await;
    loader::print_summary(&summary);
    Ok(summary.all_succeeded())
}

async fn run_verify(config: &Config, store: &dyn VectorStore) -> bool {
    let names: Vec<String> = config.frameworks.iter().map(|f| f.name.clone()).collect();
    let reports = verify::verify_frameworks(store, &names).await;
    verify::print_report(&reports);
    verify::all_reachable(&reports)
}

async fn run_index(config: &Config, store: &dyn VectorStore) -> anyhow::Result<()> {
    let manifest = index::build_manifest(store).await?;
    index::write_manifest(&manifest, &config.index.manifest_path)?;
    index::print_manifest(&manifest, &config.index.manifest_path);
    Ok(())
}

async fn run_query(
    config: &Config,
    store: &dyn VectorStore,
    question: &str,
    top_k: Option<usize>,
    max_tokens: Option<usize>,
) -> anyhow::Result<()> {
    let tiers = loader::priority_map(&config.frameworks);
    let result = query::answer(
        store,
        question,
        top_k.unwrap_or(config.query.top_k),
        max_tokens.unwrap_or(config.query.max_response_tokens),
        &tiers,
    )
    .await?;

    if result.is_empty() {
        println!("No matching documentation.");
        return Ok(());
    }

    for (i, fragment) in result.fragments.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} #{} ({})",
            i + 1,
            fragment.score,
            fragment.framework,
            fragment.sequence_index,
            fragment.chunk_id
        );
    }
    println!();
    println!("{}", result.summary);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;
    let mode = progress_mode(&cli.progress)?;
    let store = open_store(&config)?;

    let full_success = match cli.command {
        Commands::Load {
            tier,
            priority_only,
        } => {
            let tier = tier.or(if priority_only { Some(1) } else { None });
            run_load(&config, Arc::clone(&store), tier, mode).await?
        }
        Commands::Verify => run_verify(&config, store.as_ref()).await,
        Commands::Index => {
            run_index(&config, store.as_ref()).await?;
            true
        }
        Commands::Query {
            question,
            top_k,
            max_tokens,
        } => {
            run_query(&config, store.as_ref(), &question, top_k, max_tokens).await?;
            true
        }
        Commands::All => {
            let loaded = run_load(&config, Arc::clone(&store), None, mode).await?;
            let verified = run_verify(&config, store.as_ref()).await;
            run_index(&config, store.as_ref()).await?;
            loaded && verified
        }
    };

    if !full_success {
        std::process::exit(1);
    }
    Ok(())
}
