//! # docbridge
//!
//! A documentation ingestion and retrieval bridge for AI agents.
//!
//! docbridge pulls framework documentation from heterogeneous sources (a
//! remote extraction provider or local files), normalizes it into
//! deterministic chunks, stores it in a shared vector collection, and serves
//! token-bounded aggregated answers to any number of calling agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │   Fetcher    │──▶│  Normalizer   │──▶│ Vector Store │
//! │ remote/local │   │ parse + chunk │   │   (upsert)   │
//! └─────────────┘   └──────────────┘   └──────┬──────┘
//!        ▲                                    │
//!        │ per framework, priority-ordered    │
//! ┌──────┴──────┐                      ┌──────▼──────┐
//! │ Bulk Loader │                      │   Query      │
//! │  (docb load)│                      │ Aggregator   │
//! └─────────────┘                      └─────────────┘
//! ```
//!
//! The bulk loader isolates per-framework failures (one framework failing
//! never aborts the batch), falls back from remote to local fetch exactly
//! once, and commits each framework's chunks with a single keyed upsert so
//! re-loads are idempotent. The verifier and index builder run after loading;
//! the query aggregator runs independently against the same store.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`fetch`] | Remote/local source fetching |
//! | [`chunk`] | Structural text splitting |
//! | [`normalize`] | Content parsing and chunk assembly |
//! | [`store`] | Vector store adapter (HTTP and in-memory) |
//! | [`loader`] | Bulk load orchestration |
//! | [`verify`] | Post-load verification |
//! | [`index`] | Index manifest building |
//! | [`query`] | Query-time aggregation |
//! | [`progress`] | Load progress reporting |

pub mod chunk;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod store;
pub mod verify;
