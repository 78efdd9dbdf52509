#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! rirlists - registry-derived CIDR lists
//!
//! rirlists downloads the public extended-stats delegation files of the five
//! Regional Internet Registries and their routing-registry (RPSL) route-object
//! dumps, and turns them into three flat-file indices:
//!
//! - **rir**: every in-use IPv4/IPv6 block delegated by a registry
//! - **country**: the same blocks grouped by country code
//! - **asn**: the prefixes attributed to an AS number, either through the
//!   registry's holder identifier or through `route:`/`origin:` objects
//!
//! The lists can then be queried from the CLI or over HTTP and rendered as
//! csv, plain text, or a space-separated external dynamic list.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Parsing, aggregation, index store, query rendering | `oneio`, `indexmap` |
//! | `fetch` | Serial/hash checked downloads of the registry feeds | `ureq`, `rayon` |
//! | `display` | Table formatting of run summaries | `tabled` |
//! | `cli` | CLI binary and HTTP lookup server | All above + `clap`, `axum` |
//!
//! ## Choosing Features
//!
//! ```toml
//! # Parse and query already downloaded feeds
//! rirlists = { version = "0.1", default-features = false }
//!
//! # Library with downloads
//! rirlists = { version = "0.1", default-features = false, features = ["fetch"] }
//!
//! # Default (CLI binary)
//! rirlists = "0.1"
//! ```
//!
//! # Architecture
//!
//! - **[`datasets`]**: feed catalog and format parsers (extended-stats, RPSL)
//! - **[`database`]**: the on-disk index store
//! - **[`lens`]**: fetching, aggregation, ingestion runs and queries
//! - **[`config`]**: configuration management
//!
//! # Quick Start Examples
//!
//! ## Rebuild the indices
//!
//! ```rust,ignore
//! use rirlists::lens::ingest::{IngestLens, IngestOptions};
//! use rirlists::RirListsConfig;
//!
//! let config = RirListsConfig::new(&None)?;
//! let summary = IngestLens::new(&config).run(&IngestOptions::default())?;
//! println!("{} ASNs", summary.indices.asn_keys);
//! ```
//!
//! ## Query stored lists
//!
//! ```rust,ignore
//! use rirlists::database::IndexStore;
//! use rirlists::lens::query::{KeyNormalization, QueryLens, QueryRequest};
//! use rirlists::OutputFormat;
//!
//! let store = IndexStore::new("~/.rirlists/out");
//! let lens = QueryLens::new(&store);
//! let request = QueryRequest::from_lists(None, Some("NL;BE"), None, KeyNormalization::Plain);
//! let entries = lens.lookup(&request)?;
//! println!("{}", QueryLens::render(&entries, OutputFormat::Paloalto)?);
//! ```

pub mod config;
pub mod database;
pub mod datasets;
pub mod lens;

// Server module - requires CLI feature
#[cfg(feature = "cli")]
pub mod server;

// =============================================================================
// Configuration (always available)
// =============================================================================

pub use config::{format_size, FeedFamily, RirListsConfig};

// =============================================================================
// Datasets and index store
// =============================================================================

pub use database::{CommitSummary, IndexStore, Namespace};
pub use datasets::{FeedSource, Registry};

// =============================================================================
// Lens Module
// =============================================================================

pub use lens::aggregate::{Aggregator, Indices};
pub use lens::ingest::{IngestLens, IngestOptions, IngestSummary};
pub use lens::query::{KeyNormalization, QueryEntry, QueryLens, QueryRequest};
pub use lens::utils::OutputFormat;

#[cfg(feature = "fetch")]
pub use lens::fetch::{FeedTransport, FetchLens, HttpTransport};

// =============================================================================
// Server Module (HTTP API) - requires "cli" feature
// =============================================================================

#[cfg(feature = "cli")]
pub use server::{create_axum_router, start_server, ServerConfig, ServerState};
