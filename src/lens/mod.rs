//! Lens module
//!
//! This module provides high-level "lens" abstractions that combine business logic
//! with output formatting. Lenses are shared by the CLI and the HTTP server.
//!
//! # Feature Requirements
//!
//! | Lens | Feature Required | Dependencies |
//! |------|-----------------|--------------|
//! | `Aggregator` | (none) | indexmap |
//! | `IngestLens` | (none); `run` needs `fetch` | chrono, humantime, oneio |
//! | `QueryLens` | (none) | itertools |
//! | `FetchLens` | `fetch` | ureq, rayon |
//!
//! # Architecture
//!
//! Each lens module exports:
//! - A **Lens struct** (e.g., `IngestLens`, `QueryLens`) - the main entry point for all operations
//! - **Args/options structs** - input arguments for lens methods
//! - **Output types** - summaries and rendered results
//!
//! # Usage
//!
//! ```rust,ignore
//! // Rebuild the indices from the configured feeds
//! use rirlists::lens::ingest::{IngestLens, IngestOptions};
//!
//! // Look up and render stored lists
//! use rirlists::lens::query::{KeyNormalization, QueryLens, QueryRequest};
//! use rirlists::lens::utils::OutputFormat;
//! ```

// =============================================================================
// Utility module (always available)
// =============================================================================
pub mod utils;

// =============================================================================
// Core lenses
// =============================================================================

// Aggregator - rir/country/asn index building
pub mod aggregate;

// IngestLens - parse, aggregate and persist one run
pub mod ingest;

// QueryLens - index lookup and rendering
pub mod query;

// =============================================================================
// Network lenses (fetch feature)
// =============================================================================

// FetchLens - serial/hash checked feed downloads
#[cfg(feature = "fetch")]
pub mod fetch;
