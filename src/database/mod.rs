//! Database module
//!
//! rirlists persists its results as plain text files rather than a database
//! engine, so that the lists can be served directly by any web server or
//! consumed by firewalls as external dynamic lists.
//!
//! # Architecture
//!
//! ```text
//! database/
//! └── index_store   # rir/, country/, asn/ list files (one file per key)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use rirlists::database::{IndexStore, Namespace};
//!
//! let store = IndexStore::new("~/.rirlists/out");
//! let prefixes = store.read(Namespace::Country, "NL")?;
//! ```

pub mod index_store;

pub use index_store::{CommitSummary, IndexStore, Namespace};
