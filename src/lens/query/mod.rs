//! Query lens
//!
//! This module provides the `QueryLens` which reads the rir, country and asn
//! indices back from the index store and renders them in one of the output
//! formats:
//!
//! - **csv**: one column per requested key, values spread over rows
//! - **txt**: a `key:` header followed by one value per line, per key
//! - **paloalto**: every value joined by single spaces, usable as an external
//!   dynamic list
//!
//! Keys are given as `;`-separated lists per namespace and resolved in the
//! order rir, country, asn. Unknown keys resolve to no values.
//!
//! # Example
//!
//! ```rust,ignore
//! use rirlists::database::IndexStore;
//! use rirlists::lens::query::{KeyNormalization, QueryLens, QueryRequest};
//! use rirlists::lens::utils::OutputFormat;
//!
//! let store = IndexStore::new("out");
//! let lens = QueryLens::new(&store);
//!
//! let request =
//!     QueryRequest::from_lists(Some("arin"), Some("us;ca"), None, KeyNormalization::Plain);
//! let entries = lens.lookup(&request)?;
//! println!("{}", QueryLens::render(&entries, OutputFormat::Csv)?);
//! ```

use crate::database::{IndexStore, Namespace};
use crate::lens::utils::{truncate_chars, OutputFormat};
use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

const RIR_KEY_LEN: usize = 7;
const COUNTRY_KEY_LEN: usize = 2;
const ASN_KEY_LEN: usize = 6;

// =============================================================================
// Errors
// =============================================================================

/// A csv rendering was requested without any key to use as header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoKeysRequested;

impl fmt::Display for NoKeysRequested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no keys requested")
    }
}

impl std::error::Error for NoKeysRequested {}

// =============================================================================
// Requests
// =============================================================================

/// How raw query keys are cleaned up before lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyNormalization {
    /// Trim and fix case, then cut keys to their usual length
    /// (7 characters for registries, 2 for countries, 6 for ASNs)
    Truncating,
    /// Trim and fix case only
    #[default]
    Plain,
}

impl KeyNormalization {
    pub fn rir(&self, raw: &str) -> String {
        let key = raw.trim().to_lowercase();
        match self {
            KeyNormalization::Truncating => truncate_chars(&key, RIR_KEY_LEN),
            KeyNormalization::Plain => key,
        }
    }

    pub fn country(&self, raw: &str) -> String {
        let key = raw.trim().to_uppercase();
        match self {
            KeyNormalization::Truncating => truncate_chars(&key, COUNTRY_KEY_LEN),
            KeyNormalization::Plain => key,
        }
    }

    /// ASN keys are accepted only when made of decimal digits
    pub fn asn(&self, raw: &str) -> Option<String> {
        let key = raw.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(match self {
            KeyNormalization::Truncating => truncate_chars(key, ASN_KEY_LEN),
            KeyNormalization::Plain => key.to_string(),
        })
    }
}

/// Normalized keys of one query; `None` means the namespace was not asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub rir: Option<Vec<String>>,
    pub country: Option<Vec<String>>,
    pub asn: Option<Vec<String>>,
}

impl QueryRequest {
    /// Build a request from `;`-separated key lists.
    ///
    /// Absent or empty lists leave their namespace out of the query.
    pub fn from_lists(
        rir: Option<&str>,
        country: Option<&str>,
        asn: Option<&str>,
        normalization: KeyNormalization,
    ) -> Self {
        fn present(list: Option<&str>) -> Option<&str> {
            list.filter(|s| !s.is_empty())
        }

        QueryRequest {
            rir: present(rir).map(|s| s.split(';').map(|k| normalization.rir(k)).collect()),
            country: present(country)
                .map(|s| s.split(';').map(|k| normalization.country(k)).collect()),
            asn: present(asn).map(|s| {
                s.split(';')
                    .filter_map(|k| normalization.asn(k))
                    .collect()
            }),
        }
    }

    /// Whether no namespace was asked for at all
    pub fn is_empty(&self) -> bool {
        self.rir.is_none() && self.country.is_none() && self.asn.is_none()
    }

    /// Requested keys in lookup order: rir, country, asn
    pub fn keys(&self) -> Vec<(Namespace, &str)> {
        [
            (Namespace::Rir, &self.rir),
            (Namespace::Country, &self.country),
            (Namespace::Asn, &self.asn),
        ]
        .into_iter()
        .filter_map(|(namespace, keys)| keys.as_ref().map(|keys| (namespace, keys)))
        .flat_map(|(namespace, keys)| keys.iter().map(move |k| (namespace, k.as_str())))
        .collect()
    }
}

// =============================================================================
// Results
// =============================================================================

/// Values stored under one requested key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryEntry {
    pub namespace: Namespace,
    pub key: String,
    pub values: Vec<String>,
}

// =============================================================================
// Lens
// =============================================================================

/// Read-side access to the index store
pub struct QueryLens<'a> {
    store: &'a IndexStore,
}

impl<'a> QueryLens<'a> {
    pub fn new(store: &'a IndexStore) -> Self {
        Self { store }
    }

    /// Resolve every requested key, in request order
    pub fn lookup(&self, request: &QueryRequest) -> Result<Vec<QueryEntry>> {
        request
            .keys()
            .into_iter()
            .map(|(namespace, key)| -> Result<QueryEntry> {
                Ok(QueryEntry {
                    namespace,
                    key: key.to_string(),
                    values: self.store.read(namespace, key)?,
                })
            })
            .collect()
    }

    /// One line per requested namespace, e.g. `RIR data for ARIN, APNIC processed`
    pub fn processed_messages(&self, request: &QueryRequest) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(keys) = &request.rir {
            messages.push(format!(
                "RIR data for {} processed",
                keys.join(", ").to_uppercase()
            ));
        }
        if let Some(keys) = &request.country {
            messages.push(format!("Country data for {} processed", keys.join(", ")));
        }
        if let Some(keys) = &request.asn {
            messages.push(format!("ASN data for {} processed", keys.join(", ")));
        }
        messages
    }

    /// Render looked-up entries in the given format
    pub fn render(entries: &[QueryEntry], format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Csv => render_csv(entries),
            OutputFormat::Txt => Ok(render_txt(entries)),
            OutputFormat::Paloalto => Ok(render_paloalto(entries)),
        }
    }
}

fn render_csv(entries: &[QueryEntry]) -> Result<String> {
    if entries.is_empty() {
        return Err(NoKeysRequested.into());
    }

    let mut out = String::new();
    push_csv_row(&mut out, entries.iter().map(|e| e.key.as_str()));

    let rows = entries.iter().map(|e| e.values.len()).max().unwrap_or(0);
    for i in 0..rows {
        push_csv_row(
            &mut out,
            entries
                .iter()
                .map(|e| e.values.get(i).map(|v| v.as_str()).unwrap_or("")),
        );
    }
    Ok(out)
}

/// Append one `\r\n`-terminated row with minimal quoting
fn push_csv_row<'s>(out: &mut String, fields: impl Iterator<Item = &'s str>) {
    let fields: Vec<&str> = fields.collect();
    // a lone empty field would read back as a blank line
    if let [""] = fields.as_slice() {
        out.push_str("\"\"\r\n");
        return;
    }
    out.push_str(&fields.iter().map(|f| csv_field(f)).join(","));
    out.push_str("\r\n");
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_txt(entries: &[QueryEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.key);
        out.push_str(":\n");
        for value in &entry.values {
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}

fn render_paloalto(entries: &[QueryEntry]) -> String {
    entries.iter().flat_map(|e| e.values.iter()).join(" ")
}

// =============================================================================
// Tests
// =============================================================================
