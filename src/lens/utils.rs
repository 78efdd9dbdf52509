//! Common utility functions for lens modules
//!
//! This module provides the output formats shared by the CLI and the HTTP
//! surface, and the key truncation used when normalizing query keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format of a query result
///
/// The CLI rejects unknown names; the HTTP surface falls back to the default
/// with [`OutputFormat::parse_or_default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One row per index, values spread over columns
    Csv,
    /// `key:` header followed by one value per line
    Txt,
    /// All values joined by single spaces (default)
    #[default]
    Paloalto,
}

impl OutputFormat {
    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["csv", "txt", "paloalto"]
    }

    /// Parse a format name, falling back to the default format
    pub fn parse_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }

    /// File name written by the CLI for this format
    pub fn default_output_file(&self) -> &'static str {
        match self {
            Self::Csv => "output.csv",
            Self::Txt | Self::Paloalto => "output.txt",
        }
    }

    /// HTTP content type of a rendered body
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Txt | Self::Paloalto => "text/plain",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Txt => write!(f, "txt"),
            Self::Paloalto => write!(f, "paloalto"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "txt" | "text" => Ok(Self::Txt),
            "paloalto" => Ok(Self::Paloalto),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Keep at most `max_len` characters of `s`
///
/// Unlike display truncation no ellipsis is added: the result is used as a
/// lookup key.
///
/// # Examples
///
/// ```
/// use rirlists::lens::utils::truncate_chars;
///
/// assert_eq!(truncate_chars("ripencc-extra", 7), "ripencc");
/// assert_eq!(truncate_chars("US", 2), "US");
/// ```
pub fn truncate_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}
