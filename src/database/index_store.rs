//! Flat-file index store
//!
//! The indices built by an ingestion run are stored as one text file per key,
//! grouped by namespace:
//!
//! ```text
//! <output_dir>/rir/<registry>.txt     CIDRs in insertion order
//! <output_dir>/country/<CC>.txt       CIDRs in insertion order
//! <output_dir>/asn/AS<number>.txt     CIDR set
//! ```
//!
//! Values are joined by `\n` without a trailing newline. Keys with no values
//! get no file. A commit is written to a staging directory first and each
//! namespace directory is then swapped in with a rename, so a failed run never
//! leaves a namespace half overwritten.

use crate::lens::aggregate::Indices;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

const STAGING_DIR: &str = ".staging";

/// One of the three index namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Rir,
    Country,
    Asn,
}

impl Namespace {
    pub fn all() -> [Namespace; 3] {
        [Namespace::Rir, Namespace::Country, Namespace::Asn]
    }

    /// Directory name under the output directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Rir => "rir",
            Namespace::Country => "country",
            Namespace::Asn => "asn",
        }
    }

    /// File name holding the values of `key`
    pub fn file_name(&self, key: &str) -> String {
        match self {
            Namespace::Asn => format!("AS{}.txt", key),
            _ => format!("{}.txt", key),
        }
    }

    /// Recover the key from a file name, if it belongs to this namespace
    fn key_from_file_name(&self, file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(".txt")?;
        match self {
            Namespace::Asn => stem.strip_prefix("AS").map(|s| s.to_string()),
            _ => Some(stem.to_string()),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rir" => Ok(Namespace::Rir),
            "country" => Ok(Namespace::Country),
            "asn" => Ok(Namespace::Asn),
            _ => Err(format!(
                "Unknown namespace '{}'. Valid namespaces: rir, country, asn",
                s
            )),
        }
    }
}

/// Number of files written per namespace by a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub rir_files: usize,
    pub country_files: usize,
    pub asn_files: usize,
}

/// Reader and writer of the on-disk indices
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    /// Replace all three namespaces with the given indices
    pub fn commit(&self, indices: &Indices) -> Result<CommitSummary> {
        let staging = self.root.join(STAGING_DIR);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| {
                anyhow!("Failed to clear staging directory {:?}: {}", staging, e)
            })?;
        }
        for namespace in Namespace::all() {
            let dir = staging.join(namespace.dir_name());
            fs::create_dir_all(&dir)
                .map_err(|e| anyhow!("Failed to create directory {:?}: {}", dir, e))?;
        }

        info!("Write aggregate RIR lists");
        let rir_files = write_entries(
            &staging,
            Namespace::Rir,
            indices.rir.iter().map(|(k, v)| (k, v.iter())),
        )?;

        info!("Write aggregate country lists from all RIRs");
        let country_files = write_entries(
            &staging,
            Namespace::Country,
            indices.country.iter().map(|(k, v)| (k, v.iter())),
        )?;

        info!("Write ASN files");
        let asn_files = write_entries(
            &staging,
            Namespace::Asn,
            indices.asn.iter().map(|(k, v)| (k, v.iter())),
        )?;

        for namespace in Namespace::all() {
            self.swap_in(&staging, namespace)?;
        }
        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!("Failed to remove staging directory {:?}: {}", staging, e);
        }

        Ok(CommitSummary {
            rir_files,
            country_files,
            asn_files,
        })
    }

    fn swap_in(&self, staging: &Path, namespace: Namespace) -> Result<()> {
        let staged = staging.join(namespace.dir_name());
        let target = self.namespace_dir(namespace);
        let retired = self.root.join(format!(".old-{}", namespace.dir_name()));

        if retired.exists() {
            fs::remove_dir_all(&retired)
                .map_err(|e| anyhow!("Failed to remove {:?}: {}", retired, e))?;
        }
        if target.exists() {
            fs::rename(&target, &retired)
                .map_err(|e| anyhow!("Failed to move {:?} aside: {}", target, e))?;
        }
        fs::rename(&staged, &target)
            .map_err(|e| anyhow!("Failed to commit {:?}: {}", target, e))?;
        if retired.exists() {
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!("Failed to remove previous index {:?}: {}", retired, e);
            }
        }
        Ok(())
    }

    /// Read the values stored for `key`.
    ///
    /// A missing file, or a key that cannot name a file in the namespace
    /// directory, yields an empty list.
    pub fn read(&self, namespace: Namespace, key: &str) -> Result<Vec<String>> {
        if !is_safe_key(key) {
            return Ok(Vec::new());
        }

        let path = self.namespace_dir(namespace).join(namespace.file_name(key));
        if !path.is_file() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read index file {:?}: {}", path, e))?;
        Ok(content.lines().map(|l| l.to_string()).collect())
    }

    /// List the keys stored in a namespace, sorted
    pub fn keys(&self, namespace: Namespace) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys: Vec<String> = fs::read_dir(&dir)
            .map_err(|e| anyhow!("Failed to list {:?}: {}", dir, e))?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                namespace.key_from_file_name(name.to_str()?)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn is_safe_key(key: &str) -> bool {
    !key.contains('/') && !key.contains('\\') && !key.contains("..") && !key.contains('\0')
}

fn write_entries<'a, I, V>(staging: &Path, namespace: Namespace, entries: I) -> Result<usize>
where
    I: Iterator<Item = (&'a String, V)>,
    V: Iterator<Item = &'a String>,
{
    let dir = staging.join(namespace.dir_name());
    let mut written = 0;

    for (key, values) in entries {
        if !is_safe_key(key) {
            warn!("Key '{}' cannot name a {} file, skipping", key, namespace);
            continue;
        }
        let content = values.map(|v| v.as_str()).collect::<Vec<_>>().join("\n");
        if content.is_empty() {
            continue;
        }
        let path = dir.join(namespace.file_name(key));
        fs::write(&path, content)
            .map_err(|e| anyhow!("Failed to write index file {:?}: {}", path, e))?;
        written += 1;
    }

    Ok(written)
}
