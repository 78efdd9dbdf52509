//! Source fetching lens
//!
//! This module provides the `FetchLens` which keeps the raw registry feeds in
//! the input directory up to date. Every feed advertises a version token:
//!
//! - routing-registry dumps publish a numeric `CURRENTSERIAL`
//! - extended-stats files publish an md5 digest
//!
//! The last downloaded token is stored next to the raw file
//! (`<file>.serial` / `<file>.hash`). A feed is downloaded only when the local
//! token is missing or the remote one is newer (serial) or different (hash).
//!
//! Network failures never abort a run: the feed keeps its previous raw file and
//! token, and the outcome is reported as failed.
//!
//! # Example
//!
//! ```rust,ignore
//! use rirlists::datasets::sources::all_feeds;
//! use rirlists::lens::fetch::{FetchLens, HttpTransport};
//! use std::time::Duration;
//!
//! let lens = FetchLens::new(HttpTransport::new(Duration::from_secs(300)), "in");
//! for outcome in lens.refresh_all(&all_feeds()) {
//!     println!("{}: {}", outcome.feed, outcome.status);
//! }
//! ```

use crate::config::FeedFamily;
use crate::datasets::FeedSource;
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// =============================================================================
// Transport
// =============================================================================

/// Network access used by the fetcher
pub trait FeedTransport: Send + Sync {
    /// Fetch a small text document (serial or digest), trimmed
    fn fetch_token(&self, url: &str) -> Result<String>;

    /// Stream a feed body into `dest`, returning the number of bytes written
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64>;
}

/// HTTP transport backed by a `ureq` agent with a global per-request timeout
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl FeedTransport for HttpTransport {
    fn fetch_token(&self, url: &str) -> Result<String> {
        let body = self
            .agent
            .get(url)
            .call()
            .map_err(|e| anyhow!("Failed to fetch {}: {}", url, e))?
            .body_mut()
            .read_to_string()
            .map_err(|e| anyhow!("Failed to read {}: {}", url, e))?;
        Ok(body.trim().to_string())
    }

    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| anyhow!("Failed to fetch {}: {}", url, e))?;
        let mut reader = response.body_mut().as_reader();
        std::io::copy(&mut reader, dest).map_err(|e| anyhow!("Failed to download {}: {}", url, e))
    }
}

// =============================================================================
// Freshness decision
// =============================================================================

/// Whether a feed should be downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    Download,
    UpToDate,
    /// The tokens could not be compared
    Skip(String),
}

/// Compare the local and remote tokens of a feed.
///
/// A missing (empty) local token always triggers a download.
pub fn needs_download(family: FeedFamily, local: &str, remote: &str) -> FetchDecision {
    if local.is_empty() {
        return FetchDecision::Download;
    }

    match family {
        FeedFamily::Serial => match (remote.parse::<f64>(), local.parse::<f64>()) {
            (Ok(remote), Ok(local)) if remote > local => FetchDecision::Download,
            (Ok(_), Ok(_)) => FetchDecision::UpToDate,
            _ => FetchDecision::Skip(format!(
                "unable to convert serial values to float (remote '{}', local '{}')",
                remote, local
            )),
        },
        FeedFamily::Hash => {
            if remote != local {
                FetchDecision::Download
            } else {
                FetchDecision::UpToDate
            }
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of refreshing one feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    Downloaded { bytes: u64 },
    UpToDate,
    Skipped { reason: String },
    Failed { error: String },
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Downloaded { bytes } => write!(f, "downloaded ({} bytes)", bytes),
            FetchStatus::UpToDate => write!(f, "up to date"),
            FetchStatus::Skipped { reason } => write!(f, "skipped: {}", reason),
            FetchStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub feed: String,
    pub family: FeedFamily,
    #[serde(flatten)]
    pub status: FetchStatus,
}

// =============================================================================
// Lens
// =============================================================================

/// Keeps raw feed files and their tokens in the input directory fresh
pub struct FetchLens<T: FeedTransport> {
    transport: T,
    input_dir: PathBuf,
}

impl<T: FeedTransport> FetchLens<T> {
    pub fn new(transport: T, input_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            input_dir: input_dir.into(),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Last recorded token of a feed, empty if it was never fetched
    pub fn local_token(&self, feed: &FeedSource) -> String {
        let path = feed.token_path(&self.input_dir);
        if !path.is_file() {
            return String::new();
        }
        match fs::read_to_string(&path) {
            Ok(token) => token.trim().to_string(),
            Err(e) => {
                warn!("Failed to read token file {:?}: {}", path, e);
                String::new()
            }
        }
    }

    /// Refresh every feed; feeds are independent and refreshed in parallel
    pub fn refresh_all(&self, feeds: &[FeedSource]) -> Vec<FetchOutcome> {
        feeds.par_iter().map(|feed| self.refresh(feed)).collect()
    }

    /// Check one feed's token and download it if needed
    pub fn refresh(&self, feed: &FeedSource) -> FetchOutcome {
        let status = self.refresh_status(feed);
        FetchOutcome {
            feed: feed.name.clone(),
            family: feed.family,
            status,
        }
    }

    fn refresh_status(&self, feed: &FeedSource) -> FetchStatus {
        info!("Check {} for RIR {}", feed.family, feed.name);

        let remote = match self.transport.fetch_token(&feed.token_url) {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to fetch {} for {}: {}", feed.family, feed.name, e);
                return FetchStatus::Failed {
                    error: e.to_string(),
                };
            }
        };
        let local = self.local_token(feed);

        match needs_download(feed.family, &local, &remote) {
            FetchDecision::UpToDate => FetchStatus::UpToDate,
            FetchDecision::Skip(reason) => {
                warn!("{} for RIR {}, skipping download check", reason, feed.name);
                FetchStatus::Skipped { reason }
            }
            FetchDecision::Download => {
                info!("Download file {}", feed.body_url);
                match self.download(feed, &remote) {
                    Ok(bytes) => {
                        info!("File {} downloaded successfully", feed.file_name());
                        FetchStatus::Downloaded { bytes }
                    }
                    Err(e) => {
                        warn!("Failed to download {}: {}", feed.file_name(), e);
                        FetchStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    /// Download into a partial file, then move it and the new token into place
    fn download(&self, feed: &FeedSource, token: &str) -> Result<u64> {
        fs::create_dir_all(&self.input_dir)
            .map_err(|e| anyhow!("Failed to create {:?}: {}", self.input_dir, e))?;

        let raw_path = feed.raw_path(&self.input_dir);
        let part_path = self.input_dir.join(format!("{}.part", feed.file_name()));

        let bytes = match self.download_to(&feed.body_url, &part_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part_path);
                return Err(e);
            }
        };

        fs::rename(&part_path, &raw_path)
            .map_err(|e| anyhow!("Failed to replace {:?}: {}", raw_path, e))?;

        let token_path = feed.token_path(&self.input_dir);
        if is_valid_token(feed.family, token) {
            write_atomically(&token_path, token)?;
        } else {
            // an empty local token forces a check on the next run
            warn!(
                "Not recording {} '{}' for {}, it is not numeric",
                feed.family, token, feed.name
            );
            if token_path.exists() {
                fs::remove_file(&token_path)
                    .map_err(|e| anyhow!("Failed to remove {:?}: {}", token_path, e))?;
            }
        }

        Ok(bytes)
    }

    fn download_to(&self, url: &str, path: &Path) -> Result<u64> {
        let mut file =
            fs::File::create(path).map_err(|e| anyhow!("Failed to create {:?}: {}", path, e))?;
        let bytes = self.transport.download(url, &mut file)?;
        file.sync_all()
            .map_err(|e| anyhow!("Failed to flush {:?}: {}", path, e))?;
        Ok(bytes)
    }
}

/// Whether a remote token can be stored and compared on later runs
fn is_valid_token(family: FeedFamily, token: &str) -> bool {
    match family {
        FeedFamily::Serial => token.parse::<f64>().is_ok(),
        FeedFamily::Hash => true,
    }
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).map_err(|e| anyhow!("Failed to write {:?}: {}", tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| anyhow!("Failed to replace {:?}: {}", path, e))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory transport: URL → body, with a log of downloaded URLs
    #[derive(Default)]
    struct FakeTransport {
        documents: HashMap<String, String>,
        downloads: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.documents.insert(url.to_string(), body.to_string());
            self
        }

        fn downloaded(&self) -> Vec<String> {
            self.downloads.lock().unwrap().clone()
        }
    }

    impl FeedTransport for FakeTransport {
        fn fetch_token(&self, url: &str) -> Result<String> {
            self.documents
                .get(url)
                .map(|s| s.trim().to_string())
                .ok_or_else(|| anyhow!("404 {}", url))
        }

        fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
            self.downloads.lock().unwrap().push(url.to_string());
            let body = self
                .documents
                .get(url)
                .ok_or_else(|| anyhow!("404 {}", url))?;
            dest.write_all(body.as_bytes())?;
            Ok(body.len() as u64)
        }
    }

    fn serial_feed() -> FeedSource {
        FeedSource::new(
            "test",
            FeedFamily::Serial,
            "http://example.test/TEST.CURRENTSERIAL",
            "http://example.test/test.db.gz",
        )
    }

    fn hash_feed() -> FeedSource {
        FeedSource::new(
            "test",
            FeedFamily::Hash,
            "http://example.test/delegated-test-extended-latest.md5",
            "http://example.test/delegated-test-extended-latest",
        )
    }

    #[test]
    fn test_needs_download_empty_local() {
        assert_eq!(
            needs_download(FeedFamily::Serial, "", "12"),
            FetchDecision::Download
        );
        assert_eq!(
            needs_download(FeedFamily::Hash, "", "abc"),
            FetchDecision::Download
        );
    }

    #[test]
    fn test_needs_download_serial() {
        assert_eq!(
            needs_download(FeedFamily::Serial, "11.5", "12.0"),
            FetchDecision::Download
        );
        assert_eq!(
            needs_download(FeedFamily::Serial, "12", "12.0"),
            FetchDecision::UpToDate
        );
        assert_eq!(
            needs_download(FeedFamily::Serial, "13", "12"),
            FetchDecision::UpToDate
        );
        assert!(matches!(
            needs_download(FeedFamily::Serial, "12", "<html>"),
            FetchDecision::Skip(_)
        ));
    }

    #[test]
    fn test_needs_download_hash() {
        assert_eq!(
            needs_download(FeedFamily::Hash, "abc", "abc"),
            FetchDecision::UpToDate
        );
        assert_eq!(
            needs_download(FeedFamily::Hash, "abc", "abd"),
            FetchDecision::Download
        );
    }

    #[test]
    fn test_refresh_downloads_and_records_token() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = serial_feed();
        let transport = FakeTransport::default()
            .with(&feed.token_url, "42\n")
            .with(&feed.body_url, "route: 10.0.0.0/8\n");
        let lens = FetchLens::new(transport, temp_dir.path());

        let outcome = lens.refresh(&feed);
        assert_eq!(outcome.status, FetchStatus::Downloaded { bytes: 18 });
        assert_eq!(lens.local_token(&feed), "42");
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("test.db.gz")).unwrap(),
            "route: 10.0.0.0/8\n"
        );
        assert!(!temp_dir.path().join("test.db.gz.part").exists());

        // Same serial again: nothing to do
        let outcome = lens.refresh(&feed);
        assert_eq!(outcome.status, FetchStatus::UpToDate);
        assert_eq!(lens.transport.downloaded().len(), 1);
    }

    #[test]
    fn test_refresh_hash_unchanged() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = hash_feed();
        fs::write(feed.token_path(temp_dir.path()), "d41d8cd9").unwrap();

        let transport = FakeTransport::default()
            .with(&feed.token_url, "d41d8cd9")
            .with(&feed.body_url, "body");
        let lens = FetchLens::new(transport, temp_dir.path());

        assert_eq!(lens.refresh(&feed).status, FetchStatus::UpToDate);
        assert!(lens.transport.downloaded().is_empty());
    }

    #[test]
    fn test_refresh_failed_download_keeps_previous_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = hash_feed();
        fs::write(feed.raw_path(temp_dir.path()), "old body").unwrap();
        fs::write(feed.token_path(temp_dir.path()), "old").unwrap();

        // token is published but the body is missing
        let transport = FakeTransport::default().with(&feed.token_url, "new");
        let lens = FetchLens::new(transport, temp_dir.path());

        let outcome = lens.refresh(&feed);
        assert!(matches!(outcome.status, FetchStatus::Failed { .. }));
        assert_eq!(lens.local_token(&feed), "old");
        assert_eq!(
            fs::read_to_string(feed.raw_path(temp_dir.path())).unwrap(),
            "old body"
        );
        assert!(!temp_dir
            .path()
            .join("delegated-test-extended-latest.part")
            .exists());
    }

    #[test]
    fn test_refresh_token_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let lens = FetchLens::new(FakeTransport::default(), temp_dir.path());

        let outcome = lens.refresh(&serial_feed());
        assert!(matches!(outcome.status, FetchStatus::Failed { .. }));
        assert!(lens.transport.downloaded().is_empty());
    }

    #[test]
    fn test_refresh_unparseable_serial_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = serial_feed();
        fs::write(feed.token_path(temp_dir.path()), "100").unwrap();

        let transport = FakeTransport::default()
            .with(&feed.token_url, "maintenance")
            .with(&feed.body_url, "body");
        let lens = FetchLens::new(transport, temp_dir.path());

        assert!(matches!(
            lens.refresh(&feed).status,
            FetchStatus::Skipped { .. }
        ));
        assert!(lens.transport.downloaded().is_empty());
    }

    #[test]
    fn test_refresh_does_not_record_unparseable_serial() {
        let temp_dir = tempfile::tempdir().unwrap();
        let feed = serial_feed();

        let transport = FakeTransport::default()
            .with(&feed.token_url, "<html>maintenance</html>")
            .with(&feed.body_url, "body");
        let lens = FetchLens::new(transport, temp_dir.path());

        // no local token yet: the body is still fetched
        assert!(matches!(
            lens.refresh(&feed).status,
            FetchStatus::Downloaded { .. }
        ));
        assert_eq!(lens.local_token(&feed), "");
        assert!(!feed.token_path(temp_dir.path()).exists());

        // once the serial is valid again the feed is refreshed and recorded
        let transport = FakeTransport::default()
            .with(&feed.token_url, "999")
            .with(&feed.body_url, "new body");
        let lens = FetchLens::new(transport, temp_dir.path());

        assert!(matches!(
            lens.refresh(&feed).status,
            FetchStatus::Downloaded { .. }
        ));
        assert_eq!(lens.local_token(&feed), "999");
        assert_eq!(
            fs::read_to_string(feed.raw_path(temp_dir.path())).unwrap(),
            "new body"
        );
    }

    #[test]
    fn test_is_valid_token() {
        assert!(is_valid_token(FeedFamily::Serial, "12.5"));
        assert!(!is_valid_token(FeedFamily::Serial, "<html>"));
        assert!(is_valid_token(FeedFamily::Hash, "MD5 (x) = abc"));
    }

    #[test]
    fn test_refresh_all() {
        let temp_dir = tempfile::tempdir().unwrap();
        let serial = serial_feed();
        let hash = hash_feed();
        let transport = FakeTransport::default()
            .with(&serial.token_url, "1")
            .with(&serial.body_url, "a")
            .with(&hash.token_url, "h")
            .with(&hash.body_url, "b");
        let lens = FetchLens::new(transport, temp_dir.path());

        let outcomes = lens.refresh_all(&[serial, hash]);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.status, FetchStatus::Downloaded { .. })));
    }

    #[test]
    fn test_fetch_status_display() {
        assert_eq!(FetchStatus::UpToDate.to_string(), "up to date");
        assert_eq!(
            FetchStatus::Downloaded { bytes: 10 }.to_string(),
            "downloaded (10 bytes)"
        );
    }
}
