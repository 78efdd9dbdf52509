//! Ingestion run lens
//!
//! `IngestLens` drives one complete update of the index store:
//!
//! 1. refresh the raw feeds in the input directory (unless skipped)
//! 2. parse every extended-stats file, in registry order
//! 3. parse every route-object dump, in catalog order
//! 4. aggregate everything into one set of indices and commit it
//!
//! Missing or unreadable feed files are reported in the summary and skipped.
//! Only failures to write the index store abort the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use rirlists::lens::ingest::{IngestLens, IngestOptions};
//! use rirlists::RirListsConfig;
//!
//! let config = RirListsConfig::new(&None)?;
//! let lens = IngestLens::new(&config);
//! let summary = lens.run(&IngestOptions::default())?;
//! println!("{}", summary.to_json()?);
//! ```

use crate::config::RirListsConfig;
use crate::database::{CommitSummary, IndexStore};
use crate::datasets::{delegated, route, sources, Registry};
use crate::lens::aggregate::{Aggregator, IndexCounts};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

#[cfg(feature = "fetch")]
use crate::lens::fetch::{FeedTransport, FetchLens, FetchOutcome, HttpTransport};

// =============================================================================
// Types
// =============================================================================

/// Options of an ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Use the files already present in the input directory
    pub skip_fetch: bool,
}

/// Fetch result of one feed, as shown in the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct FetchReport {
    pub feed: String,
    pub status: String,
}

#[cfg(feature = "fetch")]
impl From<FetchOutcome> for FetchReport {
    fn from(outcome: FetchOutcome) -> Self {
        Self {
            feed: outcome.feed,
            status: outcome.status.to_string(),
        }
    }
}

/// Parse result of one feed file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct SourceSummary {
    pub source: String,
    pub kind: String,
    pub status: String,
    pub lines: usize,
    pub allocations: usize,
    pub asn_identities: usize,
    pub route_facts: usize,
    pub invalid: usize,
}

impl SourceSummary {
    fn new(source: &str, kind: &str) -> Self {
        Self {
            source: source.to_string(),
            kind: kind.to_string(),
            status: "ok".to_string(),
            ..Default::default()
        }
    }

    fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub started_at: String,
    pub finished_at: String,
    pub elapsed: String,
    pub fetch: Vec<FetchReport>,
    pub sources: Vec<SourceSummary>,
    pub indices: IndexCounts,
    pub files: CommitSummary,
}

impl IngestSummary {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize run summary: {}", e))
    }

    /// Render the summary as tables
    #[cfg(feature = "display")]
    pub fn to_table(&self) -> String {
        use tabled::settings::Style;
        use tabled::Table;

        let mut out = Vec::new();
        if !self.fetch.is_empty() {
            out.push(Table::new(&self.fetch).with(Style::rounded()).to_string());
        }
        out.push(Table::new(&self.sources).with(Style::rounded()).to_string());
        out.push(format!(
            "rir: {} keys / {} prefixes, country: {} keys / {} prefixes, asn: {} keys / {} prefixes",
            self.indices.rir_keys,
            self.indices.rir_prefixes,
            self.indices.country_keys,
            self.indices.country_prefixes,
            self.indices.asn_keys,
            self.indices.asn_prefixes,
        ));
        out.push(format!(
            "Started {}, finished {} ({})",
            self.started_at, self.finished_at, self.elapsed
        ));
        out.join("\n")
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Runs fetch, parse, aggregate and commit against one configuration
pub struct IngestLens<'a> {
    config: &'a RirListsConfig,
}

impl<'a> IngestLens<'a> {
    pub fn new(config: &'a RirListsConfig) -> Self {
        Self { config }
    }

    /// Refresh the feeds over HTTP, then rebuild the indices
    #[cfg(feature = "fetch")]
    pub fn run(&self, options: &IngestOptions) -> Result<IngestSummary> {
        let fetcher = FetchLens::new(
            HttpTransport::new(self.config.fetch_timeout()),
            self.config.input_path(),
        );
        self.run_with(&fetcher, options)
    }

    /// Refresh the feeds through the given fetcher, then rebuild the indices
    #[cfg(feature = "fetch")]
    pub fn run_with<T: FeedTransport>(
        &self,
        fetcher: &FetchLens<T>,
        options: &IngestOptions,
    ) -> Result<IngestSummary> {
        self.config.ensure_dirs()?;

        let fetch = if options.skip_fetch {
            info!("Skipping feed refresh");
            Vec::new()
        } else {
            fetcher
                .refresh_all(&sources::all_feeds())
                .into_iter()
                .map(FetchReport::from)
                .collect()
        };

        let mut summary = self.ingest()?;
        summary.fetch = fetch;
        Ok(summary)
    }

    /// Rebuild the indices from the files already in the input directory
    pub fn ingest(&self) -> Result<IngestSummary> {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Time: {}", started_at.to_rfc3339());

        self.config.ensure_dirs()?;
        let input_dir = self.config.input_path();

        let mut aggregator = Aggregator::new();
        let mut sources_summary = Vec::new();

        info!("Parse extended-stats files");
        for registry in Registry::all() {
            sources_summary.push(parse_delegated(&input_dir, registry, &mut aggregator));
        }

        info!("Parse route-object dumps");
        for feed in sources::route_object_feeds() {
            sources_summary.push(parse_routes(&input_dir, feed.file_name(), &mut aggregator));
        }

        let indices = aggregator.finalize();
        let counts = indices.counts();

        let store = IndexStore::new(self.config.output_path());
        let files = store.commit(&indices)?;

        let finished_at = Utc::now();
        let elapsed =
            humantime::format_duration(std::time::Duration::from_secs(timer.elapsed().as_secs()))
                .to_string();
        info!("Time: {}", finished_at.to_rfc3339());
        info!("Ingestion finished in {}", elapsed);

        Ok(IngestSummary {
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            elapsed,
            fetch: Vec::new(),
            sources: sources_summary,
            indices: counts,
            files,
        })
    }
}

fn parse_delegated(
    input_dir: &Path,
    registry: Registry,
    aggregator: &mut Aggregator,
) -> SourceSummary {
    let file_name = registry.delegated_file_name();
    let summary = SourceSummary::new(&file_name, "extended-stats");
    let path = input_dir.join(&file_name);
    if !path.is_file() {
        info!("{} not found, skipping", file_name);
        return summary.with_status("missing");
    }

    let path_str = path.to_string_lossy();
    match delegated::parse_file(registry, &path_str, |line| {
        aggregator.ingest_delegated_line(line)
    }) {
        Ok(stats) => SourceSummary {
            lines: stats.lines,
            allocations: stats.allocations,
            asn_identities: stats.asn_identities,
            invalid: stats.invalid_cidrs,
            ..summary
        },
        Err(e) => {
            warn!("{}", e);
            summary.with_status(format!("error: {}", e))
        }
    }
}

fn parse_routes(input_dir: &Path, file_name: &str, aggregator: &mut Aggregator) -> SourceSummary {
    let summary = SourceSummary::new(file_name, "route-object");
    let path = input_dir.join(file_name);
    if !path.is_file() {
        info!("{} not found, skipping", file_name);
        return summary.with_status("missing");
    }

    let path_str = path.to_string_lossy();
    match route::parse_file(&path_str, |fact| aggregator.ingest_route_fact(fact)) {
        Ok(stats) => SourceSummary {
            lines: stats.lines,
            route_facts: stats.route_facts,
            invalid: stats.invalid_origins,
            ..summary
        },
        Err(e) => {
            warn!("{}", e);
            summary.with_status(format!("error: {}", e))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Namespace;
    use std::fs;
    use std::io::Write;

    const RIPE_STATS: &str = "\
2|ripencc|20240101|4|19830705|20240101|+0100
ripencc|*|ipv4|*|2|summary
ripencc|NL|asn|3333|1|19930901|allocated|org-ripe
ripencc|NL|ipv4|193.0.0.0|4096|19930901|allocated|org-ripe
ripencc|NL|ipv6|2001:67c:2e8::|48|20030101|assigned|org-ripe
ripencc||ipv4|192.0.2.0|256|20240101|assigned|
";

    const ARIN_STATS: &str = "\
arin|US|ipv4|198.51.100.0|256|20100101|assigned|org-arin
arin|US|ipv4|203.0.113.0|300|20100101|assigned|org-arin
";

    const RIPE_ROUTES: &str = "\
route:          193.0.0.0/21
origin:         AS3333

route:          10.0.0.0/8
origin:         AS64500
";

    fn test_config(root: &Path) -> RirListsConfig {
        RirListsConfig {
            data_dir: root.to_string_lossy().to_string(),
            input_dir: root.join("in").to_string_lossy().to_string(),
            output_dir: root.join("out").to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    fn write_inputs(config: &RirListsConfig) {
        let input = config.input_path();
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("delegated-ripencc-extended-latest"), RIPE_STATS).unwrap();
        fs::write(input.join("delegated-arin-extended-latest"), ARIN_STATS).unwrap();

        let dump = input.join("ripe.db.gz");
        let mut writer = oneio::get_writer(&dump.to_string_lossy()).unwrap();
        writer.write_all(RIPE_ROUTES.as_bytes()).unwrap();
    }

    #[test]
    fn test_ingest_end_to_end() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());
        write_inputs(&config);

        let summary = IngestLens::new(&config).ingest().unwrap();
        let store = IndexStore::new(config.output_path());

        assert_eq!(
            store.read(Namespace::Rir, "ripencc").unwrap(),
            vec!["193.0.0.0/20", "2001:67c:2e8::/48", "192.0.2.0/24"]
        );
        // 300 addresses round up to a /23
        assert_eq!(
            store.read(Namespace::Country, "US").unwrap(),
            vec!["198.51.100.0/24", "203.0.113.0/23"]
        );

        let mut as3333 = store.read(Namespace::Asn, "3333").unwrap();
        as3333.sort();
        assert_eq!(
            as3333,
            vec!["193.0.0.0/20", "193.0.0.0/21", "2001:67c:2e8::/48"]
        );
        assert_eq!(
            store.read(Namespace::Asn, "64500").unwrap(),
            vec!["10.0.0.0/8"]
        );

        assert_eq!(summary.indices.rir_keys, 2);
        assert_eq!(summary.indices.asn_keys, 2);
        assert!(summary.fetch.is_empty());

        let ripe = &summary.sources[0];
        assert_eq!(ripe.source, "delegated-ripencc-extended-latest");
        assert_eq!(ripe.allocations, 3);
        assert_eq!(ripe.asn_identities, 1);

        let apnic = &summary.sources[1];
        assert_eq!(apnic.status, "missing");

        let routes = summary
            .sources
            .iter()
            .find(|s| s.source == "ripe.db.gz")
            .unwrap();
        assert_eq!(routes.route_facts, 2);
    }

    #[test]
    fn test_ingest_skips_country_code_with_separator() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());
        fs::create_dir_all(config.input_path()).unwrap();
        fs::write(
            config.input_path().join("delegated-arin-extended-latest"),
            "arin|US|ipv4|198.51.100.0|256|20100101|assigned|org-arin\n\
             arin|A/B|ipv4|203.0.113.0|256|20100101|assigned|org-arin\n",
        )
        .unwrap();

        let summary = IngestLens::new(&config).ingest().unwrap();
        let store = IndexStore::new(config.output_path());

        assert_eq!(
            store.read(Namespace::Rir, "arin").unwrap(),
            vec!["198.51.100.0/24", "203.0.113.0/24"]
        );
        assert_eq!(store.keys(Namespace::Country).unwrap(), vec!["US"]);
        assert_eq!(summary.files.country_files, 1);
    }

    #[test]
    fn test_ingest_empty_input() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());

        let summary = IngestLens::new(&config).ingest().unwrap();
        assert!(summary.sources.iter().all(|s| s.status == "missing"));
        assert_eq!(summary.files, CommitSummary::default());
        assert!(config.output_path().join("asn").is_dir());
    }

    #[test]
    fn test_ingest_unreadable_dump_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());
        fs::create_dir_all(config.input_path()).unwrap();
        // not a gzip stream
        fs::write(config.input_path().join("arin.db.gz"), "route: 10.0.0.0/8\n").unwrap();

        let summary = IngestLens::new(&config).ingest().unwrap();
        let arin = summary
            .sources
            .iter()
            .find(|s| s.source == "arin.db.gz")
            .unwrap();
        assert!(arin.status.starts_with("error"));
    }

    #[test]
    fn test_summary_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());
        write_inputs(&config);

        let summary = IngestLens::new(&config).ingest().unwrap();
        let value: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(value["indices"]["country_keys"], 3);
        assert_eq!(value["files"]["rir_files"], 2);
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_run_with_fetcher() {
        use std::collections::HashMap;

        struct StaticTransport(HashMap<String, String>);

        impl FeedTransport for StaticTransport {
            fn fetch_token(&self, url: &str) -> Result<String> {
                self.0
                    .get(url)
                    .cloned()
                    .ok_or_else(|| anyhow!("404 {}", url))
            }

            fn download(&self, url: &str, dest: &mut dyn std::io::Write) -> Result<u64> {
                let body = self.0.get(url).ok_or_else(|| anyhow!("404 {}", url))?;
                dest.write_all(body.as_bytes())?;
                Ok(body.len() as u64)
            }
        }

        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());

        let feed = sources::extended_stats_feed(Registry::Arin);
        let mut documents = HashMap::new();
        documents.insert(feed.token_url.clone(), "abc".to_string());
        documents.insert(feed.body_url.clone(), ARIN_STATS.to_string());

        let fetcher = FetchLens::new(StaticTransport(documents), config.input_path());
        let summary = IngestLens::new(&config)
            .run_with(&fetcher, &IngestOptions::default())
            .unwrap();

        assert_eq!(summary.fetch.len(), sources::all_feeds().len());
        let arin = summary
            .fetch
            .iter()
            .find(|r| r.feed == "arin" && r.status.starts_with("downloaded"));
        assert!(arin.is_some());

        let store = IndexStore::new(config.output_path());
        assert_eq!(store.read(Namespace::Rir, "arin").unwrap().len(), 2);
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_run_skip_fetch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = test_config(temp_dir.path());
        write_inputs(&config);

        let options = IngestOptions { skip_fetch: true };
        let summary = IngestLens::new(&config).run(&options).unwrap();
        assert!(summary.fetch.is_empty());
        assert_eq!(summary.indices.rir_keys, 2);
    }
}
