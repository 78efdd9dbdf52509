//! Catalog of the public registry feeds ingested by rirlists.
//!
//! Two families of feeds are used:
//! - routing-registry (RPSL) dumps, versioned by a numeric `CURRENTSERIAL` file
//! - extended-stats delegation files, versioned by an `.md5` digest file

use crate::config::FeedFamily;
use crate::datasets::registry::Registry;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A remote feed and the URL advertising its current version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSource {
    /// Short identifier, e.g. `ripe`, `apnic6`, `ripencc`
    pub name: String,
    pub family: FeedFamily,
    /// URL returning the version token (serial or hash)
    pub token_url: String,
    /// URL of the feed body
    pub body_url: String,
}

impl FeedSource {
    pub fn new(
        name: impl Into<String>,
        family: FeedFamily,
        token_url: impl Into<String>,
        body_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            token_url: token_url.into(),
            body_url: body_url.into(),
        }
    }

    /// Local file name of the raw feed: the last path segment of the body URL
    pub fn file_name(&self) -> &str {
        self.body_url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.name.as_str())
    }

    pub fn raw_path(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(self.file_name())
    }

    /// Path of the token file, e.g. `in/ripe.db.gz.serial`
    pub fn token_path(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(format!(
            "{}.{}",
            self.file_name(),
            self.family.token_extension()
        ))
    }
}

/// Routing-registry dumps, in the order they are parsed
pub fn route_object_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "ripe",
            FeedFamily::Serial,
            "https://ftp.ripe.net/ripe/dbase/RIPE.CURRENTSERIAL",
            "https://ftp.ripe.net/ripe/dbase/ripe.db.gz",
        ),
        FeedSource::new(
            "apnic",
            FeedFamily::Serial,
            "https://ftp.apnic.net/apnic/whois/APNIC.CURRENTSERIAL",
            "https://ftp.apnic.net/apnic/whois/apnic.db.route.gz",
        ),
        FeedSource::new(
            "apnic6",
            FeedFamily::Serial,
            "https://ftp.apnic.net/apnic/whois/APNIC.CURRENTSERIAL",
            "https://ftp.apnic.net/apnic/whois/apnic.db.route6.gz",
        ),
        FeedSource::new(
            "lacnic",
            FeedFamily::Serial,
            "https://ftp.lacnic.net/lacnic/irr/LACNIC.CURRENTSERIAL",
            "https://ftp.lacnic.net/lacnic/irr/lacnic.db.gz",
        ),
        FeedSource::new(
            "arin",
            FeedFamily::Serial,
            "https://ftp.arin.net/pub/rr/ARIN.CURRENTSERIAL",
            "https://ftp.arin.net/pub/rr/arin.db.gz",
        ),
        FeedSource::new(
            "afrinic",
            FeedFamily::Serial,
            "https://ftp.afrinic.net/dbase/AFRINIC.CURRENTSERIAL",
            "https://ftp.afrinic.net/dbase/afrinic.db.gz",
        ),
    ]
}

fn stats_base_url(registry: Registry) -> &'static str {
    match registry {
        Registry::RipeNcc => "https://ftp.ripe.net/ripe/stats",
        Registry::Apnic => "https://ftp.apnic.net/stats/apnic",
        Registry::Lacnic => "https://ftp.lacnic.net/pub/stats/lacnic",
        Registry::Arin => "https://ftp.arin.net/pub/stats/arin",
        Registry::Afrinic => "https://ftp.afrinic.net/stats/afrinic",
    }
}

/// Extended-stats feed of one registry
pub fn extended_stats_feed(registry: Registry) -> FeedSource {
    let body_url = format!(
        "{}/{}",
        stats_base_url(registry),
        registry.delegated_file_name()
    );
    FeedSource::new(
        registry.name(),
        FeedFamily::Hash,
        format!("{}.md5", body_url),
        body_url,
    )
}

/// Extended-stats feeds of all registries
pub fn extended_stats_feeds() -> Vec<FeedSource> {
    Registry::all()
        .into_iter()
        .map(extended_stats_feed)
        .collect()
}

/// Every feed the fetcher keeps fresh
pub fn all_feeds() -> Vec<FeedSource> {
    let mut feeds = route_object_feeds();
    feeds.extend(extended_stats_feeds());
    feeds
}
