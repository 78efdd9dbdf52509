use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout applied to every HTTP request made by the fetcher (5 minutes)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Default bind address of the lookup server
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";

/// Default port of the lookup server
pub const DEFAULT_SERVER_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct RirListsConfig {
    /// Path to the directory to hold rirlists' data
    pub data_dir: String,

    /// Directory holding raw feed files and their freshness tokens
    pub input_dir: String,

    /// Root directory of the index store
    pub output_dir: String,

    /// Timeout for each HTTP request in seconds (default: 5 minutes)
    pub fetch_timeout_secs: u64,

    /// Address the lookup server binds to
    pub server_address: String,

    /// Port the lookup server listens on
    pub server_port: u16,
}

const EMPTY_CONFIG: &str = r#"### rirlists configuration file

### directory for data used by rirlists
# data_dir = "~/.rirlists"

### raw registry feeds and their serial/hash tokens (default: <data_dir>/in)
# input_dir = "~/.rirlists/in"

### generated rir/country/asn lists (default: <data_dir>/out)
# output_dir = "~/.rirlists/out"

### timeout for each registry download, in seconds
# fetch_timeout_secs = 300

### lookup server
# server_address = "0.0.0.0"
# server_port = 5000
"#;

impl Default for RirListsConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let data_dir = format!("{}/.rirlists", home_dir);

        Self {
            input_dir: format!("{}/in", data_dir),
            output_dir: format!("{}/out", data_dir),
            data_dir,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl RirListsConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<RirListsConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.rirlists/rirlists.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let rirlists_dir = format!("{}/.rirlists", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(rirlists_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create rirlists directory: {}", e))?;
                let p = format!("{}/rirlists.toml", rirlists_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `RIRLISTS_OUTPUT_DIR=/srv/lists ./rirlists update` would set the output directory
        builder = builder.add_source(config::Environment::with_prefix("RIRLISTS"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Ok(Self::from_map(&config, &rirlists_dir))
    }

    /// Resolve settings from flattened key/value pairs, falling back to defaults
    fn from_map(config: &HashMap<String, String>, default_data_dir: &str) -> RirListsConfig {
        let data_dir = config
            .get("data_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| default_data_dir.to_string());
        let data_dir = data_dir.trim_end_matches('/').to_string();

        let input_dir = config
            .get("input_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| format!("{}/in", data_dir));

        let output_dir = config
            .get("output_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| format!("{}/out", data_dir));

        let fetch_timeout_secs = config
            .get("fetch_timeout_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        let server_address = config
            .get("server_address")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());

        let server_port = config
            .get("server_port")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        RirListsConfig {
            data_dir,
            input_dir,
            output_dir,
            fetch_timeout_secs,
            server_address,
            server_port,
        }
    }

    /// Get fetch timeout as Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn input_path(&self) -> PathBuf {
        PathBuf::from(&self.input_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    /// Create the input and output directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.output_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow!("Failed to create directory '{}': {}", dir, e))?;
        }
        Ok(())
    }

    /// Get the full bind address of the lookup server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Input Directory:    {}", self.input_dir),
            format!("Output Directory:   {}", self.output_dir),
            format!("Fetch Timeout:      {} seconds", self.fetch_timeout_secs),
            format!("Server Address:     {}", self.bind_address()),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.rirlists/rirlists.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

// =============================================================================
// Feed families
// =============================================================================

/// How a feed advertises its current version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFamily {
    /// Routing-registry dumps, versioned by a numeric `CURRENTSERIAL`
    Serial,
    /// Extended-stats files, versioned by an md5 digest
    Hash,
}

impl FeedFamily {
    /// Extension of the local token file stored next to the raw feed
    pub fn token_extension(&self) -> &'static str {
        match self {
            FeedFamily::Serial => "serial",
            FeedFamily::Hash => "hash",
        }
    }
}

impl std::fmt::Display for FeedFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedFamily::Serial => write!(f, "serial"),
            FeedFamily::Hash => write!(f, "hash"),
        }
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
