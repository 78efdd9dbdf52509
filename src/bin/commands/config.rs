use anyhow::Result;
use clap::Args;
use rirlists::database::{IndexStore, Namespace};
use rirlists::datasets::sources::all_feeds;
use rirlists::{format_size, RirListsConfig};
use serde::Serialize;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Show the status of every raw feed file
    #[clap(short, long)]
    pub verbose: bool,

    /// Print as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    input_dir: String,
    output_dir: String,
    fetch_timeout_secs: u64,
    server: String,
    index: IndexInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    feeds: Option<Vec<FeedInfo>>,
}

#[derive(Debug, Serialize)]
struct IndexInfo {
    rir_keys: usize,
    country_keys: usize,
    asn_keys: usize,
}

#[derive(Debug, Serialize)]
struct FeedInfo {
    name: String,
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    token: String,
}

pub fn run(config: &RirListsConfig, args: ConfigArgs) -> Result<()> {
    let ConfigArgs { verbose, json } = args;

    let store = IndexStore::new(config.output_path());
    let index = IndexInfo {
        rir_keys: store.keys(Namespace::Rir)?.len(),
        country_keys: store.keys(Namespace::Country)?.len(),
        asn_keys: store.keys(Namespace::Asn)?.len(),
    };

    let feeds = verbose.then(|| {
        let input = config.input_path();
        all_feeds()
            .into_iter()
            .map(|feed| FeedInfo {
                name: feed.name.clone(),
                file: feed.file_name().to_string(),
                size_bytes: std::fs::metadata(feed.raw_path(&input))
                    .ok()
                    .map(|m| m.len()),
                token: std::fs::read_to_string(feed.token_path(&input))
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>()
    });

    let info = ConfigInfo {
        config_file: RirListsConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        input_dir: config.input_dir.clone(),
        output_dir: config.output_dir.clone(),
        fetch_timeout_secs: config.fetch_timeout_secs,
        server: config.bind_address(),
        index,
        feeds,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Config File:        {}", info.config_file);
    println!("{}", config.summary());
    println!(
        "Index:              {} registries, {} countries, {} ASNs",
        info.index.rir_keys, info.index.country_keys, info.index.asn_keys
    );

    if let Some(feeds) = &info.feeds {
        println!();
        println!("Feeds:");
        for feed in feeds {
            let size = feed
                .size_bytes
                .map(format_size)
                .unwrap_or_else(|| "missing".to_string());
            let token = if feed.token.is_empty() {
                "-"
            } else {
                feed.token.as_str()
            };
            println!("  {:<8} {:<36} {:>10}  {}", feed.name, feed.file, size, token);
        }
    }
    Ok(())
}
