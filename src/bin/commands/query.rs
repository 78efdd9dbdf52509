use anyhow::{anyhow, Result};
use clap::Args;
use rirlists::database::IndexStore;
use rirlists::lens::query::{KeyNormalization, QueryLens, QueryRequest};
use rirlists::lens::utils::OutputFormat;
use rirlists::RirListsConfig;
use std::path::PathBuf;

/// Arguments for the Query command
#[derive(Args)]
pub struct QueryArgs {
    /// Registries separated by semicolons, e.g. "arin;ripencc"
    #[clap(short, long)]
    pub rir: Option<String>,

    /// Country codes separated by semicolons, e.g. "US;CA"
    #[clap(short, long)]
    pub country: Option<String>,

    /// AS numbers separated by semicolons, e.g. "3333;64500"
    #[clap(short, long)]
    pub asn: Option<String>,

    /// Output format
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Paloalto)]
    pub output: OutputFormat,

    /// Write to this file instead of output.csv / output.txt
    #[clap(long)]
    pub output_file: Option<PathBuf>,
}

impl QueryArgs {
    /// No key list was given at all
    pub fn is_empty(&self) -> bool {
        [&self.rir, &self.country, &self.asn]
            .iter()
            .all(|list| list.as_deref().unwrap_or_default().is_empty())
    }
}

pub fn run(config: &RirListsConfig, args: QueryArgs) -> Result<()> {
    let QueryArgs {
        rir,
        country,
        asn,
        output,
        output_file,
    } = args;

    let request = QueryRequest::from_lists(
        rir.as_deref(),
        country.as_deref(),
        asn.as_deref(),
        KeyNormalization::Truncating,
    );

    let store = IndexStore::new(config.output_path());
    let lens = QueryLens::new(&store);
    let entries = lens.lookup(&request)?;
    let body = QueryLens::render(&entries, output)?;

    let path = output_file.unwrap_or_else(|| PathBuf::from(output.default_output_file()));
    std::fs::write(&path, body).map_err(|e| anyhow!("Failed to write {:?}: {}", path, e))?;

    let label = match output {
        OutputFormat::Csv => "CSV output",
        OutputFormat::Txt => "TXT output",
        OutputFormat::Paloalto => "Palo Alto dynamic list format output",
    };
    println!("{} written to '{}'", label, path.display());

    let messages = lens.processed_messages(&request);
    if !messages.is_empty() {
        println!("{}", messages.join(" and "));
    }
    Ok(())
}
