use anyhow::Result;
use clap::Args;
use rirlists::lens::ingest::{IngestLens, IngestOptions};
use rirlists::RirListsConfig;

/// Arguments for the Update command
#[derive(Args)]
pub struct UpdateArgs {
    /// Rebuild from the files already in the input directory, without downloading
    #[clap(long)]
    pub skip_fetch: bool,

    /// Print the run summary as JSON
    #[clap(long)]
    pub json: bool,
}

pub fn run(config: &RirListsConfig, args: UpdateArgs) -> Result<()> {
    let UpdateArgs { skip_fetch, json } = args;

    let lens = IngestLens::new(config);
    let summary = lens.run(&IngestOptions { skip_fetch })?;

    if json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{}", summary.to_table());
    }
    Ok(())
}
