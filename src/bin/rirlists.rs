use clap::{CommandFactory, Parser, Subcommand};
use rirlists::*;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::query::QueryArgs;
use commands::serve::ServeArgs;
use commands::update::UpdateArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.rirlists/rirlists.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download fresh registry feeds and rebuild the rir/country/asn lists
    Update(UpdateArgs),

    /// Look up stored lists by registry, country or ASN and write them to a file
    Query(QueryArgs),

    /// Serve the stored lists over HTTP
    Serve(ServeArgs),

    /// Show configuration and index store status
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match RirListsConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Update(args) => commands::update::run(&config, args),
        Commands::Query(args) => {
            if args.is_empty() {
                let mut cmd = Cli::command();
                if let Some(query) = cmd.find_subcommand_mut("query") {
                    let _ = query.print_help();
                }
                return;
            }
            commands::query::run(&config, args)
        }
        Commands::Serve(args) => commands::serve::run(&config, args),
        Commands::Config(args) => commands::config::run(&config, args),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
