use anyhow::{anyhow, Result};
use clap::Args;
use rirlists::server::{start_server, ServerConfig};
use rirlists::RirListsConfig;

/// Arguments for the Serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind to (overrides the configured server_address)
    #[clap(long)]
    pub address: Option<String>,

    /// Port to listen on (overrides the configured server_port)
    #[clap(short, long)]
    pub port: Option<u16>,
}

pub fn run(config: &RirListsConfig, args: ServeArgs) -> Result<()> {
    let ServeArgs { address, port } = args;

    let mut server_config = ServerConfig::from_config(config);
    if let Some(address) = address {
        server_config = server_config.with_address(address);
    }
    if let Some(port) = port {
        server_config = server_config.with_port(port);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to start async runtime: {}", e))?;

    runtime.block_on(start_server(config.output_path(), server_config))
}
