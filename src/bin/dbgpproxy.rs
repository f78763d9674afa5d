//! Entry point for the DBGP rendezvous proxy. Parses CLI flags, initializes
//! logging, and runs the supervisor until an interrupt is received.

use clap::Parser;
use dbgp_proxy::config::{Cli, ProxyConfig};
use dbgp_proxy::Supervisor;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.to_filter())
        .init();

    let config = ProxyConfig::from(&cli);
    let supervisor = Supervisor::new(config);

    if let Err(e) = supervisor.run().await {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}
