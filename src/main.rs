mod cli;
mod config;
mod error;
mod logs;
mod output;
mod prow;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting ProwLens - OpenShift CI failure log analysis");
    cli.execute().await?;

    Ok(())
}
