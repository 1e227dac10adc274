use anyhow::Result;
use cipewatch::cli::Cli;
use cipewatch::output;
use clap::Parser;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting cipewatch - CI Pipeline Execution Watcher");
    cli.execute().await?;

    Ok(())
}
