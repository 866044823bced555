use anyhow::Result;
use cipulse::cli::Cli;
use cipulse::output;
use clap::Parser;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting cipulse - CI build status collector");
    cli.execute().await?;

    Ok(())
}
