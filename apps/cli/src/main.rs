//! ReviewHarvest CLI: cache-aside product review scraper.
//!
//! Looks up reviews for a search query in the local store and scrapes the
//! source site only when nothing is cached.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
