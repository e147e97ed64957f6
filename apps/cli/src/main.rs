//! InsightLens CLI: cross-document recommendations from the terminal.
//!
//! Uploads documents to the insight backend, searches selections against the
//! library, and streams debounced results for selections read from stdin.

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
