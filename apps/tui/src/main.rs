//! InsightLens TUI: browse the library and explore related passages.
//!
//! Upload, Library and Viewer screens over one session, built with
//! `ratatui` + `crossterm`. Logs go to `~/.insightlens/insightlens-tui.log`.

mod app;
mod screens;
mod widgets;

use std::fs::File;
use std::sync::Mutex;

use color_eyre::eyre::Result;
use insightlens_shared::{config_dir, load_config};

const LOG_FILE_NAME: &str = "insightlens-tui.log";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let config = load_config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("insightlens-tui")
        .build()?;

    app::run(runtime, &config)
}

/// Log to a file; stdout belongs to the terminal UI.
fn init_tracing() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = File::create(dir.join(LOG_FILE_NAME))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("insightlens=info"));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
