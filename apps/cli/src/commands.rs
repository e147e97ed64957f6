//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Report, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use insightlens_core::{
    PipelineState, PlaceholderCapturer, ScreenshotCapturer, SelectionOutcome, Session,
    StaticCapturer, normalize_documents, normalize_recommendations,
};
use insightlens_gateway::{Gateway, UploadFile};
use insightlens_shared::{
    AppConfig, BASE_URL_ENV, CaptureRegion, InsightError, PipelineConfig, Recommendation,
    init_config, load_config,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// InsightLens: related passages from your own document library.
#[derive(Parser)]
#[command(
    name = "insightlens",
    version,
    about = "Find related passages across your documents for any selected text.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Backend base URL (overrides the config file).
    #[arg(long, env = BASE_URL_ENV, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Upload one or more PDFs to the backend library.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List documents in the backend library.
    List {
        /// Print the normalized list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Download a document from the library.
    Fetch {
        /// Document name as listed.
        name: String,

        /// Output path (defaults to the document name).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Search the library for passages related to some text.
    Search {
        /// Selected text.
        text: String,

        /// Screenshot to send with the text (png, jpg or webp).
        #[arg(long)]
        image: Option<PathBuf>,

        /// Print recommendations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate an insight for the most recent selection.
    Insights,

    /// Generate a two-speaker podcast script for the most recent selection.
    Podcast {
        /// Print the script as returned instead of split into turns.
        #[arg(long)]
        raw: bool,
    },

    /// Read selections from stdin, one per line, through the live pipeline.
    Watch {
        /// Library document to view.
        #[arg(long, conflicts_with = "file")]
        document: Option<String>,

        /// Local file to view instead of a library document.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Quiet period override in milliseconds.
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "insightlens=info",
        1 => "insightlens=debug",
        _ => "insightlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let base_url = cli.base_url.as_deref();
    match cli.command {
        Command::Upload { files } => cmd_upload(&resolve_config(base_url)?, &files).await,
        Command::List { json } => cmd_list(&resolve_config(base_url)?, json).await,
        Command::Fetch { name, out } => cmd_fetch(&resolve_config(base_url)?, &name, out).await,
        Command::Search { text, image, json } => {
            cmd_search(&resolve_config(base_url)?, &text, image.as_deref(), json).await
        }
        Command::Insights => cmd_insights(&resolve_config(base_url)?).await,
        Command::Podcast { raw } => cmd_podcast(&resolve_config(base_url)?, raw).await,
        Command::Watch {
            document,
            file,
            debounce_ms,
        } => cmd_watch(resolve_config(base_url)?, document, file, debounce_ms).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(base_url),
        },
    }
}

/// Load the config file and apply the `--base-url` override.
fn resolve_config(base_url: Option<&str>) -> Result<AppConfig> {
    let mut config = load_config()?;
    if let Some(url) = base_url {
        config.backend.base_url = url.to_string();
        config.validate()?;
    }
    debug!(base_url = %config.backend.base_url, "resolved config");
    Ok(config)
}

/// Wrap a library error so the user sees the friendly message first.
fn friendly(err: InsightError) -> Report {
    let message = err.user_message();
    Report::new(err).wrap_err(message)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_upload(config: &AppConfig, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }

    info!(count = files.len(), "uploading documents");
    let gateway = Gateway::from_config(config)?;
    let spinner = spinner(format!("Uploading {} file(s)", files.len()));
    let receipt = gateway.upload_documents(files).await;
    spinner.finish_and_clear();
    let receipt = receipt.map_err(friendly)?;

    println!();
    println!("  {}", receipt.message);
    for name in &receipt.files {
        println!("  - {name}");
    }
    println!();
    Ok(())
}

async fn cmd_list(config: &AppConfig, json: bool) -> Result<()> {
    let gateway = Gateway::from_config(config)?;
    let payload = gateway.list_documents().await.map_err(friendly)?;
    let documents = normalize_documents(&payload, Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No documents in the library. Upload some with `insightlens upload`.");
        return Ok(());
    }

    println!();
    for doc in &documents {
        println!("  {:<40} {}", doc.name, doc.id);
    }
    println!();
    println!("  {} document(s)", documents.len());
    Ok(())
}

async fn cmd_fetch(config: &AppConfig, name: &str, out: Option<PathBuf>) -> Result<()> {
    let gateway = Gateway::from_config(config)?;
    let bytes = gateway.fetch_document(name).await.map_err(friendly)?;

    let out = out.unwrap_or_else(|| PathBuf::from(name));
    tokio::fs::write(&out, &bytes)
        .await
        .map_err(|e| eyre!("failed to write {}: {e}", out.display()))?;

    println!("Saved {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

async fn cmd_search(config: &AppConfig, text: &str, image: Option<&Path>, json: bool) -> Result<()> {
    if text.trim().is_empty() {
        return Err(eyre!("selection text is empty"));
    }

    let capturer: Box<dyn ScreenshotCapturer> = match image {
        Some(path) => Box::new(StaticCapturer::from_path(path).await?),
        None => Box::new(PlaceholderCapturer),
    };
    let screenshot = capturer.capture(&CaptureRegion::default(), text).await?;

    let gateway = Gateway::from_config(config)?;
    let spinner = spinner("Searching related passages".to_string());
    let payload = gateway.search_selection(&screenshot, text).await;
    spinner.finish_and_clear();
    let recommendations = normalize_recommendations(&payload.map_err(friendly)?);

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations);
    }
    Ok(())
}

async fn cmd_insights(config: &AppConfig) -> Result<()> {
    let gateway = Gateway::from_config(config)?;
    let spinner = spinner("Generating insight".to_string());
    let insight = gateway.fetch_insight().await;
    spinner.finish_and_clear();

    println!();
    println!("{}", insight.map_err(friendly)?.text.trim());
    println!();
    Ok(())
}

async fn cmd_podcast(config: &AppConfig, raw: bool) -> Result<()> {
    let gateway = Gateway::from_config(config)?;
    let spinner = spinner("Writing podcast script".to_string());
    let script = gateway.fetch_podcast().await;
    spinner.finish_and_clear();
    let script = script.map_err(friendly)?;

    println!();
    if raw {
        println!("{}", script.text.trim());
    } else {
        for turn in script.turns() {
            println!("  {:>8}: {}", turn.speaker, turn.line);
        }
    }
    println!();
    Ok(())
}

async fn cmd_watch(
    config: AppConfig,
    document: Option<String>,
    file: Option<PathBuf>,
    debounce_ms: Option<u64>,
) -> Result<()> {
    let mut pipeline_config = PipelineConfig::from(&config);
    if let Some(ms) = debounce_ms {
        pipeline_config.debounce = Duration::from_millis(ms);
    }
    let quiet = pipeline_config.debounce;

    let gateway = Arc::new(Gateway::from_config(&config)?);
    let mut session = Session::with_parts(gateway, Arc::new(PlaceholderCapturer), &pipeline_config);

    match (document, file) {
        (_, Some(path)) => {
            session.open_local_file(&path)?;
        }
        (Some(name), None) => {
            let found = session
                .refresh_library()
                .await
                .map_err(friendly)?
                .iter()
                .find(|d| d.name == name)
                .cloned()
                .ok_or_else(|| eyre!("'{name}' is not in the library"))?;
            session.open_document(found);
        }
        (None, None) => {
            return Err(eyre!("pass --document <name> or --file <path> to watch"));
        }
    }

    info!(quiet_ms = quiet.as_millis() as u64, "reading selections from stdin");
    let mut rx = session.pipeline().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<String> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let was_pending = session.pipeline().is_pending();
                    if session.on_selection(&line).await == SelectionOutcome::Scheduled {
                        last = Some(line);
                    } else if was_pending {
                        // the blank line cancelled it; nothing left to wait for
                        debug!("blank selection cancelled the pending one");
                        last = None;
                    } else {
                        debug!("blank selection skipped");
                    }
                }
                None => break,
            },
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state);
            }
        }
    }

    // stdin is closed; wait for the last selection to fire and settle
    let Some(last) = last else {
        return Ok(());
    };
    let settled = |s: &PipelineState| !s.loading && s.query.as_deref() == Some(last.as_str());
    if !rx.has_changed().unwrap_or(false) && settled(&rx.borrow()) {
        return Ok(());
    }

    let limit = quiet + Duration::from_secs(config.backend.timeout_secs);
    let state = tokio::time::timeout(limit, rx.wait_for(settled))
        .await
        .map_err(|_| eyre!("timed out waiting for the last selection"))?
        .map_err(|_| eyre!("selection pipeline stopped"))?
        .clone();
    print_state(&state);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(base_url: Option<&str>) -> Result<()> {
    let config = resolve_config(base_url)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_state(state: &PipelineState) {
    if state.loading {
        if let Some(query) = &state.query {
            println!("… searching for \"{}\"", preview(query, 60));
        }
        return;
    }
    if let Some(error) = &state.error {
        println!("! {error}");
        return;
    }
    if state.query.is_some() {
        print_recommendations(&state.results);
    }
}

fn print_recommendations(recs: &[Recommendation]) {
    if recs.is_empty() {
        println!("No related passages found.");
        return;
    }

    println!();
    for (i, rec) in recs.iter().enumerate() {
        println!(
            "  {}. {} (p. {})  [{} · {:.0}%]",
            i + 1,
            rec.source_document,
            rec.page_number,
            rec.connection_type,
            rec.relevance_score * 100.0
        );
        println!("     {}", rec.snippet.replace('\n', " "));
    }
    println!();
}

/// First `max` characters of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_with_image() {
        let cli = Cli::try_parse_from([
            "insightlens",
            "search",
            "attention is all you need",
            "--image",
            "shot.png",
        ])
        .unwrap();
        match cli.command {
            Command::Search { text, image, json } => {
                assert_eq!(text, "attention is all you need");
                assert_eq!(image, Some(PathBuf::from("shot.png")));
                assert!(!json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn upload_requires_files() {
        assert!(Cli::try_parse_from(["insightlens", "upload"]).is_err());
    }

    #[test]
    fn watch_rejects_both_sources() {
        let parsed = Cli::try_parse_from([
            "insightlens",
            "watch",
            "--document",
            "a.pdf",
            "--file",
            "a.pdf",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "insightlens",
            "list",
            "-vv",
            "--base-url",
            "http://10.0.0.2:8000",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.base_url.as_deref(), Some("http://10.0.0.2:8000"));
    }

    #[test]
    fn preview_flattens_and_cuts() {
        assert_eq!(preview("a\n  b", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc…");
    }
}
