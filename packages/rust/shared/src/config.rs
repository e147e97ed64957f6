//! Application configuration for InsightLens.
//!
//! User config lives at `~/.insightlens/insightlens.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InsightError, Result};
use crate::types::HighlightStyle;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "insightlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".insightlens";

/// Environment variable that overrides `[backend] base_url`.
pub const BASE_URL_ENV: &str = "INSIGHTLENS_BASE_URL";

// ---------------------------------------------------------------------------
// Config structs (matching insightlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Selection pipeline timing.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Highlight appearance on the rendering surface.
    #[serde(default)]
    pub highlight: HighlightSection,
}

/// `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the insight backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Quiet period before a selection burst is processed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    600
}

/// `[highlight]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightSection {
    /// Highlight fill color (CSS hex).
    #[serde(default = "default_color")]
    pub color: String,

    /// Highlight opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl Default for HighlightSection {
    fn default() -> Self {
        Self {
            color: default_color(),
            opacity: default_opacity(),
        }
    }
}

fn default_color() -> String {
    "#FFD54F".into()
}
fn default_opacity() -> f64 {
    0.4
}

impl AppConfig {
    /// Parse the configured base URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.backend.base_url).map_err(|e| {
            InsightError::config(format!("invalid base_url '{}': {e}", self.backend.base_url))
        })
    }

    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(InsightError::config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if !(0.0..=1.0).contains(&self.highlight.opacity) {
            return Err(InsightError::config(format!(
                "highlight opacity must be within [0, 1], got {}",
                self.highlight.opacity
            )));
        }
        if self.backend.timeout_secs == 0 {
            return Err(InsightError::config("timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Highlight style derived from the `[highlight]` section.
    pub fn highlight_style(&self) -> HighlightStyle {
        HighlightStyle {
            color: self.highlight.color.clone(),
            opacity: self.highlight.opacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Quiet period that must pass without new selections.
    pub debounce: Duration,
    /// Style applied to recommendation highlights.
    pub highlight: HighlightStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.pipeline.debounce_ms),
            highlight: config.highlight_style(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.insightlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InsightError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.insightlens/insightlens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| InsightError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        InsightError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InsightError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InsightError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InsightError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("debounce_ms"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[backend]
base_url = "http://10.0.0.5:9000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.backend.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.pipeline.debounce_ms, 600);
        assert_eq!(config.highlight.color, "#FFD54F");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let mut app = AppConfig::default();
        app.pipeline.debounce_ms = 250;
        app.highlight.opacity = 0.7;
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.debounce, Duration::from_millis(250));
        assert_eq!(pipeline.highlight.opacity, 0.7);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.backend.base_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backend.base_url = "ftp://files.example.com".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.highlight.opacity = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("opacity"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("il-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("insightlens.toml");
        std::fs::write(&path, "[pipeline]\ndebounce_ms = 100\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.pipeline.debounce_ms, 100);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
