//! Application configuration loaded from `~/.config/wmm-stack/config.toml`
//! and `WMM_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

const APP_DIR: &str = "wmm-stack";
const CONFIG_FILE: &str = "config.toml";
const ADVERT_FILE: &str = "advertisement.txt";
const ENV_PREFIX: &str = "WMM";

/// Runtime settings for the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Directory holding the game's `Journal.*.log` files.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,
    /// How many days of journals to replay on start-up.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Fallback interval for re-reading the live journal.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            journal_dir: default_journal_dir(),
            retention_days: default_retention_days(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path`, layering environment overrides on top.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// Directory holding the configuration file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Where the exported stack advertisement is written.
pub fn advertisement_path() -> PathBuf {
    config_dir().join(ADVERT_FILE)
}

/// Write a default configuration file unless one already exists.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let defaults = AppConfig::default();
    let contents = format!(
        "# Directory containing Journal.*.log files\n\
         journal_dir = '{}'\n\
         retention_days = {}\n\
         poll_interval_ms = {}\n",
        defaults.journal_dir.display(),
        defaults.retention_days,
        defaults.poll_interval_ms
    );
    fs::write(path, contents)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

fn default_journal_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Saved Games")
        .join("Frontier Developments")
        .join("Elite Dangerous")
}

fn default_retention_days() -> u32 {
    7
}

fn default_poll_interval_ms() -> u64 {
    1000
}
