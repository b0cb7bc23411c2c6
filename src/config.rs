use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "gnews.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub feed: FeedSettings,
    pub thumbnails: ThumbnailSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5005,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedSettings {
    /// Scheme and host of the aggregator, without a trailing slash
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "https://news.google.com".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Which session implementation renders article pages.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    #[default]
    Chrome,
    Static,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeadlessMode {
    #[default]
    New,
    Legacy,
    Off,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThumbnailSettings {
    /// Maximum number of article pages open at once
    pub concurrency: usize,
    pub navigation_timeout_ms: u64,
    /// Wait after the redirect target's load event before inspecting it
    pub settle_delay_ms: u64,
    pub user_agent: String,
    pub renderer: Renderer,
    pub headless: HeadlessMode,
    pub chrome_executable: Option<PathBuf>,
    pub launch_args: Vec<String>,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            navigation_timeout_ms: 20_000,
            settle_delay_ms: 2_500,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120"
                .to_string(),
            renderer: Renderer::default(),
            headless: HeadlessMode::default(),
            chrome_executable: None,
            launch_args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
        }
    }
}

impl ThumbnailSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.thumbnails.concurrency == 0 {
            anyhow::bail!("thumbnails.concurrency must be at least 1");
        }
        if self.thumbnails.navigation_timeout_ms == 0 {
            anyhow::bail!("thumbnails.navigation_timeout_ms must be positive");
        }
        Ok(())
    }
}
