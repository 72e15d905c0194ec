use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cards to review per day, shown next to today's count (default: 20)
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,

    /// Include archived decks when reviewing all decks (default: false)
    #[serde(default)]
    pub include_archived: bool,

    /// Log filter used when RUST_LOG is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Path to log file
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

fn default_daily_goal() -> u32 {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("flashdeck"))
}

fn default_db_path() -> PathBuf {
    data_dir()
        .map(|p| p.join("flashdeck.db"))
        .unwrap_or_else(|| PathBuf::from("flashdeck.db"))
}

fn default_log_path() -> PathBuf {
    data_dir()
        .map(|p| p.join("flashdeck.log"))
        .unwrap_or_else(|| PathBuf::from("flashdeck.log"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daily_goal: default_daily_goal(),
            include_archived: false,
            log_level: default_log_level(),
            db_path: default_db_path(),
            log_path: default_log_path(),
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(suffix) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(suffix);
    }
    path.to_path_buf()
}

impl Config {
    /// Load config from file or return defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", config_path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        ensure!(
            (1..=100).contains(&config.daily_goal),
            "daily_goal must be between 1 and 100, got {}",
            config.daily_goal
        );
        config.db_path = expand_tilde(&config.db_path);
        config.log_path = expand_tilde(&config.log_path);
        Ok(config)
    }

    /// Path to config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("flashdeck").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Ensure required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        for path in [&self.db_path, &self.log_path] {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        Ok(())
    }
}
