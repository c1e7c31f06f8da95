//! Configuration loader and validator for the table explorer.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub platform: Platform,
    pub project: Project,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Platform API endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platform {
    pub base_url: String,
    pub access_token: String,
}

/// The project whose database is being browsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    #[serde(rename = "ref")]
    pub project_ref: String,
    pub connection_string: String,
}

fn default_page_size() -> u32 {
    100
}

impl App {
    /// Expand a leading `~/` in `data_dir`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// SQLite URL of the preference database inside `data_dir`.
    pub fn preferences_url(&self) -> String {
        format!("sqlite://{}/preferences.db?mode=rwc", self.app.resolved_data_dir())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.page_size == 0 {
        return Err(ConfigError::Invalid("app.page_size must be > 0"));
    }

    if cfg.platform.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("platform.base_url must be non-empty"));
    }
    if Url::parse(&cfg.platform.base_url).is_err() {
        return Err(ConfigError::Invalid("platform.base_url must be a valid URL"));
    }
    if cfg.platform.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("platform.access_token must be non-empty"));
    }

    if cfg.project.project_ref.trim().is_empty() {
        return Err(ConfigError::Invalid("project.ref must be non-empty"));
    }
    if cfg.project.connection_string.trim().is_empty() {
        return Err(ConfigError::Invalid("project.connection_string must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  page_size: 100

platform:
  base_url: "https://api.supabase.com/"
  access_token: "YOUR_PLATFORM_ACCESS_TOKEN"

project:
  ref: "abcdefghijklmnopqrst"
  connection_string: "ENCRYPTED_CONNECTION_STRING"
"#
}
