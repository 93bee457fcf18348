pub mod api;
pub mod dispatcher;
pub mod error;
pub mod git;
pub mod logging;
pub mod matcher;
pub mod payload;
pub mod runner;
pub mod site;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dispatcher::DeploymentDispatcher;
use error::{DeployError, Result};
use site::{SiteConfig, SiteRegistry};

pub const DEFAULT_WEBHOOK_SOURCE: &str = "Bitbucket.org";

fn default_git_path() -> String {
    "git".to_string()
}

fn default_webhook_source() -> String {
    DEFAULT_WEBHOOK_SOURCE.to_string()
}

fn default_log_file_path() -> String {
    "deploy.log".to_string()
}

fn default_date_format() -> String {
    logging::DEFAULT_DATE_FORMAT.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    #[serde(default = "default_git_path")]
    pub git_path: String,
    /// Exact `User-Agent` token the webhook must present
    #[serde(default = "default_webhook_source")]
    pub webhook_source: String,
    /// Upper bound for a single git command; unset means no limit
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl DeployConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn registry(&self) -> SiteRegistry {
        SiteRegistry::new(self.sites.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub log_payload_data: bool,
    #[serde(default)]
    pub log_server_request: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_file_path: default_log_file_path(),
            date_format: default_date_format(),
            timezone: default_timezone(),
            log_payload_data: false,
            log_server_request: false,
        }
    }
}

/// Parse configuration text. TOML when `is_toml`, JSON otherwise.
pub fn parse_config(contents: &str, is_toml: bool, path: &str) -> Result<DeployConfig> {
    let config: DeployConfig = if is_toml {
        toml::from_str(contents).map_err(|e| DeployError::ConfigReadError {
            path: path.to_string(),
            reason: format!("Failed to parse TOML: {}", e),
        })?
    } else {
        serde_json::from_str(contents).map_err(|e| DeployError::ConfigReadError {
            path: path.to_string(),
            reason: format!("Failed to parse JSON: {}", e),
        })?
    };

    if config.sites.is_empty() {
        return Err(DeployError::ConfigNoSites);
    }
    Ok(config)
}

/// Load and validate the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<DeployConfig> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| DeployError::ConfigReadError {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    parse_config(&contents, is_toml, &display)
}

pub struct AppState {
    pub dispatcher: DeploymentDispatcher,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;
