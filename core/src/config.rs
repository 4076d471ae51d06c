use crate::errors::{MentoraError, MentoraResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "mentora";
pub const API_URL_ENV: &str = "MENTORA_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:3001";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REVALIDATE_MINUTES: u64 = 5;

/// Configuration for the Mentora client
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MentoraConfig {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
    pub revalidate_minutes: Option<u64>,
    pub download_dir: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl MentoraConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> MentoraResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            MentoraError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| MentoraError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> MentoraResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            MentoraError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                MentoraError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| MentoraError::ConfigError(format!("Failed to write config file: {}", e)))
    }

    /// Reads overrides from the process environment
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var(API_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty()),
            ..Self::default()
        }
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_url: other.api_url.clone().or_else(|| self.api_url.clone()),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            health_timeout_secs: other.health_timeout_secs.or(self.health_timeout_secs),
            revalidate_minutes: other.revalidate_minutes.or(self.revalidate_minutes),
            download_dir: other
                .download_dir
                .clone()
                .or_else(|| self.download_dir.clone()),
            session_file: other
                .session_file
                .clone()
                .or_else(|| self.session_file.clone()),
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
        }
    }

    /// Base URL without a trailing slash
    pub fn api_url(&self) -> String {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim()
            .trim_end_matches('/')
            .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(
            self.health_timeout_secs
                .unwrap_or(DEFAULT_HEALTH_TIMEOUT_SECS),
        )
    }

    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate_minutes.unwrap_or(DEFAULT_REVALIDATE_MINUTES) * 60)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn session_file(&self) -> MentoraResult<PathBuf> {
        match &self.session_file {
            Some(path) => Ok(path.clone()),
            None => Ok(get_default_config_dir(APP_NAME)?.join("mentora_user.json")),
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> MentoraResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        MentoraError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> MentoraResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
