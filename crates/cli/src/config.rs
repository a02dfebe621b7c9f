//! Runtime configuration: an optional TOML file, then environment overrides.
//!
//! The loaded [`Config`] is built once at startup and handed to whatever
//! needs it; nothing reads the environment after that.

use std::path::{Path, PathBuf};
use std::time::Duration;

use meshsync_engine::AclMode;
use meshsync_netmaker::ClientConfig;
use serde::Deserialize;
use thiserror::Error;

pub const SEARCH_PATHS: &[&str] = &["meshsync.toml", "/etc/meshsync/meshsync.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

fn invalid(key: &str, value: impl Into<String>, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub netmaker: NetmakerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetmakerConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for NetmakerConfig {
    fn default() -> Self {
        Self {
            url: "https://api.netmaker.example.com".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("meshsync.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub include_acls: bool,
    pub acl_mode: AclMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            include_acls: false,
            acl_mode: AclMode::Reconcile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Read `explicit`, or the first of [`SEARCH_PATHS`] that exists, apply
    /// the process environment and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match SEARCH_PATHS.iter().map(Path::new).find(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from environment variables, looked up through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("NETMAKER_API_URL") {
            self.netmaker.url = url;
        }
        if let Some(key) = lookup("NETMAKER_API_KEY") {
            self.netmaker.api_key = key;
        }
        if let Some(path) = lookup("DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(interval) = lookup("SYNC_INTERVAL") {
            self.sync.interval_secs = parse_interval(&interval)?;
        }
        if let Some(flag) = lookup("SYNC_INCLUDE_ACLS") {
            self.sync.include_acls = parse_bool("SYNC_INCLUDE_ACLS", &flag)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.netmaker.url.trim().is_empty() {
            return Err(invalid("netmaker.url", "", "must not be empty"));
        }
        if !self.netmaker.url.starts_with("http://") && !self.netmaker.url.starts_with("https://") {
            return Err(invalid("netmaker.url", &self.netmaker.url, "must be an http(s) URL"));
        }
        if self.netmaker.timeout_secs == 0 {
            return Err(invalid("netmaker.timeout_secs", "0", "must be positive"));
        }
        if self.sync.interval_secs == 0 {
            return Err(invalid("sync.interval_secs", "0", "must be positive"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging.level", "", "must not be empty"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.netmaker.url.clone(),
            api_key: self.netmaker.api_key.clone(),
            timeout: Duration::from_secs(self.netmaker.timeout_secs),
        }
    }
}

/// Whole seconds, or a duration such as `90s`, `5m` or `1h30m`.
pub fn parse_interval(raw: &str) -> Result<u64, ConfigError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(raw)
        .map(|interval| interval.as_secs())
        .map_err(|e| invalid("SYNC_INTERVAL", raw, &e.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw, "expected true or false")),
    }
}
