//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::Region;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// One clan entry.
///
/// Credential material may be given inline (`token`) or as the name of
/// an environment variable to read at startup (`token_env`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClanConfig {
    /// External-service clan id
    pub id: i64,

    /// Clan tag, unique case-insensitively
    pub tag: String,

    /// Display name
    pub name: String,

    /// Home region of the clan
    pub region: Region,

    /// Branding color as a hex string
    #[serde(default = "default_color")]
    pub color: String,

    /// Inline API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

fn default_color() -> String {
    "#1e90ff".to_string()
}

/// Remote ranking-service client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the ranking service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Page size for paginated endpoints
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Minimum delay between requests per clan credential
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://clanladder.example.com/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_rate_limit() -> u64 {
    500
}

fn default_user_agent() -> String {
    "clan-sync/0.1.0".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
            rate_limit_ms: default_rate_limit(),
            user_agent: default_user_agent(),
        }
    }
}

/// Sync run tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum clans synchronized concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier per attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Re-upsert an unchanged player after this many hours
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: u64,
}

fn default_max_concurrency() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    250
}

fn default_max_backoff() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_staleness_hours() -> u64 {
    24
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            staleness_hours: default_staleness_hours(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSONL store files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tag of the clan used when none is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_clan: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub clans: Vec<ClanConfig>,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_clan: None,
            log_level: default_log_level(),
            clans: Vec::new(),
            api: ApiConfig::default(),
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clans.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one clan must be configured".to_string(),
            ));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "API timeout must be greater than 0".to_string(),
            ));
        }

        if self.api.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "API page size must be greater than 0".to_string(),
            ));
        }

        if self.sync.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "sync concurrency must be at least 1".to_string(),
            ));
        }

        if self.sync.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        if let Some(default) = &self.default_clan {
            let known = self
                .clans
                .iter()
                .any(|c| c.tag.eq_ignore_ascii_case(default));
            if !known {
                return Err(ConfigError::ValidationError(format!(
                    "default clan '{}' is not in the clan list",
                    default
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clan(tag: &str) -> ClanConfig {
        ClanConfig {
            id: 776,
            tag: tag.to_string(),
            name: "Test Clan".to_string(),
            region: Region::Eu,
            color: default_color(),
            token: Some("secret".to_string()),
            token_env: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.api.rate_limit_ms, 500);
        assert_eq!(config.sync.max_concurrency, 1);
        assert_eq!(config.sync.staleness_hours, 24);
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_validation_requires_clans() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_ok_with_clan() {
        let config = AppConfig {
            clans: vec![clan("PN31")],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bad_timeout() {
        let mut config = AppConfig {
            clans: vec![clan("PN31")],
            ..Default::default()
        };
        config.api.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_concurrency() {
        let mut config = AppConfig {
            clans: vec![clan("PN31")],
            ..Default::default()
        };
        config.sync.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_default_clan_must_exist() {
        let config = AppConfig {
            default_clan: Some("ZZ99".to_string()),
            clans: vec![clan("PN31")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_default_clan_case_insensitive() {
        let config = AppConfig {
            default_clan: Some("pn31".to_string()),
            clans: vec![clan("PN31")],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_from_toml() {
        let toml_str = r#"
            default_clan = "PN31"

            [[clans]]
            id = 776
            tag = "PN31"
            name = "Pristine Navy"
            region = "eu"
            token = "t-776"

            [api]
            page_size = 50

            [sync]
            max_concurrency = 2
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();

        assert_eq!(config.clans.len(), 1);
        assert_eq!(config.clans[0].region, Region::Eu);
        assert_eq!(config.api.page_size, 50);
        assert_eq!(config.sync.max_concurrency, 2);
        // Unspecified fields fall back to defaults
        assert_eq!(config.api.rate_limit_ms, 500);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig {
            clans: vec![clan("PN31")],
            ..Default::default()
        };
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.clans[0].tag, parsed.clans[0].tag);
        assert_eq!(config.storage.data_dir, parsed.storage.data_dir);
    }
}
