//! Configuration management for Linkcast

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::platforms::Platform;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// OAuth clients keyed by platform name (`[providers.twitter]`)
    #[serde(default)]
    pub providers: HashMap<String, ProviderCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Pause between consecutive dispatches of a bulk post
    #[serde(default = "default_bulk_delay_ms")]
    pub bulk_delay_ms: u64,
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            bulk_delay_ms: default_bulk_delay_ms(),
            on_duplicate: DuplicatePolicy::default(),
        }
    }
}

impl DispatchConfig {
    pub fn bulk_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_delay_ms)
    }
}

/// What `connect_account` does when the user already has an active
/// account on the same platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with `AlreadyConnected` before contacting the provider
    #[default]
    Reject,
    /// Disconnect the existing account, then connect the new one
    Replace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between queue polls in the daemon
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// OAuth client registered with one platform
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Replaces the platform's API base URL (e.g. a gateway or sandbox)
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
}

fn default_bulk_delay_ms() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("linkcast/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration, falling back to defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Ok(Self::default_config())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/linkcast/linkcast.db".to_string(),
            },
            dispatch: DispatchConfig::default(),
            scheduling: SchedulingConfig::default(),
            http: HttpConfig::default(),
            providers: HashMap::new(),
        }
    }

    /// OAuth client for a platform, if one is configured
    pub fn provider(&self, platform: Platform) -> Option<&ProviderCredentials> {
        self.providers.get(platform.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        for (key, credentials) in &self.providers {
            key.parse::<Platform>()?;
            if credentials.client_id.trim().is_empty() {
                return Err(
                    ConfigError::MissingField(format!("providers.{}.client_id", key)).into(),
                );
            }
        }
        Ok(())
    }
}

/// Resolve the configuration file path (`$LINKCAST_CONFIG`, then the XDG config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("LINKCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("linkcast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AccountError, LinkcastError};
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "/tmp/linkcast.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/tmp/linkcast.db");
        assert_eq!(config.dispatch.bulk_delay_ms, 2000);
        assert_eq!(config.dispatch.bulk_delay(), Duration::from_secs(2));
        assert_eq!(config.dispatch.on_duplicate, DuplicatePolicy::Reject);
        assert_eq!(config.scheduling.poll_interval, 60);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "~/linkcast.db"

            [dispatch]
            bulk_delay_ms = 0
            on_duplicate = "replace"

            [scheduling]
            poll_interval = 5

            [providers.twitter]
            client_id = "abc"
            client_secret = "shh"
            api_base_url = "http://localhost:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.on_duplicate, DuplicatePolicy::Replace);
        assert_eq!(config.scheduling.poll_interval, 5);

        let twitter = config.provider(Platform::Twitter).unwrap();
        assert_eq!(twitter.client_id, "abc");
        assert_eq!(twitter.client_secret.expose_secret(), "shh");
        assert_eq!(twitter.api_base_url.as_deref(), Some("http://localhost:9000"));
        assert!(config.provider(Platform::Instagram).is_none());
    }

    #[test]
    fn test_client_secret_is_redacted_in_debug() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "/tmp/x.db"
            [providers.linkedin]
            client_id = "id"
            client_secret = "very-secret-value"
            "#,
        )
        .unwrap();

        assert!(!format!("{:?}", config).contains("very-secret-value"));
    }

    #[test]
    fn test_unknown_provider_key_is_rejected() {
        let result = Config::from_toml(
            r#"
            [database]
            path = "/tmp/x.db"
            [providers.myspace]
            client_id = "id"
            client_secret = "secret"
            "#,
        );

        assert!(matches!(
            result,
            Err(LinkcastError::Account(AccountError::UnsupportedPlatform(_)))
        ));
    }

    #[test]
    fn test_empty_database_path_is_rejected() {
        let result = Config::from_toml(
            r#"
            [database]
            path = ""
            "#,
        );
        assert!(matches!(
            result,
            Err(LinkcastError::Config(ConfigError::MissingField(_)))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("[database");
        assert!(matches!(
            result,
            Err(LinkcastError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[database]\npath = \"/tmp/env.db\"\n").unwrap();

        std::env::set_var("LINKCAST_CONFIG", &path);
        let resolved = resolve_config_path().unwrap();
        let config = Config::load().unwrap();
        std::env::remove_var("LINKCAST_CONFIG");

        assert_eq!(resolved, path);
        assert_eq!(config.database.path, "/tmp/env.db");
    }

    #[test]
    #[serial]
    fn test_load_or_default_without_file() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("LINKCAST_CONFIG", temp_dir.path().join("missing.toml"));
        let config = Config::load_or_default().unwrap();
        let strict = Config::load();
        std::env::remove_var("LINKCAST_CONFIG");

        assert!(config.database.path.ends_with("linkcast.db"));
        assert!(matches!(
            strict,
            Err(LinkcastError::Config(ConfigError::ReadError(_)))
        ));
    }
}
