//! Client configuration.
//!
//! Loaded from YAML files and environment variables, same layering as the
//! other services on the platform use.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "badge.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "BADGE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "BADGE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "BADGE_LOG";

/// Address the badge service listens on.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/.badge.service";
/// Reply deadline for a single request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1000;
/// Poll period of the readiness watcher.
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 500;
/// Broadcast re-registration attempts after the service appears.
pub const DEFAULT_REGISTER_ATTEMPTS: usize = 3;

/// Badge client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    /// Unix socket of the badge service.
    pub socket_path: PathBuf,
    /// Reply deadline for every request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Readiness poll period, in milliseconds.
    pub watch_interval_ms: u64,
    /// Fixed caller identity. Resolved from the process when unset.
    pub caller: Option<String>,
    /// How many times to retry the broadcast registration after the
    /// service appears.
    pub register_attempts: usize,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            watch_interval_ms: DEFAULT_WATCH_INTERVAL_MS,
            caller: None,
            register_attempts: DEFAULT_REGISTER_ATTEMPTS,
        }
    }
}

impl BadgeConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `badge.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing: short deadlines, fixed caller.
    pub fn for_test() -> Self {
        Self {
            request_timeout_ms: 100,
            watch_interval_ms: 10,
            caller: Some("org.example.test".to_string()),
            register_attempts: 1,
            ..Self::default()
        }
    }

    /// Reply deadline as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Watcher poll period as a `Duration`.
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = BadgeConfig::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/.badge.service"));
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert!(config.caller.is_none());
    }

    #[test]
    fn test_config_for_test() {
        let config = BadgeConfig::for_test();
        assert_eq!(config.request_timeout(), Duration::from_millis(100));
        assert_eq!(config.caller.as_deref(), Some("org.example.test"));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "socket_path: /run/badge.sock").unwrap();
        writeln!(file, "request_timeout_ms: 250").unwrap();

        let config = BadgeConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/badge.sock"));
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.watch_interval_ms, DEFAULT_WATCH_INTERVAL_MS);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(&path, "request_timeout_ms: 250\n").unwrap();

        std::env::set_var("BADGE__REQUEST_TIMEOUT_MS", "750");
        let config = BadgeConfig::load(Some(path.to_str().unwrap()));
        std::env::remove_var("BADGE__REQUEST_TIMEOUT_MS");

        assert_eq!(config.unwrap().request_timeout_ms, 750);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_fails() {
        let result = BadgeConfig::load(Some("/nonexistent/badge-client.yaml"));
        assert!(result.is_err());
    }
}
