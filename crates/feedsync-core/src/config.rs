//! SyncConfig - 設定の読み込み
//!
//! 優先順位: 環境変数 > TOML ファイル > デフォルト値

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::retry::RetryPolicy;

pub const ENV_API_BASE_URL: &str = "FEEDSYNC_API_BASE_URL";
pub const ENV_DB_PATH: &str = "FEEDSYNC_DB_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_jitter_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_jitter_ms),
        )
    }
}

/// Settings for the background sync loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How many times a failed sync (store unreadable) is rescheduled.
    pub platform_max_retries: u32,
    pub platform_base_delay_ms: u64,
    /// Connectivity probe interval for `feedsync run`.
    pub probe_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            platform_max_retries: 5,
            platform_base_delay_ms: 30_000,
            probe_interval_ms: 15_000,
        }
    }
}

impl WorkerConfig {
    pub fn platform_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.platform_base_delay_ms);
        RetryPolicy::new(self.platform_max_retries, base, base / 2)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api_base_url: String,
    /// `None` means the per-user data directory.
    pub db_path: Option<PathBuf>,
    pub request_timeout_ms: u64,
    /// `false` models a host without a deferred-sync facility.
    pub background_sync: bool,
    pub retry: RetryConfig,
    pub worker: WorkerConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            db_path: None,
            request_timeout_ms: 10_000,
            background_sync: true,
            retry: RetryConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// File (if given) + process environment, validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.db_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| ConfigError::Invalid(format!("api_base_url {:?}: {e}", self.api_base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be > 0".into()));
        }
        if self.worker.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid("worker.probe_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Explicit `db_path`, else `<data dir>/feedsync/offline-actions-db.sqlite`.
    pub fn resolved_db_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| ConfigError::Invalid("no data directory; set db_path".into()))?;
        Ok(base.join("feedsync").join("offline-actions-db.sqlite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert!(config.background_sync);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            api_base_url = "https://feedback.example.com"

            [retry]
            max_retries = 5
        "#;
        let config = SyncConfig::from_toml_str(raw, Path::new("feedsync.toml")).unwrap();

        assert_eq!(config.api_base_url, "https://feedback.example.com");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.worker, WorkerConfig::default());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = SyncConfig::from_toml_str("retry = 3", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_ms = 2500\nbackground_sync = false").unwrap();

        let config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert!(!config.background_sync);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = SyncConfig::default();
        config.apply_env_with(|key| match key {
            ENV_API_BASE_URL => Some("https://api.example.com".into()),
            ENV_DB_PATH => Some("/tmp/q.sqlite".into()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.resolved_db_path().unwrap(), PathBuf::from("/tmp/q.sqlite"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = SyncConfig::default();
        config.apply_env_with(|_| Some(String::new()));
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = SyncConfig {
            api_base_url: "ftp://example.com".into(),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        config.api_base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.api_base_url = "http://localhost".into();
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn platform_policy_uses_worker_settings() {
        let worker = WorkerConfig {
            platform_max_retries: 2,
            platform_base_delay_ms: 100,
            probe_interval_ms: 1,
        };
        let policy = worker.platform_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_jitter, Duration::from_millis(50));
    }
}
