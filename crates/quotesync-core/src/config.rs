//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/quotesync/config.toml)
//! 3. Environment variables (QUOTESYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sync::{ConflictMode, RemoteMapping};

/// Environment variable prefix
const ENV_PREFIX: &str = "QUOTESYNC";

/// Remote used when none is configured
pub const DEFAULT_SERVER_URL: &str = "https://jsonplaceholder.typicode.com/posts";

/// Default period between sync cycles
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30_000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (quote list, preferences, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Remote quote collection URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Whether remote sync is enabled
    #[serde(default)]
    pub sync_enabled: bool,

    /// Milliseconds between periodic sync cycles
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Per-request timeout for fetch and push
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How category conflicts are settled during merge
    #[serde(default)]
    pub conflict_policy: ConflictMode,

    /// Shape of the remote payload
    #[serde(default)]
    pub remote_mapping: RemoteMapping,

    /// Characters of a post body used as category (`posts` mapping)
    #[serde(default = "default_category_prefix_len")]
    pub category_prefix_len: usize,

    /// Log file path (defaults to {data_dir}/quotesync.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server_url: default_server_url(),
            sync_enabled: false,
            sync_interval_ms: default_sync_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            conflict_policy: ConflictMode::default(),
            remote_mapping: RemoteMapping::default(),
            category_prefix_len: default_category_prefix_len(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (QUOTESYNC_DATA_DIR, QUOTESYNC_SERVER_URL, ...)
    /// 2. Config file (~/.config/quotesync/config.toml or QUOTESYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_INTERVAL_MS", ENV_PREFIX)) {
            match val.parse() {
                Ok(ms) => self.sync_interval_ms = ms,
                Err(_) => warn!("Ignoring invalid {}_SYNC_INTERVAL_MS: {}", ENV_PREFIX, val),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_CONFLICT_POLICY", ENV_PREFIX)) {
            match val.parse() {
                Ok(mode) => self.conflict_policy = mode,
                Err(e) => warn!("Ignoring {}_CONFLICT_POLICY: {}", ENV_PREFIX, e),
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with QUOTESYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quotesync")
            .join("config.toml")
    }

    /// Directory of the durable key-value store
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Directory of the session-scoped store
    ///
    /// One per terminal session, under the runtime dir (or the temp dir),
    /// so state there is gone after logout or reboot. The session is
    /// identified by QUOTESYNC_SESSION, then TERM_SESSION_ID, then the
    /// parent (shell) process id.
    pub fn session_dir(&self) -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("quotesync")
            .join(session_key())
    }

    /// Effective log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("quotesync.log"))
    }

    /// Period between sync cycles
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(1))
    }

    /// Timeout applied to each remote request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn session_key() -> String {
    let raw = std::env::var(format!("{}_SESSION", ENV_PREFIX))
        .or_else(|_| std::env::var("TERM_SESSION_ID"))
        .unwrap_or_else(|_| parent_session());

    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if key.is_empty() {
        "default".to_string()
    } else {
        key
    }
}

#[cfg(unix)]
fn parent_session() -> String {
    format!("ppid-{}", std::os::unix::process::parent_id())
}

#[cfg(not(unix))]
fn parent_session() -> String {
    "default".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quotesync")
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_sync_interval_ms() -> u64 {
    DEFAULT_SYNC_INTERVAL_MS
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_category_prefix_len() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "QUOTESYNC_DATA_DIR",
        "QUOTESYNC_SERVER_URL",
        "QUOTESYNC_SYNC_ENABLED",
        "QUOTESYNC_SYNC_INTERVAL_MS",
        "QUOTESYNC_CONFLICT_POLICY",
        "QUOTESYNC_SESSION",
        "TERM_SESSION_ID",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.sync_enabled);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.sync_interval_ms, 30_000);
        assert_eq!(config.category_prefix_len, 20);
        assert_eq!(config.conflict_policy, ConflictMode::ServerWins);
        assert_eq!(config.remote_mapping, RemoteMapping::Posts);
        assert!(config.data_dir.ends_with("quotesync"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.store_dir().ends_with("store"));
        assert!(config.log_path().ends_with("quotesync.log"));
    }

    #[test]
    fn test_session_dir_per_terminal() {
        let _guard = EnvGuard::new(ENV_VARS);
        let config = Config::default();

        env::set_var("TERM_SESSION_ID", "w0t1p0:ABC");
        assert!(config.session_dir().ends_with("quotesync/w0t1p0ABC"));

        // Explicit session wins; path separators are stripped
        env::set_var("QUOTESYNC_SESSION", "abc/../x");
        assert!(config.session_dir().ends_with("quotesync/abcx"));

        env::set_var("QUOTESYNC_SESSION", "///");
        assert!(config.session_dir().ends_with("quotesync/default"));
    }

    #[test]
    fn test_durations_never_zero() {
        let config = Config {
            sync_interval_ms: 0,
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.sync_interval(), Duration::from_millis(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("QUOTESYNC_DATA_DIR", "/tmp/quotesync-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/quotesync-test"));
    }

    #[test]
    fn test_env_override_sync_enabled() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("QUOTESYNC_SYNC_ENABLED", "true");
        config.apply_env_overrides();
        assert!(config.sync_enabled);

        env::set_var("QUOTESYNC_SYNC_ENABLED", "false");
        config.apply_env_overrides();
        assert!(!config.sync_enabled);
    }

    #[test]
    fn test_env_override_interval_and_policy() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("QUOTESYNC_SYNC_INTERVAL_MS", "5000");
        env::set_var("QUOTESYNC_CONFLICT_POLICY", "prompt");
        config.apply_env_overrides();
        assert_eq!(config.sync_interval_ms, 5000);
        assert_eq!(config.conflict_policy, ConflictMode::Prompt);

        // Invalid values are ignored
        env::set_var("QUOTESYNC_SYNC_INTERVAL_MS", "soon");
        env::set_var("QUOTESYNC_CONFLICT_POLICY", "coin-flip");
        config.apply_env_overrides();
        assert_eq!(config.sync_interval_ms, 5000);
        assert_eq!(config.conflict_policy, ConflictMode::Prompt);
    }

    #[test]
    fn test_env_override_server_url_ignores_empty() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("QUOTESYNC_SERVER_URL", "http://localhost:8080/quotes");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "http://localhost:8080/quotes");

        env::set_var("QUOTESYNC_SERVER_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "http://localhost:8080/quotes");
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/quotesync"),
            sync_enabled: true,
            conflict_policy: ConflictMode::Prompt,
            remote_mapping: RemoteMapping::Quotes,
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("conflict_policy = \"prompt\""));
        assert!(toml_str.contains("remote_mapping = \"quotes\""));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.sync_enabled, config.sync_enabled);
        assert_eq!(parsed.conflict_policy, ConflictMode::Prompt);
        assert_eq!(parsed.remote_mapping, RemoteMapping::Quotes);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            server_url = "http://example.com/quotes"
            sync_enabled = true
            conflict_policy = "server-wins"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.server_url, "http://example.com/quotes");
        assert!(config.sync_enabled);
        assert_eq!(config.sync_interval_ms, DEFAULT_SYNC_INTERVAL_MS);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("QUOTESYNC_DATA_DIR", temp_dir.path().join("data"));

        let path = temp_dir.path().join("missing.toml");
        let config = Config::load_from_path(&path).unwrap();

        assert!(!config.sync_enabled);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            sync_interval_ms: 1234,
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.sync_interval_ms, 1234);
        assert_eq!(loaded.data_dir, temp_dir.path().join("data"));
    }
}
