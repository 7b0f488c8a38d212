//! Configuration file and defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::document::DocumentOrder;

/// Directory name used under the platform config and data directories.
const APP_DIR: &str = "tls-print-helper";

/// Registered custom URL scheme
pub const DEFAULT_SCHEME: &str = "tls-printing";

/// Remote printing service
pub const DEFAULT_BASE_URL: &str = "http://10.85.72.36:3004";

/// Local port of the single-instance endpoint
pub const DEFAULT_LISTEN_PORT: u16 = 9848;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub scheme: String,
    pub base_url: String,
    /// Raw cookie string; the authentication cookie is picked out of it.
    pub session_cookie: Option<String>,
    pub spool_dir: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    /// Printer name, system default when absent.
    pub printer: Option<String>,
    pub document_order: DocumentOrder,
    pub release_guard_on_step_error: bool,
    pub listen_port: u16,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            session_cookie: None,
            spool_dir: None,
            audit_dir: None,
            printer: None,
            document_order: DocumentOrder::AsFetched,
            release_guard_on_step_error: false,
            listen_port: DEFAULT_LISTEN_PORT,
            request_timeout_secs: 30,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(|| data_dir().join("spool"))
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.audit_dir.clone().unwrap_or_else(data_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `<config_dir>/tls-print-helper/config.json`
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// Load configuration.
/// - An explicit `path` must exist.
/// - Without one, the default location is used and a missing file means defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_path(), false),
    };

    let cfg = match std::fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content)?,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let scheme = cfg.scheme.trim();
    if scheme.is_empty() || scheme.contains(':') || scheme.contains('/') {
        return Err(ConfigError::Invalid("scheme must be a bare protocol name"));
    }
    if !(cfg.base_url.starts_with("http://") || cfg.base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid("base_url must start with http:// or https://"));
    }
    if cfg.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("request_timeout_secs must be > 0"));
    }
    Ok(())
}
