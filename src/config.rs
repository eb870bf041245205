// Configuration module: the command-line settings of the runner and the
// JSON secrets file that carries tokens and IDs from one probe to the next.

use crate::probes::Probe;
use clap::Parser;
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Root of the API under test, including the version prefix.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/v1";

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const USER_ID: &str = "user_id";
pub const TARGET_USER_ID: &str = "target_user_id";

/// Runner settings. Every flag falls back to an environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "api-probe", version)]
#[command(about = "Send one request at a time to the auth/users REST API")]
pub struct Settings {
    /// Base URL of the API, including the `/v1` prefix.
    #[arg(long, env = "API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// JSON file holding tokens and IDs between runs.
    #[arg(long, env = "API_PROBE_SECRETS", default_value = "secrets.json")]
    pub secrets: PathBuf,

    /// Directory receiving one `<probe>.json` response file per run.
    #[arg(long, env = "API_PROBE_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "API_PROBE_LOG", default_value = "warn")]
    pub log_level: String,

    /// Do not print response headers.
    #[arg(short, long)]
    pub quiet: bool,

    /// Probe to run. Without one an interactive menu is shown.
    #[command(subcommand)]
    pub probe: Option<Probe>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} does not hold a JSON object", .0.display())]
    NotAnObject(PathBuf),
}

/// Flat string-to-string store persisted as a JSON object.
///
/// There is no locking: probes are meant to be run one after another, and
/// the last write of a key wins.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries currently on disk. A missing file is an empty store.
    pub fn entries(&self) -> Result<Map<String, Value>, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ConfigError::NotAnObject(self.path.clone())),
            Err(source) => Err(ConfigError::Json {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Value stored under `key`, or `None` when the key or the file is absent.
    pub fn load_config(&self, key: &str) -> Option<String> {
        let mut entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable secrets file");
                return None;
            }
        };

        match entries.remove(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Set `key` and write the whole object back, keeping the other keys.
    pub fn save_config(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut entries = match self.entries() {
            Ok(entries) => entries,
            Err(e @ ConfigError::Io { .. }) => return Err(e),
            Err(e) => {
                warn!(error = %e, "starting a fresh secrets file");
                Map::new()
            }
        };
        entries.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut text = serde_json::to_string_pretty(&Value::Object(entries)).map_err(|source| {
            ConfigError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        text.push('\n');
        std::fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(key, path = %self.path.display(), "saved config value");
        Ok(())
    }
}
