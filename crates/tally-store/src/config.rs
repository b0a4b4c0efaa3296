//! Configuration loading and typed config structures.
//!
//! Configuration is an optional YAML file; every field has a default, so an
//! empty file (or no file) is valid. Environment variables override the
//! file, and the command line overrides both.
//!
//! ```yaml
//! store:
//!   state_path: state.json
//!   backup_dir: backups/state
//!   default_version: "1.0"
//! logging:
//!   level: info
//!   json: false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tally_types::DEFAULT_VERSION;

/// Environment variable overriding [`StoreConfig::state_path`].
pub const ENV_STATE_PATH: &str = "TALLY_STATE_PATH";
/// Environment variable overriding [`StoreConfig::backup_dir`].
pub const ENV_BACKUP_DIR: &str = "TALLY_BACKUP_DIR";
/// Environment variable overriding [`LoggingConfig::level`].
pub const ENV_LOG_LEVEL: &str = "TALLY_LOG_LEVEL";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TallyConfig {
    /// State store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TallyConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// - `TALLY_STATE_PATH` overrides `store.state_path`
    /// - `TALLY_BACKUP_DIR` overrides `store.backup_dir`
    /// - `TALLY_LOG_LEVEL` overrides `logging.level`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ENV_STATE_PATH) {
            self.store.state_path = PathBuf::from(val);
        }
        if let Some(val) = lookup(ENV_BACKUP_DIR) {
            self.store.backup_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = val;
        }
    }
}

/// State store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON state file.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Backup directory; `<state dir>/backups/state` when unset.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Version written into fresh documents and into saves missing one.
    #[serde(default = "default_version")]
    pub default_version: String,
}

impl StoreConfig {
    /// Settings for a state file at `path`, everything else defaulted.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: path.into(),
            ..Self::default()
        }
    }

    /// The effective backup directory.
    pub fn resolved_backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(|| {
            state_dir(&self.state_path).join("backups").join("state")
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            backup_dir: None,
            default_version: default_version(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Directory containing the state file; `.` for a bare file name.
pub(crate) fn state_dir(state_path: &Path) -> PathBuf {
    match state_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_version() -> String {
    DEFAULT_VERSION.to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
