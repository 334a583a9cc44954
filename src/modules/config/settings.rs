use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::modules::auth::flows::LoginPolicy;
use crate::modules::auth::hasher::{CredentialHasher, MAX_ROUNDS, MIN_ROUNDS};
use crate::modules::auth::password::validate_role;
use crate::modules::store::{CredentialStore, FileStore, SqliteStore, StoreError};

/// Settings file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "credstore.json";

/// Upper bound for the calibration target, in milliseconds.
pub const MAX_CALIBRATION_TARGET_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which backing holds the credential records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    File,
    Sqlite,
}

impl Backend {
    pub fn default_path(&self) -> &'static str {
        match self {
            Backend::File => "users.txt",
            Backend::Sqlite => "users.db",
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(ConfigError::Invalid(format!("unknown backend '{}'", other))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Runtime configuration. Everything the store and hasher need is passed
/// from here explicitly; nothing reads a process-wide default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub backend: Backend,
    /// Defaults to `users.txt` or `users.db` depending on the backend
    pub store_path: Option<PathBuf>,
    /// Fixed PBKDF2 cost. When absent the cost is calibrated at startup.
    pub hash_rounds: Option<u32>,
    pub calibration_target_ms: u64,
    pub default_role: String,
    pub unify_login_errors: bool,
    /// Log destination; stderr when absent
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            store_path: None,
            hash_rounds: None,
            calibration_target_ms: 100,
            default_role: "user".to_string(),
            unify_login_errors: false,
            log_file: Some(PathBuf::from("credstore.log")),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit path must exist; without one,
    /// `credstore.json` is read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rounds) = self.hash_rounds {
            if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
                return Err(ConfigError::Invalid(format!(
                    "hash_rounds must be between {} and {}",
                    MIN_ROUNDS, MAX_ROUNDS
                )));
            }
        }
        if !(1..=MAX_CALIBRATION_TARGET_MS).contains(&self.calibration_target_ms) {
            return Err(ConfigError::Invalid(format!(
                "calibration_target_ms must be between 1 and {}",
                MAX_CALIBRATION_TARGET_MS
            )));
        }
        validate_role(&self.default_role)
            .map_err(|e| ConfigError::Invalid(format!("default_role: {}", e)))?;
        if log::LevelFilter::from_str(&self.log_level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level '{}'",
                self.log_level
            )));
        }
        if matches!(&self.store_path, Some(p) if p.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid("store_path is empty".to_string()));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.backend.default_path()))
    }

    pub fn calibration_target(&self) -> Duration {
        Duration::from_millis(self.calibration_target_ms)
    }

    /// Build the hasher, measuring the cost on this machine when none is set
    pub fn hasher(&self) -> CredentialHasher {
        match self.hash_rounds {
            Some(rounds) => CredentialHasher::new(rounds),
            None => CredentialHasher::calibrated(self.calibration_target()),
        }
    }

    pub fn login_policy(&self) -> LoginPolicy {
        if self.unify_login_errors {
            LoginPolicy::Unified
        } else {
            LoginPolicy::Distinguish
        }
    }

    /// Open the configured backing store
    pub fn open_store(&self) -> Result<Box<dyn CredentialStore>, StoreError> {
        let path = self.store_path();
        let store: Box<dyn CredentialStore> = match self.backend {
            Backend::File => Box::new(FileStore::open(&path)?),
            Backend::Sqlite => Box::new(SqliteStore::open(&path)?),
        };
        Ok(store)
    }
}
