//! Configuration module
//!
//! This module handles application settings, credential resolution and
//! the per-session configuration collected from the user.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::{resolve_credential, ApiCredential, API_KEY_ENV};
pub use session::{ConfigurationForm, DatabaseMode, RemoteConnection, SessionConfiguration};

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::FileConfig;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemma2-9b-it";

/// Bundled database file name
pub const LOCAL_DB_FILE: &str = "student.db";

/// How long an opened database handle is reused (2 hours)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 2 * 60 * 60;

/// Reasoning steps allowed per question
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Application settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Model identifier sent to the provider
    pub model: String,
    /// Location of the bundled SQLite database
    pub local_db_path: PathBuf,
    /// Freshness window of cached database handles
    pub cache_ttl: Duration,
    /// Put remote connections in read-only transaction mode
    pub remote_read_only: bool,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Upper bound on agent steps per question
    pub max_iterations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            local_db_path: default_local_db_path(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            remote_read_only: true,
            log_level: "warn".to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Settings {
    /// Load settings from the config file and the process environment
    pub fn load() -> Result<Self> {
        let file = FileConfig::load()?;
        Ok(Self::from_sources(file, |name| std::env::var(name).ok()))
    }

    /// Merge file values over defaults, then environment overrides over both
    pub fn from_sources<F>(file: FileConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            model: env("SQL_CHAT_MODEL")
                .or(file.model)
                .unwrap_or(defaults.model),
            local_db_path: env("SQL_CHAT_LOCAL_DB")
                .map(PathBuf::from)
                .or(file.local_db_path)
                .unwrap_or(defaults.local_db_path),
            cache_ttl: file
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            remote_read_only: file.remote_read_only.unwrap_or(defaults.remote_read_only),
            log_level: env("SQL_CHAT_LOG")
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            max_iterations: file
                .max_iterations
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_iterations),
        }
    }
}

/// `student.db` next to the crate manifest
pub fn default_local_db_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(LOCAL_DB_FILE)
}
