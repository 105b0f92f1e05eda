//! Configuration Storage
//!
//! This module reads the optional settings file from the platform
//! configuration directory. The file is only ever read; the application
//! persists nothing between sessions.

use crate::error::{Result, SqlChatError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Application directory under the platform config dir
const APP_DIR: &str = "sql-chat";

/// Settings as they appear on disk; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Model identifier passed to the provider
    pub model: Option<String>,
    /// Path of the bundled local database
    pub local_db_path: Option<PathBuf>,
    /// How long an opened database handle is reused, in seconds
    pub cache_ttl_secs: Option<u64>,
    /// Open remote sessions in read-only transaction mode
    pub remote_read_only: Option<bool>,
    /// Default tracing filter
    pub log_level: Option<String>,
    /// Upper bound on agent reasoning steps per question
    pub max_iterations: Option<usize>,
}

impl FileConfig {
    /// Get the configuration file path, if the platform has a config dir
    pub fn config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the configuration file, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        match Self::config_file() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and parse a specific file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| {
            SqlChatError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Parse TOML content
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
