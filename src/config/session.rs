//! Session configuration
//!
//! The configuration form collected at startup and the validated,
//! immutable `SessionConfiguration` built from it.

use crate::config::credentials::{resolve_credential_with, ApiCredential};
use crate::error::{Result, SqlChatError};
use std::fmt;
use std::str::FromStr;

/// Which database the session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DatabaseMode {
    /// Bundled SQLite file, opened read-only
    #[default]
    Local,
    /// User-supplied MySQL server
    Remote,
}

impl DatabaseMode {
    /// All modes, in the order the selector shows them
    pub const ALL: [DatabaseMode; 2] = [DatabaseMode::Local, DatabaseMode::Remote];

    /// Label shown in the mode selector
    pub fn label(&self) -> &'static str {
        match self {
            DatabaseMode::Local => "Use SQLite3 Database - student.db",
            DatabaseMode::Remote => "Connect to your MySQL Database",
        }
    }
}

impl FromStr for DatabaseMode {
    type Err = SqlChatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "sqlite" | "sqlite3" | "1" => Ok(DatabaseMode::Local),
            "remote" | "mysql" | "2" => Ok(DatabaseMode::Remote),
            other => Err(SqlChatError::Config(format!(
                "Unknown database mode '{}', expected local or remote",
                other
            ))),
        }
    }
}

impl fmt::Display for DatabaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseMode::Local => f.write_str("local"),
            DatabaseMode::Remote => f.write_str("remote"),
        }
    }
}

/// Connection details for a remote MySQL server
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct RemoteConnection {
    /// Host, optionally with a `:port` suffix
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl RemoteConnection {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// Names of the fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("host", &self.host),
            ("user", &self.user),
            ("password", &self.password),
            ("database", &self.database),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Fail unless all four fields are present
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SqlChatError::MissingRemoteFields(missing))
        }
    }

    /// `mysql://<user>:<password>@<host>/<database>`
    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}/{}",
            self.user, self.password, self.host, self.database
        )
    }

    /// Connection URL with the password masked, safe for logs
    pub fn redacted_url(&self) -> String {
        format!("mysql://{}:***@{}/{}", self.user, self.host, self.database)
    }

    /// Split `host[:port]`; a non-numeric suffix is treated as part of the host
    pub fn host_and_port(&self) -> (&str, Option<u16>) {
        match self.host.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (self.host.as_str(), None),
            },
            None => (self.host.as_str(), None),
        }
    }
}

impl fmt::Debug for RemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnection")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// Raw values collected from the configuration prompts
#[derive(Debug, Clone, Default)]
pub struct ConfigurationForm {
    pub mode: DatabaseMode,
    pub remote: RemoteConnection,
    /// Key typed at the prompt; empty or `None` falls back to the environment
    pub api_key: Option<String>,
}

impl ConfigurationForm {
    /// Form for the bundled local database
    pub fn local(api_key: Option<String>) -> Self {
        Self {
            mode: DatabaseMode::Local,
            remote: RemoteConnection::default(),
            api_key,
        }
    }

    /// Form for a remote server
    pub fn remote(remote: RemoteConnection, api_key: Option<String>) -> Self {
        Self {
            mode: DatabaseMode::Remote,
            remote,
            api_key,
        }
    }

    /// Validate the form against the process environment
    pub fn resolve(self) -> Result<SessionConfiguration> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Validate the form; the credential is checked first, then the remote fields
    pub fn resolve_with<F>(self, lookup: F) -> Result<SessionConfiguration>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = resolve_credential_with(self.api_key.as_deref(), lookup)?;

        let remote = match self.mode {
            DatabaseMode::Local => None,
            DatabaseMode::Remote => {
                self.remote.validate()?;
                Some(self.remote)
            }
        };

        Ok(SessionConfiguration {
            mode: self.mode,
            remote,
            credential,
        })
    }
}

/// Validated configuration for one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfiguration {
    mode: DatabaseMode,
    remote: Option<RemoteConnection>,
    credential: ApiCredential,
}

impl SessionConfiguration {
    pub fn mode(&self) -> DatabaseMode {
        self.mode
    }

    /// Remote connection details; `Some` exactly when the mode is remote
    pub fn remote(&self) -> Option<&RemoteConnection> {
        self.remote.as_ref()
    }

    pub fn credential(&self) -> &ApiCredential {
        &self.credential
    }
}
