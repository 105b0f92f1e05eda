//! Database handle
//!
//! `SqlDatabase` wraps an opened pool and exposes the read-side operations
//! the agent toolkit needs: listing tables, describing them and running
//! queries.

use crate::config::{DatabaseMode, RemoteConnection};
use crate::database::connection::{DatabaseBackend, DatabasePool, QueryOutput};
use crate::error::{Result, SqlChatError};
use std::path::{Path, PathBuf};

/// Rows included per table in `table_info`
pub const SAMPLE_ROWS_IN_TABLE_INFO: usize = 3;

/// Options that shape how a handle is opened
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectOptions {
    /// Bundled SQLite file used in local mode
    pub local_db_path: PathBuf,
    /// Restrict remote connections to read-only transactions
    pub remote_read_only: bool,
}

impl ConnectOptions {
    pub fn new(local_db_path: impl Into<PathBuf>, remote_read_only: bool) -> Self {
        Self {
            local_db_path: local_db_path.into(),
            remote_read_only,
        }
    }
}

/// An opened database the agent can query
#[derive(Debug)]
pub struct SqlDatabase {
    /// Database connection pool
    pool: DatabasePool,
    /// Human-readable target, never containing a password
    description: String,
}

impl SqlDatabase {
    /// Open the database selected by `mode`
    ///
    /// Remote mode requires `remote` with all four fields filled in; the
    /// check happens before any connection attempt.
    pub async fn configure(
        mode: DatabaseMode,
        remote: Option<&RemoteConnection>,
        options: &ConnectOptions,
    ) -> Result<Self> {
        match mode {
            DatabaseMode::Local => Self::open_local(&options.local_db_path).await,
            DatabaseMode::Remote => {
                let remote = remote.ok_or_else(|| {
                    SqlChatError::MissingRemoteFields(vec!["host", "user", "password", "database"])
                })?;
                Self::open_remote(remote, options.remote_read_only).await
            }
        }
    }

    /// Open the local SQLite file read-only
    pub async fn open_local(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening local database read-only");
        let pool = DatabasePool::open_local(path).await?;
        pool.test_connection().await?;
        Ok(Self {
            pool,
            description: format!("sqlite://{} (read-only)", path.display()),
        })
    }

    /// Connect to a remote MySQL server
    pub async fn open_remote(remote: &RemoteConnection, read_only: bool) -> Result<Self> {
        tracing::info!(url = %remote.redacted_url(), read_only, "connecting to remote database");
        let pool = DatabasePool::open_remote(remote, read_only).await?;
        pool.test_connection().await?;
        let suffix = if read_only { " (read-only)" } else { "" };
        Ok(Self {
            pool,
            description: format!("{}{}", remote.redacted_url(), suffix),
        })
    }

    /// Get the database backend type
    pub fn backend(&self) -> DatabaseBackend {
        self.pool.backend()
    }

    /// SQL dialect name
    pub fn dialect(&self) -> &'static str {
        self.pool.backend().dialect()
    }

    /// Redacted description of the connection target
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Names of the user tables and views, sorted
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = match self.backend() {
            DatabaseBackend::SQLite => {
                "SELECT name FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name"
            }
            DatabaseBackend::MySQL => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() ORDER BY table_name"
            }
        };
        Ok(self.pool.fetch_all(sql).await?.first_column())
    }

    /// Schema and sample rows for the given tables
    ///
    /// Unknown table names are an error listing them.
    pub async fn table_info(&self, tables: &[String]) -> Result<String> {
        let known = self.list_tables().await?;
        let missing: Vec<&str> = tables
            .iter()
            .filter(|name| !known.iter().any(|k| k.eq_ignore_ascii_case(name)))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(SqlChatError::Tool {
                tool: "sql_db_schema".to_string(),
                message: format!("table_names {{{}}} not found in database", missing.join(", ")),
            });
        }

        let mut sections = Vec::with_capacity(tables.len());
        for name in tables {
            let canonical = known
                .iter()
                .find(|k| k.eq_ignore_ascii_case(name))
                .cloned()
                .unwrap_or_else(|| name.clone());
            sections.push(self.describe_table(&canonical).await?);
        }
        Ok(sections.join("\n\n"))
    }

    async fn describe_table(&self, table: &str) -> Result<String> {
        let backend = self.backend();
        let quoted = backend.quote_identifier(table);

        let ddl = match backend {
            DatabaseBackend::SQLite => {
                let sql = format!(
                    "SELECT sql FROM sqlite_master WHERE name = '{}'",
                    table.replace('\'', "''")
                );
                self.pool.fetch_all(&sql).await?.first_column().join("\n")
            }
            DatabaseBackend::MySQL => {
                let output = self
                    .pool
                    .fetch_all(&format!("SHOW CREATE TABLE {}", quoted))
                    .await?;
                output
                    .rows
                    .first()
                    .and_then(|row| row.get(1).cloned())
                    .unwrap_or_default()
            }
        };

        let sample = self
            .pool
            .fetch_all(&format!(
                "SELECT * FROM {} LIMIT {}",
                quoted, SAMPLE_ROWS_IN_TABLE_INFO
            ))
            .await?;

        Ok(format!(
            "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
            ddl.trim(),
            SAMPLE_ROWS_IN_TABLE_INFO,
            table,
            sample.to_tsv()
        ))
    }

    /// Run a statement and return its rows
    pub async fn run(&self, sql: &str) -> Result<QueryOutput> {
        tracing::debug!(sql, "running query");
        self.pool.fetch_all(sql).await
    }

    /// Run a statement, rendering either the rows or the error as text
    pub async fn run_no_throw(&self, sql: &str) -> String {
        match self.run(sql).await {
            Ok(output) => output.to_table_string(),
            Err(e) => {
                tracing::debug!(error = %e, "query failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
