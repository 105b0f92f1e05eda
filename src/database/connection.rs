//! Database connection abstraction
//!
//! This module provides the backend enum and the pool wrapper for the two
//! supported engines: the bundled SQLite file and a MySQL server.

use crate::config::RemoteConnection;
use crate::database::statement;
use crate::error::{Result, SqlChatError};
use comfy_table::{presets::ASCII_MARKDOWN, Table};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column, ColumnIndex, Decode, Executor, Row, TypeInfo, ValueRef};
use std::path::Path;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// SQLite
    SQLite,
    /// MySQL/MariaDB
    MySQL,
}

impl DatabaseBackend {
    /// Get the name of this database backend
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseBackend::SQLite => "SQLite",
            DatabaseBackend::MySQL => "MySQL",
        }
    }

    /// Dialect name given to the agent prompt
    pub fn dialect(&self) -> &'static str {
        match self {
            DatabaseBackend::SQLite => "sqlite",
            DatabaseBackend::MySQL => "mysql",
        }
    }

    /// Quote an identifier for this dialect
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            DatabaseBackend::SQLite => format!("\"{}\"", ident.replace('"', "\"\"")),
            DatabaseBackend::MySQL => format!("`{}`", ident.replace('`', "``")),
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rows returned by a statement, rendered to text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Column names (empty when no row came back)
    pub columns: Vec<String>,
    /// Cell values; NULL is rendered as `NULL`
    pub rows: Vec<Vec<String>>,
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the first column
    pub fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first().cloned())
            .collect()
    }

    /// Render as a markdown-style text table
    pub fn to_table_string(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }
        let mut table = Table::new();
        table.load_preset(ASCII_MARKDOWN);
        table.set_header(self.columns.clone());
        for row in &self.rows {
            table.add_row(row.clone());
        }
        table.to_string()
    }

    /// Tab-separated rendering used in table samples
    pub fn to_tsv(&self) -> String {
        let mut lines = vec![self.columns.join("\t")];
        lines.extend(self.rows.iter().map(|row| row.join("\t")));
        lines.join("\n")
    }
}

/// Database connection pool wrapper
///
/// This enum holds the actual database pool for the connected backend.
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// SQLite pool
    Sqlite(SqlitePool),
    /// MySQL pool; `read_only` wraps every query in a read-only transaction
    MySql { pool: MySqlPool, read_only: bool },
}

impl DatabasePool {
    /// Get the database backend for this pool
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            DatabasePool::Sqlite(_) => DatabaseBackend::SQLite,
            DatabasePool::MySql { .. } => DatabaseBackend::MySQL,
        }
    }

    /// Open a SQLite file strictly read-only; the file is never created
    pub async fn open_local(path: &Path) -> Result<Self> {
        let target = path.display().to_string();
        if !path.exists() {
            return Err(SqlChatError::db_connection(
                target,
                sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "database file does not exist",
                )),
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| SqlChatError::db_connection(target, e))?;
        Ok(DatabasePool::Sqlite(pool))
    }

    /// Connect to a MySQL server
    ///
    /// With `read_only`, every pooled connection is switched to read-only
    /// transaction mode on connect, and each query later runs inside its own
    /// `START TRANSACTION READ ONLY` that is rolled back afterwards.
    pub async fn open_remote(remote: &RemoteConnection, read_only: bool) -> Result<Self> {
        remote.validate()?;

        let (host, port) = remote.host_and_port();
        let mut options = MySqlConnectOptions::new()
            .host(host)
            .username(&remote.user)
            .password(&remote.password)
            .database(&remote.database);
        if let Some(port) = port {
            options = options.port(port);
        }

        let mut pool_options = MySqlPoolOptions::new();
        if read_only {
            pool_options = pool_options.after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                    Ok(())
                })
            });
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| SqlChatError::db_connection(remote.redacted_url(), e))?;
        Ok(DatabasePool::MySql { pool, read_only })
    }

    /// Test the connection
    pub async fn test_connection(&self) -> Result<()> {
        self.fetch_all("SELECT 1").await.map(|_| ())
    }

    /// Run a single statement and collect every row as text
    ///
    /// Input holding more than one statement is refused before anything
    /// runs. On a read-only MySQL pool only read queries are accepted.
    pub async fn fetch_all(&self, sql: &str) -> Result<QueryOutput> {
        let backend = self.backend();
        statement::ensure_single_statement(sql, backend)?;

        match self {
            DatabasePool::Sqlite(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                Ok(render_rows(&rows))
            }
            DatabasePool::MySql {
                pool,
                read_only: false,
            } => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                Ok(render_rows(&rows))
            }
            DatabasePool::MySql {
                pool,
                read_only: true,
            } => {
                statement::ensure_read_query(sql, backend)?;

                let mut conn = pool.acquire().await?;
                conn.execute(sqlx::raw_sql("START TRANSACTION READ ONLY"))
                    .await?;
                let rows = conn.fetch_all(sqlx::raw_sql(sql)).await;
                if let Err(e) = conn.execute(sqlx::raw_sql("ROLLBACK")).await {
                    tracing::warn!(error = %e, "rollback failed, discarding connection");
                    let _ = conn.close().await;
                }
                Ok(render_rows(&rows?))
            }
        }
    }

    /// Close every connection in the pool
    pub async fn close(&self) {
        match self {
            DatabasePool::Sqlite(pool) => pool.close().await,
            DatabasePool::MySql { pool, .. } => pool.close().await,
        }
    }
}

fn render_rows<R>(rows: &[R]) -> QueryOutput
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| render_cell(row, i)).collect())
        .collect();

    QueryOutput { columns, rows }
}

fn is_binary_type(name: &str) -> bool {
    let name = name.to_ascii_uppercase();
    name.contains("BLOB") || name.contains("BINARY")
}

// Values come back over the text protocol, so every non-blob cell decodes as a string.
fn render_cell<R>(row: &R, index: usize) -> String
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    let binary = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return "NULL".to_string(),
        Ok(raw) => is_binary_type(raw.type_info().name()),
        Err(e) => return format!("<error: {}>", e),
    };

    if !binary {
        if let Ok(text) = row.try_get_unchecked::<String, _>(index) {
            return text;
        }
    }
    match row.try_get_unchecked::<Vec<u8>, _>(index) {
        Ok(bytes) => format!("<blob {} bytes>", bytes.len()),
        Err(e) => format!("<error: {}>", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_display() {
        assert_eq!(DatabaseBackend::SQLite.to_string(), "SQLite");
        assert_eq!(DatabaseBackend::MySQL.to_string(), "MySQL");
        assert_eq!(DatabaseBackend::MySQL.dialect(), "mysql");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(DatabaseBackend::SQLite.quote_identifier("STUDENT"), "\"STUDENT\"");
        assert_eq!(DatabaseBackend::SQLite.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(DatabaseBackend::MySQL.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_query_output_rendering() {
        let output = QueryOutput {
            columns: vec!["NAME".to_string(), "MARKS".to_string()],
            rows: vec![vec!["Krish".to_string(), "90".to_string()]],
        };
        let table = output.to_table_string();
        assert!(table.contains("NAME"));
        assert!(table.contains("Krish"));
        assert_eq!(output.to_tsv(), "NAME\tMARKS\nKrish\t90");
        assert_eq!(output.first_column(), vec!["Krish".to_string()]);
        assert_eq!(QueryOutput::default().to_table_string(), "(no rows)");
    }

    #[tokio::test]
    async fn test_open_local_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let result = DatabasePool::open_local(&path).await;
        assert!(matches!(result, Err(SqlChatError::DatabaseConnection { .. })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_blob_cells_are_summarized() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let db = DatabasePool::Sqlite(pool);

        let output = db
            .fetch_all("SELECT x'0102' AS b, 'hi' AS t, 7 AS n, NULL AS z")
            .await
            .unwrap();
        assert_eq!(output.columns, vec!["b", "t", "n", "z"]);
        assert_eq!(
            output.rows,
            vec![vec!["<blob 2 bytes>", "hi", "7", "NULL"]]
        );
        db.close().await;
    }

    #[test]
    fn test_binary_type_names() {
        assert!(is_binary_type("BLOB"));
        assert!(is_binary_type("mediumblob"));
        assert!(is_binary_type("VARBINARY"));
        assert!(!is_binary_type("TEXT"));
        assert!(!is_binary_type("VARCHAR"));
    }

    #[tokio::test]
    async fn test_open_remote_validates_before_connecting() {
        let remote = RemoteConnection::new("", "user", "pw", "db");
        let result = DatabasePool::open_remote(&remote, true).await;
        assert!(matches!(result, Err(SqlChatError::MissingRemoteFields(_))));
    }
}
