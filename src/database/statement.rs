//! Statement guards
//!
//! Lexical checks run on agent-written SQL before it reaches a pool: one
//! statement per call, and read queries only on read-only remote
//! connections.

use crate::database::connection::DatabaseBackend;
use crate::error::{Result, SqlChatError};

/// Message returned when a call holds more than one statement
pub const SINGLE_STATEMENT_MESSAGE: &str = "You can only execute one statement at a time.";

/// Leading keywords accepted on a read-only connection
const READ_KEYWORDS: &[&str] = &[
    "SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH", "TABLE", "VALUES",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    Quoted(u8),
    LineComment,
    BlockComment,
}

fn starts_line_comment(bytes: &[u8], i: usize, backend: DatabaseBackend) -> bool {
    match backend {
        // MySQL wants whitespace after `--`; `1 --1` is arithmetic.
        DatabaseBackend::MySQL => {
            (bytes[i] == b'#')
                || (bytes[i] == b'-'
                    && bytes.get(i + 1) == Some(&b'-')
                    && bytes.get(i + 2).map_or(true, |c| c.is_ascii_whitespace()))
        }
        DatabaseBackend::SQLite => bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'-'),
    }
}

fn starts_block_comment(bytes: &[u8], i: usize, backend: DatabaseBackend) -> bool {
    if bytes[i] != b'/' || bytes.get(i + 1) != Some(&b'*') {
        return false;
    }
    // `/*! ... */` is executed by MySQL, so its body is scanned as code.
    !(backend == DatabaseBackend::MySQL && bytes.get(i + 2) == Some(&b'!'))
}

/// Split `sql` on semicolons that sit outside quotes and comments
///
/// Segments holding nothing but whitespace or comments are dropped, so a
/// trailing `;` or a closing comment does not count as a statement.
pub fn split_statements(sql: &str, backend: DatabaseBackend) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mysql = backend == DatabaseBackend::MySQL;
    let mut statements = Vec::new();
    let mut state = Lexeme::Code;
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            Lexeme::Code => {
                if starts_line_comment(bytes, i, backend) {
                    state = Lexeme::LineComment;
                } else if starts_block_comment(bytes, i, backend) {
                    state = Lexeme::BlockComment;
                    i += 1;
                } else if b == b';' {
                    if has_code {
                        statements.push(sql[start..i].trim());
                    }
                    start = i + 1;
                    has_code = false;
                } else if !b.is_ascii_whitespace() {
                    has_code = true;
                    match b {
                        b'\'' | b'"' | b'`' => state = Lexeme::Quoted(b),
                        b'[' if !mysql => state = Lexeme::Quoted(b']'),
                        _ => {}
                    }
                }
            }
            Lexeme::Quoted(close) => {
                if mysql && b == b'\\' && close != b'`' {
                    i += 1;
                } else if b == close {
                    state = Lexeme::Code;
                }
            }
            Lexeme::LineComment => {
                if b == b'\n' {
                    state = Lexeme::Code;
                }
            }
            Lexeme::BlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = Lexeme::Code;
                    i += 1;
                }
            }
        }
        i += 1;
    }

    if has_code {
        statements.push(sql[start..].trim());
    }
    statements
}

/// First keyword of a statement, uppercased
///
/// Leading whitespace, comments and opening parentheses are skipped.
/// Returns `None` when the statement does not open with a word.
pub fn leading_keyword(statement: &str, backend: DatabaseBackend) -> Option<String> {
    let bytes = statement.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() || bytes[i] == b'(' {
            i += 1;
        } else if starts_line_comment(bytes, i, backend) {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if starts_block_comment(bytes, i, backend) {
            let end = statement[i + 2..].find("*/")?;
            i += 2 + end + 2;
        } else {
            break;
        }
    }

    let word: String = statement[i..]
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    (!word.is_empty()).then(|| word.to_ascii_uppercase())
}

/// Reject input that holds more than one statement
pub fn ensure_single_statement(sql: &str, backend: DatabaseBackend) -> Result<()> {
    if split_statements(sql, backend).len() > 1 {
        return Err(SqlChatError::RejectedStatement(
            SINGLE_STATEMENT_MESSAGE.to_string(),
        ));
    }
    Ok(())
}

/// Reject anything that is not a read query
///
/// Session and transaction control (`SET`, `START`, `COMMIT`, ...) are
/// refused along with DML and DDL, as is `SELECT ... INTO OUTFILE`.
pub fn ensure_read_query(statement: &str, backend: DatabaseBackend) -> Result<()> {
    let keyword = leading_keyword(statement, backend);
    match keyword.as_deref() {
        Some(word) if READ_KEYWORDS.contains(&word) => {}
        other => {
            return Err(SqlChatError::RejectedStatement(format!(
                "Only read queries are allowed on a read-only connection (got {})",
                other.unwrap_or("an unrecognized statement")
            )));
        }
    }

    let words: Vec<String> = statement
        .split_whitespace()
        .map(|w| w.to_ascii_uppercase())
        .collect();
    let writes_file = words
        .windows(2)
        .any(|pair| pair[0] == "INTO" && (pair[1] == "OUTFILE" || pair[1] == "DUMPFILE"));
    if writes_file {
        return Err(SqlChatError::RejectedStatement(
            "Writing query results to files is not allowed on a read-only connection"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQLITE: DatabaseBackend = DatabaseBackend::SQLite;
    const MYSQL: DatabaseBackend = DatabaseBackend::MySQL;

    #[test]
    fn test_split_ignores_trailing_semicolon_and_comments() {
        assert_eq!(
            split_statements("SELECT 1;  ", SQLITE),
            vec!["SELECT 1"]
        );
        assert_eq!(
            split_statements("SELECT 1; -- done\n", SQLITE),
            vec!["SELECT 1"]
        );
        assert_eq!(
            split_statements("SELECT 1; /* a; b */ ;", SQLITE),
            vec!["SELECT 1"]
        );
        assert!(split_statements("  ; ", SQLITE).is_empty());
    }

    #[test]
    fn test_split_respects_quotes() {
        let sql = "SELECT ';' AS a, \"x;y\" FROM [t;1] WHERE NAME = 'it''s; fine'";
        assert_eq!(split_statements(sql, SQLITE), vec![sql]);

        let sql = "SELECT NAME FROM STUDENT LIMIT 1; SELECT MARKS, CLASS FROM STUDENT LIMIT 1";
        assert_eq!(
            split_statements(sql, SQLITE),
            vec![
                "SELECT NAME FROM STUDENT LIMIT 1",
                "SELECT MARKS, CLASS FROM STUDENT LIMIT 1"
            ]
        );
    }

    #[test]
    fn test_split_follows_mysql_lexing() {
        // An escaped quote does not close the string.
        assert_eq!(split_statements("SELECT 'a\\''; DELETE FROM t", MYSQL).len(), 2);
        assert_eq!(split_statements("SELECT 'a\\'; b'", MYSQL).len(), 1);
        // `--1` is not a comment in MySQL.
        assert_eq!(split_statements("SELECT 1 --1; DELETE FROM t", MYSQL).len(), 2);
        assert_eq!(split_statements("SELECT 1 # x; y\n", MYSQL).len(), 1);
        // Executable comments are code.
        assert_eq!(
            split_statements("SELECT 1 /*!; DELETE FROM t */", MYSQL).len(),
            2
        );
    }

    #[test]
    fn test_single_statement_guard() {
        assert!(ensure_single_statement("SELECT COUNT(*) FROM STUDENT;", SQLITE).is_ok());
        let err = ensure_single_statement("SET SESSION TRANSACTION READ WRITE; DELETE FROM t", MYSQL)
            .unwrap_err();
        assert_eq!(err.to_string(), SINGLE_STATEMENT_MESSAGE);
    }

    #[test]
    fn test_leading_keyword() {
        assert_eq!(leading_keyword("  select 1", MYSQL).as_deref(), Some("SELECT"));
        assert_eq!(
            leading_keyword("-- note\n/* c */ ((SELECT 1))", MYSQL).as_deref(),
            Some("SELECT")
        );
        assert_eq!(leading_keyword("/*!50000 DELETE FROM t */", MYSQL), None);
        assert_eq!(leading_keyword("/* open", SQLITE), None);
        assert_eq!(leading_keyword("", SQLITE), None);
    }

    #[test]
    fn test_read_query_guard() {
        for sql in [
            "SELECT * FROM STUDENT",
            "show tables",
            "DESCRIBE STUDENT",
            "WITH t AS (SELECT 1) SELECT * FROM t",
            "(SELECT 1) UNION (SELECT 2)",
        ] {
            assert!(ensure_read_query(sql, MYSQL).is_ok(), "{}", sql);
        }

        for sql in [
            "SET SESSION TRANSACTION READ WRITE",
            "set autocommit = 1",
            "START TRANSACTION",
            "COMMIT",
            "DELETE FROM STUDENT",
            "DROP TABLE STUDENT",
            "/*!50000 DELETE FROM STUDENT */",
            "SELECT * FROM STUDENT INTO\n  OUTFILE '/tmp/x'",
        ] {
            let err = ensure_read_query(sql, MYSQL).unwrap_err();
            assert!(matches!(err, SqlChatError::RejectedStatement(_)), "{}", sql);
        }
    }
}
