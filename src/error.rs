//! Error types for SQL Chat
//!
//! This module defines the error types used throughout the application,
//! along with the classification the interaction loop uses to decide
//! whether an error ends a configuration attempt or only a single turn.

use thiserror::Error;

/// Result type alias for SQL Chat
pub type Result<T> = std::result::Result<T, SqlChatError>;

/// How an error is handled by the interaction loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid user configuration; the user must correct it
    Configuration,
    /// A component failed to initialize
    Construction,
    /// A single question failed; the session continues
    Invocation,
}

/// Main error type for SQL Chat
#[derive(Error, Debug)]
pub enum SqlChatError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to open a database handle
    #[error("Failed to connect to {target}: {source}")]
    DatabaseConnection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No API key was typed and the environment fallback is empty
    #[error("Please add the Groq API key either at the prompt or as the {env_var} environment variable")]
    MissingCredential { env_var: String },

    /// Remote mode selected without all connection details
    #[error("Please provide all MySQL connection details (missing: {})", .0.join(", "))]
    MissingRemoteFields(Vec<&'static str>),

    /// The language model client could not be built
    #[error("Failed to initialize Groq client: {0}")]
    LlmClient(String),

    /// LLM API returned an error response
    #[error("{provider} API error (status {status}): {message}")]
    LLMApiError {
        provider: String,
        message: String,
        status: u16,
    },

    /// The query agent failed to produce an answer
    #[error("Agent error: {0}")]
    Agent(String),

    /// A statement was refused before reaching the database
    #[error("{0}")]
    RejectedStatement(String),

    /// A toolkit tool failed
    #[error("Tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Command parsing errors
    #[error("Invalid syntax for {command}, expected: {expected}")]
    InvalidCommandSyntax { command: String, expected: String },

    /// Unknown slash command
    #[error("Unknown command: {0}. Type /help for available commands")]
    UnknownCommand(String),
}

impl SqlChatError {
    /// Wrap a connection failure with the (redacted) target it was aimed at
    pub fn db_connection(target: impl Into<String>, source: sqlx::Error) -> Self {
        SqlChatError::DatabaseConnection {
            target: target.into(),
            source,
        }
    }

    /// Classify the error for the interaction loop
    pub fn class(&self) -> ErrorClass {
        match self {
            SqlChatError::Config(_)
            | SqlChatError::MissingCredential { .. }
            | SqlChatError::MissingRemoteFields(_)
            | SqlChatError::InvalidCommandSyntax { .. }
            | SqlChatError::UnknownCommand(_) => ErrorClass::Configuration,
            SqlChatError::LlmClient(_)
            | SqlChatError::DatabaseConnection { .. }
            | SqlChatError::Io(_) => ErrorClass::Construction,
            SqlChatError::Database(_)
            | SqlChatError::Http(_)
            | SqlChatError::Serialization(_)
            | SqlChatError::LLMApiError { .. }
            | SqlChatError::Agent(_)
            | SqlChatError::RejectedStatement(_)
            | SqlChatError::Tool { .. } => ErrorClass::Invocation,
        }
    }

    /// Whether the session can keep accepting questions after this error
    pub fn is_recoverable(&self) -> bool {
        self.class() == ErrorClass::Invocation
    }
}
