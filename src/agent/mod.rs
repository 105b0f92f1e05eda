//! Query agent module
//!
//! The interaction loop only sees the `QueryAgent` trait: give it a
//! question and a progress sink, get an answer back. `SqlAgent` is the
//! implementation that reasons over the SQL toolkit.

pub mod parser;
pub mod prompt;
pub mod sink;
pub mod sql_agent;
pub mod toolkit;

pub use sink::{AgentEvent, NullSink, ProgressSink, RecordingSink};
pub use sql_agent::SqlAgent;
pub use toolkit::{Tool, Toolkit};

use crate::error::Result;
use async_trait::async_trait;

/// Answers natural-language questions about a database
#[async_trait]
pub trait QueryAgent: Send + Sync {
    /// Answer `question`, reporting progress to `sink`
    ///
    /// Any error is scoped to this question; callers keep the session alive.
    async fn run(&self, question: &str, sink: &dyn ProgressSink) -> Result<String>;
}
