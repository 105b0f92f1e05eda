//! Interaction loop state machine
//!
//! Owns the session context: configuration, agent and conversation log.
//! The terminal front end drives it; all state transitions live here.

use crate::agent::{ProgressSink, QueryAgent};
use crate::config::{ConfigurationForm, SessionConfiguration};
use crate::error::{Result, SqlChatError};
use crate::session::conversation::{ChatMessage, ConversationLog};
use crate::session::factory::SessionFactory;
use std::sync::Arc;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for mode, connection details and credential
    AwaitingConfiguration,
    /// Configured; the log should be rendered
    Ready,
    /// Waiting for the user to type
    AwaitingInput,
    /// The agent is answering a question
    Processing,
    /// A question failed; folds back into `Ready` once the error message is logged
    DisplayingError,
}

/// Prefix of the assistant message logged when a question fails
pub const ERROR_REPLY_PREFIX: &str = "Sorry, I encountered an error: ";

/// One interactive session
pub struct InteractionLoop {
    factory: Arc<dyn SessionFactory>,
    state: LoopState,
    configuration: Option<SessionConfiguration>,
    agent: Option<Arc<dyn QueryAgent>>,
    database: Option<String>,
    log: ConversationLog,
}

impl InteractionLoop {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            state: LoopState::AwaitingConfiguration,
            configuration: None,
            agent: None,
            database: None,
            log: ConversationLog::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.agent.is_some()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn configuration(&self) -> Option<&SessionConfiguration> {
        self.configuration.as_ref()
    }

    /// Description of the connected database, once configured
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Validate the form against the process environment and build the session
    pub async fn configure(&mut self, form: ConfigurationForm) -> Result<()> {
        self.configure_with(form, |name| std::env::var(name).ok()).await
    }

    /// Validate the form and build the session
    ///
    /// The credential and remote fields are checked before the factory is
    /// asked for anything. On failure the loop stays in
    /// `AwaitingConfiguration`.
    pub async fn configure_with<F>(&mut self, form: ConfigurationForm, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.reconfigure();

        let configuration = form.resolve_with(lookup).inspect_err(|e| {
            tracing::warn!(error = %e, "configuration rejected");
        })?;

        let components = self.factory.build(&configuration).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to build session");
        })?;

        self.configuration = Some(configuration);
        self.agent = Some(components.agent);
        self.database = Some(components.database);
        self.state = LoopState::Ready;
        Ok(())
    }

    /// Drop the current session components and wait for new configuration
    ///
    /// The conversation log is kept.
    pub fn reconfigure(&mut self) {
        self.configuration = None;
        self.agent = None;
        self.database = None;
        self.state = LoopState::AwaitingConfiguration;
    }

    /// Replace the log with the greeting
    pub fn reset(&mut self) {
        tracing::debug!("conversation reset");
        self.log.reset();
        if self.is_ready() {
            self.state = LoopState::Ready;
        }
    }

    /// Mark the loop as waiting for input
    pub fn await_input(&mut self) {
        if self.is_ready() {
            self.state = LoopState::AwaitingInput;
        }
    }

    /// Ask the agent a question and log the exchange
    ///
    /// Agent failures are not returned: they are logged as an assistant
    /// message and the loop returns to `Ready`. Errors are only returned
    /// when the loop is not configured or the question is blank, and in
    /// those cases the log is left untouched.
    pub async fn submit(&mut self, question: &str, sink: &dyn ProgressSink) -> Result<&ChatMessage> {
        let agent = self.agent.clone().ok_or_else(|| {
            SqlChatError::Config("Please finish configuring the database and API key first".to_string())
        })?;

        let question = question.trim();
        if question.is_empty() {
            return Err(SqlChatError::Config("Question is empty".to_string()));
        }

        self.log.push_user(question);
        self.state = LoopState::Processing;

        let reply = match agent.run(question, sink).await {
            Ok(answer) => answer,
            Err(e) => {
                self.state = LoopState::DisplayingError;
                if e.is_recoverable() {
                    tracing::warn!(error = %e, "question failed");
                } else {
                    tracing::error!(error = %e, class = ?e.class(), "question failed");
                }
                format!("{}{}", ERROR_REPLY_PREFIX, e)
            }
        };

        self.state = LoopState::Ready;
        Ok(self.log.push_assistant(reply))
    }
}
