//! Progress sinks
//!
//! The agent reports what it is doing while a question is being answered:
//! streamed model tokens, tool calls and their results. A sink decides how
//! (or whether) to show them.

use std::sync::Mutex;

/// Something that happened while answering a question
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A new reasoning step begins
    StepStarted { iteration: usize },
    /// A fragment of model output
    Token(String),
    /// The model chose a tool
    ToolStarted { tool: String, input: String },
    /// A tool returned
    ToolFinished { tool: String, output: String },
    /// The model output could not be parsed; the agent will ask again
    InvalidOutput { observation: String },
    /// The final answer was produced
    Finished { answer: String },
}

/// Receives agent events for live display
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: AgentEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&self, _event: AgentEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Concatenation of all streamed tokens
    pub fn streamed_text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AgentEvent::Token(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Names of the tools called, in order
    pub fn tools_called(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AgentEvent::ToolStarted { tool, .. } => Some(tool),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
