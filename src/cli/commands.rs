//! Command parsing for the CLI
//!
//! Lines starting with `/` are commands; anything else is a question for
//! the agent.

use crate::error::{Result, SqlChatError};

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Clear the conversation log
    Clear,
    /// Go back to database and API key configuration
    Config,
    /// Show help message
    Help,
    /// Exit the application
    Quit,
    /// Natural language question
    Query { text: String },
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

/// A slash command as listed by the completer and the command menu
#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// All slash commands
pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "/clear",
        description: "Clear message history",
    },
    CommandInfo {
        name: "/config",
        description: "Change database or API key",
    },
    CommandInfo {
        name: "/help",
        description: "Show detailed help",
    },
    CommandInfo {
        name: "/quit",
        description: "Exit SQL Chat",
    },
];

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if !input.starts_with('/') {
            return Ok(Command {
                command_type: CommandType::Query {
                    text: input.to_string(),
                },
            });
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or(input);
        let has_args = parts.next().is_some();

        let command_type = match cmd {
            "/clear" => CommandType::Clear,
            "/config" => CommandType::Config,
            "/help" => CommandType::Help,
            "/quit" | "/exit" => CommandType::Quit,
            _ => return Err(SqlChatError::UnknownCommand(cmd.to_string())),
        };

        if has_args {
            return Err(SqlChatError::InvalidCommandSyntax {
                command: cmd.to_string(),
                expected: cmd.to_string(),
            });
        }

        Ok(Command { command_type })
    }
}

/// Help text shown by `/help`
pub fn help_text() -> &'static str {
    r#"
SQL Chat Commands

Session:
  /clear             Clear message history
  /config            Change database or API key
  /help              Show this help message
  /quit, /exit       Exit SQL Chat
  /                  Open the command menu

Questions:
  Any text without a / prefix is sent to the agent, which looks at the
  database schema, writes SQL, runs it and answers in plain language.

Examples:
  How many students scored above 80?
  Which class has the highest average marks?
"#
}

/// Format an error for display
pub fn format_error(error: &SqlChatError) -> String {
    format!("Error: {}", error)
}
