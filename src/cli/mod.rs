//! CLI module
//!
//! This module provides the terminal interface for SQL Chat: the REPL,
//! slash command parsing and the selection menus.

pub mod command_menu;
pub mod commands;
pub mod repl;

// Re-exports
pub use repl::{ConsoleSink, Repl};
