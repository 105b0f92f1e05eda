//! SQL Chat Library
//!
//! Chat with a SQL database in natural language. The main binary is in
//! src/main.rs.

pub mod agent;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod session;
