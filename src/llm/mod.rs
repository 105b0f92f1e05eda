//! LLM integration module
//!
//! This module provides the trait-based LLM provider abstraction and the
//! Groq implementation the query agent runs on.

pub mod client;
pub mod provider;

// Provider implementations
pub mod providers {
    pub mod groq;
}

// Re-exports
pub use provider::{
    GenerationParams, LLMProvider, LLMResponse, Message, MessageRole, TokenCallback,
};
pub use providers::groq::{create_client, GroqProvider};
