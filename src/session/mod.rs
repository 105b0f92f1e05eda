//! Session module
//!
//! Conversation state, the factory that builds a session's components,
//! and the interaction loop that ties them together.

pub mod conversation;
pub mod factory;
pub mod interaction;

// Re-exports
pub use conversation::{ChatMessage, ChatRole, ConversationLog, GREETING};
pub use factory::{SessionComponents, SessionFactory, SqlSessionFactory};
pub use interaction::{InteractionLoop, LoopState, ERROR_REPLY_PREFIX};
