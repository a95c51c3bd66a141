//! Conversation model shared by every backend
//!
//! This module defines the canonical chat structures the adapters operate on:
//! - A closed set of message roles
//! - Validated, immutable chat messages
//! - The ordered session owned by a single backend adapter

pub mod session;
pub mod types;

pub use session::{Session, SessionSeed};
pub use types::{ChatMessage, MessageError, MessageRole};
