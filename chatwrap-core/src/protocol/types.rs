//! Core message types for chat interactions
//!
//! A message is validated once, when it is built, and never changes afterwards.
//! Roles are a closed enumeration so an unknown role can only appear at the
//! boundary where text is parsed, never deeper in the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building messages or seeding a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Role text is not one of `system`, `user` or `assistant`
    #[error("role should be \"system\", \"assistant\", or \"user\", got \"{0}\"")]
    InvalidRole(String),

    /// Content was empty or whitespace only
    #[error("{role} message content must not be empty")]
    EmptyContent { role: MessageRole },

    /// Content was a structured value instead of text
    #[error("message content should be text, got {found}")]
    NonTextContent { found: String },

    /// Both a system prompt and a transcript were supplied for a new session
    #[error("a new session takes either a system prompt or a transcript, not both")]
    ConflictingSeed,
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions that frame the whole conversation
    System,
    /// Caller input
    User,
    /// Model reply
    Assistant,
}

impl MessageRole {
    /// Wire spelling of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Role name with a leading capital, as used by transcript-style prompts
    pub fn capitalized(&self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(MessageError::InvalidRole(other.to_string())),
        }
    }
}

/// A single message in the conversation
///
/// Fields are private so every instance has passed [`ChatMessage::new`].
/// Deserialization goes through the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChatMessage")]
pub struct ChatMessage {
    role: MessageRole,
    content: String,
}

impl ChatMessage {
    /// Create a validated message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Result<Self, MessageError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MessageError::EmptyContent { role });
        }
        Ok(Self { role, content })
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Result<Self, MessageError> {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Result<Self, MessageError> {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Result<Self, MessageError> {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Unvalidated wire form of a message
#[derive(Deserialize)]
struct RawChatMessage {
    role: String,
    content: serde_json::Value,
}

impl TryFrom<RawChatMessage> for ChatMessage {
    type Error = MessageError;

    fn try_from(raw: RawChatMessage) -> Result<Self, Self::Error> {
        let role = raw.role.parse::<MessageRole>()?;
        match raw.content {
            serde_json::Value::String(content) => ChatMessage::new(role, content),
            other => Err(MessageError::NonTextContent {
                found: json_kind(&other).to_string(),
            }),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            assert_eq!(role.as_str().parse::<MessageRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = "tool".parse::<MessageRole>().unwrap_err();
        assert_eq!(err, MessageError::InvalidRole("tool".to_string()));
    }

    #[test]
    fn test_empty_content_is_rejected() {
        assert!(matches!(
            ChatMessage::user("   "),
            Err(MessageError::EmptyContent { role: MessageRole::User })
        ));
    }

    #[test]
    fn test_deserialize_validates_role_and_content() {
        let ok: ChatMessage =
            serde_json::from_str(r#"{"role": "assistant", "content": "4"}"#).unwrap();
        assert_eq!(ok.role(), MessageRole::Assistant);
        assert_eq!(ok.content(), "4");

        let bad_role = serde_json::from_str::<ChatMessage>(r#"{"role": "bot", "content": "hi"}"#);
        assert!(bad_role.is_err());

        let structured =
            serde_json::from_str::<ChatMessage>(r#"{"role": "user", "content": ["a", "b"]}"#);
        assert!(structured.unwrap_err().to_string().contains("should be text"));
    }

    #[test]
    fn test_serialize_uses_lowercase_roles() {
        let message = ChatMessage::system("be brief").unwrap();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }
}
