//! Ordered conversation history
//!
//! A session only records messages. Shape rules (role order, trailing user
//! turn) depend on the backend and are checked when the session is formatted,
//! not when messages are appended.

use super::types::{ChatMessage, MessageError};

/// How a new session starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionSeed {
    /// No messages at all
    #[default]
    Empty,
    /// A single system message
    System(String),
    /// A prior transcript, taken as-is
    Transcript(Vec<ChatMessage>),
}

impl SessionSeed {
    /// Build a seed from the two optional inputs of `new_session`
    ///
    /// At most one of them may be present.
    pub fn from_parts(
        system_content: Option<String>,
        messages: Option<Vec<ChatMessage>>,
    ) -> Result<Self, MessageError> {
        match (system_content, messages) {
            (Some(_), Some(_)) => Err(MessageError::ConflictingSeed),
            (Some(system), None) => Ok(Self::System(system)),
            (None, Some(messages)) => Ok(Self::Transcript(messages)),
            (None, None) => Ok(Self::Empty),
        }
    }
}

/// Messages exchanged so far, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    messages: Vec<ChatMessage>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session from a seed
    pub fn from_seed(seed: SessionSeed) -> Result<Self, MessageError> {
        let messages = match seed {
            SessionSeed::Empty => Vec::new(),
            SessionSeed::System(content) => vec![ChatMessage::system(content)?],
            SessionSeed::Transcript(messages) => messages,
        };
        Ok(Self { messages })
    }

    /// Append a message at the end of the conversation
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }
}

impl<'a> IntoIterator for &'a Session {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
