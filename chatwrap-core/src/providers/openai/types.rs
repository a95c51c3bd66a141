//! OpenAI API types
//!
//! These types match the chat-completions wire format and are used for
//! serialization/deserialization when talking to OpenAI-compatible servers.

use crate::protocol::ChatMessage;
use crate::providers::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat completion request
///
/// Generation parameters are flattened next to `messages`, so whatever the
/// normalizer produced reaches the wire under its own name.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub messages: &'a [ChatMessage],

    #[serde(flatten)]
    pub parameters: &'a Map<String, Value>,
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub model: String,

    pub choices: Vec<ChatChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Content of the first choice
    pub fn into_text(self) -> Result<String, TransportError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            TransportError::MalformedResponse("Chat completion has no choices".to_string())
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// One choice of a completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: usize,

    pub message: ChoiceMessage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Message inside a choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,

    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
