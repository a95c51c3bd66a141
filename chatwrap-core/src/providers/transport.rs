//! Network seam between adapters and backends
//!
//! A transport sends one formatted prompt with its parameters and hands back
//! the backend's response in its native shape. Turning that shape into plain
//! text is done by [`RawResponse::into_text`], so every backend unwraps its
//! replies the same way regardless of which transport produced them.

use crate::protocol::ChatMessage;
use crate::providers::error::TransportError;
use crate::providers::format::FormattedPrompt;
use crate::providers::inference_endpoint::types::TextGenerationOutput;
use crate::providers::maritalk::AnswerResponse;
use crate::providers::openai::types::ChatCompletionResponse;
use crate::providers::params::GenerationParameters;
use async_trait::async_trait;

/// Sends a single generation request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Send the prompt and return the backend's reply
    async fn invoke(
        &self,
        prompt: &FormattedPrompt,
        params: &GenerationParameters,
    ) -> Result<RawResponse, TransportError>;
}

/// Backend reply before unwrapping
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// Chat-completions reply with a list of choices
    ChatCompletion(ChatCompletionResponse),
    /// Text-generation reply with optional token details
    TextGeneration(TextGenerationOutput),
    /// Community endpoint reply
    Answer(AnswerResponse),
    /// Bare generated text
    Text(String),
}

impl RawResponse {
    /// Generated text, untrimmed
    pub fn into_text(self) -> Result<String, TransportError> {
        match self {
            RawResponse::ChatCompletion(response) => response.into_text(),
            RawResponse::TextGeneration(output) => Ok(output.into_text()),
            RawResponse::Answer(answer) => Ok(answer.answer),
            RawResponse::Text(text) => Ok(text),
        }
    }
}

/// Turn list of a prompt, for chat-style endpoints
pub(crate) fn expect_turns<'a>(
    prompt: &'a FormattedPrompt,
    backend: &str,
) -> Result<&'a [ChatMessage], TransportError> {
    prompt.as_turns().ok_or_else(|| TransportError::InvalidRequest {
        status: 0,
        message: format!("{} expects a turn-list prompt", backend),
    })
}

/// Text of a prompt, for text-generation endpoints
pub(crate) fn expect_text<'a>(
    prompt: &'a FormattedPrompt,
    backend: &str,
) -> Result<&'a str, TransportError> {
    prompt.as_text().ok_or_else(|| TransportError::InvalidRequest {
        status: 0,
        message: format!("{} expects a text prompt", backend),
    })
}
