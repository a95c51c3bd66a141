//! Text-generation wire types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Text-generation request
#[derive(Debug, Serialize)]
pub struct TextGenerationRequest<'a> {
    pub inputs: &'a str,
    pub parameters: Map<String, Value>,
    pub stream: bool,
}

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Length,
    EosToken,
    StopSequence,
    #[serde(other)]
    Other,
}

/// One generated token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedToken {
    #[serde(default)]
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub logprob: Option<f64>,
    #[serde(default)]
    pub special: bool,
}

/// Generation details, present when the request asked for them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDetails {
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub generated_tokens: u32,
    #[serde(default)]
    pub tokens: Vec<GeneratedToken>,
}

/// Text-generation output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationOutput {
    pub generated_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<GenerationDetails>,
}

impl TextGenerationOutput {
    /// Generated text without the stop sequence that ended it
    pub fn into_text(self) -> String {
        let stop = self
            .details
            .filter(|details| details.finish_reason == FinishReason::StopSequence)
            .and_then(|details| details.tokens.into_iter().last())
            .map(|token| token.text);

        match stop {
            Some(stop) => match self.generated_text.strip_suffix(stop.as_str()) {
                Some(stripped) => stripped.to_string(),
                None => self.generated_text,
            },
            None => self.generated_text,
        }
    }
}

/// Endpoints answer with either a bare output or a one-element list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TextGenerationReply {
    Many(Vec<TextGenerationOutput>),
    One(TextGenerationOutput),
    Text(String),
}
