//! Backend profiles
//!
//! A profile is everything about a backend that does not involve the network:
//! which family it belongs to, how it formats prompts, which defaults it
//! starts from and how those get normalized.

use crate::providers::format::{PromptFormat, EOS};
use crate::providers::params::{GenerationParameters, NormalizationRules};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Context window of the managed endpoints' containers
pub const MANAGED_CONTEXT_LENGTH: usize = 4096;

/// Default completion budget
pub const DEFAULT_MAX_TOKENS: u64 = 1024;

/// How failures of a backend are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFamily {
    /// Metered API; transient failures are retried with backoff
    Commercial,
    /// Self-hosted endpoint; failures are explained by a health probe
    Managed,
    /// Free endpoint; failures are passed through
    Community,
}

impl BackendFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendFamily::Commercial => "commercial",
            BackendFamily::Managed => "managed",
            BackendFamily::Community => "community",
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendProfile {
    pub family: BackendFamily,
    pub format: PromptFormat,
    pub defaults: GenerationParameters,
    pub rules: NormalizationRules,

    /// Total tokens the model accepts; bounds `max_new_tokens` for long prompts
    pub context_length: Option<usize>,
}

impl BackendProfile {
    /// Chat-completions model such as `gpt-4`
    pub fn openai_chat(model: impl Into<String>) -> Self {
        Self {
            family: BackendFamily::Commercial,
            format: PromptFormat::TurnList,
            defaults: GenerationParameters::new()
                .set("model", model.into())
                .set("temperature", 0)
                .set("max_tokens", DEFAULT_MAX_TOKENS)
                .set("top_p", 1)
                .set("frequency_penalty", 0)
                .set("presence_penalty", 0),
            rules: NormalizationRules {
                correct_degenerate: true,
                native_stop_key: None,
            },
            context_length: None,
        }
    }

    /// Llama 2 chat model behind a managed endpoint
    pub fn llama2() -> Self {
        Self::managed(PromptFormat::InstructionTag, json!([EOS]))
    }

    /// Falcon instruct model behind a managed endpoint
    pub fn falcon() -> Self {
        Self::managed(PromptFormat::RoleTranscript, json!([EOS, "User"]))
    }

    fn managed(format: PromptFormat, stop_sequences: serde_json::Value) -> Self {
        Self {
            family: BackendFamily::Managed,
            format,
            defaults: GenerationParameters::new()
                .set("max_new_tokens", DEFAULT_MAX_TOKENS)
                .set("top_p", 1)
                .set("temperature", 0)
                .set("stop_sequences", stop_sequences),
            rules: NormalizationRules {
                correct_degenerate: true,
                native_stop_key: Some("stop_sequences"),
            },
            context_length: Some(MANAGED_CONTEXT_LENGTH),
        }
    }

    /// MariTalk community model
    pub fn maritalk() -> Self {
        Self {
            family: BackendFamily::Community,
            format: PromptFormat::TurnList,
            defaults: GenerationParameters::new()
                .set("temperature", 0)
                .set("max_tokens", DEFAULT_MAX_TOKENS)
                .set("top_p", 0.95)
                .set("do_sample", true)
                .set("stopping_tokens", json!([])),
            rules: NormalizationRules {
                correct_degenerate: false,
                native_stop_key: Some("stopping_tokens"),
            },
            context_length: None,
        }
    }

    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = Some(context_length);
        self
    }

    /// Override one default
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.defaults.insert(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_defaults() {
        let profile = BackendProfile::openai_chat("gpt-4");
        assert_eq!(profile.family, BackendFamily::Commercial);
        assert_eq!(profile.format, PromptFormat::TurnList);
        assert_eq!(profile.defaults.get("model"), Some(&json!("gpt-4")));
        assert_eq!(profile.defaults.len(), 6);
        assert!(profile.context_length.is_none());
    }

    #[test]
    fn test_managed_profiles_differ_in_format_and_stops() {
        let llama = BackendProfile::llama2();
        let falcon = BackendProfile::falcon();
        assert_eq!(llama.format, PromptFormat::InstructionTag);
        assert_eq!(falcon.format, PromptFormat::RoleTranscript);
        assert_eq!(llama.defaults.get("stop_sequences"), Some(&json!(["</s>"])));
        assert_eq!(falcon.defaults.get("stop_sequences"), Some(&json!(["</s>", "User"])));
        assert_eq!(llama.context_length, Some(4096));
        assert_eq!(falcon.rules.native_stop_key, Some("stop_sequences"));
    }

    #[test]
    fn test_maritalk_does_not_correct() {
        let profile = BackendProfile::maritalk();
        assert_eq!(profile.family, BackendFamily::Community);
        assert!(!profile.rules.correct_degenerate);
        assert_eq!(profile.defaults.get("top_p"), Some(&json!(0.95)));
    }
}
