//! OpenAI client implementation

use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::SecretString;
use crate::http::{Authorization, HttpClient, RequestOptions};
use crate::providers::error::{BackendError, TransportError};
use crate::providers::format::FormattedPrompt;
use crate::providers::params::GenerationParameters;
use crate::providers::transport::{expect_turns, RawResponse, Transport};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Public API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Per-request timeout for completions
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport for OpenAI-compatible chat-completions servers
pub struct OpenAiTransport {
    http: HttpClient,
    base_url: String,
    api_key: SecretString,
    request_timeout: Duration,
}

impl OpenAiTransport {
    /// Create a transport against `base_url`
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth(&self) -> Authorization {
        Authorization::Bearer(self.api_key.clone())
    }

    /// Check the key against the models listing
    pub async fn verify_credentials(&self) -> Result<(), BackendError> {
        let url = format!("{}/models", self.base_url);
        let options = RequestOptions::new().with_timeout(self.request_timeout);

        match self
            .http
            .get_json::<serde_json::Value>(&url, &self.auth(), options)
            .await
        {
            Ok(_) => {
                debug!("OpenAI credentials accepted ({})", self.api_key.partial_redact());
                Ok(())
            }
            Err(TransportError::Unauthorized(message)) => {
                info!("OpenAI rejected the API key");
                Err(BackendError::Authentication(message))
            }
            Err(other) => Err(BackendError::Transport(other)),
        }
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    fn name(&self) -> &str {
        "openai"
    }

    async fn invoke(
        &self,
        prompt: &FormattedPrompt,
        params: &GenerationParameters,
    ) -> Result<RawResponse, TransportError> {
        let request = ChatCompletionRequest {
            messages: expect_turns(prompt, self.name())?,
            parameters: params.as_map(),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let options = RequestOptions::new().with_timeout(self.request_timeout);
        let response: ChatCompletionResponse = self
            .http
            .post_json(&url, &self.auth(), &request, options)
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Completion used {} prompt and {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(RawResponse::ChatCompletion(response))
    }
}
