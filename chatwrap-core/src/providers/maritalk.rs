//! MariTalk community endpoint

use crate::config::SecretString;
use crate::http::{Authorization, HttpClient, RequestOptions};
use crate::protocol::ChatMessage;
use crate::providers::error::TransportError;
use crate::providers::format::FormattedPrompt;
use crate::providers::params::GenerationParameters;
use crate::providers::transport::{expect_turns, RawResponse, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Public API base URL
pub const DEFAULT_BASE_URL: &str = "https://chat.maritaca.ai";

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    parameters: &'a Map<String, Value>,
}

/// Reply of the inference route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// Transport for the MariTalk chat API
pub struct MaritalkTransport {
    http: HttpClient,
    base_url: String,
    api_key: SecretString,
}

impl MaritalkTransport {
    pub fn new(http: HttpClient, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn url(&self) -> String {
        format!("{}/api/chat/inference", self.base_url)
    }
}

#[async_trait]
impl Transport for MaritalkTransport {
    fn name(&self) -> &str {
        "maritalk"
    }

    async fn invoke(
        &self,
        prompt: &FormattedPrompt,
        params: &GenerationParameters,
    ) -> Result<RawResponse, TransportError> {
        let request = InferenceRequest {
            messages: expect_turns(prompt, self.name())?,
            parameters: params.as_map(),
        };

        let answer: AnswerResponse = self
            .http
            .post_json(
                &self.url(),
                &Authorization::Key(self.api_key.clone()),
                &request,
                RequestOptions::new(),
            )
            .await?;
        Ok(RawResponse::Answer(answer))
    }
}
