//! Managed inference endpoint client

use super::types::{TextGenerationReply, TextGenerationRequest};
use crate::config::SecretString;
use crate::http::{Authorization, HttpClient, RequestOptions};
use crate::providers::error::TransportError;
use crate::providers::format::FormattedPrompt;
use crate::providers::params::GenerationParameters;
use crate::providers::transport::{expect_text, RawResponse, Transport};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Key the text-generation server reads stop sequences from
const WIRE_STOP_KEY: &str = "stop";

/// Key the managed profiles keep stop sequences under
const PROFILE_STOP_KEY: &str = "stop_sequences";

/// Transport for a text-generation inference endpoint
pub struct InferenceEndpointTransport {
    http: HttpClient,
    endpoint_url: String,
    token: SecretString,
}

impl InferenceEndpointTransport {
    pub fn new(http: HttpClient, endpoint_url: impl Into<String>, token: SecretString) -> Self {
        Self {
            http,
            endpoint_url: endpoint_url.into(),
            token,
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Parameters as the server expects them
    fn wire_parameters(params: &GenerationParameters) -> serde_json::Map<String, Value> {
        let mut wire = params.as_map().clone();
        if let Some(stop) = wire.remove(PROFILE_STOP_KEY) {
            wire.insert(WIRE_STOP_KEY.to_string(), stop);
        }
        wire.insert("details".to_string(), Value::Bool(true));
        wire
    }
}

#[async_trait]
impl Transport for InferenceEndpointTransport {
    fn name(&self) -> &str {
        "inference-endpoint"
    }

    async fn invoke(
        &self,
        prompt: &FormattedPrompt,
        params: &GenerationParameters,
    ) -> Result<RawResponse, TransportError> {
        let request = TextGenerationRequest {
            inputs: expect_text(prompt, self.name())?,
            parameters: Self::wire_parameters(params),
            stream: false,
        };

        debug!("Sending {} prompt characters to {}", prompt.char_len(), self.endpoint_url);
        let reply: TextGenerationReply = self
            .http
            .post_json(
                &self.endpoint_url,
                &Authorization::Bearer(self.token.clone()),
                &request,
                RequestOptions::new(),
            )
            .await?;

        match reply {
            TextGenerationReply::One(output) => Ok(RawResponse::TextGeneration(output)),
            TextGenerationReply::Many(outputs) => outputs
                .into_iter()
                .next()
                .map(RawResponse::TextGeneration)
                .ok_or_else(|| {
                    TransportError::MalformedResponse("Text generation returned no outputs".to_string())
                }),
            TextGenerationReply::Text(text) => Ok(RawResponse::Text(text)),
        }
    }
}
