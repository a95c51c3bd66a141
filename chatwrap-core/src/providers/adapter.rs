//! Backend adapter
//!
//! A [`ChatBackend`] owns one session and one transport. Each call appends the
//! user message, builds the prompt and parameters for the backend, invokes it
//! under the backend family's failure handling, and appends the reply.

use crate::logging::{observation, ConversationLog, LogHandle, LogRecord, SESSION_START};
use crate::protocol::{ChatMessage, Session, SessionSeed};
use crate::providers::classify::ErrorClassifier;
use crate::providers::error::{BackendError, BackendResult};
use crate::providers::format::{FormattedPrompt, PromptFormat};
use crate::providers::inference_endpoint::InferenceEndpointTransport;
use crate::providers::maritalk::MaritalkTransport;
use crate::providers::openai::OpenAiTransport;
use crate::providers::params::{normalize, GenerationParameters};
use crate::providers::profile::{BackendFamily, BackendProfile};
use crate::providers::retry::{RetryExecutor, RetryPolicy};
use crate::providers::transport::{RawResponse, Transport};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Option bounded by the token budget
pub const MAX_NEW_TOKENS: &str = "max_new_tokens";

/// Caller hook applied to the trimmed reply
pub type PostProcess<'a> = Box<dyn FnOnce(&str) -> anyhow::Result<String> + Send + 'a>;

/// What happens when an invocation fails
#[derive(Clone)]
pub enum FailureHandling {
    /// Retry transient failures with backoff
    Retry(RetryExecutor),
    /// Ask the endpoint what state it is in
    Classify(ErrorClassifier),
    /// Return the failure as is
    Propagate,
}

/// Prompt size in tokens, estimated at 2.5 characters per token
pub fn approx_prompt_tokens(prompt: &FormattedPrompt) -> usize {
    prompt.char_len() * 2 / 5
}

/// Multi-turn chat against one backend
pub struct ChatBackend {
    profile: BackendProfile,
    transport: Box<dyn Transport>,
    failure: FailureHandling,
    session: Session,
    log: LogHandle,
}

impl ChatBackend {
    /// Assemble a backend from its parts
    pub fn from_parts(
        profile: BackendProfile,
        transport: Box<dyn Transport>,
        failure: FailureHandling,
    ) -> Self {
        Self {
            profile,
            transport,
            failure,
            session: Session::new(),
            log: LogHandle::default(),
        }
    }

    /// Chat-completions backend; the API key is checked before returning
    pub async fn openai(
        transport: OpenAiTransport,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> BackendResult<Self> {
        transport.verify_credentials().await?;
        Ok(Self::from_parts(
            BackendProfile::openai_chat(model),
            Box::new(transport),
            FailureHandling::Retry(RetryExecutor::new(retry)),
        ))
    }

    /// Llama 2 behind a managed endpoint
    pub fn llama2(transport: InferenceEndpointTransport, classifier: ErrorClassifier) -> Self {
        Self::from_parts(
            BackendProfile::llama2(),
            Box::new(transport),
            FailureHandling::Classify(classifier),
        )
    }

    /// Falcon behind a managed endpoint
    pub fn falcon(transport: InferenceEndpointTransport, classifier: ErrorClassifier) -> Self {
        Self::from_parts(
            BackendProfile::falcon(),
            Box::new(transport),
            FailureHandling::Classify(classifier),
        )
    }

    pub fn maritalk(transport: MaritalkTransport) -> Self {
        Self::from_parts(
            BackendProfile::maritalk(),
            Box::new(transport),
            FailureHandling::Propagate,
        )
    }

    /// Send conversation records to `log`
    pub fn with_log(mut self, log: Arc<dyn ConversationLog>) -> Self {
        self.log = LogHandle::new(Some(log));
        if let FailureHandling::Retry(executor) = &mut self.failure {
            *executor = executor.clone().with_log_handle(self.log.clone());
        }
        self
    }

    /// Override the context window of the profile
    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.profile = self.profile.with_context_length(context_length);
        self
    }

    /// Discard the current session and start a new one
    pub fn new_session(&mut self, seed: SessionSeed) -> BackendResult<()> {
        let session = Session::from_seed(seed)?;

        self.log.record(LogRecord::text(SESSION_START));
        for message in &session {
            self.log.message(message);
        }
        self.session = session;
        Ok(())
    }

    /// Send `message` and return the reply
    pub async fn call(&mut self, message: &str, overrides: &GenerationParameters) -> BackendResult<String> {
        self.exchange(message, overrides, None).await
    }

    /// Send `message` and return the reply after `post_process`
    pub async fn call_with<F>(
        &mut self,
        message: &str,
        overrides: &GenerationParameters,
        post_process: F,
    ) -> BackendResult<String>
    where
        F: FnOnce(&str) -> anyhow::Result<String> + Send,
    {
        self.exchange(message, overrides, Some(Box::new(post_process)))
            .await
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn family(&self) -> BackendFamily {
        self.profile.family
    }

    pub fn format(&self) -> PromptFormat {
        self.profile.format
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    async fn exchange(
        &mut self,
        message: &str,
        overrides: &GenerationParameters,
        post_process: Option<PostProcess<'_>>,
    ) -> BackendResult<String> {
        let user = ChatMessage::user(message)?;
        self.log.message(&user);
        self.session.push(user);

        let mut params = normalize(&self.profile.defaults, overrides, self.profile.rules)?;
        let prompt = self.profile.format.format(self.session.messages())?;
        if self.profile.family == BackendFamily::Managed {
            self.fit_token_budget(&prompt, &mut params)?;
        }

        let raw = self.invoke(&prompt, &params).await?;
        let reply = raw.into_text()?.trim().to_string();
        debug!("{} replied with {} characters", self.transport.name(), reply.len());

        let reply = match post_process {
            Some(hook) => {
                let record = match ChatMessage::assistant(reply.as_str()) {
                    Ok(message) => LogRecord::message(message),
                    Err(_) => LogRecord::text(reply.as_str()),
                };
                self.log
                    .record(record.with_observation(observation::ASSISTANT_BEFORE_POST_PROCESS));
                hook(&reply).map_err(BackendError::PostProcess)?
            }
            None => reply,
        };

        let assistant = ChatMessage::assistant(reply.as_str())?;
        self.log.message(&assistant);
        self.session.push(assistant);
        Ok(reply)
    }

    async fn invoke(
        &self,
        prompt: &FormattedPrompt,
        params: &GenerationParameters,
    ) -> BackendResult<RawResponse> {
        let transport = self.transport.as_ref();
        match &self.failure {
            FailureHandling::Retry(executor) => {
                executor.execute(|| transport.invoke(prompt, params)).await
            }
            FailureHandling::Classify(classifier) => match transport.invoke(prompt, params).await {
                Ok(raw) => Ok(raw),
                Err(error) => Err(classifier.classify(error).await),
            },
            FailureHandling::Propagate => Ok(transport.invoke(prompt, params).await?),
        }
    }

    /// Shrink `max_new_tokens` so prompt and completion fit the context window
    fn fit_token_budget(
        &self,
        prompt: &FormattedPrompt,
        params: &mut GenerationParameters,
    ) -> BackendResult<()> {
        let Some(value) = params.get(MAX_NEW_TOKENS) else {
            return Ok(());
        };
        let requested = requested_tokens(value)?;

        let prompt_tokens = approx_prompt_tokens(prompt);
        let mut budget = requested;
        if prompt_tokens as i64 > requested {
            if let Some(context_length) = self.profile.context_length {
                budget = context_length as i64 - prompt_tokens as i64;
                if budget <= 0 {
                    return Err(BackendError::PromptTooLong {
                        prompt_tokens,
                        context_length,
                    });
                }
                info!(
                    "Prompt of ~{} tokens, lowering {} from {} to {}",
                    prompt_tokens, MAX_NEW_TOKENS, requested, budget
                );
            }
        }
        params.insert(MAX_NEW_TOKENS, budget);
        Ok(())
    }
}

/// Read `max_new_tokens` as a positive whole number
///
/// Accepts any JSON number with no fractional part, so `10` and `10.0` agree.
fn requested_tokens(value: &Value) -> BackendResult<i64> {
    let invalid = |message: String| BackendError::InvalidParameter {
        name: MAX_NEW_TOKENS.to_string(),
        message,
    };

    let Some(number) = value.as_f64() else {
        return Err(invalid(format!("expected a number, got {}", value)));
    };
    if number.fract() != 0.0 {
        return Err(invalid(format!("expected a whole number, got {}", number)));
    }
    if number < 1.0 {
        return Err(invalid(format!("must be positive, got {}", number)));
    }
    // Saturates above i64::MAX
    Ok(number as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogContent, MemoryLog};
    use crate::providers::error::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed text and remembers what it was sent
    struct Canned {
        reply: String,
        sent: Arc<Mutex<Vec<(FormattedPrompt, GenerationParameters)>>>,
    }

    impl Canned {
        fn new(reply: &str) -> (Self, Arc<Mutex<Vec<(FormattedPrompt, GenerationParameters)>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    reply: reply.to_string(),
                    sent: sent.clone(),
                },
                sent,
            )
        }
    }

    #[async_trait]
    impl Transport for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn invoke(
            &self,
            prompt: &FormattedPrompt,
            params: &GenerationParameters,
        ) -> Result<RawResponse, TransportError> {
            self.sent.lock().unwrap().push((prompt.clone(), params.clone()));
            Ok(RawResponse::Text(self.reply.clone()))
        }
    }

    struct Failing;

    #[async_trait]
    impl Transport for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn invoke(
            &self,
            _prompt: &FormattedPrompt,
            _params: &GenerationParameters,
        ) -> Result<RawResponse, TransportError> {
            Err(TransportError::Connection("refused".into()))
        }
    }

    fn community(reply: &str) -> ChatBackend {
        let (transport, _) = Canned::new(reply);
        ChatBackend::from_parts(
            BackendProfile::maritalk(),
            Box::new(transport),
            FailureHandling::Propagate,
        )
    }

    #[tokio::test]
    async fn test_call_appends_user_and_assistant() {
        let mut backend = community(" 4\n");
        backend
            .new_session(SessionSeed::System("You are terse.".into()))
            .unwrap();

        let reply = backend.call("2+2?", &GenerationParameters::new()).await.unwrap();
        assert_eq!(reply, "4");
        assert_eq!(backend.session().len(), 3);
        assert_eq!(backend.session().last().unwrap().content(), "4");
    }

    #[tokio::test]
    async fn test_failure_keeps_user_message() {
        let mut backend = ChatBackend::from_parts(
            BackendProfile::maritalk(),
            Box::new(Failing),
            FailureHandling::Propagate,
        );
        let err = backend.call("hello", &GenerationParameters::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(TransportError::Connection(_))));
        assert_eq!(backend.session().len(), 1);
    }

    #[tokio::test]
    async fn test_post_process_sees_trimmed_reply() {
        let mut backend = community("  (B)  ");
        let reply = backend
            .call_with("pick one", &GenerationParameters::new(), |text| {
                Ok(text.trim_matches(|c| c == '(' || c == ')').to_string())
            })
            .await
            .unwrap();
        assert_eq!(reply, "B");
        assert_eq!(backend.session().last().unwrap().content(), "B");
    }

    #[tokio::test]
    async fn test_post_process_failure_appends_nothing() {
        let mut backend = community("4");
        let err = backend
            .call_with("2+2?", &GenerationParameters::new(), |_| {
                Err(anyhow::anyhow!("no letter found"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::PostProcess(_)));
        assert_eq!(backend.session().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_is_rejected() {
        let mut backend = community("   ");
        let err = backend.call("hi", &GenerationParameters::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Message(_)));
        assert_eq!(backend.session().len(), 1);
    }

    #[tokio::test]
    async fn test_log_records_conversation() {
        let log = Arc::new(MemoryLog::new());
        let mut backend = community("4").with_log(log.clone());
        backend.new_session(SessionSeed::System("S".into())).unwrap();
        backend
            .call_with("2+2?", &GenerationParameters::new(), |t| Ok(t.to_string()))
            .await
            .unwrap();

        let records = log.take();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].content, LogContent::Text(SESSION_START.into()));
        assert_eq!(
            records[3].observation.as_deref(),
            Some(observation::ASSISTANT_BEFORE_POST_PROCESS)
        );
        assert!(records[4].observation.is_none());
    }

    #[tokio::test]
    async fn test_managed_budget_lowers_max_new_tokens() {
        let (transport, sent) = Canned::new("ok");
        let mut backend = ChatBackend::from_parts(
            BackendProfile::falcon(),
            Box::new(transport),
            FailureHandling::Propagate,
        );
        let long = "x".repeat(1_000);
        backend
            .call(&long, &GenerationParameters::new().set(MAX_NEW_TOKENS, 10))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        let (prompt, params) = &sent[0];
        let expected = 4096 - approx_prompt_tokens(prompt) as i64;
        assert_eq!(params.get(MAX_NEW_TOKENS).and_then(Value::as_i64), Some(expected));
    }

    #[tokio::test]
    async fn test_float_max_new_tokens_is_budgeted() {
        let (transport, sent) = Canned::new("ok");
        let mut backend = ChatBackend::from_parts(
            BackendProfile::falcon(),
            Box::new(transport),
            FailureHandling::Propagate,
        );
        let long = "x".repeat(1_000);
        backend
            .call(&long, &GenerationParameters::new().set(MAX_NEW_TOKENS, 10.0))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        let (prompt, params) = &sent[0];
        let expected = 4096 - approx_prompt_tokens(prompt) as i64;
        assert_eq!(params.get(MAX_NEW_TOKENS).and_then(Value::as_i64), Some(expected));
    }

    #[tokio::test]
    async fn test_whole_float_is_sent_as_integer() {
        let (transport, sent) = Canned::new("ok");
        let mut backend = ChatBackend::from_parts(
            BackendProfile::llama2(),
            Box::new(transport),
            FailureHandling::Propagate,
        );
        backend
            .call("hi", &GenerationParameters::new().set(MAX_NEW_TOKENS, 512.0))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].1.get(MAX_NEW_TOKENS), Some(&serde_json::json!(512)));
    }

    #[tokio::test]
    async fn test_float_max_new_tokens_still_hits_context_limit() {
        let (transport, sent) = Canned::new("ok");
        let mut backend = ChatBackend::from_parts(
            BackendProfile::llama2(),
            Box::new(transport),
            FailureHandling::Propagate,
        );
        let huge = "x".repeat(20_000);
        let err = backend
            .call(&huge, &GenerationParameters::new().set(MAX_NEW_TOKENS, 10.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::PromptTooLong { .. }));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_max_new_tokens_is_rejected_before_sending() {
        let invalid: [Value; 5] = [
            serde_json::json!(-5.0),
            serde_json::json!(0),
            serde_json::json!(10.5),
            serde_json::json!("512"),
            Value::Null,
        ];
        for value in invalid {
            let (transport, sent) = Canned::new("ok");
            let mut backend = ChatBackend::from_parts(
                BackendProfile::llama2(),
                Box::new(transport),
                FailureHandling::Propagate,
            );
            let huge = "x".repeat(20_000);
            let err = backend
                .call(&huge, &GenerationParameters::new().set(MAX_NEW_TOKENS, value.clone()))
                .await
                .unwrap_err();
            assert!(
                matches!(err, BackendError::InvalidParameter { ref name, .. } if name == MAX_NEW_TOKENS),
                "{value} gave {err:?}"
            );
            assert!(sent.lock().unwrap().is_empty());
            // The user message stays
            assert_eq!(backend.session().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_prompt_too_long_fails_before_sending() {
        let (transport, sent) = Canned::new("ok");
        let mut backend = ChatBackend::from_parts(
            BackendProfile::llama2(),
            Box::new(transport),
            FailureHandling::Propagate,
        );
        let huge = "x".repeat(20_000);
        let err = backend.call(&huge, &GenerationParameters::new()).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::PromptTooLong {
                context_length: 4096,
                ..
            }
        ));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let (transport, sent) = Canned::new("ok");
        let mut backend = ChatBackend::from_parts(
            BackendProfile::falcon(),
            Box::new(transport),
            FailureHandling::Propagate,
        );
        backend
            .new_session(SessionSeed::Transcript(vec![ChatMessage::assistant("Hi").unwrap()]))
            .unwrap();
        let err = backend.call("hello", &GenerationParameters::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_approx_tokens_floors() {
        assert_eq!(approx_prompt_tokens(&FormattedPrompt::Text("abcde".into())), 2);
        assert_eq!(approx_prompt_tokens(&FormattedPrompt::Text("abcdef".into())), 2);
        assert_eq!(approx_prompt_tokens(&FormattedPrompt::Text("abcdefg".into())), 2);
        assert_eq!(approx_prompt_tokens(&FormattedPrompt::Text("abcdefghij".into())), 4);
    }
}
