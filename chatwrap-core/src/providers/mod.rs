//! Backend adapters
//!
//! This module implements the layer between a chat session and the hosted
//! model backends: parameter normalization, prompt formats, transports,
//! failure classification and retry, and the adapter tying them together.

pub mod adapter;
pub mod classify;
pub mod error;
pub mod format;
pub mod health;
pub mod inference_endpoint;
pub mod maritalk;
pub mod openai;
pub mod params;
pub mod profile;
pub mod retry;
pub mod transport;

pub use adapter::{approx_prompt_tokens, ChatBackend, FailureHandling, PostProcess};
pub use classify::{ErrorClassifier, ProbeTrigger};
pub use error::{Advisory, BackendError, BackendResult, TransportError, TransportErrorKind};
pub use format::{FormattedPrompt, PromptFormat, PromptFormatError};
pub use health::{EndpointHealthProbe, EndpointState, HealthProbe, ProbeOutcome};
pub use inference_endpoint::InferenceEndpointTransport;
pub use maritalk::MaritalkTransport;
pub use openai::OpenAiTransport;
pub use params::{normalize, GenerationParameters, NormalizationRules};
pub use profile::{BackendFamily, BackendProfile};
pub use retry::{RetryExecutor, RetryPolicy, RetryReport};
pub use transport::{RawResponse, Transport};
