//! OpenAI chat-completions backend
//!
//! Talks to the commercial chat API, or anything that speaks its wire format.

mod client;
pub mod types;

pub use client::{OpenAiTransport, DEFAULT_BASE_URL, REQUEST_TIMEOUT};
pub use types::{ChatCompletionRequest, ChatCompletionResponse};
