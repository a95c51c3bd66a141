//! Managed inference endpoints
//!
//! Text-generation servers hosted as managed endpoints. The prompt is sent as
//! one string; the endpoint's management API is used by the health probe.

mod client;
pub mod types;

pub use client::InferenceEndpointTransport;
pub use types::{FinishReason, GenerationDetails, GeneratedToken, TextGenerationOutput};
