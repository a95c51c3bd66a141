//! Chatwrap Core Library
//!
//! Uniform multi-turn chat over heterogeneous text-generation backends: a
//! commercial chat-completions API, managed inference endpoints serving
//! Llama 2 or Falcon, and the MariTalk community endpoint.
//!
//! ```no_run
//! use chatwrap_core::config::{connect, BackendConfig};
//! use chatwrap_core::protocol::SessionSeed;
//! use chatwrap_core::providers::GenerationParameters;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BackendConfig::from_process_env("gpt-4")?;
//! let mut backend = connect(&config).await?;
//! backend.new_session(SessionSeed::System("You are terse.".into()))?;
//! let reply = backend.call("2+2?", &GenerationParameters::new()).await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod logging;
pub mod protocol;
pub mod providers;

pub use logging::{ConversationLog, LogRecord, MemoryLog, TracingLog};
pub use protocol::{ChatMessage, MessageRole, Session, SessionSeed};
pub use providers::{BackendError, BackendResult, ChatBackend, GenerationParameters};

/// Returns the version of the Chatwrap Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
