//! Conversation Demo - one session against a configured backend
//!
//! The model name picks the backend:
//! - `gpt-3.5-turbo*` / `gpt-4*` need OPENAI_API_KEY
//! - `LLaMA-2*` / `Falcon*` need huggingface_token, huggingface_namespace and
//!   huggingface_<Model>_url / huggingface_<Model>_name (dashes removed)
//! - `maritalk` needs MARITALK_API_KEY
//!
//! Run with: cargo run --example conversation_demo -- gpt-3.5-turbo

use chatwrap_core::config::{connect, BackendConfig, SafeLogging};
use chatwrap_core::providers::Advisory;
use chatwrap_core::{GenerationParameters, SessionSeed, TracingLog};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("chatwrap_core=info,chatwrap::conversation=info")
        .init();

    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gpt-3.5-turbo".to_string());

    println!("\n💬 Chatwrap Conversation Demo\n");
    println!("=============================\n");

    let config = BackendConfig::from_process_env(&model)?;
    println!("Backend: {}", config.safe_for_logging());

    let mut chat = connect(&config).await?.with_log(Arc::new(TracingLog));
    println!(
        "Family: {} | Prompt format: {:?} | Transport: {}\n",
        chat.family(),
        chat.format(),
        chat.transport_name()
    );

    chat.new_session(SessionSeed::System(
        "You are a terse assistant. Answer with as few words as possible.".into(),
    ))?;

    let params = GenerationParameters::new().set("temperature", 0);
    for question in ["What is 2+2?", "And times 3?"] {
        println!("👤 {question}");
        match chat.call(question, &params).await {
            Ok(reply) => println!("🤖 {reply}\n"),
            Err(err) => {
                match err.advisory() {
                    Advisory::Wait => println!("⏳ Backend is starting up, try again later: {err}"),
                    Advisory::Blocking => println!("⛔ Backend is disabled: {err}"),
                    _ => println!("❌ {err}"),
                }
                return Ok(());
            }
        }
    }

    // Post-process hook: keep the first word only
    let reply = chat
        .call_with("Name a primary color.", &params, |text| {
            Ok(text.split_whitespace().next().unwrap_or_default().to_string())
        })
        .await?;
    println!("🤖 (first word) {reply}\n");

    println!("Session holds {} messages", chat.session().len());
    Ok(())
}
