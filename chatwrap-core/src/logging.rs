//! Conversation log records
//!
//! Adapters report what happens in a conversation (messages, retries, replies
//! before post-processing) to an injected [`ConversationLog`]. Rendering and
//! persisting those records is up to the sink. Internal diagnostics go through
//! `tracing` independently of any sink.

use crate::protocol::ChatMessage;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Observation labels attached to records
pub mod observation {
    /// Assistant reply as produced by the backend, before the caller's hook
    pub const ASSISTANT_BEFORE_POST_PROCESS: &str = "assistant-before-post-process";
    /// Failed attempt
    pub const ERROR: &str = "Error";
    /// Informational note, e.g. a backoff wait
    pub const INFO: &str = "Info";
}

/// Text logged when a new session starts
pub const SESSION_START: &str = " --- NEW CHAT COMPLETION SESSION --- ";

/// Payload of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogContent {
    Text(String),
    Message(ChatMessage),
}

/// One entry of the conversation log
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub content: LogContent,
    pub observation: Option<String>,
    pub timestamp: SystemTime,
}

impl LogRecord {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: LogContent::Text(text.into()),
            observation: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn message(message: ChatMessage) -> Self {
        Self {
            content: LogContent::Message(message),
            observation: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }
}

/// Sink for conversation log records
pub trait ConversationLog: Send + Sync {
    fn record(&self, record: LogRecord);

    /// Persist buffered records, if the sink buffers
    fn flush(&self) {}
}

/// Forwards records to `tracing` under the `chatwrap::conversation` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl ConversationLog for TracingLog {
    fn record(&self, record: LogRecord) {
        let observation = record.observation.as_deref().unwrap_or("");
        match &record.content {
            LogContent::Text(text) => {
                tracing::info!(target: "chatwrap::conversation", observation, "{}", text);
            }
            LogContent::Message(message) => {
                tracing::info!(
                    target: "chatwrap::conversation",
                    observation,
                    role = message.role().as_str(),
                    "{}",
                    message.content()
                );
            }
        }
    }
}

/// Keeps records in memory until drained
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the buffered records
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Remove and return the buffered records
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConversationLog for MemoryLog {
    fn record(&self, record: LogRecord) {
        self.lock().push(record);
    }
}

/// Optional sink held by adapters and the retry executor
#[derive(Clone, Default)]
pub(crate) struct LogHandle(Option<Arc<dyn ConversationLog>>);

impl LogHandle {
    pub(crate) fn new(sink: Option<Arc<dyn ConversationLog>>) -> Self {
        Self(sink)
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    pub(crate) fn record(&self, record: LogRecord) {
        if let Some(sink) = &self.0 {
            sink.record(record);
        }
    }

    pub(crate) fn message(&self, message: &ChatMessage) {
        if self.is_enabled() {
            self.record(LogRecord::message(message.clone()));
        }
    }

    pub(crate) fn observe(&self, observation: &str, text: impl Into<String>) {
        if self.is_enabled() {
            self.record(LogRecord::text(text).with_observation(observation));
        }
    }

    pub(crate) fn flush(&self) {
        if let Some(sink) = &self.0 {
            sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_buffers_and_drains() {
        let log = MemoryLog::new();
        log.record(LogRecord::text("hello"));
        log.record(
            LogRecord::message(ChatMessage::user("hi").unwrap())
                .with_observation(observation::INFO),
        );
        assert_eq!(log.len(), 2);

        let records = log.take();
        assert!(log.is_empty());
        assert_eq!(records[0].content, LogContent::Text("hello".into()));
        assert_eq!(records[1].observation.as_deref(), Some("Info"));
    }

    #[test]
    fn test_disabled_handle_records_nothing() {
        let handle = LogHandle::default();
        assert!(!handle.is_enabled());
        handle.observe(observation::ERROR, "ignored");
        handle.flush();
    }

    #[test]
    fn test_handle_forwards_to_sink() {
        let sink = Arc::new(MemoryLog::new());
        let handle = LogHandle::new(Some(sink.clone() as Arc<dyn ConversationLog>));
        handle.message(&ChatMessage::assistant("4").unwrap());
        handle.observe(observation::ERROR, "boom");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].observation.as_deref(), Some("Error"));
    }
}
