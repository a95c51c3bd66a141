//! Credentials and redaction
//!
//! Backend keys and tokens are held in [`SecretString`] from the moment they
//! are read. Anything printed from a configuration goes through
//! [`redact_fields`], which blanks values under credential-like names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Placeholder printed instead of a credential
pub const REDACTED: &str = "[REDACTED]";

/// API key or token
///
/// Prints as [`REDACTED`]; serializes as the plain value.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The credential itself, for building request headers
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Blank or whitespace only
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Enough of the credential to tell two apart: `sk-...cdef`, `hf...kl`
    pub fn partial_redact(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let (head, tail) = if self.0.starts_with("sk-") { (3, 4) } else { (2, 2) };
        match chars.len() {
            0 => "[EMPTY]".to_string(),
            n if n <= 8 => REDACTED.to_string(),
            n => format!(
                "{}...{}",
                chars[..head].iter().collect::<String>(),
                chars[n - tail..].iter().collect::<String>()
            ),
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({REDACTED})")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Printable form with credentials removed
pub trait SafeLogging {
    fn safe_for_logging(&self) -> String;
}

/// Name segments that mark a credential, e.g. `api_key`, `huggingface_token`
const SENSITIVE_SEGMENTS: [&str; 7] = [
    "key",
    "token",
    "secret",
    "password",
    "credential",
    "auth",
    "authorization",
];

/// Whether a field or variable name holds a credential
///
/// Matches whole `_`/`-` separated segments, so `OPENAI_API_KEY` is sensitive
/// and `max_new_tokens` is not.
pub fn is_sensitive_name(name: &str) -> bool {
    name.split(['_', '-', '.'])
        .any(|segment| SENSITIVE_SEGMENTS.contains(&segment.to_ascii_lowercase().as_str()))
}

/// `value`, or [`REDACTED`] when `name` is sensitive
pub fn redact_named(name: &str, value: &str) -> String {
    if is_sensitive_name(name) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// Blank every value stored under a sensitive key, at any depth
pub fn redact_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if is_sensitive_name(key) && !field.is_null() {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact_fields(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_fields),
        _ => {}
    }
}
