//! Errors raised while reading a backend catalog or building a backend config

use thiserror::Error;

/// Failure to turn a file or the environment into a usable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read backend catalog '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Syntax or shape error; `line`/`column` are 1-based when the parser knows them
    #[error("malformed backend catalog '{path}' ({}): {message}", location(.line, .column))]
    ParseError {
        path: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    /// A `${VAR}` placeholder or a per-model variable has no value
    #[error("variable '{var}' is unset or empty")]
    EnvVarNotFound { var: String },

    /// The model name matches no known backend prefix
    #[error("no backend serves model '{model}'")]
    UnknownModel { model: String },

    /// The catalog has no entry for the model
    #[error("model '{model}' is not in the backend catalog")]
    MissingBackend { model: String },
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!("line {line}, column {column}"),
        (Some(line), None) => format!("line {line}"),
        _ => "unknown position".to_string(),
    }
}

/// A field that parsed but holds an unusable value
///
/// `field_path` is dotted from the catalog root, e.g.
/// `backends.LLaMA-2-7b.endpoint_url`.
#[derive(Debug, Error)]
#[error("{field_path}: {kind}{}", context_suffix(.context))]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
    pub context: Option<String>,
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|context| format!(" ({context})"))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("missing")]
    RequiredFieldMissing,

    #[error("out of range, {message}")]
    OutOfRange { message: String },

    #[error("bad URL, {message}")]
    InvalidUrl { message: String },

    #[error("catalog version {actual} is not supported (expected {expected})")]
    InvalidVersion { expected: String, actual: String },

    /// Backend type does not fit the model it is configured for
    #[error("{message}")]
    Incompatible { message: String },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::RequiredFieldMissing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(field_path, ValidationErrorKind::OutOfRange { message })
    }

    pub fn invalid_url(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(field_path, ValidationErrorKind::InvalidUrl { message })
    }
}
