//! Configuration for chat backends
//!
//! This module provides the configuration schema, loading, validation and the
//! step that turns a validated configuration into a connected backend.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{extract_env_vars, interpolate_env_vars, interpolate_with};
pub use error::{ConfigError, ValidationError, ValidationErrorKind};
pub use schema::{
    BackendConfig, BackendKind, CatalogConfig, InferenceEndpointConfig, ManagedTemplate,
    MaritalkConfig, OpenAiConfig, CONFIG_VERSION,
};
pub use secrets::{
    is_sensitive_name, redact_fields, redact_named, SafeLogging, SecretString, REDACTED,
};
pub use validator::ConfigValidator;

use crate::http::HttpClient;
use crate::providers::{
    BackendError, BackendResult, ChatBackend, EndpointHealthProbe, ErrorClassifier,
    InferenceEndpointTransport, MaritalkTransport, OpenAiTransport,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<CatalogConfig, ConfigError> {
    load_from_yaml_with(path, |var| std::env::var(var).ok())
}

/// Load a YAML configuration, resolving placeholders through `lookup`
pub fn load_from_yaml_with<P: AsRef<Path>>(
    path: P,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CatalogConfig, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;

    // Interpolate environment variables before parsing
    let interpolated = interpolate_with(&content, lookup)?;

    let config: CatalogConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<CatalogConfig, ConfigError> {
    load_from_json_with(path, |var| std::env::var(var).ok())
}

/// Load a JSON configuration, resolving placeholders through `lookup`
pub fn load_from_json_with<P: AsRef<Path>>(
    path: P,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CatalogConfig, ConfigError> {
    let path = path.as_ref();
    let content = read(path)?;
    let interpolated = interpolate_with(&content, lookup)?;

    let config: CatalogConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// Build a backend from its configuration
///
/// Commercial backends verify their credentials before this returns.
pub async fn connect(config: &BackendConfig) -> BackendResult<ChatBackend> {
    ConfigValidator::new()
        .validate_backend("backend", config)
        .map_err(|e| BackendError::Configuration(e.to_string()))?;
    info!("Connecting {}", config.safe_for_logging());

    let http = HttpClient::new()?;
    match config {
        BackendConfig::OpenAi(openai) => {
            let transport = OpenAiTransport::new(http, &openai.base_url, openai.api_key.clone())
                .with_request_timeout(Duration::from_secs(openai.request_timeout_secs));
            ChatBackend::openai(transport, openai.model.clone(), openai.retry.clone()).await
        }
        BackendConfig::InferenceEndpoint(endpoint) => {
            let transport = InferenceEndpointTransport::new(
                http.clone(),
                &endpoint.endpoint_url,
                endpoint.token.clone(),
            );
            let probe = EndpointHealthProbe::new(
                http,
                &endpoint.management_url,
                &endpoint.namespace,
                &endpoint.name,
                endpoint.token.clone(),
            );
            let classifier =
                ErrorClassifier::new(Arc::new(probe)).with_trigger(endpoint.probe_trigger.clone());

            let backend = match endpoint.template {
                ManagedTemplate::Llama2 => ChatBackend::llama2(transport, classifier),
                ManagedTemplate::Falcon => ChatBackend::falcon(transport, classifier),
            };
            Ok(backend.with_context_length(endpoint.context_length))
        }
        BackendConfig::Maritalk(maritalk) => Ok(ChatBackend::maritalk(MaritalkTransport::new(
            http,
            &maritalk.base_url,
            maritalk.api_key.clone(),
        ))),
    }
}
