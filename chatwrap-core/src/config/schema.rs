//! Configuration schema structures with serde support

use super::error::{ConfigError, ValidationError, ValidationErrorKind};
use super::secrets::{redact_fields, redact_named, SafeLogging, SecretString};
use crate::providers::classify::ProbeTrigger;
use crate::providers::health::DEFAULT_MANAGEMENT_URL;
use crate::providers::profile::{BackendFamily, MANAGED_CONTEXT_LENGTH};
use crate::providers::retry::RetryPolicy;
use crate::providers::{maritalk, openai};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Schema version understood by this crate
pub const CONFIG_VERSION: &str = "0.1";

/// Backend selected for a model name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[serde(rename = "openai")]
    OpenAi,
    Llama2,
    Falcon,
    Maritalk,
}

impl BackendKind {
    /// Pick the backend from the model name prefix
    pub fn from_model_name(model: &str) -> Result<Self, ConfigError> {
        if model.starts_with("gpt-3.5-turbo") || model.starts_with("gpt-4") {
            Ok(BackendKind::OpenAi)
        } else if model.starts_with("LLaMA-2") {
            Ok(BackendKind::Llama2)
        } else if model.starts_with("Falcon") {
            Ok(BackendKind::Falcon)
        } else if model.starts_with("MariTalk") || model.starts_with("maritalk") {
            Ok(BackendKind::Maritalk)
        } else {
            Err(ConfigError::UnknownModel {
                model: model.to_string(),
            })
        }
    }

    pub fn family(&self) -> BackendFamily {
        match self {
            BackendKind::OpenAi => BackendFamily::Commercial,
            BackendKind::Llama2 | BackendKind::Falcon => BackendFamily::Managed,
            BackendKind::Maritalk => BackendFamily::Community,
        }
    }
}

/// Prompt template of a managed endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedTemplate {
    Llama2,
    Falcon,
}

/// Connection settings of one backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    #[serde(rename = "openai")]
    OpenAi(OpenAiConfig),
    InferenceEndpoint(InferenceEndpointConfig),
    Maritalk(MaritalkConfig),
}

/// Commercial chat-completions API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// Model sent with every request
    pub model: String,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl OpenAiConfig {
    pub fn new(model: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: default_openai_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Managed inference endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceEndpointConfig {
    pub template: ManagedTemplate,

    /// URL the generation requests are posted to
    pub endpoint_url: String,

    /// Token for both inference and management calls
    pub token: SecretString,

    /// Account or organization owning the endpoint
    pub namespace: String,

    /// Endpoint name within the namespace
    pub name: String,

    #[serde(default = "default_management_url")]
    pub management_url: String,

    #[serde(default)]
    pub probe_trigger: ProbeTrigger,

    /// Must match the container configuration of the endpoint
    #[serde(default = "default_context_length")]
    pub context_length: usize,
}

/// Community endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MaritalkConfig {
    pub api_key: SecretString,

    #[serde(default = "default_maritalk_base_url")]
    pub base_url: String,
}

impl MaritalkConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: default_maritalk_base_url(),
        }
    }
}

impl BackendConfig {
    /// Build the configuration of `model` from environment-style variables
    ///
    /// `lookup` returns the value of a variable, or `None` when it is unset.
    pub fn from_env(
        model: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let require = |var: &str| -> Result<String, ConfigError> {
            let value = lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::EnvVarNotFound {
                    var: var.to_string(),
                })?;
            debug!("{} = {}", var, redact_named(var, &value));
            Ok(value)
        };

        match BackendKind::from_model_name(model)? {
            BackendKind::OpenAi => Ok(BackendConfig::OpenAi(OpenAiConfig::new(
                model,
                SecretString::new(require("OPENAI_API_KEY")?),
            ))),
            kind @ (BackendKind::Llama2 | BackendKind::Falcon) => {
                let key = model.replace('-', "");
                Ok(BackendConfig::InferenceEndpoint(InferenceEndpointConfig {
                    template: if kind == BackendKind::Llama2 {
                        ManagedTemplate::Llama2
                    } else {
                        ManagedTemplate::Falcon
                    },
                    endpoint_url: require(&format!("huggingface_{}_url", key))?,
                    token: SecretString::new(require("huggingface_token")?),
                    namespace: require("huggingface_namespace")?,
                    name: require(&format!("huggingface_{}_name", key))?,
                    management_url: default_management_url(),
                    probe_trigger: ProbeTrigger::default(),
                    context_length: default_context_length(),
                }))
            }
            BackendKind::Maritalk => Ok(BackendConfig::Maritalk(MaritalkConfig::new(
                SecretString::new(require("MARITALK_API_KEY")?),
            ))),
        }
    }

    /// [`BackendConfig::from_env`] against the process environment
    pub fn from_process_env(model: &str) -> Result<Self, ConfigError> {
        Self::from_env(model, |var| std::env::var(var).ok())
    }

    pub fn family(&self) -> BackendFamily {
        match self {
            BackendConfig::OpenAi(_) => BackendFamily::Commercial,
            BackendConfig::InferenceEndpoint(_) => BackendFamily::Managed,
            BackendConfig::Maritalk(_) => BackendFamily::Community,
        }
    }

    /// Check the fields that serde cannot
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        match self {
            BackendConfig::OpenAi(config) => {
                require_secret(&format!("{path}.api_key"), &config.api_key)?;
                if config.model.trim().is_empty() {
                    return Err(ValidationError::required(format!("{path}.model")));
                }
                if config.request_timeout_secs == 0 {
                    return Err(ValidationError::out_of_range(
                        format!("{path}.request_timeout_secs"),
                        "must be greater than 0",
                    ));
                }
                if config.retry.exponential_base < 1.0 {
                    return Err(ValidationError::out_of_range(
                        format!("{path}.retry.exponential_base"),
                        format!("must be at least 1, got {}", config.retry.exponential_base),
                    ));
                }
            }
            BackendConfig::InferenceEndpoint(config) => {
                require_secret(&format!("{path}.token"), &config.token)?;
                for (field, value) in [("namespace", &config.namespace), ("name", &config.name)] {
                    if value.trim().is_empty() {
                        return Err(ValidationError::required(format!("{path}.{field}")));
                    }
                }
                if config.context_length == 0 {
                    return Err(ValidationError::out_of_range(
                        format!("{path}.context_length"),
                        "must be greater than 0",
                    ));
                }
            }
            BackendConfig::Maritalk(config) => {
                require_secret(&format!("{path}.api_key"), &config.api_key)?;
            }
        }
        Ok(())
    }

    /// URL-valued fields with their paths, for URL validation
    pub(crate) fn urls<'a>(&'a self, path: &str) -> Vec<(String, &'a str)> {
        match self {
            BackendConfig::OpenAi(config) => vec![(format!("{path}.base_url"), config.base_url.as_str())],
            BackendConfig::InferenceEndpoint(config) => vec![
                (format!("{path}.endpoint_url"), config.endpoint_url.as_str()),
                (format!("{path}.management_url"), config.management_url.as_str()),
            ],
            BackendConfig::Maritalk(config) => vec![(format!("{path}.base_url"), config.base_url.as_str())],
        }
    }
}

impl SafeLogging for BackendConfig {
    /// Compact JSON with credential-named fields blanked
    fn safe_for_logging(&self) -> String {
        redacted_json(self)
    }
}

impl SafeLogging for CatalogConfig {
    fn safe_for_logging(&self) -> String {
        redacted_json(self)
    }
}

fn redacted_json<T: Serialize>(config: &T) -> String {
    match serde_json::to_value(config) {
        Ok(mut value) => {
            redact_fields(&mut value);
            value.to_string()
        }
        Err(e) => format!("<unprintable configuration: {e}>"),
    }
}

/// Root of a configuration file: one backend per model name
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Schema version (required - no default)
    pub version: String,

    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

impl CatalogConfig {
    /// Configuration of `model`
    pub fn backend(&self, model: &str) -> Result<&BackendConfig, ConfigError> {
        self.backends.get(model).ok_or_else(|| ConfigError::MissingBackend {
            model: model.to_string(),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        for (model, backend) in &self.backends {
            let path = format!("backends.{model}");
            backend.validate(&path)?;

            if let Ok(kind) = BackendKind::from_model_name(model) {
                if kind.family() != backend.family() {
                    return Err(ValidationError::new(
                        path,
                        ValidationErrorKind::Incompatible {
                            message: format!(
                                "model '{}' needs a {} backend, got {}",
                                model,
                                kind.family(),
                                backend.family()
                            ),
                        },
                    ));
                }
            }
        }
        Ok(())
    }
}

fn require_secret(path: &str, secret: &SecretString) -> Result<(), ValidationError> {
    if secret.is_empty() {
        return Err(ValidationError::required(path).with_context("credential must not be empty"));
    }
    Ok(())
}

fn default_openai_base_url() -> String {
    openai::DEFAULT_BASE_URL.to_string()
}

fn default_maritalk_base_url() -> String {
    maritalk::DEFAULT_BASE_URL.to_string()
}

fn default_management_url() -> String {
    DEFAULT_MANAGEMENT_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    openai::REQUEST_TIMEOUT.as_secs()
}

fn default_context_length() -> usize {
    MANAGED_CONTEXT_LENGTH
}
