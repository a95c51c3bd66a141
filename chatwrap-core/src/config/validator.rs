//! Configuration validation utilities

use super::env::extract_env_vars;
use super::error::{ValidationError, ValidationErrorKind};
use super::schema::{BackendConfig, CatalogConfig};
use tracing::warn;
use url::Url;

/// Checks what serde and the schema cannot: that every URL parses and uses
/// a supported scheme, and that no `${VAR}` placeholder was left behind
///
/// Plain `http` endpoints are accepted with a warning.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a whole catalog: schema rules first, then every backend's URLs
    pub fn validate(&self, config: &CatalogConfig) -> Result<(), ValidationError> {
        config.validate()?;

        for (model, backend) in &config.backends {
            self.validate_urls(&format!("backends.{model}"), backend)?;
        }
        Ok(())
    }

    /// Validate a single backend configuration
    pub fn validate_backend(&self, path: &str, backend: &BackendConfig) -> Result<(), ValidationError> {
        backend.validate(path)?;
        self.validate_urls(path, backend)
    }

    fn validate_urls(&self, path: &str, backend: &BackendConfig) -> Result<(), ValidationError> {
        for (field, value) in backend.urls(path) {
            self.validate_url(&field, value)?;
        }
        Ok(())
    }

    fn validate_url(&self, field: &str, value: &str) -> Result<(), ValidationError> {
        let leftover = extract_env_vars(value);
        if !leftover.is_empty() {
            return Err(ValidationError::invalid_url(
                field,
                format!("unresolved placeholder ${{{}}}", leftover[0]),
            ));
        }

        let url = Url::parse(value)
            .map_err(|e| ValidationError::invalid_url(field, format!("'{}': {}", value, e)))?;

        match url.scheme() {
            "https" => Ok(()),
            "http" => {
                warn!("{} uses plain http: {}", field, value);
                Ok(())
            }
            other => Err(ValidationError::new(
                field,
                ValidationErrorKind::InvalidUrl {
                    message: format!("unsupported scheme '{}'", other),
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaritalkConfig, OpenAiConfig, SecretString};

    #[test]
    fn test_valid_backend() {
        let backend = BackendConfig::OpenAi(OpenAiConfig::new("gpt-4", SecretString::new("sk-x")));
        assert!(ConfigValidator::new().validate_backend("b", &backend).is_ok());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let mut config = MaritalkConfig::new(SecretString::new("key"));
        config.base_url = "not a url".to_string();
        let err = ConfigValidator::new()
            .validate_backend("backends.maritalk", &BackendConfig::Maritalk(config))
            .unwrap_err();
        assert_eq!(err.field_path, "backends.maritalk.base_url");
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }

    #[test]
    fn test_unsupported_scheme() {
        let mut config = MaritalkConfig::new(SecretString::new("key"));
        config.base_url = "ftp://chat.example.com".to_string();
        let err = ConfigValidator::new()
            .validate_backend("b", &BackendConfig::Maritalk(config))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_plain_http_is_accepted() {
        let mut config = MaritalkConfig::new(SecretString::new("key"));
        config.base_url = "http://127.0.0.1:8080".to_string();
        assert!(ConfigValidator::new()
            .validate_backend("b", &BackendConfig::Maritalk(config))
            .is_ok());
    }

    #[test]
    fn test_leftover_placeholder_is_rejected() {
        let mut config = MaritalkConfig::new(SecretString::new("key"));
        config.base_url = "https://${MARITALK_HOST}".to_string();
        let err = ConfigValidator::new()
            .validate_backend("b", &BackendConfig::Maritalk(config))
            .unwrap_err();
        assert!(err.to_string().contains("MARITALK_HOST"));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let backend = BackendConfig::OpenAi(OpenAiConfig::new("gpt-4", SecretString::new("")));
        let err = ConfigValidator::new().validate_backend("b", &backend).unwrap_err();
        assert_eq!(err.field_path, "b.api_key");
    }
}
