//! Environment variable interpolation for configuration

use super::error::ConfigError;
use super::secrets::redact_named;
use regex::Regex;
use std::env;
use std::sync::OnceLock;
use tracing::debug;

/// `${NAME}` placeholder; names may be lower case
pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

/// Interpolate placeholders using `lookup` for their values
///
/// Fails on the first placeholder `lookup` has no value for.
pub fn interpolate_with(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut missing = None;
    let result = env_var_pattern().replace_all(content, |caps: &regex::Captures<'_>| {
        match lookup(&caps[1]) {
            Some(value) => {
                debug!("Resolved ${{{}}} to {}", &caps[1], redact_named(&caps[1], &value));
                value
            }
            None => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}

/// Names of the placeholders in `text`
pub fn extract_env_vars(text: &str) -> Vec<String> {
    env_var_pattern()
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .collect()
}
