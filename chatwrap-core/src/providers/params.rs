//! Generation parameters and their normalization
//!
//! Each backend carries a default parameter set. Every call builds a fresh
//! set from those defaults plus the caller's overrides, then patches values
//! the backend's sampler cannot handle. The defaults themselves are never
//! touched.

use crate::providers::error::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Replacement for a nucleus-sampling threshold of exactly 0
pub const TOP_P_FLOOR: f64 = 2e-4;

/// Replacement for a nucleus-sampling threshold of exactly 1
pub const TOP_P_CEILING: f64 = 0.9999999;

/// Replacement for a temperature of exactly 0
pub const TEMPERATURE_FLOOR: f64 = 0.001;

/// Caller-facing name of the stop-sequence option
pub const GENERIC_STOP_KEY: &str = "stop";

/// Option name to value mapping sent to a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationParameters(Map<String, Value>);

impl GenerationParameters {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Add caller stop sequences under the generic `stop` name
    pub fn with_stop<S: Into<String>>(self, sequences: impl IntoIterator<Item = S>) -> Self {
        let sequences: Vec<Value> = sequences
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        self.set(GENERIC_STOP_KEY, Value::Array(sequences))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric value of an option, if present and numeric
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for GenerationParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for GenerationParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Per-backend rules applied while normalizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationRules {
    /// Patch boundary values of `top_p` and `temperature`
    pub correct_degenerate: bool,

    /// Backend spelling of the stop-sequence list; `None` means the generic
    /// `stop` option is passed through as-is
    pub native_stop_key: Option<&'static str>,
}

impl NormalizationRules {
    /// Rules that leave the merged parameters untouched
    pub const fn passthrough() -> Self {
        Self {
            correct_degenerate: false,
            native_stop_key: None,
        }
    }
}

/// Merge caller overrides onto backend defaults
///
/// Works on an owned copy of `defaults`, so list-valued defaults such as stop
/// sequences are never shared with the result.
pub fn normalize(
    defaults: &GenerationParameters,
    overrides: &GenerationParameters,
    rules: NormalizationRules,
) -> BackendResult<GenerationParameters> {
    let mut params = defaults.clone();
    for (key, value) in overrides.iter() {
        params.insert(key.clone(), value.clone());
    }

    if rules.correct_degenerate {
        replace_exact(&mut params, "top_p", 0.0, TOP_P_FLOOR);
        replace_exact(&mut params, "top_p", 1.0, TOP_P_CEILING);
        replace_exact(&mut params, "temperature", 0.0, TEMPERATURE_FLOOR);
    }

    if let Some(native) = rules.native_stop_key.filter(|key| *key != GENERIC_STOP_KEY) {
        let existing = params
            .remove(native)
            .map(|value| string_list(native, value))
            .transpose()?;
        let extra = params
            .remove(GENERIC_STOP_KEY)
            .map(|value| string_list(GENERIC_STOP_KEY, value))
            .transpose()?;

        let merged = match (existing, extra) {
            (Some(mut list), Some(extra)) => {
                list.extend(extra);
                Some(list)
            }
            (list, None) | (None, list) => list,
        };
        if let Some(merged) = merged {
            params.insert(native, merged);
        }
    }

    Ok(params)
}

fn replace_exact(params: &mut GenerationParameters, key: &str, exact: f64, replacement: f64) {
    if params.get_f64(key) == Some(exact) {
        params.insert(key, replacement);
    }
}

fn string_list(name: &str, value: Value) -> BackendResult<Vec<String>> {
    let invalid = || BackendError::InvalidParameter {
        name: name.to_string(),
        message: "expected a string or a list of strings".to_string(),
    };

    match value {
        Value::String(single) => Ok(vec![single]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}
