//! Failure classification for managed endpoints
//!
//! When an inference call fails, the endpoint's management API is asked what
//! state the endpoint is in. A paused endpoint becomes `Disabled`, a cold or
//! scaling one becomes `Loading`, and everything else keeps the original
//! failure untouched.

use crate::providers::error::{BackendError, TransportError, TransportErrorKind};
use crate::providers::health::{EndpointState, HealthProbe};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Which failures are worth a health probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeTrigger {
    /// Probe on every failure
    #[default]
    AnyFailure,
    /// Probe only on failures of these kinds
    Kinds(Vec<TransportErrorKind>),
}

impl ProbeTrigger {
    pub fn matches(&self, error: &TransportError) -> bool {
        match self {
            ProbeTrigger::AnyFailure => true,
            ProbeTrigger::Kinds(kinds) => kinds.contains(&error.kind()),
        }
    }
}

/// Turns raw transport failures into typed backend errors
#[derive(Clone)]
pub struct ErrorClassifier {
    probe: Arc<dyn HealthProbe>,
    trigger: ProbeTrigger,
}

impl ErrorClassifier {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            probe,
            trigger: ProbeTrigger::default(),
        }
    }

    pub fn with_trigger(mut self, trigger: ProbeTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn trigger(&self) -> &ProbeTrigger {
        &self.trigger
    }

    /// Classify a failed inference call
    pub async fn classify(&self, error: TransportError) -> BackendError {
        if !self.trigger.matches(&error) {
            debug!("Not probing endpoint health for {:?} failure", error.kind());
            return BackendError::Transport(error);
        }

        let outcome = self.probe.probe().await;
        match outcome.state {
            Some(EndpointState::Paused) if outcome.is_success() => {
                info!("Endpoint is paused");
                BackendError::Disabled { source: error }
            }
            Some(state) if outcome.is_success() && state.is_loading() => {
                info!("Endpoint is loading ({})", state);
                BackendError::Loading {
                    state,
                    source: error,
                }
            }
            _ => BackendError::Transport(error),
        }
    }
}
