//! Endpoint health probing
//!
//! A probe is one best-effort read of a managed endpoint's state. It is used
//! only to explain a failure that already happened, never on the primary call
//! path, and it is never retried.

use crate::config::SecretString;
use crate::http::{Authorization, HttpClient, RequestOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Default base URL of the managed-endpoint management API
pub const DEFAULT_MANAGEMENT_URL: &str = "https://api.endpoints.huggingface.cloud";

/// Operational state reported by the management API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointState {
    Pending,
    Initializing,
    Updating,
    UpdateFailed,
    Running,
    Paused,
    Failed,
    ScaledToZero,
    #[serde(other)]
    Unknown,
}

impl EndpointState {
    /// Parse the wire spelling; anything unrecognised is `Unknown`
    pub fn from_wire(state: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(state.to_string()))
            .unwrap_or(EndpointState::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointState::Pending => "pending",
            EndpointState::Initializing => "initializing",
            EndpointState::Updating => "updating",
            EndpointState::UpdateFailed => "updateFailed",
            EndpointState::Running => "running",
            EndpointState::Paused => "paused",
            EndpointState::Failed => "failed",
            EndpointState::ScaledToZero => "scaledToZero",
            EndpointState::Unknown => "unknown",
        }
    }

    /// States in which the endpoint will come up on its own
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            EndpointState::ScaledToZero | EndpointState::Initializing | EndpointState::Updating
        )
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// HTTP status of the management call; 0 when no response arrived
    pub status: u16,

    /// Reported state; only present when `status` is 200
    pub state: Option<EndpointState>,
}

impl ProbeOutcome {
    pub fn running(state: EndpointState) -> Self {
        Self {
            status: 200,
            state: Some(state),
        }
    }

    pub fn failed(status: u16) -> Self {
        Self {
            status,
            state: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Source of endpoint health information
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}

#[derive(Deserialize)]
struct EndpointDescription {
    status: EndpointStatus,
}

#[derive(Deserialize)]
struct EndpointStatus {
    state: String,
}

/// Probe against the management API of a managed inference endpoint
pub struct EndpointHealthProbe {
    http: HttpClient,
    management_url: String,
    namespace: String,
    name: String,
    token: SecretString,
}

impl EndpointHealthProbe {
    pub fn new(
        http: HttpClient,
        management_url: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        token: SecretString,
    ) -> Self {
        Self {
            http,
            management_url: management_url.into(),
            namespace: namespace.into(),
            name: name.into(),
            token,
        }
    }

    /// URL of the endpoint description
    pub fn url(&self) -> String {
        format!(
            "{}/v2/endpoint/{}/{}",
            self.management_url.trim_end_matches('/'),
            self.namespace,
            self.name
        )
    }
}

#[async_trait]
impl HealthProbe for EndpointHealthProbe {
    async fn probe(&self) -> ProbeOutcome {
        let url = self.url();
        let auth = Authorization::Bearer(self.token.clone());

        let reply = match self.http.get_raw(&url, &auth, RequestOptions::new()).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Health probe for {} got no response: {}", self.name, err);
                return ProbeOutcome::failed(0);
            }
        };

        let status = reply.status.as_u16();
        if status != 200 {
            debug!("Health probe for {} returned status {}", self.name, status);
            return ProbeOutcome::failed(status);
        }

        let state = serde_json::from_str::<EndpointDescription>(&reply.body)
            .map(|d| EndpointState::from_wire(&d.status.state))
            .unwrap_or(EndpointState::Unknown);
        debug!("Endpoint {} is {}", self.name, state);
        ProbeOutcome::running(state)
    }
}
