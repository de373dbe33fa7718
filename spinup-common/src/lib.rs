use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub mod backup;
pub mod error;

pub use error::OrchestratorError;

// --- Enums ---

/// Position of the orchestrator's own state machine. Independent of the
/// provider-reported instance state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Idle,            // Nothing tracked
    Provisioning,    // Security group + launch in flight
    AwaitingNetwork, // Instance launched, polling for running + public address
    Configuring,     // Remote setup over ssh
    Running,         // Configured and serving
    Terminating,     // Terminate call in flight
    Failed,          // Instance launched but never reached Running; still tracked
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Idle => "idle",
            LifecyclePhase::Provisioning => "provisioning",
            LifecyclePhase::AwaitingNetwork => "awaiting_network",
            LifecyclePhase::Configuring => "configuring",
            LifecyclePhase::Running => "running",
            LifecyclePhase::Terminating => "terminating",
            LifecyclePhase::Failed => "failed",
        }
    }

    /// Edges of the lifecycle graph. Anything else is a programming error in
    /// the orchestrator.
    pub fn can_transition_to(&self, to: LifecyclePhase) -> bool {
        use LifecyclePhase::*;
        matches!(
            (self, to),
            (Idle, Provisioning)
                | (Provisioning, Idle)
                | (Provisioning, AwaitingNetwork)
                | (AwaitingNetwork, Configuring)
                | (AwaitingNetwork, Failed)
                | (AwaitingNetwork, Terminating)
                | (Configuring, Running)
                | (Configuring, Failed)
                | (Configuring, Terminating)
                | (Running, Terminating)
                | (Failed, Terminating)
                | (Terminating, Idle)
                | (Terminating, Failed)
        )
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Entities ---

fn default_ingress_protocol() -> String {
    "udp".to_string()
}

/// Immutable provisioning parameters, loaded once at startup.
///
/// Keys are accepted both in snake_case and camelCase. Port values are `u16`,
/// so anything outside [0, 65535] fails deserialization.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InstanceTemplate {
    #[serde(alias = "availabilityZone")]
    pub availability_zone: String,
    #[serde(alias = "securityGroupName")]
    pub security_group_name: String,
    #[serde(alias = "ingressPorts")]
    pub ingress_ports: Vec<u16>,
    #[serde(alias = "egressPorts")]
    pub egress_ports: Vec<u16>,
    pub ami: String,
    #[serde(alias = "keyName")]
    pub key_name: String,
    #[serde(alias = "instanceType")]
    pub instance_type: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default = "default_ingress_protocol", alias = "ingressProtocol")]
    pub ingress_protocol: String,
}

impl InstanceTemplate {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("cannot read template {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            OrchestratorError::Config(msg) => {
                OrchestratorError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, OrchestratorError> {
        let template: InstanceTemplate = serde_json::from_str(raw)
            .map_err(|e| OrchestratorError::Config(format!("invalid template: {}", e)))?;
        if template.ingress_protocol.trim().is_empty() {
            return Err(OrchestratorError::Config(
                "invalid template: ingress_protocol must not be empty".to_string(),
            ));
        }
        Ok(template)
    }

    /// Inclusive [min, max] span of the ingress ports, or `None` when no
    /// ingress rule should be created.
    pub fn ingress_range(&self) -> Option<(u16, u16)> {
        let min = self.ingress_ports.iter().copied().min()?;
        let max = self.ingress_ports.iter().copied().max()?;
        Some((min, max))
    }
}
