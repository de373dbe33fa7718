use serde::Serialize;
use spinup_common::LifecyclePhase;

use crate::logger;

/// Record a phase transition.
fn log_state_transition(instance_id: Option<&str>, from: LifecyclePhase, to: LifecyclePhase, reason: &str) {
    tracing::info!(
        instance_id = instance_id.unwrap_or("-"),
        from = from.as_str(),
        to = to.as_str(),
        reason,
        "lifecycle transition"
    );
}

/// The single process-wide lifecycle record. Only the orchestrator holds it.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    pub phase: LifecyclePhase,
    pub instance_id: Option<String>,
    pub backup_name: Option<String>,
    pub address: Option<String>,
    /// Bumped by every stop so an overtaken start can tell it lost the slot.
    pub epoch: u64,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            phase: LifecyclePhase::Idle,
            instance_id: None,
            backup_name: None,
            address: None,
            epoch: 0,
        }
    }
}

/// Read-only copy of the lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleSnapshot {
    pub phase: LifecyclePhase,
    pub instance_id: Option<String>,
    pub backup_name: Option<String>,
    pub address: Option<String>,
}

impl LifecycleState {
    /// Move to `to` (idempotent). Returns false when already there or when
    /// the edge is not part of the lifecycle graph.
    pub fn transition(&mut self, to: LifecyclePhase, reason: &str) -> bool {
        let from = self.phase;
        if from == to {
            return false;
        }
        if !from.can_transition_to(to) {
            let log_id = logger::log_event_with_metadata(
                "LIFECYCLE_TRANSITION",
                "rejected",
                self.instance_id.as_deref(),
                Some(serde_json::json!({"from": from.as_str(), "to": to.as_str(), "reason": reason})),
            );
            tracing::error!(log_id = %log_id, from = from.as_str(), to = to.as_str(), "invalid lifecycle transition");
            return false;
        }
        log_state_transition(self.instance_id.as_deref(), from, to, reason);
        self.phase = to;
        true
    }

    /// Forget the tracked instance.
    pub fn clear(&mut self) {
        self.instance_id = None;
        self.backup_name = None;
        self.address = None;
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            phase: self.phase,
            instance_id: self.instance_id.clone(),
            backup_name: self.backup_name.clone(),
            address: self.address.clone(),
        }
    }
}
