use std::time::Duration;
use thiserror::Error;

/// Every failure the lifecycle can surface to the command layer. The
/// `Display` text is what the operator sees in chat.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Missing or malformed required configuration. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cloud API call failed.
    #[error("provider error: {0:#}")]
    Provider(anyhow::Error),

    /// The instance did not become reachable in time. It is left running.
    #[error("instance {instance_id} did not become reachable within {}s", waited.as_secs())]
    ReadinessTimeout {
        instance_id: String,
        waited: Duration,
    },

    /// Connection-level ssh failure. Exit codes of individual remote commands
    /// are not reported here.
    #[error("remote configuration of {address} failed: {message}")]
    RemoteConfiguration { address: String, message: String },

    /// An in-flight launch was overtaken by `stop`.
    #[error("launch aborted: {0}")]
    Aborted(String),
}

impl OrchestratorError {
    pub fn provider(err: impl Into<anyhow::Error>) -> Self {
        OrchestratorError::Provider(err.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Config(_) => "config",
            OrchestratorError::Provider(_) => "provider",
            OrchestratorError::ReadinessTimeout { .. } => "readiness_timeout",
            OrchestratorError::RemoteConfiguration { .. } => "remote_configuration",
            OrchestratorError::Aborted(_) => "aborted",
        }
    }
}
