pub mod backups;
pub mod commands;
pub mod directory;
pub mod launcher;
pub mod lifecycle;
pub mod logger;
pub mod network_access;
pub mod provider_manager;
pub mod readiness;
pub mod remote_config;
pub mod routes;
pub mod settings;
pub mod setup;
pub mod state_machine;

#[cfg(test)]
mod testing;

pub use commands::{ChatCommand, CommandDispatcher};
pub use lifecycle::{LifecycleOrchestrator, Progress, SaveOutcome, StartOutcome, StopOutcome};
