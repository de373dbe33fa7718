use spinup_common::OrchestratorError;
use std::sync::Arc;
use thiserror::Error;

use crate::backups::{BackupCatalog, NO_BACKUPS};
use crate::lifecycle::{LifecycleOrchestrator, Progress, SaveOutcome, StartOutcome, StopOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Start {
        name: Option<String>,
        version: Option<String>,
    },
    Name(String),
    Save(Option<String>),
    Stop,
    List,
    Status,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid argument '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidArgument(String),
}

/// Names and versions end up in tags, urls and remote commands.
fn checked(arg: &str) -> Result<String, CommandParseError> {
    let ok = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(arg.to_string())
    } else {
        Err(CommandParseError::InvalidArgument(arg.to_string()))
    }
}

impl ChatCommand {
    /// `[!]verb [args]`, verbs are case-insensitive.
    pub fn parse(text: &str) -> Result<Self, CommandParseError> {
        let text = text.trim();
        let text = text.strip_prefix('!').unwrap_or(text);
        let mut words = text.split_whitespace();
        let verb = words.next().ok_or(CommandParseError::Empty)?.to_lowercase();
        let args: Vec<&str> = words.collect();

        match (verb.as_str(), args.as_slice()) {
            ("start", [..]) if args.len() <= 2 => Ok(ChatCommand::Start {
                name: args.first().map(|a| checked(a)).transpose()?,
                version: args.get(1).map(|a| checked(a)).transpose()?,
            }),
            ("start", _) => Err(CommandParseError::Usage("start [name] [version]")),
            ("name", [backup]) => Ok(ChatCommand::Name(checked(backup)?)),
            ("name", _) => Err(CommandParseError::Usage("name <backup>")),
            ("save", []) => Ok(ChatCommand::Save(None)),
            ("save", [backup]) => Ok(ChatCommand::Save(Some(checked(backup)?))),
            ("save", _) => Err(CommandParseError::Usage("save [backup]")),
            ("stop", []) => Ok(ChatCommand::Stop),
            ("list", []) => Ok(ChatCommand::List),
            ("status", []) => Ok(ChatCommand::Status),
            ("stop" | "list" | "status", _) => Err(CommandParseError::Usage("stop | list | status")),
            (other, _) => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}

fn error_reply(err: &OrchestratorError) -> String {
    tracing::warn!(kind = err.kind(), error = %err, "command failed");
    format!("Error: {}", err)
}

/// Routes parsed commands from the configured channel to the lifecycle.
pub struct CommandDispatcher {
    lifecycle: Arc<LifecycleOrchestrator>,
    catalog: BackupCatalog,
    channel_id: String,
}

impl CommandDispatcher {
    pub fn new(
        lifecycle: Arc<LifecycleOrchestrator>,
        catalog: BackupCatalog,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            catalog,
            channel_id: channel_id.into(),
        }
    }

    /// Final replies for `command`. `None` when the channel is not ours.
    /// Intermediate lines go to `progress`.
    pub async fn dispatch(
        &self,
        channel_id: &str,
        command: ChatCommand,
        progress: &Progress,
    ) -> Option<Vec<String>> {
        if channel_id != self.channel_id {
            tracing::debug!(channel_id, "ignoring command from another channel");
            return None;
        }
        tracing::info!(?command, "dispatching command");

        let reply = match command {
            ChatCommand::Start { name, version } => {
                match self
                    .lifecycle
                    .start(name.as_deref(), version.as_deref(), progress)
                    .await
                {
                    Ok(StartOutcome::Started { address, .. }) => format!("Server running at {}", address),
                    Ok(StartOutcome::AlreadyRunning) => "Server already running".to_string(),
                    Err(e) => error_reply(&e),
                }
            }
            ChatCommand::Name(name) => {
                if self.lifecycle.set_backup_name(&name).await {
                    format!("Backup name set to {}", name)
                } else {
                    "No running server".to_string()
                }
            }
            ChatCommand::Save(name) => match self.lifecycle.save(name.as_deref(), progress).await {
                Ok(SaveOutcome::Saved { file }) => format!("Save complete: {}", file),
                Ok(SaveOutcome::NoServer) => "No game server configured".to_string(),
                Ok(SaveOutcome::NotRunning) => "No running server".to_string(),
                Err(e) => error_reply(&e),
            },
            ChatCommand::Stop => match self.lifecycle.stop(progress).await {
                Ok(StopOutcome::Terminated { .. }) => "Server terminated".to_string(),
                Ok(StopOutcome::AlreadyStopping) => "Server is already stopping".to_string(),
                Ok(StopOutcome::NotRunning) => "No running server".to_string(),
                Err(e) => error_reply(&e),
            },
            ChatCommand::List => match self.catalog.list().await {
                Ok(objects) => {
                    let listing = BackupCatalog::format_listing(&objects);
                    if listing == NO_BACKUPS {
                        listing
                    } else {
                        format!("Available backups:\n{}", listing)
                    }
                }
                Err(e) => error_reply(&e),
            },
            ChatCommand::Status => match self.lifecycle.status().await {
                Ok(Some(instance)) => {
                    let mut lines = vec![format!("Server running: {}", instance.instance_id)];
                    if let Some(ip) = &instance.public_ip {
                        lines.push(format!("Address: {}", ip));
                    }
                    lines.push(format!("State: {}", instance.state));
                    if let Some(instance_type) = &instance.instance_type {
                        lines.push(format!("Type: {}", instance_type));
                    }
                    if let Some(zone) = &instance.availability_zone {
                        lines.push(format!("Zone: {}", zone));
                    }
                    lines.join("\n")
                }
                Ok(None) => "No running servers".to_string(),
                Err(e) => error_reply(&e),
            },
        };
        Some(vec![reply])
    }
}
