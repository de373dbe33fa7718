use async_trait::async_trait;
use spinup_common::OrchestratorError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::logger;
use crate::settings::SshSettings;

/// ssh reports its own connection-level failures with this exit status.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Written to stderr by the script with the status of its last command.
const EXIT_STATUS_MARKER: &str = "remote-last-status=";

/// Runs the post-boot commands on a freshly reachable instance.
#[async_trait]
pub trait RemoteConfigurator: Send + Sync {
    /// Only connection-level failures are errors. Exit codes of individual
    /// commands are not checked.
    async fn configure(&self, address: &str, commands: &[String]) -> Result<(), OrchestratorError>;
}

/// Pipes the commands to `bash -s` over one ssh session. The host key is
/// trusted on first use.
pub struct SshConfigurator {
    settings: SshSettings,
}

impl SshConfigurator {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn key_path(&self) -> Result<&Path, OrchestratorError> {
        let path = self
            .settings
            .key_path
            .as_deref()
            .ok_or_else(|| OrchestratorError::Config("SSH_KEY_PATH must be set".to_string()))?;
        if !path.is_file() {
            return Err(OrchestratorError::Config(format!(
                "ssh key {} does not exist",
                path.display()
            )));
        }
        Ok(path)
    }

    /// One command per line, no `set -e`: a failing command does not stop
    /// the ones after it. The script always exits 0 so that a remote 255
    /// cannot pass for an ssh failure; the real status goes to stderr.
    pub fn script(commands: &[String]) -> String {
        let mut script = commands.join("\n");
        script.push('\n');
        script.push_str(&format!("echo \"{}$?\" >&2\nexit 0\n", EXIT_STATUS_MARKER));
        script
    }

    fn command(&self, key: &Path, target: &str) -> Command {
        let mut cmd = Command::new(&self.settings.program);
        cmd.arg("-i")
            .arg(key)
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("UserKnownHostsFile=/dev/null")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.settings.connect_timeout.as_secs().max(1)))
            .arg("-o")
            .arg(format!("ConnectionAttempts={}", self.settings.connection_attempts.max(1)))
            .arg(target)
            .arg("bash -s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Status of the last remote command, if the script got that far.
fn last_status(stderr: &[u8]) -> Option<i32> {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(EXIT_STATUS_MARKER)?.parse().ok())
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(5)..].join(" | ")
}

#[async_trait]
impl RemoteConfigurator for SshConfigurator {
    async fn configure(&self, address: &str, commands: &[String]) -> Result<(), OrchestratorError> {
        let key = self.key_path()?;
        let target = format!("{}@{}", self.settings.user, address);
        let failure = |message: String| OrchestratorError::RemoteConfiguration {
            address: address.to_string(),
            message,
        };

        let started = std::time::Instant::now();
        let log_id = logger::log_event_with_metadata(
            "REMOTE_CONFIGURE",
            "in_progress",
            None,
            Some(serde_json::json!({"target": target, "commands": commands.len()})),
        );
        let finish = |status: &str, error: Option<&str>| {
            logger::log_event_complete(
                log_id,
                "REMOTE_CONFIGURE",
                status,
                started.elapsed().as_millis(),
                error,
            )
        };

        let mut child = match self.command(key, &target).spawn() {
            Ok(c) => c,
            Err(e) => {
                let message = format!("ssh spawn failed: {}", e);
                finish("failed", Some(&message));
                return Err(failure(message));
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            // A session that dies early closes the pipe; the exit status says why.
            let _ = stdin.write_all(Self::script(commands).as_bytes()).await;
        }

        let output = match tokio::time::timeout(self.settings.session_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let message = format!("ssh wait failed: {}", e);
                finish("failed", Some(&message));
                return Err(failure(message));
            }
            Err(_) => {
                let message = format!(
                    "ssh session timed out after {}s",
                    self.settings.session_timeout.as_secs()
                );
                finish("failed", Some(&message));
                return Err(failure(message));
            }
        };

        match output.status.code() {
            Some(SSH_CONNECTION_FAILURE) | None => {
                let message = format!("ssh exited with {}: {}", output.status, tail(&output.stderr));
                finish("failed", Some(&message));
                Err(failure(message))
            }
            Some(0) => {
                match last_status(&output.stderr) {
                    Some(0) => {}
                    Some(code) => tracing::warn!(
                        address,
                        exit_code = code,
                        stderr = %tail(&output.stderr),
                        "last remote command exited non-zero"
                    ),
                    None => tracing::warn!(address, "remote script ended before its last line"),
                }
                finish("success", None);
                Ok(())
            }
            Some(code) => {
                tracing::warn!(
                    address,
                    exit_code = code,
                    stderr = %tail(&output.stderr),
                    "remote setup finished with a non-zero exit code"
                );
                finish("success", None);
                Ok(())
            }
        }
    }
}
