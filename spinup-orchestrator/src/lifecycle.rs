use spinup_common::backup::BackupKey;
use spinup_common::{InstanceTemplate, LifecyclePhase, OrchestratorError};
use spinup_providers::inventory::RemoteInstance;
use spinup_providers::CloudProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::backups::BackupCatalog;
use crate::directory::ComputeDirectory;
use crate::launcher::InstanceLauncher;
use crate::network_access::NetworkAccessProvisioner;
use crate::readiness::ReadinessWaiter;
use crate::remote_config::RemoteConfigurator;
use crate::settings::ServerSettings;
use crate::setup::SetupPlan;
use crate::state_machine::{LifecycleSnapshot, LifecycleState};

/// Sink for user-facing progress lines emitted while a command runs.
#[derive(Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl Progress {
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn send(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(progress = %message);
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening anymore.
            let _ = tx.send(message);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// A launch is in flight, an instance is tracked, or the provider
    /// already has a matching one.
    AlreadyRunning,
    Started { instance_id: String, address: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    NotRunning,
    AlreadyStopping,
    Terminated { instance_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing tracked in the Running phase.
    NotRunning,
    /// No game server image is configured, so there is nothing to archive.
    NoServer,
    Saved { file: String },
}

/// Single-flight owner of the lifecycle record.
///
/// The state lock is only held for bookkeeping, never across a provider or
/// ssh call, so `stop` stays usable while a `start` is waiting. `stop` bumps
/// the launch epoch; a `start` that sees a different epoch at its next step
/// gives up with `Aborted` and leaves the record alone.
pub struct LifecycleOrchestrator {
    template: InstanceTemplate,
    directory: ComputeDirectory,
    network: NetworkAccessProvisioner,
    launcher: InstanceLauncher,
    readiness: ReadinessWaiter,
    readiness_timeout: Duration,
    configurator: Arc<dyn RemoteConfigurator>,
    server: ServerSettings,
    catalog: Option<BackupCatalog>,
    state: Mutex<LifecycleState>,
    /// One backup session per instance at a time.
    backup_lock: Mutex<()>,
}

impl LifecycleOrchestrator {
    pub fn new(
        template: InstanceTemplate,
        provider: Arc<dyn CloudProvider>,
        configurator: Arc<dyn RemoteConfigurator>,
    ) -> Self {
        Self {
            template,
            directory: ComputeDirectory::new(provider.clone()),
            network: NetworkAccessProvisioner::new(provider.clone()),
            launcher: InstanceLauncher::new(provider.clone()),
            readiness: ReadinessWaiter::new(provider, Duration::from_secs(5)),
            readiness_timeout: Duration::from_secs(300),
            configurator,
            server: ServerSettings::default(),
            catalog: None,
            state: Mutex::new(LifecycleState::default()),
            backup_lock: Mutex::new(()),
        }
    }

    pub fn with_readiness(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.readiness = self.readiness.with_poll_interval(poll_interval);
        self.readiness_timeout = timeout;
        self
    }

    /// What to run after docker is up, and where backups are restored from
    /// and uploaded to.
    pub fn with_server(mut self, server: ServerSettings, catalog: BackupCatalog) -> Self {
        self.server = server;
        self.catalog = Some(catalog);
        self
    }

    pub async fn snapshot(&self) -> LifecycleSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Ground truth from the provider, independent of the local record.
    pub async fn status(&self) -> Result<Option<RemoteInstance>, OrchestratorError> {
        self.directory.find_running_instance(&self.template).await
    }

    /// Only applies while an instance is tracked.
    pub async fn set_backup_name(&self, name: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.instance_id.is_none() {
            return false;
        }
        tracing::info!(backup_name = name, "backup name set");
        state.backup_name = Some(name.to_string());
        true
    }

    pub async fn start(
        &self,
        name: Option<&str>,
        version: Option<&str>,
        progress: &Progress,
    ) -> Result<StartOutcome, OrchestratorError> {
        progress.send("Checking for existing server...");
        let epoch = {
            let mut state = self.state.lock().await;
            if state.phase != LifecyclePhase::Idle {
                tracing::info!(phase = %state.phase, "start rejected, lifecycle busy");
                return Ok(StartOutcome::AlreadyRunning);
            }
            state.transition(LifecyclePhase::Provisioning, "start requested");
            state.epoch
        };

        match self.directory.find_running_instance(&self.template).await {
            Ok(None) => {}
            Ok(Some(existing)) => {
                tracing::info!(instance_id = %existing.instance_id, "matching instance already exists");
                self.release("matching instance already exists").await;
                return Ok(StartOutcome::AlreadyRunning);
            }
            Err(e) => {
                self.release("instance lookup failed").await;
                return Err(e);
            }
        }

        progress.send("Launching instance...");
        let instance_id = match self.provision_and_launch(name).await {
            Ok(launched) => launched,
            Err(e) => {
                self.release("launch failed").await;
                return Err(e);
            }
        };
        let backup_name = {
            let mut state = self.state.lock().await;
            state.instance_id = Some(instance_id.clone());
            state.backup_name = name.map(str::to_string);
            state.transition(LifecyclePhase::AwaitingNetwork, "instance launched");
            state.backup_name.clone()
        };

        let address = match self
            .readiness
            .await_reachable(&instance_id, self.readiness_timeout)
            .await
        {
            Ok(address) => address,
            Err(e) => return Err(self.fail(epoch, &instance_id, e).await),
        };
        self.advance(
            epoch,
            &instance_id,
            LifecyclePhase::Configuring,
            "instance reachable",
            Some(&address),
        )
        .await?;
        progress.send(format!("Instance launched with IP {}, installing docker...", address));

        let plan = match self.setup_plan(backup_name.as_deref(), version).await {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(epoch, &instance_id, e).await),
        };
        if let Err(e) = self.configurator.configure(&address, plan.commands()).await {
            return Err(self.fail(epoch, &instance_id, e).await);
        }
        self.advance(
            epoch,
            &instance_id,
            LifecyclePhase::Running,
            "remote setup finished",
            None,
        )
        .await?;

        Ok(StartOutcome::Started {
            instance_id,
            address,
        })
    }

    /// Backs up a running server, then terminates the instance. A failed
    /// backup is reported but does not keep the instance alive.
    pub async fn stop(&self, progress: &Progress) -> Result<StopOutcome, OrchestratorError> {
        let (instance_id, running_at) = {
            let mut state = self.state.lock().await;
            let Some(instance_id) = state.instance_id.clone() else {
                return Ok(StopOutcome::NotRunning);
            };
            if state.phase == LifecyclePhase::Terminating {
                return Ok(StopOutcome::AlreadyStopping);
            }
            let running_at = match (state.phase, &state.address) {
                (LifecyclePhase::Running, Some(address)) => {
                    Some((address.clone(), state.backup_name.clone()))
                }
                _ => None,
            };
            state.epoch += 1;
            state.transition(LifecyclePhase::Terminating, "stop requested");
            (instance_id, running_at)
        };

        progress.send("Stopping server...");
        if let Some((address, backup_name)) = running_at {
            if let Err(e) = self.back_up(&address, backup_name.as_deref(), progress).await {
                tracing::warn!(instance_id = %instance_id, error = %e, "backup before terminate failed");
                progress.send(format!("Backup failed: {}", e));
            }
        }
        let result = self.launcher.terminate(&instance_id).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(_) => {
                state.clear();
                state.transition(LifecyclePhase::Idle, "instance terminated");
                Ok(StopOutcome::Terminated { instance_id })
            }
            Err(e) => {
                state.transition(LifecyclePhase::Failed, "terminate failed");
                Err(e)
            }
        }
    }

    /// Backs up the running server without stopping the instance. `name`
    /// also replaces the recorded backup name.
    pub async fn save(
        &self,
        name: Option<&str>,
        progress: &Progress,
    ) -> Result<SaveOutcome, OrchestratorError> {
        let (address, backup_name) = {
            let mut state = self.state.lock().await;
            let (LifecyclePhase::Running, Some(address)) = (state.phase, state.address.clone())
            else {
                return Ok(SaveOutcome::NotRunning);
            };
            if let Some(name) = name {
                tracing::info!(backup_name = name, "backup name set");
                state.backup_name = Some(name.to_string());
            }
            (address, state.backup_name.clone())
        };

        match self.back_up(&address, backup_name.as_deref(), progress).await? {
            Some(file) => Ok(SaveOutcome::Saved { file }),
            None => Ok(SaveOutcome::NoServer),
        }
    }

    async fn provision_and_launch(&self, name: Option<&str>) -> Result<String, OrchestratorError> {
        let group_id = self.network.provision(&self.template).await?;
        self.launcher.launch(&self.template, &group_id, name).await
    }

    async fn setup_plan(
        &self,
        backup_name: Option<&str>,
        version: Option<&str>,
    ) -> Result<SetupPlan, OrchestratorError> {
        let restore = match (backup_name, &self.catalog) {
            (Some(name), Some(catalog))
                if self.server.image.is_some() && self.server.backup_download_url.is_some() =>
            {
                let found = catalog.latest_for(name).await?;
                if found.is_none() {
                    tracing::info!(backup_name = name, "no backup to restore, starting fresh");
                }
                found
            }
            _ => None,
        };
        Ok(SetupPlan::build(
            &self.template,
            &self.server,
            restore.as_deref(),
            version,
        ))
    }

    /// Archives the data dir on `address` and uploads it as today's backup
    /// of `name`. `None` when no game server is configured.
    async fn back_up(
        &self,
        address: &str,
        name: Option<&str>,
        progress: &Progress,
    ) -> Result<Option<String>, OrchestratorError> {
        let Some(catalog) = self.catalog.as_ref().filter(|_| self.server.image.is_some()) else {
            return Ok(None);
        };
        let name = name.map(str::to_string).unwrap_or_else(BackupKey::unnamed);
        let file = BackupKey::today(&name).file_name();
        let plan = SetupPlan::backup(&self.server, &file, &catalog.upload_destination(&file));

        let _session = self.backup_lock.lock().await;
        progress.send(format!("Saving backup as {}...", file));
        self.configurator.configure(address, plan.commands()).await?;
        tracing::info!(address, file = %file, "backup session finished");
        Ok(Some(file))
    }

    /// Provisioning ended before anything was launched.
    async fn release(&self, reason: &str) {
        self.state
            .lock()
            .await
            .transition(LifecyclePhase::Idle, reason);
    }

    async fn advance(
        &self,
        epoch: u64,
        instance_id: &str,
        to: LifecyclePhase,
        reason: &str,
        address: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            return Err(aborted(instance_id));
        }
        if let Some(address) = address {
            state.address = Some(address.to_string());
        }
        state.transition(to, reason);
        Ok(())
    }

    /// The instance exists but did not make it to Running. It stays tracked
    /// so `stop` can clean it up.
    async fn fail(&self, epoch: u64, instance_id: &str, err: OrchestratorError) -> OrchestratorError {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::info!(instance_id, error = %err, "launch overtaken by stop");
            return aborted(instance_id);
        }
        state.transition(LifecyclePhase::Failed, err.kind());
        err
    }
}

fn aborted(instance_id: &str) -> OrchestratorError {
    OrchestratorError::Aborted(format!("instance {} was stopped", instance_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{template, FakeConfigurator};
    use spinup_providers::mock::{BootBehavior, MockCall, MockObjectStore, MockProvider};

    fn orchestrator(
        provider: &Arc<MockProvider>,
        configurator: &Arc<FakeConfigurator>,
    ) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(template(&[34197], &[]), provider.clone(), configurator.clone())
            .with_readiness(Duration::from_millis(200), Duration::from_millis(5))
    }

    fn with_game_server(lifecycle: LifecycleOrchestrator) -> LifecycleOrchestrator {
        let server = ServerSettings {
            image: Some("factoriotools/factorio".to_string()),
            ..ServerSettings::default()
        };
        let catalog = BackupCatalog::new(Arc::new(MockObjectStore::new().with_bucket("b")), "b");
        lifecycle.with_server(server, catalog)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(m) = rx.try_recv() {
            messages.push(m);
        }
        messages
    }

    #[tokio::test]
    async fn start_reaches_running() {
        let provider = Arc::new(MockProvider::new().with_boot(BootBehavior::AfterPolls(1)));
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);
        let (progress, mut rx) = Progress::channel();

        let outcome = lifecycle.start(Some("world"), None, &progress).await.unwrap();
        let StartOutcome::Started { instance_id, address } = outcome else {
            panic!("expected a launch");
        };
        assert_eq!(address, "203.0.113.5");

        let snap = lifecycle.snapshot().await;
        assert_eq!(snap.phase, LifecyclePhase::Running);
        assert_eq!(snap.instance_id.as_deref(), Some(instance_id.as_str()));
        assert_eq!(snap.backup_name.as_deref(), Some("world"));
        assert_eq!(snap.address.as_deref(), Some("203.0.113.5"));

        assert_eq!(configurator.calls().await.len(), 1);
        drop(progress);
        let mut messages = Vec::new();
        while let Some(m) = rx.recv().await {
            messages.push(m);
        }
        assert_eq!(
            messages,
            vec![
                "Checking for existing server...".to_string(),
                "Launching instance...".to_string(),
                "Instance launched with IP 203.0.113.5, installing docker...".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn lookup_failure_returns_to_idle() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_on(MockCall::DescribeInstances, "Throttling").await;
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);

        let err = lifecycle.start(None, None, &Progress::silent()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Provider(_)));
        assert_eq!(lifecycle.snapshot().await.phase, LifecyclePhase::Idle);
        assert_eq!(provider.calls(MockCall::CreateSecurityGroup).await, 0);
    }

    #[tokio::test]
    async fn launch_failure_records_nothing() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_on(MockCall::RunInstance, "InvalidAMIID.NotFound").await;
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);

        let err = lifecycle.start(None, None, &Progress::silent()).await.unwrap_err();
        assert!(err.to_string().contains("InvalidAMIID.NotFound"));
        let snap = lifecycle.snapshot().await;
        assert_eq!(snap.phase, LifecyclePhase::Idle);
        assert_eq!(snap.instance_id, None);
        // The security group is not rolled back.
        assert_eq!(provider.security_groups().await.len(), 1);
    }

    #[tokio::test]
    async fn readiness_timeout_leaves_instance_tracked() {
        let provider = Arc::new(MockProvider::new().with_boot(BootBehavior::Never));
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);

        let err = lifecycle.start(None, None, &Progress::silent()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ReadinessTimeout { .. }));
        let snap = lifecycle.snapshot().await;
        assert_eq!(snap.phase, LifecyclePhase::Failed);
        assert!(snap.instance_id.is_some());
        assert!(provider.terminations().await.is_empty());
        assert!(configurator.calls().await.is_empty());

        let again = lifecycle.start(None, None, &Progress::silent()).await.unwrap();
        assert_eq!(again, StartOutcome::AlreadyRunning);

        let stopped = lifecycle.stop(&Progress::silent()).await.unwrap();
        assert!(matches!(stopped, StopOutcome::Terminated { .. }));
        assert_eq!(lifecycle.snapshot().await.phase, LifecyclePhase::Idle);
    }

    #[tokio::test]
    async fn remote_configuration_failure_marks_failed() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::failing("Connection refused"));
        let lifecycle = orchestrator(&provider, &configurator);

        let err = lifecycle.start(None, None, &Progress::silent()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::RemoteConfiguration { .. }));
        let snap = lifecycle.snapshot().await;
        assert_eq!(snap.phase, LifecyclePhase::Failed);
        assert_eq!(snap.address.as_deref(), Some("203.0.113.5"));
    }

    #[tokio::test]
    async fn set_backup_name_needs_a_tracked_instance() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);

        assert!(!lifecycle.set_backup_name("world").await);
        assert_eq!(lifecycle.snapshot().await.backup_name, None);

        lifecycle.start(None, None, &Progress::silent()).await.unwrap();
        assert!(lifecycle.set_backup_name("world").await);
        assert_eq!(lifecycle.snapshot().await.backup_name.as_deref(), Some("world"));
        assert_eq!(provider.calls(MockCall::RunInstance).await, 1);
    }

    #[tokio::test]
    async fn failed_terminate_keeps_instance_tracked() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);
        lifecycle.start(None, None, &Progress::silent()).await.unwrap();

        provider.fail_on(MockCall::TerminateInstance, "UnauthorizedOperation").await;
        let err = lifecycle.stop(&Progress::silent()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Provider(_)));
        let snap = lifecycle.snapshot().await;
        assert_eq!(snap.phase, LifecyclePhase::Failed);
        assert!(snap.instance_id.is_some());

        provider.clear_failure(MockCall::TerminateInstance).await;
        let stopped = lifecycle.stop(&Progress::silent()).await.unwrap();
        assert!(matches!(stopped, StopOutcome::Terminated { .. }));
        assert_eq!(provider.calls(MockCall::TerminateInstance).await, 2);
    }

    #[tokio::test]
    async fn stop_backs_up_a_running_server_first() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = with_game_server(orchestrator(&provider, &configurator));
        lifecycle.start(None, None, &Progress::silent()).await.unwrap();
        assert!(lifecycle.set_backup_name("world").await);

        let (progress, mut rx) = Progress::channel();
        let stopped = lifecycle.stop(&progress).await.unwrap();
        assert!(matches!(stopped, StopOutcome::Terminated { .. }));

        let file = BackupKey::today("world").file_name();
        let calls = configurator.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "203.0.113.5");
        assert_eq!(calls[1].1[0], "sudo docker stop 'factorio'");
        assert!(calls[1].1[1].contains(&format!("'s3://b/{}'", file)));
        assert_eq!(
            drain(&mut rx),
            vec![
                "Stopping server...".to_string(),
                format!("Saving backup as {}...", file),
            ]
        );
        assert_eq!(provider.calls(MockCall::TerminateInstance).await, 1);
    }

    #[tokio::test]
    async fn failed_backup_still_terminates() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::failing_after(1, "Connection reset"));
        let lifecycle = with_game_server(orchestrator(&provider, &configurator));
        lifecycle.start(Some("world"), None, &Progress::silent()).await.unwrap();

        let (progress, mut rx) = Progress::channel();
        let stopped = lifecycle.stop(&progress).await.unwrap();
        assert!(matches!(stopped, StopOutcome::Terminated { .. }));
        assert_eq!(lifecycle.snapshot().await.phase, LifecyclePhase::Idle);
        assert_eq!(configurator.calls().await.len(), 2);
        assert!(drain(&mut rx)
            .last()
            .is_some_and(|m| m.starts_with("Backup failed:") && m.contains("Connection reset")));
    }

    #[tokio::test]
    async fn unconfigured_or_unfinished_servers_are_not_backed_up() {
        // No image: nothing to archive.
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);
        lifecycle.start(Some("world"), None, &Progress::silent()).await.unwrap();
        lifecycle.stop(&Progress::silent()).await.unwrap();
        assert_eq!(configurator.calls().await.len(), 1);

        // Setup never finished, so the server never ran.
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::failing("Connection refused"));
        let lifecycle = with_game_server(orchestrator(&provider, &configurator));
        lifecycle.start(Some("world"), None, &Progress::silent()).await.unwrap_err();
        lifecycle.stop(&Progress::silent()).await.unwrap();
        assert_eq!(configurator.calls().await.len(), 1);
        assert_eq!(provider.calls(MockCall::TerminateInstance).await, 1);
    }

    #[tokio::test]
    async fn save_keeps_the_instance_running() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = with_game_server(orchestrator(&provider, &configurator));
        assert_eq!(
            lifecycle.save(None, &Progress::silent()).await.unwrap(),
            SaveOutcome::NotRunning
        );
        lifecycle.start(Some("world"), None, &Progress::silent()).await.unwrap();

        let saved = lifecycle.save(None, &Progress::silent()).await.unwrap();
        assert_eq!(
            saved,
            SaveOutcome::Saved {
                file: BackupKey::today("world").file_name()
            }
        );

        let renamed = lifecycle.save(Some("other"), &Progress::silent()).await.unwrap();
        assert_eq!(
            renamed,
            SaveOutcome::Saved {
                file: BackupKey::today("other").file_name()
            }
        );
        let snap = lifecycle.snapshot().await;
        assert_eq!(snap.phase, LifecyclePhase::Running);
        assert_eq!(snap.backup_name.as_deref(), Some("other"));
        assert_eq!(configurator.calls().await.len(), 3);
        assert!(provider.terminations().await.is_empty());
    }

    #[tokio::test]
    async fn unnamed_save_gets_a_generated_name() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = with_game_server(orchestrator(&provider, &configurator));
        lifecycle.start(None, None, &Progress::silent()).await.unwrap();

        let SaveOutcome::Saved { file } = lifecycle.save(None, &Progress::silent()).await.unwrap()
        else {
            panic!("expected a backup");
        };
        assert!(BackupKey::parse(&file).unwrap().name.starts_with("backup-"));
        assert_eq!(lifecycle.snapshot().await.backup_name, None);

    }

    #[tokio::test]
    async fn save_without_game_server_has_nothing_to_do() {
        let provider = Arc::new(MockProvider::new());
        let configurator = Arc::new(FakeConfigurator::default());
        let lifecycle = orchestrator(&provider, &configurator);
        lifecycle.start(None, None, &Progress::silent()).await.unwrap();

        assert_eq!(
            lifecycle.save(Some("world"), &Progress::silent()).await.unwrap(),
            SaveOutcome::NoServer
        );
        assert_eq!(configurator.calls().await.len(), 1);
    }
}
