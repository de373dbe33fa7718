// Shared fixtures: mock cloud, fake ssh and a wired-up orchestrator.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use spinup_common::{InstanceTemplate, OrchestratorError};
use spinup_orchestrator::backups::BackupCatalog;
use spinup_orchestrator::remote_config::RemoteConfigurator;
use spinup_orchestrator::routes::{self, AppState};
use spinup_orchestrator::settings::ServerSettings;
use spinup_orchestrator::{CommandDispatcher, LifecycleOrchestrator};
use spinup_providers::mock::{MockObjectStore, MockProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

pub const CHANNEL_ID: &str = "factorio-ops";
pub const BOT_TOKEN: &str = "test-bot-token";
pub const BUCKET: &str = "factorio-backups";

/// `{zone: us-east-1a, tags: {app: factorio}, ingress: [34197], egress: []}`
pub fn scenario_template() -> InstanceTemplate {
    InstanceTemplate::from_json(
        r#"{
            "availabilityZone": "us-east-1a",
            "securityGroupName": "factorio-sg",
            "ingressPorts": [34197],
            "egressPorts": [],
            "ami": "ami-0123456789abcdef0",
            "keyName": "factorio",
            "instanceType": "t3.medium",
            "tags": {"app": "factorio"}
        }"#,
    )
    .unwrap()
}

/// Records sessions. Can be told to hold every session until released.
#[derive(Default)]
pub struct RecordingConfigurator {
    sessions: Mutex<Vec<(String, Vec<String>)>>,
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
}

impl RecordingConfigurator {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub async fn sessions(&self) -> Vec<(String, Vec<String>)> {
        self.sessions.lock().await.clone()
    }

    /// Resolves once a session has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl RemoteConfigurator for RecordingConfigurator {
    async fn configure(&self, address: &str, commands: &[String]) -> Result<(), OrchestratorError> {
        self.sessions
            .lock()
            .await
            .push((address.to_string(), commands.to_vec()));
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(())
    }
}

pub struct Harness {
    pub provider: Arc<MockProvider>,
    pub configurator: Arc<RecordingConfigurator>,
    pub lifecycle: Arc<LifecycleOrchestrator>,
    pub dispatcher: Arc<CommandDispatcher>,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::build(
            provider,
            RecordingConfigurator::default(),
            MockObjectStore::new().with_bucket(BUCKET),
            ServerSettings::default(),
        )
    }

    pub fn build(
        provider: MockProvider,
        configurator: RecordingConfigurator,
        store: MockObjectStore,
        server: ServerSettings,
    ) -> Self {
        let provider = Arc::new(provider);
        let configurator = Arc::new(configurator);
        let catalog = BackupCatalog::new(Arc::new(store), BUCKET);
        let lifecycle = Arc::new(
            LifecycleOrchestrator::new(scenario_template(), provider.clone(), configurator.clone())
                .with_readiness(Duration::from_millis(300), Duration::from_millis(5))
                .with_server(server, catalog.clone()),
        );
        let dispatcher = Arc::new(CommandDispatcher::new(lifecycle.clone(), catalog, CHANNEL_ID));
        Self {
            provider,
            configurator,
            lifecycle,
            dispatcher,
        }
    }

    pub fn router(&self) -> Router {
        routes::router(Arc::new(AppState {
            dispatcher: self.dispatcher.clone(),
            lifecycle: self.lifecycle.clone(),
            bot_token: BOT_TOKEN.to_string(),
        }))
    }
}
