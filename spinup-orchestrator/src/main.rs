use spinup_common::InstanceTemplate;
use spinup_orchestrator::backups::BackupCatalog;
use spinup_orchestrator::provider_manager::ProviderManager;
use spinup_orchestrator::remote_config::SshConfigurator;
use spinup_orchestrator::routes::{self, AppState};
use spinup_orchestrator::settings::Settings;
use spinup_orchestrator::{CommandDispatcher, LifecycleOrchestrator};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let template = InstanceTemplate::load(&settings.template_path)?;
    tracing::info!(
        template = %settings.template_path.display(),
        zone = %template.availability_zone,
        provider = %settings.provider,
        "configuration loaded"
    );

    let providers = ProviderManager::build(&settings).await?;
    let catalog = BackupCatalog::new(providers.objects.clone(), settings.backup_bucket.clone());
    let lifecycle = Arc::new(
        LifecycleOrchestrator::new(
            template,
            providers.cloud.clone(),
            Arc::new(SshConfigurator::new(settings.ssh.clone())),
        )
        .with_readiness(settings.readiness_timeout, settings.readiness_poll_interval)
        .with_server(settings.server.clone(), catalog.clone()),
    );
    let dispatcher = Arc::new(CommandDispatcher::new(
        lifecycle.clone(),
        catalog,
        settings.chat_channel_id.clone(),
    ));

    let state = Arc::new(AppState {
        dispatcher,
        lifecycle,
        bot_token: settings.chat_bot_token.clone(),
    });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr).await?;
    tracing::info!(addr = %settings.listen_addr, "orchestrator listening");
    axum::serve(listener, app).await?;
    Ok(())
}
