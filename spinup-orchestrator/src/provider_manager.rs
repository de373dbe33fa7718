use spinup_common::OrchestratorError;
use spinup_providers::{CloudProvider, ObjectStore};
use std::sync::Arc;

use crate::settings::Settings;

pub struct Providers {
    pub cloud: Arc<dyn CloudProvider>,
    pub objects: Arc<dyn ObjectStore>,
}

pub struct ProviderManager;

impl ProviderManager {
    /// Providers named by `PROVIDER`. Only the ones compiled in are available.
    pub async fn build(settings: &Settings) -> Result<Providers, OrchestratorError> {
        match settings.provider.as_str() {
            #[cfg(feature = "provider-aws")]
            "aws" => {
                use spinup_providers::aws::{self, AwsProvider, S3ObjectStore};
                let config = aws::load_config(settings.aws_region.as_deref()).await;
                Ok(Providers {
                    cloud: Arc::new(AwsProvider::new(&config)),
                    objects: Arc::new(S3ObjectStore::new(&config)),
                })
            }
            #[cfg(feature = "provider-mock")]
            "mock" => {
                use spinup_providers::mock::{MockObjectStore, MockProvider};
                tracing::warn!("using the in-memory mock provider, nothing is launched");
                Ok(Providers {
                    cloud: Arc::new(MockProvider::new()),
                    objects: Arc::new(MockObjectStore::new().with_bucket(&settings.backup_bucket)),
                })
            }
            other => Err(OrchestratorError::Config(format!(
                "provider '{}' is unknown or not compiled in",
                other
            ))),
        }
    }
}
