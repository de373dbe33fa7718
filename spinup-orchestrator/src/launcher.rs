use spinup_common::{InstanceTemplate, OrchestratorError};
use spinup_providers::inventory::LaunchRequest;
use spinup_providers::CloudProvider;
use std::sync::Arc;

use crate::logger;

/// Tag carrying the backup name an instance was started for.
pub const SAVE_NAME_TAG: &str = "SaveName";

#[derive(Clone)]
pub struct InstanceLauncher {
    provider: Arc<dyn CloudProvider>,
}

impl InstanceLauncher {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self { provider }
    }

    pub fn launch_request(
        template: &InstanceTemplate,
        security_group_id: &str,
        save_name: Option<&str>,
    ) -> LaunchRequest {
        let mut tags = template.tags.clone();
        if let Some(name) = save_name {
            tags.insert(SAVE_NAME_TAG.to_string(), name.to_string());
        }
        LaunchRequest {
            image_id: template.ami.clone(),
            instance_type: template.instance_type.clone(),
            key_name: template.key_name.clone(),
            availability_zone: template.availability_zone.clone(),
            security_group_ids: vec![security_group_id.to_string()],
            tags,
        }
    }

    /// Launches exactly one instance and returns its id.
    pub async fn launch(
        &self,
        template: &InstanceTemplate,
        security_group_id: &str,
        save_name: Option<&str>,
    ) -> Result<String, OrchestratorError> {
        let request = Self::launch_request(template, security_group_id, save_name);
        logger::track("RUN_INSTANCE", None, self.provider.run_instance(&request))
            .await
            .map_err(OrchestratorError::provider)
    }

    pub async fn terminate(&self, instance_id: &str) -> Result<bool, OrchestratorError> {
        logger::track(
            "TERMINATE_INSTANCE",
            Some(instance_id),
            self.provider.terminate_instance(instance_id),
        )
        .await
        .map_err(OrchestratorError::provider)
    }
}
