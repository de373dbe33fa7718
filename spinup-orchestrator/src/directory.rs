use spinup_common::{InstanceTemplate, OrchestratorError};
use spinup_providers::inventory::{self, InstanceFilter, RemoteInstance};
use spinup_providers::CloudProvider;
use std::sync::Arc;

use crate::logger;

/// Read-only lookups of instances matching the template.
#[derive(Clone)]
pub struct ComputeDirectory {
    provider: Arc<dyn CloudProvider>,
}

impl ComputeDirectory {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self { provider }
    }

    /// pending|running, in the template zone, carrying every template tag.
    pub fn filter_for(template: &InstanceTemplate) -> InstanceFilter {
        InstanceFilter {
            states: vec![
                inventory::STATE_PENDING.to_string(),
                inventory::STATE_RUNNING.to_string(),
            ],
            availability_zone: Some(template.availability_zone.clone()),
            tags: template.tags.clone(),
        }
    }

    /// First live instance matching the template. Multiple matches are
    /// tolerated; the first one reported wins.
    pub async fn find_running_instance(
        &self,
        template: &InstanceTemplate,
    ) -> Result<Option<RemoteInstance>, OrchestratorError> {
        let filter = Self::filter_for(template);
        let instances = logger::track(
            "DESCRIBE_INSTANCES",
            None,
            self.provider.describe_instances(&filter),
        )
        .await
        .map_err(OrchestratorError::provider)?;

        if instances.len() > 1 {
            tracing::warn!(
                count = instances.len(),
                "more than one instance matches the template, using the first"
            );
        }
        Ok(instances.into_iter().next())
    }
}
