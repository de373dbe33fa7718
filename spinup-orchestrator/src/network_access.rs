use spinup_common::{InstanceTemplate, OrchestratorError};
use spinup_providers::inventory::{PortRange, ANY_IPV4};
use spinup_providers::CloudProvider;
use std::sync::Arc;

use crate::logger;

pub const SECURITY_GROUP_DESCRIPTION: &str = "factorio-server";

/// Creates the security group for a launch.
#[derive(Clone)]
pub struct NetworkAccessProvisioner {
    provider: Arc<dyn CloudProvider>,
}

/// The single inbound rule for a template: [min, max] of its ingress ports.
pub fn ingress_rule(template: &InstanceTemplate) -> Option<PortRange> {
    let (from_port, to_port) = template.ingress_range()?;
    Some(PortRange {
        protocol: template.ingress_protocol.clone(),
        from_port,
        to_port,
        cidr: ANY_IPV4.to_string(),
    })
}

impl NetworkAccessProvisioner {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self { provider }
    }

    /// Returns the new group id. An existing group with the same name makes
    /// this fail; there is no reuse.
    pub async fn provision(&self, template: &InstanceTemplate) -> Result<String, OrchestratorError> {
        let group_id = logger::track(
            "CREATE_SECURITY_GROUP",
            None,
            self.provider
                .create_security_group(&template.security_group_name, SECURITY_GROUP_DESCRIPTION),
        )
        .await
        .map_err(OrchestratorError::provider)?;

        if let Some(rule) = ingress_rule(template) {
            logger::track(
                "AUTHORIZE_INGRESS",
                None,
                self.provider.authorize_ingress(&group_id, &rule),
            )
            .await
            .map_err(OrchestratorError::provider)?;
        }

        if !template.egress_ports.is_empty() {
            logger::track(
                "AUTHORIZE_EGRESS",
                None,
                self.provider.authorize_egress_all(&group_id),
            )
            .await
            .map_err(OrchestratorError::provider)?;
        }

        Ok(group_id)
    }
}
