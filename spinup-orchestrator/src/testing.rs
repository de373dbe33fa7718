use async_trait::async_trait;
use spinup_common::{InstanceTemplate, OrchestratorError};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::remote_config::RemoteConfigurator;

pub fn template(ingress: &[u16], egress: &[u16]) -> InstanceTemplate {
    let mut tags = BTreeMap::new();
    tags.insert("app".to_string(), "factorio".to_string());
    InstanceTemplate {
        availability_zone: "us-east-1a".to_string(),
        security_group_name: "factorio-sg".to_string(),
        ingress_ports: ingress.to_vec(),
        egress_ports: egress.to_vec(),
        ami: "ami-0123456789abcdef0".to_string(),
        key_name: "factorio".to_string(),
        instance_type: "t3.medium".to_string(),
        tags,
        ingress_protocol: "udp".to_string(),
    }
}

/// Records every configure call instead of opening a session.
#[derive(Default)]
pub struct FakeConfigurator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    /// Calls that succeed before every later one fails with the message.
    failure: Option<(usize, String)>,
}

impl FakeConfigurator {
    pub fn failing(message: &str) -> Self {
        Self::failing_after(0, message)
    }

    pub fn failing_after(successes: usize, message: &str) -> Self {
        Self {
            failure: Some((successes, message.to_string())),
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl RemoteConfigurator for FakeConfigurator {
    async fn configure(&self, address: &str, commands: &[String]) -> Result<(), OrchestratorError> {
        let mut calls = self.calls.lock().await;
        calls.push((address.to_string(), commands.to_vec()));
        match &self.failure {
            Some((successes, message)) if calls.len() > *successes => {
                Err(OrchestratorError::RemoteConfiguration {
                    address: address.to_string(),
                    message: message.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}
