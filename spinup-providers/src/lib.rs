use anyhow::Result;
use async_trait::async_trait;

/// Cloud operations the lifecycle needs. Implementations must be safe to call
/// concurrently: `status` runs alongside an in-flight `start`.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Instances matching every clause of `filter`.
    async fn describe_instances(
        &self,
        filter: &inventory::InstanceFilter,
    ) -> Result<Vec<inventory::RemoteInstance>>;

    /// Snapshot of a single instance. `None` when the provider does not know
    /// the id (yet): right after a launch this is normal.
    async fn describe_instance(&self, instance_id: &str)
        -> Result<Option<inventory::RemoteInstance>>;

    /// Creates a security group and returns its id. A duplicate name is an
    /// error; there is no look-up-or-create.
    async fn create_security_group(&self, name: &str, description: &str) -> Result<String>;

    async fn authorize_ingress(&self, group_id: &str, rule: &inventory::PortRange) -> Result<()>;

    /// Allow all outbound traffic, any protocol, to 0.0.0.0/0.
    async fn authorize_egress_all(&self, group_id: &str) -> Result<()>;

    /// Launches exactly one instance and returns its id.
    async fn run_instance(&self, request: &inventory::LaunchRequest) -> Result<String>;

    async fn terminate_instance(&self, instance_id: &str) -> Result<bool>;
}

/// Read-only view of the backup bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<inventory::StoredObject>>;
}

pub mod inventory {
    use chrono::{DateTime, Utc};
    use serde::Serialize;
    use std::collections::BTreeMap;

    pub const STATE_PENDING: &str = "pending";
    pub const STATE_RUNNING: &str = "running";
    pub const STATE_SHUTTING_DOWN: &str = "shutting-down";
    pub const STATE_TERMINATED: &str = "terminated";

    pub const ANY_IPV4: &str = "0.0.0.0/0";

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct RemoteInstance {
        pub instance_id: String,
        pub state: String,
        pub public_ip: Option<String>,
        pub instance_type: Option<String>,
        pub availability_zone: Option<String>,
        pub tags: BTreeMap<String, String>,
    }

    impl RemoteInstance {
        pub fn is_running(&self) -> bool {
            self.state == STATE_RUNNING
        }

        pub fn is_gone(&self) -> bool {
            self.state == STATE_SHUTTING_DOWN || self.state == STATE_TERMINATED
        }
    }

    /// Conjunction of lifecycle-state set, zone and exact tag matches.
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct InstanceFilter {
        pub states: Vec<String>,
        pub availability_zone: Option<String>,
        pub tags: BTreeMap<String, String>,
    }

    impl InstanceFilter {
        pub fn matches(&self, instance: &RemoteInstance) -> bool {
            if !self.states.is_empty() && !self.states.iter().any(|s| s == &instance.state) {
                return false;
            }
            if let Some(zone) = &self.availability_zone {
                if instance.availability_zone.as_deref() != Some(zone.as_str()) {
                    return false;
                }
            }
            self.tags
                .iter()
                .all(|(k, v)| instance.tags.get(k).map(|x| x == v).unwrap_or(false))
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct PortRange {
        pub protocol: String,
        pub from_port: u16,
        pub to_port: u16,
        pub cidr: String,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct LaunchRequest {
        pub image_id: String,
        pub instance_type: String,
        pub key_name: String,
        pub availability_zone: String,
        pub security_group_ids: Vec<String>,
        pub tags: BTreeMap<String, String>,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct StoredObject {
        pub key: String,
        pub size_bytes: i64,
        pub last_modified: Option<DateTime<Utc>>,
    }
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "aws")]
pub mod aws;
