use crate::inventory::{
    self, InstanceFilter, LaunchRequest, PortRange, RemoteInstance, StoredObject,
};
use crate::{CloudProvider, ObjectStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Provider calls the mock counts and can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockCall {
    DescribeInstances,
    DescribeInstance,
    CreateSecurityGroup,
    AuthorizeIngress,
    AuthorizeEgress,
    RunInstance,
    TerminateInstance,
}

/// How a freshly launched instance behaves under `describe_instance` polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootBehavior {
    /// `pending` for this many polls, then `running` with the public address.
    AfterPolls(u32),
    /// Stays `pending` forever.
    Never,
}

struct MockInstance {
    instance: RemoteInstance,
    polls: u32,
}

#[derive(Default)]
struct MockState {
    instances: Vec<MockInstance>,
    security_groups: Vec<(String, String)>,
    ingress_rules: Vec<(String, PortRange)>,
    egress_rules: Vec<String>,
    launches: Vec<LaunchRequest>,
    terminations: Vec<String>,
    calls: HashMap<MockCall, usize>,
    failures: HashMap<MockCall, String>,
    next_id: u32,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-mock{:04}", prefix, self.next_id)
    }
}

/// Deterministic in-memory provider. Records every call so tests can assert
/// on exactly what the orchestrator asked the cloud to do.
pub struct MockProvider {
    state: Mutex<MockState>,
    boot: BootBehavior,
    public_ip: String,
    launch_delay: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            boot: BootBehavior::AfterPolls(0),
            public_ip: "203.0.113.5".to_string(),
            launch_delay: Duration::ZERO,
        }
    }

    pub fn with_public_ip(mut self, ip: &str) -> Self {
        self.public_ip = ip.to_string();
        self
    }

    pub fn with_boot(mut self, boot: BootBehavior) -> Self {
        self.boot = boot;
        self
    }

    /// Makes `run_instance` take this long, to widen race windows in tests.
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// Seeds an instance that already exists out-of-band.
    pub fn with_existing_instance(mut self, instance: RemoteInstance) -> Self {
        self.state.get_mut().instances.push(MockInstance { instance, polls: 0 });
        self
    }

    pub async fn fail_on(&self, call: MockCall, message: &str) {
        self.state.lock().await.failures.insert(call, message.to_string());
    }

    pub async fn clear_failure(&self, call: MockCall) {
        self.state.lock().await.failures.remove(&call);
    }

    pub async fn calls(&self, call: MockCall) -> usize {
        self.state.lock().await.calls.get(&call).copied().unwrap_or(0)
    }

    pub async fn security_groups(&self) -> Vec<(String, String)> {
        self.state.lock().await.security_groups.clone()
    }

    pub async fn ingress_rules(&self) -> Vec<(String, PortRange)> {
        self.state.lock().await.ingress_rules.clone()
    }

    pub async fn egress_rules(&self) -> Vec<String> {
        self.state.lock().await.egress_rules.clone()
    }

    pub async fn launches(&self) -> Vec<LaunchRequest> {
        self.state.lock().await.launches.clone()
    }

    pub async fn terminations(&self) -> Vec<String> {
        self.state.lock().await.terminations.clone()
    }

    async fn enter(&self, call: MockCall) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().await;
        *state.calls.entry(call).or_insert(0) += 1;
        if let Some(message) = state.failures.get(&call) {
            return Err(anyhow::anyhow!("mock {:?} failed: {}", call, message));
        }
        Ok(state)
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<RemoteInstance>> {
        let state = self.enter(MockCall::DescribeInstances).await?;
        Ok(state
            .instances
            .iter()
            .map(|m| m.instance.clone())
            .filter(|i| filter.matches(i))
            .collect())
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Option<RemoteInstance>> {
        let mut state = self.enter(MockCall::DescribeInstance).await?;
        let boot = self.boot;
        let public_ip = self.public_ip.clone();
        let Some(entry) = state
            .instances
            .iter_mut()
            .find(|m| m.instance.instance_id == instance_id)
        else {
            return Ok(None);
        };

        if entry.instance.state == inventory::STATE_PENDING {
            let ready = match boot {
                BootBehavior::AfterPolls(n) => entry.polls >= n,
                BootBehavior::Never => false,
            };
            if ready {
                entry.instance.state = inventory::STATE_RUNNING.to_string();
                entry.instance.public_ip = Some(public_ip);
            }
        }
        entry.polls += 1;
        Ok(Some(entry.instance.clone()))
    }

    async fn create_security_group(&self, name: &str, _description: &str) -> Result<String> {
        let mut state = self.enter(MockCall::CreateSecurityGroup).await?;
        if state.security_groups.iter().any(|(_, n)| n == name) {
            return Err(anyhow::anyhow!(
                "InvalidGroup.Duplicate: the security group '{}' already exists",
                name
            ));
        }
        let id = state.next_id("sg");
        state.security_groups.push((id.clone(), name.to_string()));
        Ok(id)
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &PortRange) -> Result<()> {
        let mut state = self.enter(MockCall::AuthorizeIngress).await?;
        state.ingress_rules.push((group_id.to_string(), rule.clone()));
        Ok(())
    }

    async fn authorize_egress_all(&self, group_id: &str) -> Result<()> {
        let mut state = self.enter(MockCall::AuthorizeEgress).await?;
        state.egress_rules.push(group_id.to_string());
        Ok(())
    }

    async fn run_instance(&self, request: &LaunchRequest) -> Result<String> {
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        let mut state = self.enter(MockCall::RunInstance).await?;
        let id = state.next_id("i");
        state.launches.push(request.clone());
        state.instances.push(MockInstance {
            instance: RemoteInstance {
                instance_id: id.clone(),
                state: inventory::STATE_PENDING.to_string(),
                public_ip: None,
                instance_type: Some(request.instance_type.clone()),
                availability_zone: Some(request.availability_zone.clone()),
                tags: request.tags.clone(),
            },
            polls: 0,
        });
        Ok(id)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<bool> {
        let mut state = self.enter(MockCall::TerminateInstance).await?;
        state.terminations.push(instance_id.to_string());
        let Some(entry) = state
            .instances
            .iter_mut()
            .find(|m| m.instance.instance_id == instance_id)
        else {
            return Err(anyhow::anyhow!(
                "InvalidInstanceID.NotFound: the instance ID '{}' does not exist",
                instance_id
            ));
        };
        entry.instance.state = inventory::STATE_TERMINATED.to_string();
        entry.instance.public_ip = None;
        Ok(true)
    }
}

/// In-memory bucket listing.
#[derive(Default)]
pub struct MockObjectStore {
    buckets: BTreeMap<String, Vec<StoredObject>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// An existing bucket with no objects in it.
    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.buckets.entry(bucket.to_string()).or_default();
        self
    }

    pub fn with_object(
        mut self,
        bucket: &str,
        key: &str,
        size_bytes: i64,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .push(StoredObject {
                key: key.to_string(),
                size_bytes,
                last_modified,
            });
        self
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StoredObject>> {
        self.buckets
            .get(bucket)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchBucket: {}", bucket))
    }
}
