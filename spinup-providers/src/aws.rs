use crate::inventory::{
    InstanceFilter, LaunchRequest, PortRange, RemoteInstance, StoredObject, ANY_IPV4,
};
use crate::{CloudProvider, ObjectStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{
    Filter, Instance, InstanceType, IpPermission, IpRange, Placement, ResourceType, Tag,
    TagSpecification,
};
use std::collections::BTreeMap;

const NOT_FOUND: &str = "InvalidInstanceID.NotFound";
const DUPLICATE_PERMISSION: &str = "InvalidPermission.Duplicate";

/// Loads the shared SDK config. Credentials come from the standard chain
/// (AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY first).
pub async fn load_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region.map(str::trim).filter(|r| !r.is_empty()) {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

pub struct AwsProvider {
    ec2: aws_sdk_ec2::Client,
}

impl AwsProvider {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            ec2: aws_sdk_ec2::Client::new(config),
        }
    }
}

fn to_remote_instance(instance: &Instance) -> Option<RemoteInstance> {
    let instance_id = instance.instance_id()?.to_string();
    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| n.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let tags: BTreeMap<String, String> = instance
        .tags()
        .iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect();
    Some(RemoteInstance {
        instance_id,
        state,
        public_ip: instance.public_ip_address().map(str::to_string),
        instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
        availability_zone: instance
            .placement()
            .and_then(|p| p.availability_zone())
            .map(str::to_string),
        tags,
    })
}

fn ec2_filters(filter: &InstanceFilter) -> Vec<Filter> {
    let mut filters = Vec::new();
    if !filter.states.is_empty() {
        filters.push(
            Filter::builder()
                .name("instance-state-name")
                .set_values(Some(filter.states.clone()))
                .build(),
        );
    }
    if let Some(zone) = &filter.availability_zone {
        filters.push(
            Filter::builder()
                .name("availability-zone")
                .values(zone)
                .build(),
        );
    }
    for (key, value) in &filter.tags {
        filters.push(
            Filter::builder()
                .name(format!("tag:{}", key))
                .values(value)
                .build(),
        );
    }
    filters
}

#[async_trait]
impl CloudProvider for AwsProvider {
    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<RemoteInstance>> {
        let resp = self
            .ec2
            .describe_instances()
            .set_filters(Some(ec2_filters(filter)))
            .send()
            .await
            .context("ec2 DescribeInstances")?;

        let instances: Vec<RemoteInstance> = resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .filter_map(to_remote_instance)
            .collect();
        tracing::debug!(count = instances.len(), "ec2 DescribeInstances (filtered)");
        Ok(instances)
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Option<RemoteInstance>> {
        let resp = match self
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                if err.as_service_error().and_then(|e| e.code()) == Some(NOT_FOUND) {
                    tracing::debug!(instance_id, "ec2 does not know the instance yet");
                    return Ok(None);
                }
                return Err(anyhow::Error::new(err))
                    .with_context(|| format!("ec2 DescribeInstances {}", instance_id));
            }
        };

        Ok(resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .find_map(to_remote_instance))
    }

    async fn create_security_group(&self, name: &str, description: &str) -> Result<String> {
        let resp = self
            .ec2
            .create_security_group()
            .group_name(name)
            .description(description)
            .send()
            .await
            .with_context(|| format!("ec2 CreateSecurityGroup {}", name))?;
        let group_id = resp
            .group_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("CreateSecurityGroup returned no group id"))?;
        tracing::info!(group_id = %group_id, name, "security group created");
        Ok(group_id)
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &PortRange) -> Result<()> {
        self.ec2
            .authorize_security_group_ingress()
            .group_id(group_id)
            .ip_protocol(&rule.protocol)
            .from_port(i32::from(rule.from_port))
            .to_port(i32::from(rule.to_port))
            .cidr_ip(&rule.cidr)
            .send()
            .await
            .with_context(|| {
                format!(
                    "ec2 AuthorizeSecurityGroupIngress {} {}/{}-{}",
                    group_id, rule.protocol, rule.from_port, rule.to_port
                )
            })?;
        Ok(())
    }

    async fn authorize_egress_all(&self, group_id: &str) -> Result<()> {
        let permission = IpPermission::builder()
            .ip_protocol("-1")
            .ip_ranges(IpRange::builder().cidr_ip(ANY_IPV4).build())
            .build();
        match self
            .ec2
            .authorize_security_group_egress()
            .group_id(group_id)
            .ip_permissions(permission)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            // New VPC groups already carry the allow-all egress rule.
            Err(err) if err.as_service_error().and_then(|e| e.code()) == Some(DUPLICATE_PERMISSION) => {
                tracing::debug!(group_id, "allow-all egress already present");
                Ok(())
            }
            Err(err) => Err(anyhow::Error::new(err))
                .with_context(|| format!("ec2 AuthorizeSecurityGroupEgress {}", group_id)),
        }
    }

    async fn run_instance(&self, request: &LaunchRequest) -> Result<String> {
        let mut call = self
            .ec2
            .run_instances()
            .image_id(&request.image_id)
            .instance_type(InstanceType::from(request.instance_type.as_str()))
            .key_name(&request.key_name)
            .set_security_group_ids(Some(request.security_group_ids.clone()))
            .placement(
                Placement::builder()
                    .availability_zone(&request.availability_zone)
                    .build(),
            )
            .min_count(1)
            .max_count(1);

        if !request.tags.is_empty() {
            let tags: Vec<Tag> = request
                .tags
                .iter()
                .map(|(k, v)| Tag::builder().key(k).value(v).build())
                .collect();
            call = call.tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .set_tags(Some(tags))
                    .build(),
            );
        }

        let resp = call.send().await.context("ec2 RunInstances")?;
        let instance_id = resp
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("RunInstances returned no instance id"))?;
        tracing::info!(instance_id = %instance_id, image = %request.image_id, "instance launched");
        Ok(instance_id)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<bool> {
        self.ec2
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .with_context(|| format!("ec2 TerminateInstances {}", instance_id))?;
        Ok(true)
    }
}

pub struct S3ObjectStore {
    s3: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let resp = self
                .s3
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("s3 ListObjectsV2 {}", bucket))?;

            for object in resp.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(StoredObject {
                    key: key.to_string(),
                    size_bytes: object.size().unwrap_or(0),
                    last_modified: object.last_modified().and_then(|t| {
                        chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                });
            }

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_cover_state_zone_and_tags() {
        let mut tags = BTreeMap::new();
        tags.insert("app".to_string(), "factorio".to_string());
        let filter = InstanceFilter {
            states: vec!["pending".to_string(), "running".to_string()],
            availability_zone: Some("us-east-1a".to_string()),
            tags,
        };
        let filters = ec2_filters(&filter);
        let names: Vec<&str> = filters.iter().filter_map(|f| f.name()).collect();
        assert_eq!(names, vec!["instance-state-name", "availability-zone", "tag:app"]);
        assert_eq!(
            filters[0].values().to_vec(),
            vec!["pending".to_string(), "running".to_string()]
        );
        assert_eq!(filters[2].values().to_vec(), vec!["factorio".to_string()]);
    }
}
