use spinup_common::backup::{BackupKey, BACKUP_SUFFIX};
use spinup_common::OrchestratorError;
use spinup_providers::inventory::StoredObject;
use spinup_providers::ObjectStore;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::logger;

pub const NO_BACKUPS: &str = "No backups found";

/// The backup bucket: listing, lookups and upload targets.
#[derive(Clone)]
pub struct BackupCatalog {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl BackupCatalog {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Where an instance uploads a new backup file.
    pub fn upload_destination(&self, file: &str) -> String {
        format!("s3://{}/{}", self.bucket, file)
    }

    pub async fn list(&self) -> Result<Vec<StoredObject>, OrchestratorError> {
        logger::track("LIST_BACKUPS", None, self.store.list_objects(&self.bucket))
            .await
            .map_err(OrchestratorError::provider)
    }

    /// Newest backup file for `name`. A full file name is taken as-is.
    pub async fn latest_for(&self, name: &str) -> Result<Option<String>, OrchestratorError> {
        if name.ends_with(BACKUP_SUFFIX) {
            return Ok(Some(name.to_string()));
        }
        let objects = self.list().await?;
        Ok(objects
            .iter()
            .filter_map(|o| BackupKey::parse(&o.key).map(|k| (k, o)))
            .filter(|(k, _)| k.name == name)
            .max_by_key(|(k, _)| k.date)
            .map(|(_, o)| o.key.clone()))
    }

    /// Backups grouped by name, newest first, sizes in MB. Keys that do not
    /// follow the naming scheme are listed after them verbatim.
    pub fn format_listing(objects: &[StoredObject]) -> String {
        let mut grouped: BTreeMap<String, Vec<(BackupKey, i64)>> = BTreeMap::new();
        let mut unstructured: Vec<&str> = Vec::new();
        for object in objects {
            match BackupKey::parse(&object.key) {
                Some(key) => grouped
                    .entry(key.name.clone())
                    .or_default()
                    .push((key, object.size_bytes)),
                None => unstructured.push(&object.key),
            }
        }
        if grouped.is_empty() && unstructured.is_empty() {
            return NO_BACKUPS.to_string();
        }

        let mut lines = Vec::new();
        for (name, mut entries) in grouped {
            entries.sort_by(|a, b| b.0.date.cmp(&a.0.date));
            lines.push(name);
            for (key, size) in entries {
                let mb = size as f64 / 1024.0 / 1024.0;
                lines.push(format!("  - {} ({:.1} MB)", key.date_label(), mb));
            }
        }
        unstructured.sort_unstable();
        lines.extend(unstructured.into_iter().map(str::to_string));
        lines.join("\n")
    }
}
