//! Provider data sources.
//!
//! Intel modules never talk to a provider API directly; they consume one of
//! these trait objects. The shipped implementation reads exported inventory
//! snapshot files (one JSON array per resource type), which keeps module
//! logic identical whether records come from a snapshot, a live collector
//! sidecar, or a test fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use strata_core::{StrataError, StrataResult};

/// Errors raised by a provider source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The credential is valid but not authorized for this scope or region.
    #[error("access denied: {0}")]
    AuthDenied(String),

    #[error("{0}")]
    Other(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// One page of records from a paginating source.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Value>,
    /// Whether another page follows this one.
    pub has_more: bool,
}

/// AWS inventory facts, keyed by account and region.
#[async_trait]
pub trait AwsSource: Send + Sync {
    async fn accounts(&self) -> SourceResult<Vec<Value>>;
    async fn regions(&self, account_id: &str) -> SourceResult<Vec<String>>;
    async fn s3_buckets(&self, account_id: &str) -> SourceResult<Vec<Value>>;
    async fn ec2_instances(&self, account_id: &str, region: &str) -> SourceResult<Vec<Value>>;
    async fn ec2_security_groups(&self, account_id: &str, region: &str)
        -> SourceResult<Vec<Value>>;
}

/// Azure inventory facts, keyed by subscription.
#[async_trait]
pub trait AzureSource: Send + Sync {
    async fn subscriptions(&self) -> SourceResult<Vec<Value>>;
    async fn storage_accounts(&self, subscription_id: &str) -> SourceResult<Vec<Value>>;
    async fn virtual_machines(&self, subscription_id: &str) -> SourceResult<Vec<Value>>;
}

/// GCP inventory facts, keyed by project. List calls paginate.
#[async_trait]
pub trait GcpSource: Send + Sync {
    async fn projects(&self) -> SourceResult<Vec<Value>>;
    async fn instances(&self, project_id: &str, page_no: i64, page_size: i64)
        -> SourceResult<Page>;
    async fn buckets(&self, project_id: &str, page_no: i64, page_size: i64)
        -> SourceResult<Page>;
}

/// Jamf device-management facts.
#[async_trait]
pub trait JamfSource: Send + Sync {
    /// A stable identifier for the Jamf instance, used as the scope id.
    fn tenant_id(&self) -> String;
    async fn computer_groups(&self) -> SourceResult<Vec<Value>>;
}

/// Map a regional listing result so a denied region degrades to an empty
/// listing instead of failing the whole scope.
pub fn regional_records(
    result: SourceResult<Vec<Value>>,
    resource: &str,
    region: &str,
) -> StrataResult<Vec<Value>> {
    match result {
        Ok(records) => Ok(records),
        Err(SourceError::AuthDenied(msg)) => {
            warn!(resource, region, "Access denied listing region, treating as empty: {msg}");
            Ok(Vec::new())
        }
        Err(e) => Err(StrataError::provider(e.to_string())),
    }
}

/// Snapshot-file source shared by the AWS, Azure and GCP traits.
///
/// Layout under the snapshot root, one JSON array per file:
///
/// ```text
/// aws/accounts.json
/// aws/<account>/regions.json
/// aws/<account>/s3_buckets.json
/// aws/<account>/<region>/ec2_instances.json
/// aws/<account>/<region>/ec2_security_groups.json
/// azure/subscriptions.json
/// azure/<subscription>/storage_accounts.json
/// azure/<subscription>/virtual_machines.json
/// gcp/projects.json
/// gcp/<project>/instances.json
/// gcp/<project>/buckets.json
/// ```
///
/// A missing file is an empty listing, so partial snapshots sync cleanly.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    root: PathBuf,
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_array(&self, relative: &Path) -> SourceResult<Vec<Value>> {
        let path = self.root.join(relative);
        if !path.exists() {
            debug!(path = %path.display(), "Snapshot file absent, treating as empty");
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| SourceError::other(format!("{}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| SourceError::other(format!("{}: {e}", path.display())))?;
        match value {
            Value::Array(items) => Ok(items),
            _ => Err(SourceError::other(format!(
                "{}: expected a JSON array",
                path.display()
            ))),
        }
    }

    fn read_page(&self, relative: &Path, page_no: i64, page_size: i64) -> SourceResult<Page> {
        let all = self.read_array(relative)?;
        let size = page_size.max(1) as usize;
        let start = (page_no.max(0) as usize).saturating_mul(size);
        let end = (start + size).min(all.len());
        let records = if start < all.len() {
            all[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(Page {
            has_more: end < all.len(),
            records,
        })
    }
}

#[async_trait]
impl AwsSource for SnapshotSource {
    async fn accounts(&self) -> SourceResult<Vec<Value>> {
        self.read_array(Path::new("aws/accounts.json"))
    }

    async fn regions(&self, account_id: &str) -> SourceResult<Vec<String>> {
        let items = self.read_array(&Path::new("aws").join(account_id).join("regions.json"))?;
        Ok(items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    async fn s3_buckets(&self, account_id: &str) -> SourceResult<Vec<Value>> {
        self.read_array(&Path::new("aws").join(account_id).join("s3_buckets.json"))
    }

    async fn ec2_instances(&self, account_id: &str, region: &str) -> SourceResult<Vec<Value>> {
        self.read_array(
            &Path::new("aws")
                .join(account_id)
                .join(region)
                .join("ec2_instances.json"),
        )
    }

    async fn ec2_security_groups(
        &self,
        account_id: &str,
        region: &str,
    ) -> SourceResult<Vec<Value>> {
        self.read_array(
            &Path::new("aws")
                .join(account_id)
                .join(region)
                .join("ec2_security_groups.json"),
        )
    }
}

#[async_trait]
impl AzureSource for SnapshotSource {
    async fn subscriptions(&self) -> SourceResult<Vec<Value>> {
        self.read_array(Path::new("azure/subscriptions.json"))
    }

    async fn storage_accounts(&self, subscription_id: &str) -> SourceResult<Vec<Value>> {
        self.read_array(
            &Path::new("azure")
                .join(subscription_id)
                .join("storage_accounts.json"),
        )
    }

    async fn virtual_machines(&self, subscription_id: &str) -> SourceResult<Vec<Value>> {
        self.read_array(
            &Path::new("azure")
                .join(subscription_id)
                .join("virtual_machines.json"),
        )
    }
}

#[async_trait]
impl GcpSource for SnapshotSource {
    async fn projects(&self) -> SourceResult<Vec<Value>> {
        self.read_array(Path::new("gcp/projects.json"))
    }

    async fn instances(
        &self,
        project_id: &str,
        page_no: i64,
        page_size: i64,
    ) -> SourceResult<Page> {
        self.read_page(
            &Path::new("gcp").join(project_id).join("instances.json"),
            page_no,
            page_size,
        )
    }

    async fn buckets(&self, project_id: &str, page_no: i64, page_size: i64) -> SourceResult<Page> {
        self.read_page(
            &Path::new("gcp").join(project_id).join("buckets.json"),
            page_no,
            page_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(root: &Path, relative: &str, value: &Value) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("strata-snapshot-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_files_are_empty_listings() {
        let source = SnapshotSource::new(temp_root("missing"));
        assert!(source.accounts().await.unwrap().is_empty());
        assert!(source
            .s3_buckets("111111111111")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reads_regional_listings() {
        let root = temp_root("regional");
        write(
            &root,
            "aws/111111111111/us-east-1/ec2_instances.json",
            &json!([{"id": "i-1"}, {"id": "i-2"}]),
        );
        let source = SnapshotSource::new(&root);
        let instances = source
            .ec2_instances("111111111111", "us-east-1")
            .await
            .unwrap();
        assert_eq!(instances.len(), 2);
    }

    #[tokio::test]
    async fn non_array_snapshots_are_rejected() {
        let root = temp_root("nonarray");
        write(&root, "aws/accounts.json", &json!({"id": "oops"}));
        let source = SnapshotSource::new(&root);
        assert!(source.accounts().await.is_err());
    }

    #[tokio::test]
    async fn pages_slice_and_report_continuation() {
        let root = temp_root("paging");
        write(
            &root,
            "gcp/my-project/buckets.json",
            &json!([{"id": "b0"}, {"id": "b1"}, {"id": "b2"}]),
        );
        let source = SnapshotSource::new(&root);

        let first = source.buckets("my-project", 0, 2).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);

        let second = source.buckets("my-project", 1, 2).await.unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(!second.has_more);

        let past_end = source.buckets("my-project", 5, 2).await.unwrap();
        assert!(past_end.records.is_empty());
        assert!(!past_end.has_more);
    }

    #[test]
    fn denied_regions_degrade_to_empty() {
        let result = regional_records(
            Err(SourceError::AuthDenied("explicit deny".to_string())),
            "ec2_instances",
            "eu-north-1",
        );
        assert!(result.unwrap().is_empty());

        let result = regional_records(
            Err(SourceError::other("socket reset")),
            "ec2_instances",
            "eu-north-1",
        );
        assert!(result.is_err());
    }
}
