//! S3 bucket ingestion.
//!
//! Buckets are a global listing per account; the bucket name is the
//! account-wide identity.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{
    load_nodes, record_module_sync_metadata, CleanupSpec, GraphClient, NodeSpec,
};

use crate::aws::{SCOPE_LABEL, SCOPE_PARAM};
use crate::records::parse_records;
use crate::source::AwsSource;

const NODE_LABEL: &str = "S3Bucket";

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRecord {
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub anonymous_access: Option<bool>,
    #[serde(default)]
    pub versioning_enabled: Option<bool>,
}

fn transform(buckets: Vec<BucketRecord>) -> Vec<Map<String, Value>> {
    buckets
        .into_iter()
        .map(|bucket| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(bucket.name.clone()));
            record.insert("name".to_string(), Value::from(bucket.name));
            if let Some(region) = bucket.region {
                record.insert("region".to_string(), Value::from(region));
            }
            if let Some(created) = bucket.creation_date {
                record.insert("creation_date".to_string(), Value::from(created));
            }
            if let Some(anonymous) = bucket.anonymous_access {
                record.insert("anonymous_access".to_string(), Value::from(anonymous));
            }
            if let Some(versioning) = bucket.versioning_enabled {
                record.insert("versioning_enabled".to_string(), Value::from(versioning));
            }
            record
        })
        .collect()
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn AwsSource,
    account_id: &str,
    params: &JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let raw = source
        .s3_buckets(account_id)
        .await
        .map_err(|e| StrataError::provider(e.to_string()))?;
    let buckets: Vec<BucketRecord> = parse_records(raw, "s3_buckets");
    let records = transform(buckets);
    let update_tag = params.update_tag();

    let spec = NodeSpec::new(NODE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    let loaded = load_nodes(client, &spec, &records, account_id, update_tag).await?;
    info!(account = account_id, buckets = loaded, "Loaded S3 buckets");

    let mut cleanup = CleanupSpec::new(NODE_LABEL, "RESOURCE", SCOPE_LABEL, SCOPE_PARAM)
        .build_job()?;
    cleanup.merge_parameters(params);
    cleanup.run(client, behavior).await?;

    record_module_sync_metadata(client, SCOPE_LABEL, account_id, NODE_LABEL, update_tag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bucket_name_becomes_the_identity() {
        let records = transform(vec![BucketRecord {
            name: "logs-prod".to_string(),
            region: Some("us-east-1".to_string()),
            creation_date: None,
            anonymous_access: Some(false),
            versioning_enabled: None,
        }]);
        assert_eq!(records[0]["id"], json!("logs-prod"));
        assert_eq!(records[0]["name"], json!("logs-prod"));
        assert_eq!(records[0]["anonymous_access"], json!(false));
        assert!(!records[0].contains_key("creation_date"));
    }

    #[test]
    fn minimal_provider_records_parse() {
        let buckets: Vec<BucketRecord> =
            parse_records(vec![json!({"name": "b1"}), json!({"nope": 1})], "s3_buckets");
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "b1");
    }
}
