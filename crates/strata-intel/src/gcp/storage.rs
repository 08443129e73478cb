//! GCP storage bucket ingestion.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{
    load_nodes, record_module_sync_metadata, CleanupSpec, GraphClient, NodeSpec,
};

use crate::gcp::{page_size, starting_page, SCOPE_LABEL, SCOPE_PARAM, PAGE_NO, PAGE_SIZE};
use crate::records::parse_records;
use crate::source::GcpSource;

const NODE_LABEL: &str = "GCPBucket";

#[derive(Debug, Clone, Deserialize)]
pub struct GcpBucketRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub uniform_bucket_level_access: Option<bool>,
}

fn transform(buckets: Vec<GcpBucketRecord>) -> Vec<Map<String, Value>> {
    buckets
        .into_iter()
        .map(|bucket| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(bucket.id));
            if let Some(name) = bucket.name {
                record.insert("name".to_string(), Value::from(name));
            }
            if let Some(location) = bucket.location {
                record.insert("location".to_string(), Value::from(location));
            }
            if let Some(class) = bucket.storage_class {
                record.insert("storage_class".to_string(), Value::from(class));
            }
            if let Some(uniform) = bucket.uniform_bucket_level_access {
                record.insert(
                    "uniform_bucket_level_access".to_string(),
                    Value::from(uniform),
                );
            }
            record
        })
        .collect()
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn GcpSource,
    project_id: &str,
    params: &mut JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let update_tag = params.update_tag();
    let size = page_size(params);
    let mut page_no = starting_page(params);
    let spec = NodeSpec::new(NODE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    let mut total = 0usize;

    loop {
        params.set(PAGE_NO, page_no);
        params.set(PAGE_SIZE, size);

        let page = source
            .buckets(project_id, page_no, size)
            .await
            .map_err(|e| StrataError::provider(e.to_string()))?;
        let buckets: Vec<GcpBucketRecord> = parse_records(page.records, "gcp_buckets");
        let records = transform(buckets);
        total += load_nodes(client, &spec, &records, project_id, update_tag).await?;

        if !page.has_more {
            break;
        }
        page_no += 1;
    }
    params.unset(PAGE_NO);
    params.unset(PAGE_SIZE);
    info!(project = project_id, buckets = total, "Loaded GCP buckets");

    let mut cleanup = CleanupSpec::new(NODE_LABEL, "RESOURCE", SCOPE_LABEL, SCOPE_PARAM)
        .build_job()?;
    cleanup.merge_parameters(params);
    cleanup.run(client, behavior).await?;

    record_module_sync_metadata(client, SCOPE_LABEL, project_id, NODE_LABEL, update_tag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bucket_transform_flattens_access_flag() {
        let records = transform(vec![GcpBucketRecord {
            id: "artifacts-prod".to_string(),
            name: Some("artifacts-prod".to_string()),
            location: Some("US".to_string()),
            storage_class: Some("STANDARD".to_string()),
            uniform_bucket_level_access: Some(true),
        }]);
        assert_eq!(records[0]["uniform_bucket_level_access"], json!(true));
        assert_eq!(records[0]["storage_class"], json!("STANDARD"));
    }
}
