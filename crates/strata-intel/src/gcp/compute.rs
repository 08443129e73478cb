//! GCP compute instance ingestion.

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

const NODE_LABEL: &str = "GCPInstance";

#[derive(Debug, Clone, Deserialize)]
pub struct GcpInstanceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub machine_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn transform(instances: Vec<GcpInstanceRecord>) -> Vec<Map<String, Value>> {
    instances
        .into_iter()
        .map(|instance| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(instance.id));
            if let Some(name) = instance.name {
                record.insert("name".to_string(), Value::from(name));
            }
            if let Some(zone) = instance.zone {
                record.insert("zone".to_string(), Value::from(zone));
            }
            if let Some(machine_type) = instance.machine_type {
                record.insert("machine_type".to_string(), Value::from(machine_type));
            }
            if let Some(status) = instance.status {
                record.insert("status".to_string(), Value::from(status));
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

    // Each page is loaded before the next is fetched, and the cursor is
    // recorded so a retry within this run does not re-list earlier pages.
    loop {
        params.set(PAGE_NO, page_no);
        params.set(PAGE_SIZE, size);

        let page = source
            .instances(project_id, page_no, size)
            .await
            .map_err(|e| StrataError::provider(e.to_string()))?;
        let instances: Vec<GcpInstanceRecord> = parse_records(page.records, "gcp_instances");
        let records = transform(instances);
        total += load_nodes(client, &spec, &records, project_id, update_tag).await?;

        if !page.has_more {
            break;
        }
        page_no += 1;
    }
    params.unset(PAGE_NO);
    params.unset(PAGE_SIZE);
    info!(project = project_id, instances = total, "Loaded GCP instances");

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
    fn instance_transform_keeps_numeric_style_ids_as_strings() {
        let records = transform(vec![GcpInstanceRecord {
            id: "5123456789".to_string(),
            name: Some("worker-1".to_string()),
            zone: Some("us-central1-a".to_string()),
            machine_type: None,
            status: Some("RUNNING".to_string()),
        }]);
        assert_eq!(records[0]["id"], json!("5123456789"));
        assert_eq!(records[0]["status"], json!("RUNNING"));
        assert!(!records[0].contains_key("machine_type"));
    }
}
