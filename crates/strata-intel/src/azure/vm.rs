//! Azure virtual machine ingestion.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{
    load_nodes, record_module_sync_metadata, CleanupSpec, GraphClient, NodeSpec,
};

use crate::azure::{SCOPE_LABEL, SCOPE_PARAM};
use crate::records::parse_records;
use crate::source::AzureSource;

const NODE_LABEL: &str = "AzureVirtualMachine";

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualMachineRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub vm_size: Option<String>,
    #[serde(default)]
    pub os_type: Option<String>,
}

fn transform(machines: Vec<VirtualMachineRecord>) -> Vec<Map<String, Value>> {
    machines
        .into_iter()
        .map(|vm| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(vm.id));
            if let Some(name) = vm.name {
                record.insert("name".to_string(), Value::from(name));
            }
            if let Some(location) = vm.location {
                record.insert("location".to_string(), Value::from(location));
            }
            if let Some(size) = vm.vm_size {
                record.insert("vm_size".to_string(), Value::from(size));
            }
            if let Some(os) = vm.os_type {
                record.insert("os_type".to_string(), Value::from(os));
            }
            record
        })
        .collect()
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn AzureSource,
    subscription_id: &str,
    params: &JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let raw = source
        .virtual_machines(subscription_id)
        .await
        .map_err(|e| StrataError::provider(e.to_string()))?;
    let machines: Vec<VirtualMachineRecord> = parse_records(raw, "azure_virtual_machines");
    let records = transform(machines);
    let update_tag = params.update_tag();

    let spec = NodeSpec::new(NODE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    let loaded = load_nodes(client, &spec, &records, subscription_id, update_tag).await?;
    info!(subscription = subscription_id, virtual_machines = loaded, "Loaded virtual machines");

    let mut cleanup = CleanupSpec::new(NODE_LABEL, "RESOURCE", SCOPE_LABEL, SCOPE_PARAM)
        .build_job()?;
    cleanup.merge_parameters(params);
    cleanup.run(client, behavior).await?;

    record_module_sync_metadata(client, SCOPE_LABEL, subscription_id, NODE_LABEL, update_tag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vm_records_keep_resource_id_identity() {
        let records = transform(vec![VirtualMachineRecord {
            id: "/subscriptions/sub-1/vm/web-1".to_string(),
            name: Some("web-1".to_string()),
            location: Some("westeurope".to_string()),
            vm_size: Some("Standard_D2s_v3".to_string()),
            os_type: None,
        }]);
        assert_eq!(records[0]["id"], json!("/subscriptions/sub-1/vm/web-1"));
        assert_eq!(records[0]["vm_size"], json!("Standard_D2s_v3"));
    }
}
