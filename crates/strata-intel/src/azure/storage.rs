//! Azure storage account ingestion.

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

const NODE_LABEL: &str = "AzureStorageAccount";

#[derive(Debug, Clone, Deserialize)]
pub struct StorageAccountRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub allow_blob_public_access: Option<bool>,
}

fn transform(accounts: Vec<StorageAccountRecord>) -> Vec<Map<String, Value>> {
    accounts
        .into_iter()
        .map(|account| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(account.id));
            if let Some(name) = account.name {
                record.insert("name".to_string(), Value::from(name));
            }
            if let Some(location) = account.location {
                record.insert("location".to_string(), Value::from(location));
            }
            if let Some(kind) = account.kind {
                record.insert("kind".to_string(), Value::from(kind));
            }
            if let Some(public) = account.allow_blob_public_access {
                record.insert("allow_blob_public_access".to_string(), Value::from(public));
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
        .storage_accounts(subscription_id)
        .await
        .map_err(|e| StrataError::provider(e.to_string()))?;
    let accounts: Vec<StorageAccountRecord> = parse_records(raw, "azure_storage_accounts");
    let records = transform(accounts);
    let update_tag = params.update_tag();

    let spec = NodeSpec::new(NODE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    let loaded = load_nodes(client, &spec, &records, subscription_id, update_tag).await?;
    info!(subscription = subscription_id, storage_accounts = loaded, "Loaded storage accounts");

    let mut cleanup = CleanupSpec::new(NODE_LABEL, "RESOURCE", SCOPE_LABEL, SCOPE_PARAM)
        .build_job()?;
    cleanup.merge_parameters(params);
    cleanup.run(client, behavior).await?;

    record_module_sync_metadata(client, SCOPE_LABEL, subscription_id, NODE_LABEL, update_tag).await
}
