//! Azure ingestion: subscriptions, then per-subscription resource modules.

pub mod storage;
pub mod vm;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{load_scope_nodes, GraphClient};

use crate::records::parse_records;
use crate::source::AzureSource;

pub const SCOPE_LABEL: &str = "AzureSubscription";
pub const SCOPE_PARAM: &str = "AZURE_SUBSCRIPTION_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct AzureSubscription {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl AzureSubscription {
    fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("id".to_string(), Value::from(self.id.clone()));
        if let Some(name) = &self.name {
            record.insert("name".to_string(), Value::from(name.clone()));
        }
        if let Some(state) = &self.state {
            record.insert("state".to_string(), Value::from(state.clone()));
        }
        record
    }
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn AzureSource,
    params: &mut JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let raw = source
        .subscriptions()
        .await
        .map_err(|e| StrataError::provider(e.to_string()))?;
    let subscriptions: Vec<AzureSubscription> = parse_records(raw, "azure_subscriptions");
    if subscriptions.is_empty() {
        warn!("No Azure subscriptions available, nothing to sync");
        return Ok(());
    }

    let update_tag = params.update_tag();
    let records: Vec<Map<String, Value>> =
        subscriptions.iter().map(AzureSubscription::to_record).collect();
    load_scope_nodes(client, SCOPE_LABEL, &records, update_tag).await?;

    let mut failed_modules: Vec<String> = Vec::new();
    for subscription in &subscriptions {
        info!(subscription = %subscription.id, "Syncing Azure subscription");
        params.set(SCOPE_PARAM, subscription.id.clone());

        sync_one_subscription(
            client,
            source,
            &subscription.id,
            params,
            behavior,
            &mut failed_modules,
        )
        .await;

        params.unset(SCOPE_PARAM);
    }

    if failed_modules.is_empty() {
        Ok(())
    } else {
        Err(StrataError::provider(format!(
            "modules failed: {}",
            failed_modules.join(", ")
        )))
    }
}

async fn sync_one_subscription(
    client: &GraphClient,
    source: &dyn AzureSource,
    subscription_id: &str,
    params: &JobParameters,
    behavior: CleanupBehavior,
    failed_modules: &mut Vec<String>,
) {
    let mut contain = |module: &str, result: StrataResult<()>| {
        if let Err(e) = result {
            error!(provider = "azure", scope = subscription_id, module, error = %e, "Module sync failed");
            failed_modules.push(format!("azure/{subscription_id}/{module}"));
        }
    };

    let result = storage::sync(client, source, subscription_id, params, behavior).await;
    contain("storage", result);

    let result = vm::sync(client, source, subscription_id, params, behavior).await;
    contain("vm", result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_records_flatten() {
        let subscription = AzureSubscription {
            id: "sub-1".to_string(),
            name: Some("platform".to_string()),
            state: Some("Enabled".to_string()),
        };
        let record = subscription.to_record();
        assert_eq!(record["id"], json!("sub-1"));
        assert_eq!(record["state"], json!("Enabled"));
    }
}
