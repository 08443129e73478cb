//! AWS ingestion: accounts, then per-account resource modules.

pub mod ec2;
pub mod s3;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{load_scope_nodes, GraphClient};

use crate::records::parse_records;
use crate::source::AwsSource;

pub const SCOPE_LABEL: &str = "AWSAccount";
pub const SCOPE_PARAM: &str = "AWS_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct AwsAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl AwsAccount {
    fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("id".to_string(), Value::from(self.id.clone()));
        if let Some(name) = &self.name {
            record.insert("name".to_string(), Value::from(name.clone()));
        }
        record
    }
}

/// Sync all known AWS accounts. Each account gets the full module flow with
/// its scope id bound in the shared parameters for the duration.
///
/// A failed module is logged and the remaining modules still run; the
/// aggregate failure is surfaced at the end so the stage reports partial
/// failure without blocking sibling accounts.
pub async fn sync(
    client: &GraphClient,
    source: &dyn AwsSource,
    params: &mut JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let raw = source
        .accounts()
        .await
        .map_err(|e| StrataError::provider(e.to_string()))?;
    let accounts: Vec<AwsAccount> = parse_records(raw, "aws_accounts");
    if accounts.is_empty() {
        warn!("No AWS accounts available, nothing to sync");
        return Ok(());
    }

    let update_tag = params.update_tag();
    let records: Vec<Map<String, Value>> = accounts.iter().map(AwsAccount::to_record).collect();
    load_scope_nodes(client, SCOPE_LABEL, &records, update_tag).await?;

    let mut failed_modules: Vec<String> = Vec::new();
    for account in &accounts {
        info!(account = %account.id, "Syncing AWS account");
        params.set(SCOPE_PARAM, account.id.clone());

        sync_one_account(client, source, account, params, behavior, &mut failed_modules).await;

        // The scope id must not leak into the next account or stage.
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

async fn sync_one_account(
    client: &GraphClient,
    source: &dyn AwsSource,
    account: &AwsAccount,
    params: &JobParameters,
    behavior: CleanupBehavior,
    failed_modules: &mut Vec<String>,
) {
    let mut contain = |module: &str, result: StrataResult<()>| {
        if let Err(e) = result {
            error!(provider = "aws", scope = %account.id, module, error = %e, "Module sync failed");
            failed_modules.push(format!("aws/{}/{module}", account.id));
        }
    };

    let result = s3::sync(client, source, &account.id, params, behavior).await;
    contain("s3", result);

    let result = match source.regions(&account.id).await {
        Ok(regions) => ec2::sync(client, source, &account.id, &regions, params, behavior).await,
        Err(e) => Err(StrataError::provider(e.to_string())),
    };
    contain("ec2", result);
}
