//! Jamf device-management ingestion.
//!
//! The only live HTTP connector: Jamf's classic API is a simple basic-auth
//! REST surface, so no SDK stands between us and it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use strata_core::config::{CleanupBehavior, JamfSettings};
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{
    load_nodes, load_scope_nodes, record_module_sync_metadata, CleanupSpec, GraphClient, NodeSpec,
};

use crate::records::parse_records;
use crate::source::{JamfSource, SourceError, SourceResult};

pub const SCOPE_LABEL: &str = "JamfTenant";
pub const SCOPE_PARAM: &str = "JAMF_TENANT_ID";
const NODE_LABEL: &str = "JamfComputerGroup";

/// Live Jamf classic-API source.
pub struct HttpJamfSource {
    client: reqwest::Client,
    base_uri: String,
    user: String,
    password: String,
}

impl HttpJamfSource {
    /// Build from settings; `None` when the settings are incomplete.
    pub fn from_settings(settings: &JamfSettings) -> Option<Self> {
        let base_uri = settings.base_uri.clone()?;
        let user = settings.user.clone()?;
        let password = settings.password.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            base_uri: base_uri.trim_end_matches('/').to_string(),
            user,
            password,
        })
    }

    async fn get_json(&self, path: &str) -> SourceResult<Value> {
        let url = format!("{}{path}", self.base_uri);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::other(format!("{url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::AuthDenied(format!("{url}: {status}")));
        }
        if !status.is_success() {
            return Err(SourceError::other(format!("{url}: {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| SourceError::other(format!("{url}: {e}")))
    }
}

#[async_trait]
impl JamfSource for HttpJamfSource {
    fn tenant_id(&self) -> String {
        self.base_uri.clone()
    }

    async fn computer_groups(&self) -> SourceResult<Vec<Value>> {
        let body = self.get_json("/JSSResource/computergroups").await?;
        match body.get("computer_groups") {
            Some(Value::Array(groups)) => Ok(groups.clone()),
            _ => Err(SourceError::other(
                "computergroups response missing computer_groups array",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputerGroupRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_smart: Option<bool>,
}

fn transform(groups: Vec<ComputerGroupRecord>) -> Vec<Map<String, Value>> {
    groups
        .into_iter()
        .map(|group| {
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(group.id.to_string()));
            record.insert("name".to_string(), Value::from(group.name));
            if let Some(smart) = group.is_smart {
                record.insert("is_smart".to_string(), Value::from(smart));
            }
            record
        })
        .collect()
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn JamfSource,
    params: &mut JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let tenant_id = source.tenant_id();
    let update_tag = params.update_tag();

    let raw = match source.computer_groups().await {
        Ok(raw) => raw,
        Err(SourceError::AuthDenied(msg)) => {
            warn!("Jamf credentials rejected, skipping: {msg}");
            return Ok(());
        }
        Err(e) => return Err(StrataError::provider(e.to_string())),
    };
    let groups: Vec<ComputerGroupRecord> = parse_records(raw, "jamf_computer_groups");
    let records = transform(groups);

    let mut tenant = Map::new();
    tenant.insert("id".to_string(), Value::from(tenant_id.clone()));
    load_scope_nodes(client, SCOPE_LABEL, &[tenant], update_tag).await?;

    params.set(SCOPE_PARAM, tenant_id.clone());
    let result = async {
        let spec = NodeSpec::new(NODE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
        let loaded = load_nodes(client, &spec, &records, &tenant_id, update_tag).await?;
        info!(tenant = %tenant_id, computer_groups = loaded, "Loaded Jamf computer groups");

        let mut cleanup = CleanupSpec::new(NODE_LABEL, "RESOURCE", SCOPE_LABEL, SCOPE_PARAM)
            .build_job()?;
        cleanup.merge_parameters(params);
        cleanup.run(client, behavior).await?;

        record_module_sync_metadata(client, SCOPE_LABEL, &tenant_id, NODE_LABEL, update_tag).await
    }
    .await;
    params.unset(SCOPE_PARAM);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_group_ids_become_string_identities() {
        let records = transform(vec![ComputerGroupRecord {
            id: 42,
            name: "All Laptops".to_string(),
            is_smart: Some(true),
        }]);
        assert_eq!(records[0]["id"], json!("42"));
        assert_eq!(records[0]["is_smart"], json!(true));
    }

    #[test]
    fn incomplete_settings_yield_no_source() {
        let settings = JamfSettings {
            base_uri: Some("https://jamf.example.com".to_string()),
            user: None,
            password: None,
        };
        assert!(HttpJamfSource::from_settings(&settings).is_none());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let settings = JamfSettings {
            base_uri: Some("https://jamf.example.com/".to_string()),
            user: Some("api".to_string()),
            password: Some("secret".to_string()),
        };
        let source = HttpJamfSource::from_settings(&settings).unwrap();
        assert_eq!(source.tenant_id(), "https://jamf.example.com");
    }
}
