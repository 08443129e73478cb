//! GCP ingestion: projects, then per-project resource modules.
//!
//! GCP listings paginate; the page cursor lives in the shared job
//! parameters as `pageNo`/`pageSize` while a module walks its pages, so an
//! interrupted listing inside one process run can resume from the recorded
//! page. The cursor never outlives the run.

pub mod compute;
pub mod storage;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};
use strata_graph::{load_scope_nodes, GraphClient};

use crate::records::parse_records;
use crate::source::GcpSource;

pub const SCOPE_LABEL: &str = "GCPProject";
pub const SCOPE_PARAM: &str = "GCP_PROJECT_ID";

pub const PAGE_NO: &str = "pageNo";
pub const PAGE_SIZE: &str = "pageSize";
pub const DEFAULT_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct GcpProject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lifecycle_state: Option<String>,
}

impl GcpProject {
    fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("id".to_string(), Value::from(self.id.clone()));
        if let Some(name) = &self.name {
            record.insert("name".to_string(), Value::from(name.clone()));
        }
        if let Some(state) = &self.lifecycle_state {
            record.insert("lifecycle_state".to_string(), Value::from(state.clone()));
        }
        record
    }
}

/// Resume point for a paginated listing, read back from the parameters.
pub(crate) fn starting_page(params: &JobParameters) -> i64 {
    params.get(PAGE_NO).and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn page_size(params: &JobParameters) -> i64 {
    params
        .get(PAGE_SIZE)
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn GcpSource,
    params: &mut JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let raw = source
        .projects()
        .await
        .map_err(|e| StrataError::provider(e.to_string()))?;
    let projects: Vec<GcpProject> = parse_records(raw, "gcp_projects");
    if projects.is_empty() {
        warn!("No GCP projects available, nothing to sync");
        return Ok(());
    }

    let update_tag = params.update_tag();
    let records: Vec<Map<String, Value>> = projects.iter().map(GcpProject::to_record).collect();
    load_scope_nodes(client, SCOPE_LABEL, &records, update_tag).await?;

    let mut failed_modules: Vec<String> = Vec::new();
    for project in &projects {
        info!(project = %project.id, "Syncing GCP project");
        params.set(SCOPE_PARAM, project.id.clone());

        sync_one_project(client, source, &project.id, params, behavior, &mut failed_modules)
            .await;

        params.unset(SCOPE_PARAM);
        params.unset(PAGE_NO);
        params.unset(PAGE_SIZE);
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

async fn sync_one_project(
    client: &GraphClient,
    source: &dyn GcpSource,
    project_id: &str,
    params: &mut JobParameters,
    behavior: CleanupBehavior,
    failed_modules: &mut Vec<String>,
) {
    // A module that fails mid-walk leaves its page cursor behind; clear it
    // so the next module starts from page zero.
    if let Err(e) = compute::sync(client, source, project_id, params, behavior).await {
        error!(provider = "gcp", scope = project_id, module = "compute", error = %e, "Module sync failed");
        failed_modules.push(format!("gcp/{project_id}/compute"));
        params.unset(PAGE_NO);
        params.unset(PAGE_SIZE);
    }

    if let Err(e) = storage::sync(client, source, project_id, params, behavior).await {
        error!(provider = "gcp", scope = project_id, module = "storage", error = %e, "Module sync failed");
        failed_modules.push(format!("gcp/{project_id}/storage"));
        params.unset(PAGE_NO);
        params.unset(PAGE_SIZE);
    }
}
