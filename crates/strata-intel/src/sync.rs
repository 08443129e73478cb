//! The sync orchestrator: ordered stages with per-stage failure containment.

use std::time::Instant;

use tracing::{error, info, warn};

use strata_core::params::JobParameters;
use strata_core::{Config, StrataError, StrataResult, UpdateTag};
use strata_graph::{initialize_schema, run_analysis_job, analysis_job_names, GraphClient};

use crate::report::{StageOutcome, SyncReport};
use crate::source::{AwsSource, AzureSource, GcpSource, JamfSource, SnapshotSource};
use crate::{aws, azure, gcp, jamf};

/// All stages, in execution order. Index creation always leads so MERGE
/// lookups are backed before any load, and analysis always trails so the
/// derived layer sees the freshest facts.
pub const STAGE_NAMES: &[&str] = &["create-indexes", "aws", "azure", "gcp", "jamf", "analysis"];

/// The provider sources available to this run.
#[derive(Default)]
pub struct Sources {
    pub aws: Option<Box<dyn AwsSource>>,
    pub azure: Option<Box<dyn AzureSource>>,
    pub gcp: Option<Box<dyn GcpSource>>,
    pub jamf: Option<Box<dyn JamfSource>>,
}

impl Sources {
    /// Wire up sources from configuration: snapshot-backed cloud sources
    /// when a snapshot directory is set, a live Jamf client when its
    /// settings are complete.
    pub fn from_config(config: &Config) -> Self {
        let mut sources = Self::default();
        if let Some(dir) = &config.snapshot_dir {
            sources.aws = Some(Box::new(SnapshotSource::new(dir)));
            sources.azure = Some(Box::new(SnapshotSource::new(dir)));
            sources.gcp = Some(Box::new(SnapshotSource::new(dir)));
        }
        if let Some(jamf_source) = jamf::HttpJamfSource::from_settings(&config.jamf) {
            sources.jamf = Some(Box::new(jamf_source));
        }
        sources
    }
}

/// Reject unknown stage names up front so a typo fails the run before it
/// half-executes.
pub fn validate_requested_syncs(config: &Config) -> StrataResult<()> {
    for requested in &config.requested_syncs {
        if !STAGE_NAMES.contains(&requested.as_str()) {
            return Err(StrataError::config(format!(
                "unknown sync stage '{requested}', valid stages: {}",
                STAGE_NAMES.join(", ")
            )));
        }
    }
    Ok(())
}

enum StageRun {
    Ran,
    Skipped(String),
}

/// Run all requested stages against the graph.
///
/// A stage failure is contained: it is logged, recorded in the report, and
/// the run moves on, so one provider outage cannot block the others'
/// cleanups. The caller decides what a partially failed run means.
pub async fn run(
    client: &GraphClient,
    config: &Config,
    sources: &Sources,
) -> StrataResult<SyncReport> {
    validate_requested_syncs(config)?;

    let update_tag = config
        .update_tag
        .map(UpdateTag::from)
        .unwrap_or_else(UpdateTag::now);
    info!(update_tag = update_tag.as_i64(), "Starting sync run");

    let mut params = JobParameters::new(update_tag);
    let mut report = SyncReport::default();

    for name in STAGE_NAMES {
        if !config.is_sync_requested(name) {
            report.record(name, StageOutcome::Skipped("not requested".to_string()), Default::default());
            continue;
        }

        let started = Instant::now();
        let outcome = match run_stage(name, client, config, sources, &mut params).await {
            Ok(StageRun::Ran) => {
                info!(stage = name, elapsed_ms = started.elapsed().as_millis() as u64, "Stage completed");
                StageOutcome::Completed
            }
            Ok(StageRun::Skipped(reason)) => {
                warn!(stage = name, reason = %reason, "Stage skipped");
                StageOutcome::Skipped(reason)
            }
            Err(e) => {
                error!(stage = name, error = %e, "Stage failed, continuing with remaining stages");
                StageOutcome::Failed(e.to_string())
            }
        };
        report.record(name, outcome, started.elapsed());
    }

    info!(
        failed = report.failed_stages().len(),
        stages = report.stages.len(),
        "Sync run finished"
    );
    Ok(report)
}

async fn run_stage(
    name: &str,
    client: &GraphClient,
    config: &Config,
    sources: &Sources,
    params: &mut JobParameters,
) -> StrataResult<StageRun> {
    match name {
        "create-indexes" => {
            initialize_schema(client)
                .await
                .map_err(|e| StrataError::graph(e.to_string()))?;
            Ok(StageRun::Ran)
        }
        "aws" => match &sources.aws {
            Some(source) => {
                aws::sync(client, source.as_ref(), params, config.cleanup_behavior).await?;
                Ok(StageRun::Ran)
            }
            None => Ok(StageRun::Skipped("no AWS source configured".to_string())),
        },
        "azure" => match &sources.azure {
            Some(source) => {
                azure::sync(client, source.as_ref(), params, config.cleanup_behavior).await?;
                Ok(StageRun::Ran)
            }
            None => Ok(StageRun::Skipped("no Azure source configured".to_string())),
        },
        "gcp" => match &sources.gcp {
            Some(source) => {
                gcp::sync(client, source.as_ref(), params, config.cleanup_behavior).await?;
                Ok(StageRun::Ran)
            }
            None => Ok(StageRun::Skipped("no GCP source configured".to_string())),
        },
        "jamf" => match &sources.jamf {
            Some(source) => {
                jamf::sync(client, source.as_ref(), params, config.cleanup_behavior).await?;
                Ok(StageRun::Ran)
            }
            None => Ok(StageRun::Skipped("no Jamf source configured".to_string())),
        },
        "analysis" => {
            for job_name in analysis_job_names() {
                run_analysis_job(client, job_name, params, config.cleanup_behavior).await?;
            }
            Ok(StageRun::Ran)
        }
        other => Err(StrataError::config(format!("unknown stage '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_requested_sync_is_a_config_error() {
        let config = Config {
            requested_syncs: vec!["aws".to_string(), "digitalocean".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            validate_requested_syncs(&config),
            Err(StrataError::Config(_))
        ));
    }

    #[test]
    fn known_requested_syncs_validate() {
        let config = Config {
            requested_syncs: vec!["aws".to_string(), "analysis".to_string()],
            ..Default::default()
        };
        assert!(validate_requested_syncs(&config).is_ok());
    }

    #[test]
    fn sources_come_up_empty_without_configuration() {
        let sources = Sources::from_config(&Config::default());
        assert!(sources.aws.is_none());
        assert!(sources.jamf.is_none());
    }

    #[test]
    fn snapshot_dir_enables_cloud_sources() {
        let config = Config {
            snapshot_dir: Some("/tmp/snap".to_string()),
            ..Default::default()
        };
        let sources = Sources::from_config(&config);
        assert!(sources.aws.is_some());
        assert!(sources.azure.is_some());
        assert!(sources.gcp.is_some());
        assert!(sources.jamf.is_none());
    }
}
