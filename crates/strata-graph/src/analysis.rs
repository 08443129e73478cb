//! Registry of declarative analysis jobs.
//!
//! Analysis jobs derive new properties and edges from facts the intel
//! modules already loaded. They are expressed as JSON job definitions
//! embedded at compile time, and they run after every intel stage so the
//! derived layer is never older than the raw layer. Each job clears its own
//! derived properties from nodes the current run did not touch before
//! recomputing, which keeps re-runs idempotent.

use tracing::info;

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};

use crate::client::GraphClient;
use crate::job::GraphJob;

/// Embedded analysis job definitions, keyed by file stem.
pub const ANALYSIS_JOBS: &[(&str, &str)] = &[
    (
        "aws_ec2_asset_exposure",
        include_str!("../data/jobs/analysis/aws_ec2_asset_exposure.json"),
    ),
    (
        "aws_foreign_accounts",
        include_str!("../data/jobs/analysis/aws_foreign_accounts.json"),
    ),
    (
        "azure_storage_asset_exposure",
        include_str!("../data/jobs/analysis/azure_storage_asset_exposure.json"),
    ),
];

/// Names of all registered analysis jobs, in execution order.
pub fn analysis_job_names() -> Vec<&'static str> {
    ANALYSIS_JOBS.iter().map(|(name, _)| *name).collect()
}

fn lookup(name: &str) -> StrataResult<&'static str> {
    ANALYSIS_JOBS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, blob)| *blob)
        .ok_or_else(|| StrataError::UnknownJob(name.to_string()))
}

/// Run one registered analysis job by name with the given run parameters.
pub async fn run_analysis_job(
    client: &GraphClient,
    name: &str,
    parameters: &JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let blob = lookup(name)?;
    info!(job = name, "Running analysis job");
    GraphJob::run_from_json(client, name, blob, parameters, behavior).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_embedded_job_parses() {
        for (name, blob) in ANALYSIS_JOBS {
            let job = GraphJob::from_json(name, blob)
                .unwrap_or_else(|e| panic!("job {name} failed to parse: {e}"));
            assert!(!job.statements.is_empty(), "job {name} has no statements");
        }
    }

    #[test]
    fn derived_property_clearing_comes_first_and_is_iterative() {
        for (name, blob) in ANALYSIS_JOBS {
            let job = GraphJob::from_json(name, blob).unwrap();
            let first = &job.statements[0];
            assert!(first.iterative, "job {name} must clear in batches");
            assert!(
                first.query.contains("REMOVE"),
                "job {name} must clear its derived properties before recomputing"
            );
            assert!(first.query.contains("RETURN COUNT(*) as TotalCompleted"));
        }
    }

    #[test]
    fn unknown_job_name_is_an_error() {
        assert!(matches!(
            lookup("no_such_job"),
            Err(StrataError::UnknownJob(_))
        ));
    }

    // Labels and relationship types the intel modules actually load; an
    // analysis job matching anything else can never produce results.
    const INGESTED_ENTITIES: &[&str] = &[
        "AWSAccount",
        "EC2Instance",
        "EC2SecurityGroup",
        "IpPermissionInbound",
        "IpRange",
        "AzureSubscription",
        "AzureStorageAccount",
        "RESOURCE",
        "MEMBER_OF_EC2_SECURITY_GROUP",
        "MEMBER_OF_IP_RULE",
    ];

    fn label_tokens(query: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for (i, _) in query.match_indices(':') {
            let token: String = query[i + 1..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if !token.is_empty() {
                tokens.push(token);
            }
        }
        tokens
    }

    #[test]
    fn jobs_reference_only_ingested_labels_and_relationships() {
        for (name, blob) in ANALYSIS_JOBS {
            let job = GraphJob::from_json(name, blob).unwrap();
            for statement in &job.statements {
                for token in label_tokens(&statement.query) {
                    assert!(
                        INGESTED_ENTITIES.contains(&token.as_str()),
                        "job {name} matches {token}, which no module loads"
                    );
                }
            }
        }
    }

    #[test]
    fn names_are_stable_and_ordered() {
        let names = analysis_job_names();
        assert_eq!(names.len(), ANALYSIS_JOBS.len());
        assert!(names.contains(&"aws_ec2_asset_exposure"));
    }
}
