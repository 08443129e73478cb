//! A named sequence of graph statements executed in order.

use serde::Deserialize;
use tracing::{debug, error};

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::{StrataError, StrataResult};

use crate::client::GraphClient;
use crate::statement::GraphStatement;

/// A job that will run against the strata graph. A job is a sequence of
/// statements which execute sequentially; the first failing statement
/// aborts the job, there is no partial silent success.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphJob {
    pub name: String,
    pub statements: Vec<GraphStatement>,
}

impl GraphJob {
    pub fn new(name: impl Into<String>, statements: Vec<GraphStatement>) -> Self {
        Self {
            name: name.into(),
            statements,
        }
    }

    /// Create a job from a declarative JSON definition.
    pub fn from_json(name: &str, blob: &str) -> StrataResult<Self> {
        serde_json::from_str(blob).map_err(|e| StrataError::MalformedJob {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Merge parameters into all job statements.
    pub fn merge_parameters(&mut self, parameters: &JobParameters) {
        let map = parameters.as_map();
        for statement in &mut self.statements {
            statement.merge_parameters(&map);
        }
    }

    /// Run the job. This will execute all statements sequentially.
    pub async fn run(&self, client: &GraphClient, behavior: CleanupBehavior) -> StrataResult<()> {
        debug!(job = %self.name, "Starting graph job");
        for statement in &self.statements {
            if let Err(e) = statement.run(client, behavior).await {
                error!(job = %self.name, error = %e, "Statement failed in graph job");
                return Err(e);
            }
        }
        debug!(job = %self.name, "Finished graph job");
        Ok(())
    }

    /// Run a job from a JSON definition with the given parameters.
    pub async fn run_from_json(
        client: &GraphClient,
        name: &str,
        blob: &str,
        parameters: &JobParameters,
        behavior: CleanupBehavior,
    ) -> StrataResult<()> {
        let mut job = Self::from_json(name, blob)?;
        job.merge_parameters(parameters);
        job.run(client, behavior).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_core::UpdateTag;

    const JOB_BLOB: &str = r#"{
        "name": "test cleanup",
        "statements": [
            {
                "query": "MATCH (n:Widget)<-[:RESOURCE]-(:Account{id: $ACCOUNT_ID}) WHERE n.lastupdated <> $UPDATE_TAG WITH n LIMIT $LIMIT_SIZE DETACH DELETE n RETURN COUNT(*) as TotalCompleted",
                "iterative": true,
                "iterationsize": 100
            },
            {
                "query": "MATCH (:Widget)<-[r:RESOURCE]-(:Account{id: $ACCOUNT_ID}) WHERE r.lastupdated <> $UPDATE_TAG WITH r LIMIT $LIMIT_SIZE DELETE r RETURN COUNT(*) as TotalCompleted",
                "iterative": true,
                "iterationsize": 100
            }
        ]
    }"#;

    #[test]
    fn parses_declarative_job() {
        let job = GraphJob::from_json("test cleanup", JOB_BLOB).unwrap();
        assert_eq!(job.name, "test cleanup");
        assert_eq!(job.statements.len(), 2);
        assert!(job.statements.iter().all(|s| s.iterative));
    }

    #[test]
    fn malformed_job_is_rejected_with_name() {
        let err = GraphJob::from_json("broken", "{\"name\": 3}").unwrap_err();
        match err {
            StrataError::MalformedJob { name, .. } => assert_eq!(name, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parameters_reach_every_statement() {
        let mut job = GraphJob::from_json("test cleanup", JOB_BLOB).unwrap();
        let mut params = JobParameters::new(UpdateTag(200));
        params.set("ACCOUNT_ID", "111");
        job.merge_parameters(&params);

        for statement in &job.statements {
            assert_eq!(statement.parameters["UPDATE_TAG"], json!(200));
            assert_eq!(statement.parameters["ACCOUNT_ID"], json!("111"));
        }
    }
}
