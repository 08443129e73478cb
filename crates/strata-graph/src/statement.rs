//! A single parameterized statement run against the inventory graph.

use std::time::Duration;

use neo4rs::Query;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use strata_core::config::CleanupBehavior;
use strata_core::params::LIMIT_SIZE;
use strata_core::{StrataError, StrataResult};

use crate::bolt::json_to_bolt;
use crate::client::GraphClient;

/// Upper bound on re-runs of one iterative statement within a single job
/// execution. Combined with the growing backoff this gives up after roughly
/// ten minutes, mirroring large-delete best practice of bounded retries.
const MAX_ITERATIONS: u32 = 100;

/// A statement that will run against the strata graph. Statements can query
/// or update the graph.
///
/// Iterative statements delete in bounded batches: they must end in
/// `RETURN COUNT(*) as TotalCompleted` and are re-run until that count
/// reaches zero, so no single transaction holds a lock over the entire
/// stale set.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphStatement {
    pub query: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub iterative: bool,
    #[serde(default, rename = "iterationsize")]
    pub iteration_size: i64,
}

impl GraphStatement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Map::new(),
            iterative: false,
            iteration_size: 0,
        }
    }

    /// Create an iterative statement batched by `iteration_size` rows.
    pub fn iterative(query: impl Into<String>, iteration_size: i64) -> Self {
        Self {
            query: query.into(),
            parameters: Map::new(),
            iterative: true,
            iteration_size,
        }
    }

    /// Merge given parameters with existing parameters.
    pub fn merge_parameters(&mut self, parameters: &Map<String, Value>) {
        for (key, value) in parameters {
            self.parameters.insert(key.clone(), value.clone());
        }
    }

    /// The parameter set bound at execution time. The batch limit is always
    /// injected for iterative statements so `$LIMIT_SIZE` resolves.
    fn effective_parameters(&self) -> Map<String, Value> {
        let mut bound = self.parameters.clone();
        if self.iterative {
            bound.insert(LIMIT_SIZE.to_string(), Value::from(self.iteration_size));
        }
        bound
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new(self.query.clone());
        for (key, value) in self.effective_parameters() {
            query = query.param(key.as_str(), json_to_bolt(&value));
        }
        query
    }

    fn loops(&self, behavior: CleanupBehavior) -> bool {
        self.iterative && behavior == CleanupBehavior::LoopUntilConverged
    }

    /// Run the statement against the graph.
    pub async fn run(&self, client: &GraphClient, behavior: CleanupBehavior) -> StrataResult<()> {
        if self.loops(behavior) {
            self.run_iterative(client).await
        } else {
            self.run_once(client).await.map(|_| ())
        }
    }

    async fn run_once(&self, client: &GraphClient) -> StrataResult<i64> {
        let rows = client
            .query(self.to_query())
            .await
            .map_err(|e| StrataError::graph(e.to_string()))?;

        if !self.iterative {
            return Ok(0);
        }

        // Iterative statements report progress via TotalCompleted.
        let completed = rows
            .first()
            .and_then(|row| row.get::<i64>("TotalCompleted").ok())
            .ok_or_else(|| {
                StrataError::graph("iterative statement did not return TotalCompleted")
            })?;
        Ok(completed)
    }

    async fn run_iterative(&self, client: &GraphClient) -> StrataResult<()> {
        converge(&self.query, move || self.run_once(client)).await
    }
}

/// Re-runs one pass in batches of `LIMIT_SIZE` until `TotalCompleted`
/// returns 0, sleeping a growing interval between passes so a large stale
/// set does not monopolize the store.
async fn converge<F, Fut>(query: &str, mut run_pass: F) -> StrataResult<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = StrataResult<i64>>,
{
    let mut backoff_ms: u64 = 0;
    for attempt in 1..=MAX_ITERATIONS {
        let completed = run_pass().await?;
        if completed == 0 {
            debug!(attempts = attempt, "Iterative statement converged");
            return Ok(());
        }
        debug!(attempt, completed, "Iterative statement pass deleted rows");
        if backoff_ms > 0 {
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
        // 0, 100, 200, 400 ... capped at 5s between passes.
        backoff_ms = (backoff_ms * 2).max(100).min(5_000);
    }
    warn!(query = %query, "Iterative statement did not converge");
    Err(StrataError::CleanupStalled {
        job: query.to_string(),
        attempts: MAX_ITERATIONS,
    })
}
