//! Run configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{StrataError, StrataResult};

/// Connection settings for the Neo4j graph store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "strata_dev".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

/// How a cleanup job treats its bounded delete batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupBehavior {
    /// Re-run each iterative statement until no stale rows remain (default).
    #[default]
    LoopUntilConverged,
    /// Run each statement once; convergence is left to subsequent runs.
    SinglePass,
}

/// Jamf connector settings (basic-auth REST).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JamfSettings {
    pub base_uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Top-level configuration for one sync run.
///
/// Loaded from a TOML file and/or overridden by CLI flags. All provider
/// sections are optional; a provider stage without usable settings logs a
/// warning and is skipped, it does not fail the run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphSettings,

    /// Update tag override; when absent, the run picks the current unix time.
    pub update_tag: Option<i64>,

    /// Subset of provider stages to run; empty means all.
    pub requested_syncs: Vec<String>,

    pub cleanup_behavior: CleanupBehavior,

    /// Directory of inventory snapshot files consumed by the snapshot
    /// connectors for AWS/Azure/GCP.
    pub snapshot_dir: Option<String>,

    pub jamf: JamfSettings,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| StrataError::config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Whether a provider stage was requested (empty selection = all).
    pub fn is_sync_requested(&self, name: &str) -> bool {
        self.requested_syncs.is_empty() || self.requested_syncs.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
        assert_eq!(config.cleanup_behavior, CleanupBehavior::LoopUntilConverged);
        assert!(config.update_tag.is_none());
    }

    #[test]
    fn empty_selection_requests_everything() {
        let config = Config::default();
        assert!(config.is_sync_requested("aws"));
        assert!(config.is_sync_requested("jamf"));
    }

    #[test]
    fn explicit_selection_filters() {
        let config = Config {
            requested_syncs: vec!["aws".to_string()],
            ..Default::default()
        };
        assert!(config.is_sync_requested("aws"));
        assert!(!config.is_sync_requested("gcp"));
    }

    #[test]
    fn parses_toml() {
        let config: Config = toml::from_str(
            r#"
            update_tag = 1700000000
            requested_syncs = ["aws", "azure"]
            cleanup_behavior = "single_pass"

            [graph]
            uri = "bolt://graph:7687"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.update_tag, Some(1700000000));
        assert_eq!(config.graph.uri, "bolt://graph:7687");
        assert_eq!(config.graph.user, "neo4j");
        assert_eq!(config.cleanup_behavior, CleanupBehavior::SinglePass);
    }
}
