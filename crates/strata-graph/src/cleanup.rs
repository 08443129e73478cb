//! Builders for stale-node and stale-relationship cleanup jobs.
//!
//! Graph query languages only allow values as bind parameters, never labels
//! or property names, so labels are validated against a strict identifier
//! form and substituted as text. Scope identifiers and the update tag are
//! always bound parameters.

use strata_core::{StrataError, StrataResult};

use crate::job::GraphJob;
use crate::statement::GraphStatement;

/// Default bound on rows deleted per cleanup pass.
pub const DEFAULT_BATCH_SIZE: i64 = 1000;

/// Direction of the owning relationship between scope and resource, as seen
/// from the resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// `(resource)<-[:REL]-(scope)` — the conventional ownership shape.
    Inward,
    /// `(resource)-[:REL]->(scope)`
    Outward,
}

/// Describes the stale-set of one resource type within one owning scope.
#[derive(Debug, Clone)]
pub struct CleanupSpec {
    /// Label of the resource nodes to clean, e.g. `S3Bucket`.
    pub node_label: String,
    /// Label of the owning relationship, e.g. `RESOURCE`.
    pub rel_label: String,
    /// Label of the scope node, e.g. `AWSAccount`.
    pub scope_label: String,
    /// Property on the scope node that identifies it, usually `id`.
    pub scope_key: String,
    /// Name of the bound parameter carrying the scope identifier value,
    /// e.g. `AWS_ID`.
    pub scope_param: String,
    pub direction: LinkDirection,
    pub batch_size: i64,
}

impl CleanupSpec {
    pub fn new(
        node_label: impl Into<String>,
        rel_label: impl Into<String>,
        scope_label: impl Into<String>,
        scope_param: impl Into<String>,
    ) -> Self {
        Self {
            node_label: node_label.into(),
            rel_label: rel_label.into(),
            scope_label: scope_label.into(),
            scope_key: "id".to_string(),
            scope_param: scope_param.into(),
            direction: LinkDirection::Inward,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn validate(&self) -> StrataResult<()> {
        for label in [
            &self.node_label,
            &self.rel_label,
            &self.scope_label,
            &self.scope_key,
        ] {
            validate_identifier(label)?;
        }
        validate_identifier(&self.scope_param)
    }

    fn owner_link(&self, rel_var: &str) -> String {
        let rel = if rel_var.is_empty() {
            format!(":{}", self.rel_label)
        } else {
            format!("{}:{}", rel_var, self.rel_label)
        };
        match self.direction {
            LinkDirection::Inward => format!("<-[{rel}]-"),
            LinkDirection::Outward => format!("-[{rel}]->"),
        }
    }

    fn scope_match(&self) -> String {
        format!(
            "(:{}{{{}: ${}}})",
            self.scope_label, self.scope_key, self.scope_param
        )
    }

    /// Build the two-statement cleanup job: stale nodes first (DETACH
    /// DELETE), then stale owning relationships. Both statements are
    /// iterative and bounded by the batch size.
    pub fn build_job(&self) -> StrataResult<GraphJob> {
        self.validate()?;

        let node_query = format!(
            "MATCH (n:{label}){link}{scope} \
             WHERE n.lastupdated <> $UPDATE_TAG \
             WITH n LIMIT $LIMIT_SIZE \
             DETACH DELETE n \
             RETURN COUNT(*) as TotalCompleted",
            label = self.node_label,
            link = self.owner_link(""),
            scope = self.scope_match(),
        );

        let rel_query = format!(
            "MATCH (:{label}){link}{scope} \
             WHERE r.lastupdated <> $UPDATE_TAG \
             WITH r LIMIT $LIMIT_SIZE \
             DELETE r \
             RETURN COUNT(*) as TotalCompleted",
            label = self.node_label,
            link = self.owner_link("r"),
            scope = self.scope_match(),
        );

        Ok(GraphJob::new(
            format!("cleanup {}", self.node_label),
            vec![
                GraphStatement::iterative(node_query, self.batch_size),
                GraphStatement::iterative(rel_query, self.batch_size),
            ],
        ))
    }

    /// Build a job that removes a single stale property from matching nodes
    /// instead of deleting them. Used for schema-evolution cleanups where a
    /// field stopped being ingested but the nodes live on.
    pub fn build_property_removal_job(&self, property: &str) -> StrataResult<GraphJob> {
        self.validate()?;
        validate_identifier(property)?;

        let query = format!(
            "MATCH (n:{label}){link}{scope} \
             WHERE n.{property} IS NOT NULL AND n.lastupdated <> $UPDATE_TAG \
             WITH n LIMIT $LIMIT_SIZE \
             REMOVE n.{property} \
             RETURN COUNT(*) as TotalCompleted",
            label = self.node_label,
            link = self.owner_link(""),
            scope = self.scope_match(),
            property = property,
        );

        Ok(GraphJob::new(
            format!("remove stale {}.{}", self.node_label, property),
            vec![GraphStatement::iterative(query, self.batch_size)],
        ))
    }
}

/// Allow-list check for anything substituted into query text: ASCII
/// alphanumerics and underscores, starting with a letter.
pub fn validate_identifier(name: &str) -> StrataResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StrataError::InvalidLabel(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_spec() -> CleanupSpec {
        CleanupSpec::new("S3Bucket", "RESOURCE", "AWSAccount", "AWS_ID")
    }

    #[test]
    fn node_statement_detach_deletes_stale_nodes_within_scope() {
        let job = bucket_spec().build_job().unwrap();
        let query = &job.statements[0].query;
        assert!(query.contains("MATCH (n:S3Bucket)<-[:RESOURCE]-(:AWSAccount{id: $AWS_ID})"));
        assert!(query.contains("WHERE n.lastupdated <> $UPDATE_TAG"));
        assert!(query.contains("WITH n LIMIT $LIMIT_SIZE"));
        assert!(query.contains("DETACH DELETE n"));
        assert!(query.contains("RETURN COUNT(*) as TotalCompleted"));
    }

    #[test]
    fn rel_statement_deletes_stale_ownership_edges() {
        let job = bucket_spec().build_job().unwrap();
        let query = &job.statements[1].query;
        assert!(query.contains("MATCH (:S3Bucket)<-[r:RESOURCE]-(:AWSAccount{id: $AWS_ID})"));
        assert!(query.contains("WHERE r.lastupdated <> $UPDATE_TAG"));
        assert!(query.contains("DELETE r"));
        assert!(!query.contains("DETACH"));
    }

    #[test]
    fn scope_value_is_always_a_bound_parameter() {
        // Cleanup scoping: the scope identifier must never be inlined, so a
        // run for scope Y cannot be templated into deleting scope X's nodes.
        let job = bucket_spec().build_job().unwrap();
        for statement in &job.statements {
            assert!(statement.query.contains("$AWS_ID"));
            assert!(statement.iterative);
        }
    }

    #[test]
    fn batch_size_is_configurable() {
        let job = bucket_spec().with_batch_size(50).build_job().unwrap();
        assert!(job.statements.iter().all(|s| s.iteration_size == 50));
    }

    #[test]
    fn outward_direction_flips_the_arrow() {
        let mut spec = bucket_spec();
        spec.direction = LinkDirection::Outward;
        let job = spec.build_job().unwrap();
        assert!(job.statements[0]
            .query
            .contains("(n:S3Bucket)-[:RESOURCE]->(:AWSAccount{id: $AWS_ID})"));
    }

    #[test]
    fn property_removal_keeps_the_node() {
        let job = bucket_spec().build_property_removal_job("anonymous_access").unwrap();
        let query = &job.statements[0].query;
        assert!(query.contains("REMOVE n.anonymous_access"));
        assert!(!query.contains("DELETE n"));
    }

    #[test]
    fn injection_shaped_labels_are_rejected() {
        let spec = CleanupSpec::new("S3Bucket) DETACH DELETE (m", "RESOURCE", "AWSAccount", "AWS_ID");
        assert!(matches!(spec.build_job(), Err(StrataError::InvalidLabel(_))));

        let spec = CleanupSpec::new("S3Bucket", "RESOURCE", "AWSAccount", "AWS_ID");
        assert!(matches!(
            spec.build_property_removal_job("a b"),
            Err(StrataError::InvalidLabel(_))
        ));
    }
}
