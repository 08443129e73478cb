//! UNWIND-batched upsert of resource nodes and relationships.
//!
//! One statement ingests a whole batch server-side, so round trips stay
//! O(resource types x scopes) instead of O(resources). Every touched node
//! and edge gets `firstseen` on create only and `lastupdated` stamped with
//! the run's update tag; re-running the same batch with the same tag leaves
//! the graph unchanged.

use serde_json::{Map, Value};
use tracing::debug;

use strata_core::{StrataResult, UpdateTag};

use crate::bolt::records_to_bolt;
use crate::cleanup::validate_identifier;
use crate::client::GraphClient;

/// Default records per UNWIND round trip.
pub const DEFAULT_LOAD_BATCH_SIZE: usize = 1000;

/// Describes how a resource type's nodes attach to their owning scope.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Node label, e.g. `S3Bucket`.
    pub label: String,
    /// Identity property, unique within the label, e.g. `id`.
    pub id_key: String,
    /// Scope node label, e.g. `AWSAccount`.
    pub scope_label: String,
    /// Owning relationship label, conventionally `RESOURCE`, directed from
    /// the scope to the resource.
    pub rel_label: String,
    /// Bound parameter name carrying the scope identifier, e.g. `AWS_ID`.
    pub scope_param: String,
    pub batch_size: usize,
}

impl NodeSpec {
    pub fn new(
        label: impl Into<String>,
        scope_label: impl Into<String>,
        scope_param: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            id_key: "id".to_string(),
            scope_label: scope_label.into(),
            rel_label: "RESOURCE".to_string(),
            scope_param: scope_param.into(),
            batch_size: DEFAULT_LOAD_BATCH_SIZE,
        }
    }

    fn validate(&self) -> StrataResult<()> {
        for name in [
            &self.label,
            &self.id_key,
            &self.scope_label,
            &self.rel_label,
            &self.scope_param,
        ] {
            validate_identifier(name)?;
        }
        Ok(())
    }

    /// The batched upsert statement for this resource type.
    pub fn build_query(&self) -> String {
        format!(
            "UNWIND $Records AS record \
             MERGE (n:{label}{{{id_key}: record.{id_key}}}) \
             ON CREATE SET n.firstseen = timestamp() \
             SET n += record, n.lastupdated = $UPDATE_TAG \
             WITH n \
             MATCH (owner:{scope_label}{{id: ${scope_param}}}) \
             MERGE (owner)-[r:{rel_label}]->(n) \
             ON CREATE SET r.firstseen = timestamp() \
             SET r.lastupdated = $UPDATE_TAG",
            label = self.label,
            id_key = self.id_key,
            scope_label = self.scope_label,
            scope_param = self.scope_param,
            rel_label = self.rel_label,
        )
    }
}

/// Upsert a batch of flattened records as nodes owned by the given scope.
///
/// Records missing the identity key are skipped with a warning rather than
/// failing the batch. Returns the number of records sent.
pub async fn load_nodes(
    client: &GraphClient,
    spec: &NodeSpec,
    records: &[Map<String, Value>],
    scope_id: &str,
    update_tag: UpdateTag,
) -> StrataResult<usize> {
    spec.validate()?;

    let valid: Vec<Map<String, Value>> = records
        .iter()
        .filter(|record| {
            let has_id = record
                .get(&spec.id_key)
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if !has_id {
                tracing::warn!(
                    label = %spec.label,
                    "Skipping record without identity key '{}'",
                    spec.id_key
                );
            }
            has_id
        })
        .cloned()
        .collect();

    let query_text = spec.build_query();
    for chunk in valid.chunks(spec.batch_size) {
        let query = neo4rs::Query::new(query_text.clone())
            .param("Records", records_to_bolt(chunk))
            .param(spec.scope_param.as_str(), scope_id)
            .param("UPDATE_TAG", update_tag.as_i64());
        client
            .execute(query)
            .await
            .map_err(|e| strata_core::StrataError::graph(e.to_string()))?;
    }

    debug!(label = %spec.label, count = valid.len(), "Loaded nodes");
    Ok(valid.len())
}

/// Upsert scope nodes themselves (accounts, subscriptions, projects,
/// tenants). Scopes have no owner, so there is no ownership edge; the stamp
/// discipline is the same as for resources.
pub async fn load_scope_nodes(
    client: &GraphClient,
    label: &str,
    records: &[Map<String, Value>],
    update_tag: UpdateTag,
) -> StrataResult<usize> {
    validate_identifier(label)?;

    let query_text = format!(
        "UNWIND $Records AS record \
         MERGE (n:{label}{{id: record.id}}) \
         ON CREATE SET n.firstseen = timestamp() \
         SET n += record, n.lastupdated = $UPDATE_TAG"
    );
    for chunk in records.chunks(DEFAULT_LOAD_BATCH_SIZE) {
        let query = neo4rs::Query::new(query_text.clone())
            .param("Records", records_to_bolt(chunk))
            .param("UPDATE_TAG", update_tag.as_i64());
        client
            .execute(query)
            .await
            .map_err(|e| strata_core::StrataError::graph(e.to_string()))?;
    }

    debug!(label, count = records.len(), "Loaded scope nodes");
    Ok(records.len())
}

/// Describes a cross-resource relationship between two already-loaded
/// resource types.
#[derive(Debug, Clone)]
pub struct RelSpec {
    pub from_label: String,
    pub from_key: String,
    pub to_label: String,
    pub to_key: String,
    pub rel_label: String,
    pub batch_size: usize,
}

impl RelSpec {
    pub fn new(
        from_label: impl Into<String>,
        to_label: impl Into<String>,
        rel_label: impl Into<String>,
    ) -> Self {
        Self {
            from_label: from_label.into(),
            from_key: "id".to_string(),
            to_label: to_label.into(),
            to_key: "id".to_string(),
            rel_label: rel_label.into(),
            batch_size: DEFAULT_LOAD_BATCH_SIZE,
        }
    }

    fn validate(&self) -> StrataResult<()> {
        for name in [
            &self.from_label,
            &self.from_key,
            &self.to_label,
            &self.to_key,
            &self.rel_label,
        ] {
            validate_identifier(name)?;
        }
        Ok(())
    }

    /// MATCH-both-endpoints merge: the edge is only created or refreshed
    /// when both endpoints already exist.
    pub fn build_query(&self) -> String {
        format!(
            "UNWIND $Rels AS rel \
             MATCH (a:{from_label}{{{from_key}: rel.from_id}}) \
             MATCH (b:{to_label}{{{to_key}: rel.to_id}}) \
             MERGE (a)-[r:{rel_label}]->(b) \
             ON CREATE SET r.firstseen = timestamp() \
             SET r.lastupdated = $UPDATE_TAG",
            from_label = self.from_label,
            from_key = self.from_key,
            to_label = self.to_label,
            to_key = self.to_key,
            rel_label = self.rel_label,
        )
    }
}

/// One endpoint pair for a cross-resource relationship batch.
#[derive(Debug, Clone)]
pub struct RelEndpoints {
    pub from_id: String,
    pub to_id: String,
}

/// Merge a batch of cross-resource relationships, stamping the update tag.
pub async fn load_relationships(
    client: &GraphClient,
    spec: &RelSpec,
    pairs: &[RelEndpoints],
    update_tag: UpdateTag,
) -> StrataResult<usize> {
    spec.validate()?;

    let records: Vec<Map<String, Value>> = pairs
        .iter()
        .map(|pair| {
            let mut m = Map::new();
            m.insert("from_id".to_string(), Value::from(pair.from_id.clone()));
            m.insert("to_id".to_string(), Value::from(pair.to_id.clone()));
            m
        })
        .collect();

    let query_text = spec.build_query();
    for chunk in records.chunks(spec.batch_size) {
        let query = neo4rs::Query::new(query_text.clone())
            .param("Rels", records_to_bolt(chunk))
            .param("UPDATE_TAG", update_tag.as_i64());
        client
            .execute(query)
            .await
            .map_err(|e| strata_core::StrataError::graph(e.to_string()))?;
    }

    debug!(rel = %spec.rel_label, count = pairs.len(), "Loaded relationships");
    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bucket_spec() -> NodeSpec {
        NodeSpec::new("S3Bucket", "AWSAccount", "AWS_ID")
    }

    #[test]
    fn upsert_query_sets_firstseen_on_create_only() {
        let query = bucket_spec().build_query();
        assert!(query.contains("MERGE (n:S3Bucket{id: record.id})"));
        assert!(query.contains("ON CREATE SET n.firstseen = timestamp()"));
        assert!(query.contains("SET n += record, n.lastupdated = $UPDATE_TAG"));
    }

    #[test]
    fn upsert_query_merges_ownership_edge_with_same_stamp() {
        let query = bucket_spec().build_query();
        assert!(query.contains("MATCH (owner:AWSAccount{id: $AWS_ID})"));
        assert!(query.contains("MERGE (owner)-[r:RESOURCE]->(n)"));
        assert!(query.contains("ON CREATE SET r.firstseen = timestamp()"));
        assert!(query.ends_with("SET r.lastupdated = $UPDATE_TAG"));
    }

    #[test]
    fn rel_query_requires_both_endpoints() {
        let query = RelSpec::new("EC2Instance", "EC2SecurityGroup", "MEMBER_OF_EC2_SECURITY_GROUP")
            .build_query();
        assert!(query.contains("MATCH (a:EC2Instance{id: rel.from_id})"));
        assert!(query.contains("MATCH (b:EC2SecurityGroup{id: rel.to_id})"));
        assert!(query.contains("MERGE (a)-[r:MEMBER_OF_EC2_SECURITY_GROUP]->(b)"));
    }

    #[test]
    fn records_without_identity_are_filtered() {
        let records = vec![
            json!({"id": "b1", "region": "us-east-1"}).as_object().unwrap().clone(),
            json!({"region": "eu-west-1"}).as_object().unwrap().clone(),
            json!({"id": null}).as_object().unwrap().clone(),
        ];
        let spec = bucket_spec();
        let valid: Vec<_> = records
            .iter()
            .filter(|r| r.get(&spec.id_key).map(|v| !v.is_null()).unwrap_or(false))
            .collect();
        assert_eq!(valid.len(), 1);
    }

    #[test]
    fn bad_labels_fail_validation() {
        let spec = NodeSpec::new("S3 Bucket", "AWSAccount", "AWS_ID");
        assert!(spec.validate().is_err());
    }
}
