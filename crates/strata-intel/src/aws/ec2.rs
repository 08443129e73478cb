//! EC2 ingestion: instances, security groups, ingress rules, and group
//! membership.
//!
//! Listings are per region. A region the credential cannot read is treated
//! as empty rather than failing the account, since organizations routinely
//! deny unused regions with SCPs.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use strata_core::config::CleanupBehavior;
use strata_core::params::JobParameters;
use strata_core::StrataResult;
use strata_graph::{
    load_nodes, load_relationships, record_module_sync_metadata, CleanupSpec, GraphClient,
    GraphJob, GraphStatement, NodeSpec, RelEndpoints, RelSpec,
};

use crate::aws::{SCOPE_LABEL, SCOPE_PARAM};
use crate::records::parse_records;
use crate::source::{regional_records, AwsSource};

const INSTANCE_LABEL: &str = "EC2Instance";
const SG_LABEL: &str = "EC2SecurityGroup";
const RULE_LABEL: &str = "IpPermissionInbound";
const RANGE_LABEL: &str = "IpRange";
const MEMBERSHIP_REL: &str = "MEMBER_OF_EC2_SECURITY_GROUP";
const RANGE_REL: &str = "MEMBER_OF_IP_RULE";

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub public_ip_address: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroupRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingress_rules: Vec<IngressRuleRecord>,
}

/// One inbound permission on a security group, with the CIDR ranges it
/// grants access to.
#[derive(Debug, Clone, Deserialize)]
pub struct IngressRuleRecord {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub from_port: Option<i64>,
    #[serde(default)]
    pub to_port: Option<i64>,
    #[serde(default)]
    pub ranges: Vec<String>,
}

fn transform_instance(instance: &InstanceRecord, region: &str) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("id".to_string(), Value::from(instance.id.clone()));
    record.insert("region".to_string(), Value::from(region));
    if let Some(state) = &instance.state {
        record.insert("state".to_string(), Value::from(state.clone()));
    }
    if let Some(instance_type) = &instance.instance_type {
        record.insert("instancetype".to_string(), Value::from(instance_type.clone()));
    }
    if let Some(public_ip) = &instance.public_ip_address {
        record.insert("publicipaddress".to_string(), Value::from(public_ip.clone()));
    }
    if let Some(private_ip) = &instance.private_ip_address {
        record.insert("privateipaddress".to_string(), Value::from(private_ip.clone()));
    }
    record
}

fn transform_security_group(group: &SecurityGroupRecord, region: &str) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("id".to_string(), Value::from(group.id.clone()));
    record.insert("region".to_string(), Value::from(region));
    if let Some(name) = &group.name {
        record.insert("name".to_string(), Value::from(name.clone()));
    }
    if let Some(description) = &group.description {
        record.insert("description".to_string(), Value::from(description.clone()));
    }
    record
}

fn membership_pairs(instances: &[(InstanceRecord, String)]) -> Vec<RelEndpoints> {
    instances
        .iter()
        .flat_map(|(instance, _)| {
            instance.security_group_ids.iter().map(|sg_id| RelEndpoints {
                from_id: instance.id.clone(),
                to_id: sg_id.clone(),
            })
        })
        .collect()
}

/// Deterministic identity for one inbound rule, so re-runs update in place.
fn rule_id(sg_id: &str, rule: &IngressRuleRecord) -> String {
    let protocol = rule.protocol.as_deref().unwrap_or("all");
    let from = rule.from_port.map_or_else(|| "any".to_string(), |p| p.to_string());
    let to = rule.to_port.map_or_else(|| "any".to_string(), |p| p.to_string());
    format!("{sg_id}/inbound/{from}/{to}/{protocol}")
}

#[derive(Debug, Default)]
struct IngressGraph {
    rules: Vec<Map<String, Value>>,
    ranges: Vec<Map<String, Value>>,
    /// rule -> security group
    rule_memberships: Vec<RelEndpoints>,
    /// CIDR range -> rule
    range_memberships: Vec<RelEndpoints>,
}

fn transform_ingress(groups: &[SecurityGroupRecord]) -> IngressGraph {
    let mut ingress = IngressGraph::default();
    let mut seen_ranges: BTreeSet<String> = BTreeSet::new();

    for group in groups {
        for rule in &group.ingress_rules {
            let id = rule_id(&group.id, rule);
            let mut record = Map::new();
            record.insert("id".to_string(), Value::from(id.clone()));
            record.insert("groupid".to_string(), Value::from(group.id.clone()));
            if let Some(protocol) = &rule.protocol {
                record.insert("protocol".to_string(), Value::from(protocol.clone()));
            }
            if let Some(port) = rule.from_port {
                record.insert("fromport".to_string(), Value::from(port));
            }
            if let Some(port) = rule.to_port {
                record.insert("toport".to_string(), Value::from(port));
            }
            ingress.rules.push(record);
            ingress.rule_memberships.push(RelEndpoints {
                from_id: id.clone(),
                to_id: group.id.clone(),
            });

            for cidr in &rule.ranges {
                // Ranges are shared nodes keyed by CIDR; one node per CIDR
                // no matter how many rules reference it.
                if seen_ranges.insert(cidr.clone()) {
                    let mut range = Map::new();
                    range.insert("id".to_string(), Value::from(cidr.clone()));
                    range.insert("range".to_string(), Value::from(cidr.clone()));
                    ingress.ranges.push(range);
                }
                ingress.range_memberships.push(RelEndpoints {
                    from_id: cidr.clone(),
                    to_id: id.clone(),
                });
            }
        }
    }
    ingress
}

pub async fn sync(
    client: &GraphClient,
    source: &dyn AwsSource,
    account_id: &str,
    regions: &[String],
    params: &JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    let update_tag = params.update_tag();

    let mut instances: Vec<(InstanceRecord, String)> = Vec::new();
    let mut instance_records: Vec<Map<String, Value>> = Vec::new();
    let mut groups: Vec<SecurityGroupRecord> = Vec::new();
    let mut sg_records: Vec<Map<String, Value>> = Vec::new();

    for region in regions {
        let raw = regional_records(
            source.ec2_instances(account_id, region).await,
            "ec2_instances",
            region,
        )?;
        for instance in parse_records::<InstanceRecord>(raw, "ec2_instances") {
            instance_records.push(transform_instance(&instance, region));
            instances.push((instance, region.clone()));
        }

        let raw = regional_records(
            source.ec2_security_groups(account_id, region).await,
            "ec2_security_groups",
            region,
        )?;
        for group in parse_records::<SecurityGroupRecord>(raw, "ec2_security_groups") {
            sg_records.push(transform_security_group(&group, region));
            groups.push(group);
        }
    }

    // Groups first so membership edges find both endpoints.
    let sg_spec = NodeSpec::new(SG_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    load_nodes(client, &sg_spec, &sg_records, account_id, update_tag).await?;

    let instance_spec = NodeSpec::new(INSTANCE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    load_nodes(client, &instance_spec, &instance_records, account_id, update_tag).await?;

    let rel_spec = RelSpec::new(INSTANCE_LABEL, SG_LABEL, MEMBERSHIP_REL);
    let pairs = membership_pairs(&instances);
    load_relationships(client, &rel_spec, &pairs, update_tag).await?;

    // Ingress rules and their CIDR ranges feed internet-exposure analysis.
    let ingress = transform_ingress(&groups);
    let rule_spec = NodeSpec::new(RULE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    load_nodes(client, &rule_spec, &ingress.rules, account_id, update_tag).await?;
    let range_spec = NodeSpec::new(RANGE_LABEL, SCOPE_LABEL, SCOPE_PARAM);
    load_nodes(client, &range_spec, &ingress.ranges, account_id, update_tag).await?;

    let rule_rel = RelSpec::new(RULE_LABEL, SG_LABEL, MEMBERSHIP_REL);
    load_relationships(client, &rule_rel, &ingress.rule_memberships, update_tag).await?;
    let range_rel = RelSpec::new(RANGE_LABEL, RULE_LABEL, RANGE_REL);
    load_relationships(client, &range_rel, &ingress.range_memberships, update_tag).await?;

    info!(
        account = account_id,
        instances = instance_records.len(),
        security_groups = sg_records.len(),
        ingress_rules = ingress.rules.len(),
        memberships = pairs.len(),
        "Loaded EC2 inventory"
    );

    cleanup(client, params, behavior).await?;

    record_module_sync_metadata(client, SCOPE_LABEL, account_id, INSTANCE_LABEL, update_tag)
        .await?;
    record_module_sync_metadata(client, SCOPE_LABEL, account_id, SG_LABEL, update_tag).await?;
    record_module_sync_metadata(client, SCOPE_LABEL, account_id, RULE_LABEL, update_tag).await
}

async fn cleanup(
    client: &GraphClient,
    params: &JobParameters,
    behavior: CleanupBehavior,
) -> StrataResult<()> {
    // Stale edges between surviving nodes go first; the node cleanups then
    // detach-delete anything stale outright. The membership statement covers
    // both instance->group and rule->group edges.
    let membership_cleanup = GraphStatement::iterative(
        format!(
            "MATCH ()-[r:{MEMBERSHIP_REL}]->(:{SG_LABEL})\
             <-[:RESOURCE]-(:{SCOPE_LABEL}{{id: ${SCOPE_PARAM}}}) \
             WHERE r.lastupdated <> $UPDATE_TAG \
             WITH r LIMIT $LIMIT_SIZE \
             DELETE r \
             RETURN COUNT(*) as TotalCompleted"
        ),
        1000,
    );
    let range_cleanup = GraphStatement::iterative(
        format!(
            "MATCH (:{RANGE_LABEL})-[r:{RANGE_REL}]->(:{RULE_LABEL})\
             <-[:RESOURCE]-(:{SCOPE_LABEL}{{id: ${SCOPE_PARAM}}}) \
             WHERE r.lastupdated <> $UPDATE_TAG \
             WITH r LIMIT $LIMIT_SIZE \
             DELETE r \
             RETURN COUNT(*) as TotalCompleted"
        ),
        1000,
    );
    let mut job = GraphJob::new(
        "cleanup EC2 group membership and ingress edges",
        vec![membership_cleanup, range_cleanup],
    );
    job.merge_parameters(params);
    job.run(client, behavior).await?;

    for label in [INSTANCE_LABEL, SG_LABEL, RULE_LABEL, RANGE_LABEL] {
        let mut job = CleanupSpec::new(label, "RESOURCE", SCOPE_LABEL, SCOPE_PARAM).build_job()?;
        job.merge_parameters(params);
        job.run(client, behavior).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_transform_flattens_and_tags_region() {
        let instance: InstanceRecord = serde_json::from_value(json!({
            "id": "i-0abc",
            "state": "running",
            "instance_type": "m5.large",
            "public_ip_address": "203.0.113.7",
            "security_group_ids": ["sg-1", "sg-2"]
        }))
        .unwrap();
        let record = transform_instance(&instance, "us-east-1");
        assert_eq!(record["id"], json!("i-0abc"));
        assert_eq!(record["region"], json!("us-east-1"));
        assert_eq!(record["publicipaddress"], json!("203.0.113.7"));
        // Membership travels as edges, not as a node property.
        assert!(!record.contains_key("security_group_ids"));
    }

    #[test]
    fn membership_pairs_expand_per_group() {
        let instance: InstanceRecord = serde_json::from_value(json!({
            "id": "i-0abc",
            "security_group_ids": ["sg-1", "sg-2"]
        }))
        .unwrap();
        let pairs = membership_pairs(&[(instance, "us-east-1".to_string())]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.from_id == "i-0abc"));
        assert_eq!(pairs[1].to_id, "sg-2");
    }

    #[test]
    fn instances_without_groups_produce_no_pairs() {
        let instance: InstanceRecord = serde_json::from_value(json!({"id": "i-1"})).unwrap();
        assert!(membership_pairs(&[(instance, "eu-west-1".to_string())]).is_empty());
    }

    #[test]
    fn ingress_rules_expand_into_rule_and_range_nodes() {
        let group: SecurityGroupRecord = serde_json::from_value(json!({
            "id": "sg-1",
            "name": "web",
            "ingress_rules": [
                {"protocol": "tcp", "from_port": 443, "to_port": 443, "ranges": ["0.0.0.0/0"]}
            ]
        }))
        .unwrap();
        let ingress = transform_ingress(&[group]);

        assert_eq!(ingress.rules.len(), 1);
        assert_eq!(ingress.rules[0]["id"], json!("sg-1/inbound/443/443/tcp"));
        assert_eq!(ingress.rules[0]["groupid"], json!("sg-1"));
        assert_eq!(ingress.ranges[0]["id"], json!("0.0.0.0/0"));

        assert_eq!(ingress.rule_memberships[0].from_id, "sg-1/inbound/443/443/tcp");
        assert_eq!(ingress.rule_memberships[0].to_id, "sg-1");
        assert_eq!(ingress.range_memberships[0].from_id, "0.0.0.0/0");
        assert_eq!(ingress.range_memberships[0].to_id, "sg-1/inbound/443/443/tcp");
    }

    #[test]
    fn shared_cidrs_collapse_to_one_range_node() {
        let groups: Vec<SecurityGroupRecord> = serde_json::from_value(json!([
            {"id": "sg-1", "ingress_rules": [{"protocol": "tcp", "from_port": 22, "to_port": 22, "ranges": ["0.0.0.0/0"]}]},
            {"id": "sg-2", "ingress_rules": [{"protocol": "tcp", "from_port": 443, "to_port": 443, "ranges": ["0.0.0.0/0"]}]}
        ]))
        .unwrap();
        let ingress = transform_ingress(&groups);
        assert_eq!(ingress.ranges.len(), 1);
        assert_eq!(ingress.range_memberships.len(), 2);
    }

    #[test]
    fn portless_rules_get_a_stable_identity() {
        let rule: IngressRuleRecord =
            serde_json::from_value(json!({"ranges": ["10.0.0.0/8"]})).unwrap();
        assert_eq!(rule_id("sg-9", &rule), "sg-9/inbound/any/any/all");
    }
}
