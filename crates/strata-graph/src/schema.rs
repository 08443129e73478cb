//! Neo4j schema initialization (constraints and indexes).

use anyhow::Result;
use neo4rs::Query;
use tracing::info;

use crate::GraphClient;

/// Cypher statements for schema initialization.
///
/// Every loaded label gets a uniqueness constraint on its identity property
/// (which also backs the MERGE lookups in the loaders), plus lookup indexes
/// on `lastupdated` for the labels the cleanup jobs scan.
const SCHEMA_STATEMENTS: &[&str] = &[
    // Scope node identities
    "CREATE CONSTRAINT aws_account_id IF NOT EXISTS FOR (a:AWSAccount) REQUIRE a.id IS UNIQUE",
    "CREATE CONSTRAINT azure_subscription_id IF NOT EXISTS FOR (s:AzureSubscription) REQUIRE s.id IS UNIQUE",
    "CREATE CONSTRAINT gcp_project_id IF NOT EXISTS FOR (p:GCPProject) REQUIRE p.id IS UNIQUE",
    "CREATE CONSTRAINT jamf_tenant_id IF NOT EXISTS FOR (t:JamfTenant) REQUIRE t.id IS UNIQUE",
    // Resource node identities
    "CREATE CONSTRAINT s3_bucket_id IF NOT EXISTS FOR (b:S3Bucket) REQUIRE b.id IS UNIQUE",
    "CREATE CONSTRAINT ec2_instance_id IF NOT EXISTS FOR (i:EC2Instance) REQUIRE i.id IS UNIQUE",
    "CREATE CONSTRAINT ec2_security_group_id IF NOT EXISTS FOR (g:EC2SecurityGroup) REQUIRE g.id IS UNIQUE",
    "CREATE CONSTRAINT ip_permission_inbound_id IF NOT EXISTS FOR (p:IpPermissionInbound) REQUIRE p.id IS UNIQUE",
    "CREATE CONSTRAINT ip_range_id IF NOT EXISTS FOR (r:IpRange) REQUIRE r.id IS UNIQUE",
    "CREATE CONSTRAINT azure_storage_account_id IF NOT EXISTS FOR (s:AzureStorageAccount) REQUIRE s.id IS UNIQUE",
    "CREATE CONSTRAINT azure_vm_id IF NOT EXISTS FOR (v:AzureVirtualMachine) REQUIRE v.id IS UNIQUE",
    "CREATE CONSTRAINT gcp_instance_id IF NOT EXISTS FOR (i:GCPInstance) REQUIRE i.id IS UNIQUE",
    "CREATE CONSTRAINT gcp_bucket_id IF NOT EXISTS FOR (b:GCPBucket) REQUIRE b.id IS UNIQUE",
    "CREATE CONSTRAINT jamf_computer_group_id IF NOT EXISTS FOR (g:JamfComputerGroup) REQUIRE g.id IS UNIQUE",
    "CREATE CONSTRAINT module_sync_metadata_id IF NOT EXISTS FOR (m:ModuleSyncMetadata) REQUIRE m.id IS UNIQUE",
    // Cleanup scans filter on lastupdated
    "CREATE INDEX s3_bucket_lastupdated IF NOT EXISTS FOR (b:S3Bucket) ON (b.lastupdated)",
    "CREATE INDEX ec2_instance_lastupdated IF NOT EXISTS FOR (i:EC2Instance) ON (i.lastupdated)",
    "CREATE INDEX ec2_security_group_lastupdated IF NOT EXISTS FOR (g:EC2SecurityGroup) ON (g.lastupdated)",
    "CREATE INDEX ip_permission_inbound_lastupdated IF NOT EXISTS FOR (p:IpPermissionInbound) ON (p.lastupdated)",
    "CREATE INDEX ip_range_lastupdated IF NOT EXISTS FOR (r:IpRange) ON (r.lastupdated)",
    "CREATE INDEX azure_storage_account_lastupdated IF NOT EXISTS FOR (s:AzureStorageAccount) ON (s.lastupdated)",
    "CREATE INDEX azure_vm_lastupdated IF NOT EXISTS FOR (v:AzureVirtualMachine) ON (v.lastupdated)",
    "CREATE INDEX gcp_instance_lastupdated IF NOT EXISTS FOR (i:GCPInstance) ON (i.lastupdated)",
    "CREATE INDEX gcp_bucket_lastupdated IF NOT EXISTS FOR (b:GCPBucket) ON (b.lastupdated)",
    "CREATE INDEX jamf_computer_group_lastupdated IF NOT EXISTS FOR (g:JamfComputerGroup) ON (g.lastupdated)",
];

/// Initialize Neo4j schema with constraints and indexes.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses.
pub async fn initialize_schema(client: &GraphClient) -> Result<()> {
    info!("Initializing Neo4j schema...");

    for statement in SCHEMA_STATEMENTS {
        client.execute(Query::new(statement.to_string())).await?;
    }

    info!("Neo4j schema initialized ({} statements)", SCHEMA_STATEMENTS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_statements_are_idempotent() {
        for statement in SCHEMA_STATEMENTS {
            assert!(statement.contains("IF NOT EXISTS"), "{statement}");
        }
    }

    #[test]
    fn merged_labels_have_identity_constraints() {
        for label in ["AWSAccount", "S3Bucket", "ModuleSyncMetadata"] {
            let needle = format!(":{label})");
            assert!(
                SCHEMA_STATEMENTS
                    .iter()
                    .any(|s| s.contains("CREATE CONSTRAINT") && s.contains(&needle)),
                "missing constraint for {label}"
            );
        }
    }
}
