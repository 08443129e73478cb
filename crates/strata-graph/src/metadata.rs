//! Per-module sync bookkeeping nodes.
//!
//! Each successful module run records what was synced, for which scope, at
//! which update tag. Operators query these nodes to answer "when did module
//! X last complete for account Y" without scanning resource nodes.

use neo4rs::Query;
use tracing::{debug, warn};

use strata_core::{StrataResult, UpdateTag};

use crate::client::GraphClient;

const MERGE_METADATA: &str = "MERGE (n:ModuleSyncMetadata{id: $ID}) \
     ON CREATE SET n:SyncMetadata, n.firstseen = timestamp() \
     SET n.syncedtype = $SYNCED_TYPE, \
         n.grouptype = $GROUP_TYPE, \
         n.groupid = $GROUP_ID, \
         n.lastupdated = $UPDATE_TAG";

/// Deterministic identity for a (group type, group id, synced type) triple,
/// so repeated runs update one node instead of accumulating rows.
pub fn metadata_id(group_type: &str, group_id: &str, synced_type: &str) -> String {
    format!("{group_type}_{group_id}_{synced_type}")
}

/// Record that `synced_type` finished syncing for the scope identified by
/// `group_type`/`group_id`, stamped with the run's update tag.
pub async fn merge_module_sync_metadata(
    client: &GraphClient,
    group_type: &str,
    group_id: &str,
    synced_type: &str,
    update_tag: UpdateTag,
) -> StrataResult<()> {
    let id = metadata_id(group_type, group_id, synced_type);
    let query = Query::new(MERGE_METADATA.to_string())
        .param("ID", id.as_str())
        .param("SYNCED_TYPE", synced_type)
        .param("GROUP_TYPE", group_type)
        .param("GROUP_ID", group_id)
        .param("UPDATE_TAG", update_tag.as_i64());

    client
        .execute(query)
        .await
        .map_err(|e| strata_core::StrataError::graph(e.to_string()))?;

    debug!(group_type, group_id, synced_type, "Recorded module sync metadata");
    Ok(())
}

/// Best-effort metadata recording for the end of a module run. A failed
/// write is logged and swallowed; the module outcome was already decided by
/// its load and cleanup steps.
pub async fn record_module_sync_metadata(
    client: &GraphClient,
    group_type: &str,
    group_id: &str,
    synced_type: &str,
    update_tag: UpdateTag,
) -> StrataResult<()> {
    let result =
        merge_module_sync_metadata(client, group_type, group_id, synced_type, update_tag).await;
    write_outcome(result, group_id, synced_type)
}

fn write_outcome(result: StrataResult<()>, group_id: &str, synced_type: &str) -> StrataResult<()> {
    if let Err(e) = result {
        warn!(group_id, synced_type, error = %e, "Failed to record module sync metadata");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_per_triple() {
        assert_eq!(
            metadata_id("AWSAccount", "111111111111", "S3Bucket"),
            "AWSAccount_111111111111_S3Bucket"
        );
        assert_eq!(
            metadata_id("AWSAccount", "111111111111", "S3Bucket"),
            metadata_id("AWSAccount", "111111111111", "S3Bucket"),
        );
    }

    #[test]
    fn failed_metadata_writes_do_not_fail_the_module() {
        use strata_core::StrataError;

        let failed = write_outcome(
            Err(StrataError::graph("write lock timeout")),
            "111111111111",
            "S3Bucket",
        );
        assert!(failed.is_ok());
        assert!(write_outcome(Ok(()), "111111111111", "S3Bucket").is_ok());
    }

    #[test]
    fn merge_statement_sets_firstseen_on_create_only() {
        assert!(MERGE_METADATA.contains("MERGE (n:ModuleSyncMetadata{id: $ID})"));
        assert!(MERGE_METADATA.contains("ON CREATE SET n:SyncMetadata, n.firstseen = timestamp()"));
        assert!(MERGE_METADATA.contains("n.lastupdated = $UPDATE_TAG"));
        // All values are bound, nothing templated.
        assert!(!MERGE_METADATA.contains("format!"));
    }
}
