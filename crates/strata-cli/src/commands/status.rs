//! The status command: graph counts and module sync recency.

use anyhow::Result;
use colored::Colorize;
use neo4rs::Query;

use strata_core::Config;
use strata_graph::GraphClient;

pub async fn execute(config: &Config) -> Result<()> {
    let client = GraphClient::connect(&config.graph).await?;

    let counts = client.get_counts().await?;
    println!("{}", "Inventory graph".bold());
    println!("  Nodes:         {}", counts.nodes);
    println!("  Relationships: {}", counts.relationships);

    let rows = client
        .query(Query::new(
            "MATCH (m:ModuleSyncMetadata) \
             RETURN m.grouptype as grouptype, m.groupid as groupid, \
                    m.syncedtype as syncedtype, m.lastupdated as lastupdated \
             ORDER BY m.grouptype, m.groupid, m.syncedtype"
                .to_string(),
        ))
        .await?;

    if rows.is_empty() {
        println!("\n{}", "No module syncs recorded yet.".dimmed());
        return Ok(());
    }

    println!("\n{}", "Module sync recency:".bold());
    for row in rows {
        let group_type: String = row.get("grouptype").unwrap_or_default();
        let group_id: String = row.get("groupid").unwrap_or_default();
        let synced_type: String = row.get("syncedtype").unwrap_or_default();
        let last_updated: i64 = row.get("lastupdated").unwrap_or_default();
        println!(
            "  {} {} {} {}",
            group_type.cyan(),
            group_id.yellow(),
            synced_type,
            format!("@{last_updated}").dimmed()
        );
    }
    Ok(())
}
