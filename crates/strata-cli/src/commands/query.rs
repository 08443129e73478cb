//! The query command: raw Cypher against the inventory graph.

use anyhow::Result;
use colored::Colorize;
use neo4rs::Query;

use strata_core::Config;
use strata_graph::GraphClient;

pub async fn execute(config: &Config, cypher: &str) -> Result<()> {
    let client = GraphClient::connect(&config.graph).await?;
    let rows = client.query(Query::new(cypher.to_string())).await?;

    if rows.is_empty() {
        println!("{}", "No results.".dimmed());
        return Ok(());
    }

    for (i, row) in rows.iter().enumerate() {
        // Rows are heterogeneous, so print the debug representation wrapped
        // in JSON for greppability.
        let value = serde_json::json!({ "row": format!("{row:?}") });
        println!("{}: {}", (i + 1).to_string().dimmed(), value);
    }
    Ok(())
}
