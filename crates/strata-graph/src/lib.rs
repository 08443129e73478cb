//! # Strata Graph
//!
//! The idempotent graph synchronization layer: session provider over Neo4j,
//! update-tag upsert discipline, batched cleanup jobs, analysis jobs, and
//! the per-module sync-metadata recorder.

pub mod analysis;
pub mod bolt;
pub mod cleanup;
pub mod client;
pub mod job;
pub mod loader;
pub mod metadata;
pub mod schema;
pub mod statement;

pub use analysis::{analysis_job_names, run_analysis_job};
pub use cleanup::{CleanupSpec, LinkDirection};
pub use client::{GraphClient, GraphCounts};
pub use job::GraphJob;
pub use loader::{load_nodes, load_relationships, load_scope_nodes, NodeSpec, RelEndpoints, RelSpec};
pub use metadata::{merge_module_sync_metadata, record_module_sync_metadata};
pub use schema::initialize_schema;
pub use statement::GraphStatement;
