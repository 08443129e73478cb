//! # Strata Intel
//!
//! Provider ingestion modules and the sync orchestrator. Each provider
//! module follows the same flow: fetch records from its source, transform
//! them into flat property maps, load them with the update-tag stamp, run
//! the scoped cleanup, and record module sync metadata.

pub mod aws;
pub mod azure;
pub mod gcp;
pub mod jamf;
pub mod records;
pub mod report;
pub mod source;
pub mod sync;

pub use report::{StageOutcome, StageSummary, SyncReport};
pub use source::{AwsSource, AzureSource, GcpSource, JamfSource, SnapshotSource, SourceError};
pub use sync::{run, validate_requested_syncs, Sources, STAGE_NAMES};
