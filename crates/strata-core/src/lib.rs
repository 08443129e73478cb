//! # Strata Core
//!
//! Shared building blocks for the strata sync pipeline: configuration,
//! error taxonomy, the update tag, and the common job-parameter map that
//! every resource-type module receives.

pub mod config;
pub mod error;
pub mod params;
pub mod tag;

pub use config::Config;
pub use error::{StrataError, StrataResult};
pub use params::JobParameters;
pub use tag::UpdateTag;
