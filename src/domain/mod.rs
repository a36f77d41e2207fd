//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - voxel label conventions (`BAND_SENTINEL`, `VoxelLabel`)
//! - grain statistics rows and the unified grain table (`GrainRow`, `GrainTable`)
//! - the validated run configuration (`RunConfiguration`)
//! - per-run output locations and logging span (`RunContext`)

pub mod config;
pub mod context;
pub mod types;

pub use config::*;
pub use context::*;
pub use types::*;
