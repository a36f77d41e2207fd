//! Input/output helpers.
//!
//! - grain statistics CSV ingest (`ingest`)
//! - generation-data tables (`export`)
//! - run manifest JSON read/write (`manifest`)

pub mod export;
pub mod ingest;
pub mod manifest;

pub use export::*;
pub use ingest::*;
pub use manifest::*;
