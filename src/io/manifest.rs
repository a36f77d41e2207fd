//! Read/write the run manifest (`run_config.json`).
//!
//! The manifest records everything needed to reproduce a run: the validated
//! configuration (including the seed), the run date/epoch, and the grain
//! statistics summary logged during initialization.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::RunConfiguration;
use crate::error::AppError;

pub const MANIFEST_FILE: &str = "run_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub tool: String,
    pub date: NaiveDate,
    pub epoch: u64,
    pub grain_count: usize,
    pub phase_two_grains: usize,
    pub total_volume: f64,
    pub estimated_box_size: f64,
    pub config: RunConfiguration,
}

/// Write the manifest into `store_path`.
pub fn write_manifest(store_path: &Path, manifest: &RunManifest) -> Result<(), AppError> {
    let path = store_path.join(MANIFEST_FILE);
    let file = File::create(&path)
        .map_err(|e| AppError::io(format!("Failed to create manifest '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, manifest)
        .map_err(|e| AppError::io(format!("Failed to write manifest: {e}")))?;
    Ok(())
}

/// Read a manifest back and re-validate its configuration.
pub fn read_manifest(store_path: &Path) -> Result<RunManifest, AppError> {
    let path = store_path.join(MANIFEST_FILE);
    let file = File::open(&path)
        .map_err(|e| AppError::io(format!("Failed to open manifest '{}': {e}", path.display())))?;
    let manifest: RunManifest =
        serde_json::from_reader(file).map_err(|e| AppError::io(format!("Invalid manifest JSON: {e}")))?;
    manifest.config.validate()?;
    Ok(manifest)
}
