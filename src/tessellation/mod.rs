//! Tessellation engine seam.
//!
//! A tessellator grows the packed seeds until every voxel belongs to a grain or
//! to the surviving band material. [`DiscreteTessellation`] is the default.

use std::path::Path;

use crate::domain::GrainTable;
use crate::error::AppError;
use crate::geometry::{GridGeometry, VoxelGrid};

pub mod growth;

pub use growth::*;

pub const TESSELLATION_PROGRESS_FILE: &str = "tessellation_progress.csv";

#[derive(Debug, Clone, Copy)]
pub struct TessellationRequest<'a> {
    pub geometry: &'a GridGeometry,
    pub packed: &'a VoxelGrid,
    /// Grain table with seeds assigned.
    pub grains: &'a GrainTable,
    /// Linear shrink factor; growth starts from the packing size.
    pub shrink_factor: f64,
    /// Share of the packed band material that stays reserved.
    pub band_ratio_final: f64,
    pub animation_dir: Option<&'a Path>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TessellationOutcome {
    pub grid: VoxelGrid,
    pub success: bool,
}

pub trait Tessellator {
    fn tessellate(&self, request: &TessellationRequest<'_>) -> Result<TessellationOutcome, AppError>;
}
