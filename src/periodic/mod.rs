//! Periodicity repair.
//!
//! Converts the tessellated grid into the flat voxel table handed to
//! reconciliation and meshing. Voxels a grain reached across a box face carry
//! an image label; they are folded back onto their grain here so that every
//! grain is one consistent set of voxels in the periodic box.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::domain::{BAND_SENTINEL, PHASE_UNASSIGNED, VoxelLabel};
use crate::error::AppError;
use crate::geometry::{GridGeometry, VoxelGrid, gen_grid};

/// One voxel of the RVE table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RveVoxel {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(rename = "GrainID")]
    pub grain_id: i32,
    #[serde(rename = "phaseID")]
    pub phase_id: u8,
}

/// Flat voxel table in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicRveTable {
    pub geometry: GridGeometry,
    pub voxels: Vec<RveVoxel>,
}

impl PeriodicRveTable {
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn count_grain(&self, grain_id: i32) -> usize {
        self.voxels.iter().filter(|v| v.grain_id == grain_id).count()
    }

    /// Voxel count per grain ID, ascending.
    pub fn grain_voxel_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for v in &self.voxels {
            *counts.entry(v.grain_id).or_insert(0) += 1;
        }
        counts
    }
}

/// Fold periodic images onto their grains and flatten the grid.
///
/// Grain labels and the band sentinel pass through; phase IDs start unassigned.
pub fn repair_periodicity(grid: &VoxelGrid, geometry: &GridGeometry) -> Result<PeriodicRveTable, AppError> {
    if !grid.matches(geometry) {
        return Err(AppError::reconciliation("Tessellated grid does not match the grid resolution."));
    }

    let coords = gen_grid(geometry);
    let mut folded = 0usize;
    let mut voxels = Vec::with_capacity(grid.len());

    for (idx, &label) in grid.labels().iter().enumerate() {
        let grain_id = match VoxelLabel::decode(label) {
            VoxelLabel::Grain(g) => g as i32,
            VoxelLabel::Image(g) => {
                folded += 1;
                g as i32
            }
            VoxelLabel::Band => BAND_SENTINEL,
            VoxelLabel::Background => {
                return Err(AppError::reconciliation(format!(
                    "Voxel {idx} is still background after tessellation."
                )));
            }
            VoxelLabel::Invalid(l) => {
                return Err(AppError::reconciliation(format!("Voxel {idx} has invalid label {l}.")));
            }
        };
        voxels.push(RveVoxel {
            x: coords.x[idx],
            y: coords.y[idx],
            z: coords.z[idx],
            grain_id,
            phase_id: PHASE_UNASSIGNED,
        });
    }

    debug!(folded, "periodic images folded");
    Ok(PeriodicRveTable {
        geometry: *geometry,
        voxels,
    })
}
