//! Shared domain types.
//!
//! Grain records are serializable so the same structs are used in memory and in
//! the persisted `Generation_Data` tables.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Voxel label reserved for band material that has not been assigned a grain yet.
pub const BAND_SENTINEL: i32 = -200;

/// Phase of the first input table (the matrix phase).
pub const PHASE_ONE: u8 = 1;
/// Phase of the second input table and of all band material.
pub const PHASE_TWO: u8 = 2;
/// Phase written by the periodicity repairer before reconciliation.
pub const PHASE_UNASSIGNED: u8 = 0;

/// Decoded meaning of a raw voxel label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelLabel {
    Background,
    Grain(u32),
    /// Voxel of grain `g` that was reached across a box face.
    Image(u32),
    Band,
    Invalid(i32),
}

impl VoxelLabel {
    pub fn decode(label: i32) -> Self {
        match label {
            0 => VoxelLabel::Background,
            BAND_SENTINEL => VoxelLabel::Band,
            l if l > 0 => VoxelLabel::Grain(l as u32),
            l if l < BAND_SENTINEL => VoxelLabel::Image((BAND_SENTINEL - l) as u32),
            l => VoxelLabel::Invalid(l),
        }
    }

    /// Grain that owns this voxel, folding periodic images onto their grain.
    pub fn owner(self) -> Option<u32> {
        match self {
            VoxelLabel::Grain(g) | VoxelLabel::Image(g) => Some(g),
            _ => None,
        }
    }
}

/// Label written for a voxel of `grain_id` reached across a box face.
pub fn image_label(grain_id: u32) -> i32 {
    BAND_SENTINEL - grain_id as i32
}

/// One row of a grain statistics input table.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainRow {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    /// Rotation about the z axis, in degrees.
    pub alpha: f64,
    /// Explicit target volume; derived from the axes when absent.
    pub volume: Option<f64>,
}

/// Packing-stage ellipsoid of one grain, keyed by grain ID.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainAxes {
    pub grain_id: u32,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
}

impl GrainAxes {
    pub fn volume(&self) -> f64 {
        ellipsoid_volume(self.a, self.b, self.c)
    }
}

/// Seed position of a packed grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub grain_id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub fn ellipsoid_volume(a: f64, b: f64, c: f64) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * a * b * c
}

/// One target grain of the RVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainRecord {
    #[serde(rename = "GrainID")]
    pub grain_id: u32,
    #[serde(rename = "phaseID")]
    pub phase_id: u8,
    /// Packing (shrunk) semi-axes.
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    /// Tessellation (unshrunk) semi-axes.
    pub a_final: f64,
    pub b_final: f64,
    pub c_final: f64,
    /// Continuous volume of the packing ellipsoid.
    pub volume: f64,
    pub final_conti_volume: f64,
    pub final_discrete_volume: f64,
    pub x_0: Option<f64>,
    pub y_0: Option<f64>,
    pub z_0: Option<f64>,
}

impl GrainRecord {
    pub fn axes(&self) -> GrainAxes {
        GrainAxes {
            grain_id: self.grain_id,
            a: self.a,
            b: self.b,
            c: self.c,
            alpha: self.alpha,
        }
    }

    pub fn seed(&self) -> Option<Seed> {
        Some(Seed {
            grain_id: self.grain_id,
            x: self.x_0?,
            y: self.y_0?,
            z: self.z_0?,
        })
    }
}

/// The unified grain table.
///
/// Records are kept sorted by grain ID and IDs are dense, so the record of grain
/// `g` always lives at index `g - 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GrainTable {
    records: Vec<GrainRecord>,
}

impl GrainTable {
    pub fn new(mut records: Vec<GrainRecord>) -> Result<Self, AppError> {
        records.sort_by_key(|r| r.grain_id);
        for (idx, record) in records.iter().enumerate() {
            let expected = idx as u32 + 1;
            if record.grain_id != expected {
                return Err(AppError::configuration(format!(
                    "Grain IDs must be contiguous from 1: expected {expected}, found {}",
                    record.grain_id
                )));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[GrainRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &GrainRecord> {
        self.records.iter()
    }

    pub fn get(&self, grain_id: u32) -> Option<&GrainRecord> {
        let idx = (grain_id as usize).checked_sub(1)?;
        self.records.get(idx)
    }

    pub fn count_phase(&self, phase_id: u8) -> usize {
        self.records.iter().filter(|r| r.phase_id == phase_id).count()
    }

    /// Packing axes in grain-ID order.
    pub fn packing_axes(&self) -> Vec<GrainAxes> {
        self.records.iter().map(GrainRecord::axes).collect()
    }

    pub fn total_final_conti_volume(&self) -> f64 {
        self.records.iter().map(|r| r.final_conti_volume).sum()
    }

    /// Attach packed seed coordinates, matching each seed to its record by grain ID.
    ///
    /// Every grain must receive exactly one seed.
    pub fn assign_seeds(&mut self, seeds: &[Seed]) -> Result<(), AppError> {
        if seeds.len() != self.records.len() {
            return Err(AppError::packing(format!(
                "Packing returned {} seeds for {} grains",
                seeds.len(),
                self.records.len()
            )));
        }
        let mut seen = vec![false; self.records.len()];
        for seed in seeds {
            let idx = (seed.grain_id as usize)
                .checked_sub(1)
                .filter(|idx| *idx < self.records.len())
                .ok_or_else(|| AppError::packing(format!("Seed for unknown grain {}", seed.grain_id)))?;
            if seen[idx] {
                return Err(AppError::packing(format!("Duplicate seed for grain {}", seed.grain_id)));
            }
            seen[idx] = true;

            let record = &mut self.records[idx];
            record.x_0 = Some(seed.x);
            record.y_0 = Some(seed.y);
            record.z_0 = Some(seed.z);
        }
        Ok(())
    }

    pub fn seeds_complete(&self) -> bool {
        self.records.iter().all(|r| r.seed().is_some())
    }
}

/// Parameters of the synthetic grain statistics sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub grain_count: usize,
    /// Median equivalent sphere diameter.
    pub median_diameter: f64,
    /// Log-normal shape parameter of the diameter distribution.
    pub sigma: f64,
    pub aspect_mean: f64,
    pub aspect_std: f64,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            grain_count: 50,
            median_diameter: 10.0,
            sigma: 0.3,
            aspect_mean: 1.5,
            aspect_std: 0.3,
        }
    }
}
