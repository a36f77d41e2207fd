//! Packing engine seam.
//!
//! A packer places the shrunk grain ellipsoids into the box without overlap and
//! reports where each grain's seed ended up. The pipeline only sees the
//! [`Packer`] trait; [`DiscreteRsa`] is the default implementation.

use std::path::Path;

use crate::band::BandField;
use crate::domain::{GrainAxes, Seed};
use crate::error::AppError;
use crate::geometry::{GridGeometry, VoxelGrid};

pub mod rsa;

pub use rsa::*;

pub const RSA_PROGRESS_FILE: &str = "rsa_progress.csv";

/// Inputs of one packing run.
#[derive(Debug, Clone, Copy)]
pub struct PackingRequest<'a> {
    pub geometry: &'a GridGeometry,
    /// Packing axes, keyed by grain ID.
    pub grains: &'a [GrainAxes],
    pub bands: Option<&'a BandField>,
    /// Share of each band kept off-limits during packing.
    pub band_ratio: f64,
    /// Where to write per-grain progress, when animation is on.
    pub animation_dir: Option<&'a Path>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackingOutcome {
    pub grid: VoxelGrid,
    /// Seeds of the placed grains, keyed by grain ID.
    pub seeds: Vec<Seed>,
    pub success: bool,
}

pub trait Packer {
    /// Place every grain of `request`. Failing to place a grain is reported
    /// through `success`, not as an error.
    fn pack(&self, request: &PackingRequest<'_>) -> Result<PackingOutcome, AppError>;
}
