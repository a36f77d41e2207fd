//! Band generation.
//!
//! Bands are slabs of whole voxel layers normal to the y axis, reserved for the
//! secondary phase. They are labeled with [`BAND_SENTINEL`] so the packing and
//! tessellation engines keep ordinary grains out of them; the identity
//! reconciler later turns them into one trailing phase-2 grain.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::domain::{BAND_SENTINEL, band_layers};
use crate::error::AppError;
use crate::geometry::{GridGeometry, VoxelGrid};

/// One placed band: `layers` consecutive y layers starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub start: usize,
    pub layers: usize,
}

impl Band {
    pub fn end(&self) -> usize {
        self.start + self.layers
    }

    pub fn overlaps(&self, other: &Band) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// Voxel array carrying the accumulated bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BandField {
    grid: VoxelGrid,
    /// Layers per band.
    layers: usize,
    /// Last start layer that keeps a band inside the grid.
    last_start: usize,
    bands: Vec<Band>,
}

/// Empty (all background) array matching the box.
pub fn gen_array(geometry: &GridGeometry) -> VoxelGrid {
    VoxelGrid::new(geometry.n_pts)
}

/// Attach boundary metadata for bands of `bandwidth` to an empty array.
pub fn gen_boundaries(grid: VoxelGrid, geometry: &GridGeometry, bandwidth: f64) -> Result<BandField, AppError> {
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        return Err(AppError::configuration(format!("Invalid bandwidth {bandwidth}.")));
    }
    if !grid.matches(geometry) {
        return Err(AppError::configuration("Band array does not match the grid resolution."));
    }
    let layers = band_layers(bandwidth, geometry.bin_size());
    if layers > geometry.n_pts {
        return Err(AppError::configuration(format!(
            "Bandwidth {bandwidth} ({layers} layers) exceeds the box ({} layers).",
            geometry.n_pts
        )));
    }
    Ok(BandField {
        grid,
        layers,
        last_start: geometry.n_pts - layers,
        bands: Vec::new(),
    })
}

impl BandField {
    /// Place one more band at a random admissible position that does not overlap
    /// any band placed so far.
    pub fn band_generator<R: Rng + ?Sized>(mut self, rng: &mut R) -> Result<Self, AppError> {
        let layers = self.layers;
        let candidates: Vec<usize> = (0..=self.last_start)
            .filter(|&start| {
                let band = Band { start, layers };
                self.bands.iter().all(|b| !b.overlaps(&band))
            })
            .collect();

        let start = *candidates.choose(rng).ok_or_else(|| {
            AppError::configuration(format!(
                "No room for band {} of {layers} layers.",
                self.bands.len() + 1
            ))
        })?;

        let band = Band { start, layers };
        let n = self.grid.n_pts();
        for k in 0..n {
            for j in band.start..band.end() {
                for i in 0..n {
                    self.grid.set_ijk(i, j, k, BAND_SENTINEL);
                }
            }
        }
        debug!(start, layers, "band placed");
        self.bands.push(band);
        Ok(self)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn band_voxel_count(&self) -> usize {
        self.grid.count(BAND_SENTINEL)
    }

    /// Array in which only the central `ratio` share of each band stays reserved
    /// (at least one layer per band); the outer layers are released.
    pub fn core(&self, ratio: f64) -> VoxelGrid {
        let n = self.grid.n_pts();
        let mut out = VoxelGrid::new(n);
        for band in &self.bands {
            let kept = ((band.layers as f64 * ratio).round() as usize).clamp(1, band.layers);
            let first = band.start + (band.layers - kept) / 2;
            for k in 0..n {
                for j in first..first + kept {
                    for i in 0..n {
                        out.set_ijk(i, j, k, BAND_SENTINEL);
                    }
                }
            }
        }
        out
    }
}

/// Build the band array for a run: an empty array with boundary metadata and
/// `number_of_bands` non-overlapping bands.
pub fn generate_bands<R: Rng + ?Sized>(
    geometry: &GridGeometry,
    number_of_bands: usize,
    bandwidth: f64,
    rng: &mut R,
) -> Result<BandField, AppError> {
    let mut field = gen_boundaries(gen_array(geometry), geometry, bandwidth)?;
    for _ in 0..number_of_bands {
        field = field.band_generator(rng)?;
    }
    info!(
        bands = field.bands().len(),
        voxels = field.band_voxel_count(),
        "band array generated"
    );
    Ok(field)
}
