//! Random sequential addition on the voxel grid.

use std::cmp::Ordering;

use nalgebra::Vector3;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{GrainAxes, Seed, image_label};
use crate::error::AppError;
use crate::geometry::{Ellipsoid, GridGeometry, VoxelGrid};
use crate::io::export::write_rows;
use crate::packing::{PackingOutcome, PackingRequest, Packer, RSA_PROGRESS_FILE};

pub const DEFAULT_MAX_ATTEMPTS: usize = 2_000;

/// Places grains largest first at random free voxel centers; a placement is
/// accepted only when every voxel the ellipsoid covers is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteRsa {
    pub seed: u64,
    pub max_attempts: usize,
}

impl DiscreteRsa {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct PlacementRow {
    #[serde(rename = "GrainID")]
    grain_id: u32,
    attempts: usize,
    placed: bool,
}

impl Packer for DiscreteRsa {
    fn pack(&self, request: &PackingRequest<'_>) -> Result<PackingOutcome, AppError> {
        let geometry = request.geometry;
        let mut grid = match request.bands {
            Some(field) => field.core(request.band_ratio),
            None => VoxelGrid::new(geometry.n_pts),
        };
        if !grid.matches(geometry) {
            return Err(AppError::packing("Band array does not match the grid resolution."));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut seeds = Vec::with_capacity(request.grains.len());
        let mut progress = Vec::with_capacity(request.grains.len());
        let mut success = true;

        for grain in placement_order(request.grains) {
            let (placed, attempts) = self.place(&mut grid, geometry, grain, &mut rng);
            progress.push(PlacementRow {
                grain_id: grain.grain_id,
                attempts,
                placed: placed.is_some(),
            });
            match placed {
                Some(seed) => {
                    debug!(grain = grain.grain_id, attempts, "grain placed");
                    seeds.push(seed);
                }
                None => {
                    warn!(
                        grain = grain.grain_id,
                        attempts, "grain could not be placed; packing failed"
                    );
                    success = false;
                    break;
                }
            }
        }

        if let Some(dir) = request.animation_dir {
            write_rows(&dir.join(RSA_PROGRESS_FILE), progress.iter())?;
        }

        seeds.sort_by_key(|s| s.grain_id);
        if success {
            info!(grains = seeds.len(), "packing finished");
        }
        Ok(PackingOutcome { grid, seeds, success })
    }
}

impl DiscreteRsa {
    fn place<R: Rng + ?Sized>(
        &self,
        grid: &mut VoxelGrid,
        geometry: &GridGeometry,
        grain: &GrainAxes,
        rng: &mut R,
    ) -> (Option<Seed>, usize) {
        let free: Vec<usize> = (0..grid.len()).filter(|&idx| grid.get(idx) == 0).collect();

        for attempt in 1..=self.max_attempts {
            let Some(&idx) = free.choose(rng) else {
                return (None, attempt - 1);
            };
            let (i, j, k) = geometry.coords(idx);
            let center = Vector3::new(geometry.center(i), geometry.center(j), geometry.center(k));
            let ellipsoid = Ellipsoid::new(center, grain.a, grain.b, grain.c, grain.alpha);
            let footprint = ellipsoid.rasterize(geometry);

            if footprint.iter().any(|f| grid.get(f.index) != 0) {
                continue;
            }
            for f in &footprint {
                let label = if f.wrapped {
                    image_label(grain.grain_id)
                } else {
                    grain.grain_id as i32
                };
                grid.set(f.index, label);
            }
            let seed = Seed {
                grain_id: grain.grain_id,
                x: center.x,
                y: center.y,
                z: center.z,
            };
            return (Some(seed), attempt);
        }
        (None, self.max_attempts)
    }
}

/// Largest volume first; equal volumes by grain ID.
fn placement_order(grains: &[GrainAxes]) -> Vec<&GrainAxes> {
    let mut order: Vec<&GrainAxes> = grains.iter().collect();
    order.sort_by(|a, b| {
        b.volume()
            .partial_cmp(&a.volume())
            .unwrap_or(Ordering::Equal)
            .then(a.grain_id.cmp(&b.grain_id))
    });
    order
}
