//! Discrete ellipsoid growth.
//!
//! Every grain grows its final (unshrunk) ellipsoid around its seed, starting
//! from the packing size. Each step the scale grows by `growth_rate` and each
//! active grain proposes the free voxels inside its scaled ellipsoid; a voxel
//! proposed by several grains goes to the one it is relatively closest to, ties
//! to the smaller grain ID. Grains stop at their discrete target volume. Once
//! no grain is growing but free voxels remain, all grains resume without a cap.

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{BAND_SENTINEL, VoxelLabel, image_label};
use crate::error::AppError;
use crate::geometry::{Ellipsoid, GridGeometry, VoxelGrid};
use crate::io::export::write_rows;
use crate::tessellation::{TESSELLATION_PROGRESS_FILE, TessellationOutcome, TessellationRequest, Tessellator};

pub const DEFAULT_MAX_ITERATIONS: usize = 1_000;
pub const DEFAULT_GROWTH_RATE: f64 = 0.05;
/// Capped steps without any claim before the cap is lifted.
pub const DEFAULT_STALL_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscreteTessellation {
    pub max_iterations: usize,
    pub growth_rate: f64,
    pub stall_limit: usize,
}

impl Default for DiscreteTessellation {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            growth_rate: DEFAULT_GROWTH_RATE,
            stall_limit: DEFAULT_STALL_LIMIT,
        }
    }
}

/// A free voxel proposed by one grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Claim {
    pub index: usize,
    pub grain_id: u32,
    pub distance: f64,
    pub wrapped: bool,
}

impl Claim {
    fn beats(&self, other: &Claim) -> bool {
        self.distance < other.distance || (self.distance == other.distance && self.grain_id < other.grain_id)
    }

    fn label(&self) -> i32 {
        if self.wrapped {
            image_label(self.grain_id)
        } else {
            self.grain_id as i32
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GrowingGrain {
    grain_id: u32,
    ellipsoid: Ellipsoid,
    target: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GrowthRow {
    iteration: usize,
    scale: f64,
    free_voxels: usize,
}

impl Tessellator for DiscreteTessellation {
    fn tessellate(&self, request: &TessellationRequest<'_>) -> Result<TessellationOutcome, AppError> {
        let geometry = request.geometry;
        if !request.packed.matches(geometry) {
            return Err(AppError::tessellation("Packed grid does not match the grid resolution."));
        }

        let mut grid = request.packed.clone();
        let released = release_band_margin(&mut grid, request.band_ratio_final);
        if released > 0 {
            debug!(released, "band margin released");
        }

        let voxel_volume = geometry.voxel_volume();
        let grains = request
            .grains
            .iter()
            .map(|r| {
                let seed = r.seed().ok_or_else(|| {
                    AppError::tessellation(format!("Grain {} has no seed coordinates.", r.grain_id))
                })?;
                Ok(GrowingGrain {
                    grain_id: r.grain_id,
                    ellipsoid: Ellipsoid::new(
                        Vector3::new(seed.x, seed.y, seed.z),
                        r.a_final,
                        r.b_final,
                        r.c_final,
                        r.alpha,
                    ),
                    target: ((r.final_discrete_volume / voxel_volume).round() as usize).max(1),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let mut counts = owned_counts(&grid, grains.len());
        let mut active: Vec<bool> = grains.iter().zip(&counts).map(|(g, &c)| c < g.target).collect();
        let mut capped = true;
        let mut stalled = 0;
        let mut scale = request.shrink_factor;
        let mut free = grid.count(0);
        let mut progress = Vec::new();
        let mut iteration = 0;

        while free > 0 && iteration < self.max_iterations {
            iteration += 1;
            if capped && (!active.contains(&true) || stalled >= self.stall_limit) {
                info!(iteration, free, "lifting the volume cap");
                capped = false;
                active.fill(true);
            }
            scale *= 1.0 + self.growth_rate;

            let proposals: Vec<Vec<Claim>> = grains
                .par_iter()
                .zip(active.par_iter())
                .filter(|(_, is_active)| **is_active)
                .map(|(grain, _)| propose(&grid, geometry, grain, scale))
                .collect();
            let claims = merge_claims(proposals, grid.len());

            stalled = if claims.is_empty() { stalled + 1 } else { 0 };
            for claim in &claims {
                grid.set(claim.index, claim.label());
                counts[claim.grain_id as usize - 1] += 1;
            }
            free -= claims.len();

            if capped {
                for (idx, grain) in grains.iter().enumerate() {
                    if counts[idx] >= grain.target {
                        active[idx] = false;
                    }
                }
            }
            progress.push(GrowthRow {
                iteration,
                scale,
                free_voxels: free,
            });
        }

        if let Some(dir) = request.animation_dir {
            write_rows(&dir.join(TESSELLATION_PROGRESS_FILE), progress.iter())?;
        }

        let success = free == 0;
        if success {
            info!(iterations = iteration, "tessellation finished");
        } else {
            warn!(iterations = iteration, free, "tessellation left free voxels");
        }
        Ok(TessellationOutcome { grid, success })
    }
}

/// Shrink the sentinel region from its surface inwards, one shell at a time,
/// while at least `ratio` of it remains. Returns the number of released voxels.
pub fn release_band_margin(grid: &mut VoxelGrid, ratio: f64) -> usize {
    let initial = grid.count(BAND_SENTINEL);
    if initial == 0 || ratio >= 1.0 {
        return 0;
    }
    let keep = (initial as f64 * ratio).ceil() as usize;
    let mut remaining = initial;

    loop {
        let frontier: Vec<usize> = (0..grid.len())
            .filter(|&idx| {
                grid.get(idx) == BAND_SENTINEL
                    && grid.neighbors(idx).iter().any(|&nb| grid.get(nb) != BAND_SENTINEL)
            })
            .collect();
        if frontier.is_empty() || remaining < keep + frontier.len() {
            break;
        }
        for &idx in &frontier {
            grid.set(idx, 0);
        }
        remaining -= frontier.len();
    }
    initial - remaining
}

/// Resolve competing proposals: one claim per voxel, closest grain first.
pub fn merge_claims(proposals: Vec<Vec<Claim>>, len: usize) -> Vec<Claim> {
    let mut best: Vec<Option<Claim>> = vec![None; len];
    for claim in proposals.into_iter().flatten() {
        if best[claim.index].is_none_or(|current| claim.beats(&current)) {
            best[claim.index] = Some(claim);
        }
    }
    best.into_iter().flatten().collect()
}

fn propose(grid: &VoxelGrid, geometry: &GridGeometry, grain: &GrowingGrain, scale: f64) -> Vec<Claim> {
    grain
        .ellipsoid
        .scaled(scale)
        .rasterize(geometry)
        .into_iter()
        .filter(|f| grid.get(f.index) == 0)
        .map(|f| Claim {
            index: f.index,
            grain_id: grain.grain_id,
            distance: f.distance,
            wrapped: f.wrapped,
        })
        .collect()
}

/// Voxels owned per grain (index `g - 1`), periodic images included.
fn owned_counts(grid: &VoxelGrid, grains: usize) -> Vec<usize> {
    let mut counts = vec![0; grains];
    for &label in grid.labels() {
        if let Some(g) = VoxelLabel::decode(label).owner() {
            if let Some(slot) = counts.get_mut(g as usize - 1) {
                *slot += 1;
            }
        }
    }
    counts
}
