//! Box grid geometry.
//!
//! Voxel `(i, j, k)` covers `[i*bin, (i+1)*bin)` along x (likewise y and z) and is
//! represented by its center `(i + 0.5) * bin`. Flat indices run x fastest:
//! `idx = i + n * (j + n * k)`.

use crate::domain::RunConfiguration;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub box_size: f64,
    pub n_pts: usize,
}

impl GridGeometry {
    pub fn new(box_size: f64, n_pts: usize) -> Result<Self, AppError> {
        if !(box_size.is_finite() && box_size > 0.0) {
            return Err(AppError::configuration(format!("Invalid box size {box_size}.")));
        }
        if n_pts == 0 || n_pts % 2 != 0 {
            return Err(AppError::configuration(format!(
                "Invalid n_pts {n_pts} (must be even and > 0)."
            )));
        }
        Ok(Self { box_size, n_pts })
    }

    pub fn from_config(config: &RunConfiguration) -> Result<Self, AppError> {
        Self::new(config.box_size, config.n_pts)
    }

    pub fn bin_size(&self) -> f64 {
        self.box_size / self.n_pts as f64
    }

    pub fn voxel_volume(&self) -> f64 {
        self.bin_size().powi(3)
    }

    pub fn voxel_count(&self) -> usize {
        self.n_pts * self.n_pts * self.n_pts
    }

    /// Center coordinate of layer `i` along any axis.
    pub fn center(&self, i: usize) -> f64 {
        (i as f64 + 0.5) * self.bin_size()
    }

    /// Voxel centers along one axis.
    pub fn axis(&self) -> Vec<f64> {
        (0..self.n_pts).map(|i| self.center(i)).collect()
    }

    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.n_pts * (j + self.n_pts * k)
    }

    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        let n = self.n_pts;
        (idx % n, (idx / n) % n, idx / (n * n))
    }

    /// Layer containing coordinate `x`, wrapping periodically into the box.
    pub fn layer_of(&self, x: f64) -> usize {
        let layer = (x / self.bin_size()).floor() as i64;
        layer.rem_euclid(self.n_pts as i64) as usize
    }
}

/// Flattened coordinate grids: entry `idx` of each vector is the voxel center of
/// flat index `idx`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCoordinates {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

/// Build the x/y/z voxel-center grids for the box.
pub fn gen_grid(geometry: &GridGeometry) -> GridCoordinates {
    let axis = geometry.axis();
    let count = geometry.voxel_count();
    let mut x = Vec::with_capacity(count);
    let mut y = Vec::with_capacity(count);
    let mut z = Vec::with_capacity(count);

    for &zk in &axis {
        for &yj in &axis {
            for &xi in &axis {
                x.push(xi);
                y.push(yj);
                z.push(zk);
            }
        }
    }

    GridCoordinates { x, y, z }
}
