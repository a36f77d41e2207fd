//! Voxel label array.

use crate::error::AppError;
use crate::geometry::GridGeometry;

/// `n_pts³` voxel labels in flat x-fastest order (see [`GridGeometry::index`]).
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    n_pts: usize,
    labels: Vec<i32>,
}

impl VoxelGrid {
    /// All-background grid.
    pub fn new(n_pts: usize) -> Self {
        Self::filled(n_pts, 0)
    }

    pub fn filled(n_pts: usize, label: i32) -> Self {
        Self {
            n_pts,
            labels: vec![label; n_pts * n_pts * n_pts],
        }
    }

    pub fn from_labels(n_pts: usize, labels: Vec<i32>) -> Result<Self, AppError> {
        let expected = n_pts * n_pts * n_pts;
        if labels.len() != expected {
            return Err(AppError::configuration(format!(
                "Voxel grid of resolution {n_pts} needs {expected} labels, got {}",
                labels.len()
            )));
        }
        Ok(Self { n_pts, labels })
    }

    pub fn n_pts(&self) -> usize {
        self.n_pts
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn get(&self, idx: usize) -> i32 {
        self.labels[idx]
    }

    pub fn set(&mut self, idx: usize, label: i32) {
        self.labels[idx] = label;
    }

    pub fn get_ijk(&self, i: usize, j: usize, k: usize) -> i32 {
        self.labels[i + self.n_pts * (j + self.n_pts * k)]
    }

    pub fn set_ijk(&mut self, i: usize, j: usize, k: usize, label: i32) {
        let n = self.n_pts;
        self.labels[i + n * (j + n * k)] = label;
    }

    pub fn count(&self, label: i32) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Periodic 6-neighborhood of a flat index.
    pub fn neighbors(&self, idx: usize) -> [usize; 6] {
        let n = self.n_pts;
        let i = idx % n;
        let j = (idx / n) % n;
        let k = idx / (n * n);
        let up = |v: usize| (v + 1) % n;
        let down = |v: usize| (v + n - 1) % n;
        let at = |i: usize, j: usize, k: usize| i + n * (j + n * k);
        [
            at(down(i), j, k),
            at(up(i), j, k),
            at(i, down(j), k),
            at(i, up(j), k),
            at(i, j, down(k)),
            at(i, j, up(k)),
        ]
    }

    pub fn matches(&self, geometry: &GridGeometry) -> bool {
        self.n_pts == geometry.n_pts
    }
}
