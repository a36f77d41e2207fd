//! Voxel geometry: the box grid, the voxel label array and ellipsoid rasterization.

pub mod ellipsoid;
pub mod grid;
pub mod voxel;

pub use ellipsoid::*;
pub use grid::*;
pub use voxel::*;
