//! Ellipsoid rasterization on the periodic voxel grid.
//!
//! Grains are ellipsoids rotated by `alpha` (degrees) about the z axis. Packing,
//! discrete target volumes and tessellation growth all use the same rasterizer so
//! that "inside" means exactly the same thing in every stage.

use nalgebra::{Rotation3, Vector3};

use crate::geometry::GridGeometry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub center: Vector3<f64>,
    pub semi_axes: Vector3<f64>,
    rotation: Rotation3<f64>,
}

/// One voxel covered by an ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub index: usize,
    /// Normalized distance to the center (`<= 1` inside).
    pub distance: f64,
    /// The voxel was reached across a box face.
    pub wrapped: bool,
}

impl Ellipsoid {
    pub fn new(center: Vector3<f64>, a: f64, b: f64, c: f64, alpha_deg: f64) -> Self {
        Self {
            center,
            semi_axes: Vector3::new(a, b, c),
            rotation: Rotation3::from_axis_angle(&Vector3::z_axis(), alpha_deg.to_radians()),
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            semi_axes: self.semi_axes * factor,
            ..*self
        }
    }

    /// `(x/a)² + (y/b)² + (z/c)²` of an offset from the center, in the ellipsoid frame.
    pub fn normalized_distance(&self, offset: &Vector3<f64>) -> f64 {
        let local = self.rotation.inverse_transform_vector(offset);
        let q = local.component_div(&self.semi_axes);
        q.norm_squared()
    }

    /// Voxels whose centers lie inside the ellipsoid, wrapped into the box.
    ///
    /// The scan window is capped at one box length per axis so a voxel is never
    /// reported twice, even for ellipsoids larger than the box.
    pub fn rasterize(&self, geometry: &GridGeometry) -> Vec<Footprint> {
        let bin = geometry.bin_size();
        let n = geometry.n_pts as i64;
        let half = n / 2;

        let reach = |r: f64| (r / bin).ceil() as i64 + 1;
        let r_xy = reach(self.semi_axes.x.max(self.semi_axes.y));
        let r_z = reach(self.semi_axes.z);
        let window = |r: i64| -(r.min(half))..=r.min(half - 1);

        let ci = (self.center.x / bin).floor() as i64;
        let cj = (self.center.y / bin).floor() as i64;
        let ck = (self.center.z / bin).floor() as i64;

        let mut out = Vec::new();
        for dk in window(r_z) {
            let uk = ck + dk;
            for dj in window(r_xy) {
                let uj = cj + dj;
                for di in window(r_xy) {
                    let ui = ci + di;
                    let point = Vector3::new(
                        (ui as f64 + 0.5) * bin,
                        (uj as f64 + 0.5) * bin,
                        (uk as f64 + 0.5) * bin,
                    );
                    let distance = self.normalized_distance(&(point - self.center));
                    if distance > 1.0 {
                        continue;
                    }
                    let inside = |u: i64| (0..n).contains(&u);
                    let index = geometry.index(
                        ui.rem_euclid(n) as usize,
                        uj.rem_euclid(n) as usize,
                        uk.rem_euclid(n) as usize,
                    );
                    out.push(Footprint {
                        index,
                        distance,
                        wrapped: !(inside(ui) && inside(uj) && inside(uk)),
                    });
                }
            }
        }
        out
    }
}
