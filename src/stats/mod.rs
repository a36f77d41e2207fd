//! Grain statistics processing.
//!
//! Merges the phase input tables into one `GrainTable` and derives the geometry
//! each later stage needs:
//!
//! - packing axes: final axes scaled by the linear shrink factor
//! - `final_conti_volume`: the unshrunk continuous target volume
//! - `final_discrete_volume`: the target as the grid actually resolves it

use nalgebra::Vector3;
use tracing::info;

use crate::domain::{GrainRecord, GrainRow, GrainTable, PHASE_ONE, PHASE_TWO, ellipsoid_volume};
use crate::error::AppError;
use crate::geometry::{Ellipsoid, GridGeometry};

pub mod sample;

pub use sample::*;

/// Processed grain statistics.
#[derive(Debug, Clone)]
pub struct GrainStatistics {
    pub table: GrainTable,
    /// Sum of `final_conti_volume`.
    pub total_volume: f64,
    /// Edge of a cube holding `total_volume`.
    pub estimated_box_size: f64,
}

/// Build the unified grain table from one or two phase tables.
///
/// Rows of `phase1` get phase 1 and rows of `phase2` get phase 2; grain IDs are
/// assigned densely from 1 in input order, phase 1 first.
pub fn build_grain_table(
    phase1: Vec<GrainRow>,
    phase2: Option<Vec<GrainRow>>,
    shrink_factor: f64,
    geometry: &GridGeometry,
) -> Result<GrainStatistics, AppError> {
    if phase1.is_empty() {
        return Err(AppError::configuration("Phase 1 table contains no grains."));
    }
    if phase2.as_ref().is_some_and(Vec::is_empty) {
        return Err(AppError::configuration("Phase 2 table was given but contains no grains."));
    }
    if !(shrink_factor.is_finite() && shrink_factor > 0.0 && shrink_factor <= 1.0) {
        return Err(AppError::configuration(format!("Invalid shrink factor {shrink_factor}.")));
    }

    let tagged = phase1
        .into_iter()
        .map(|row| (PHASE_ONE, row))
        .chain(phase2.into_iter().flatten().map(|row| (PHASE_TWO, row)));

    let mut records = Vec::new();
    for (idx, (phase_id, row)) in tagged.enumerate() {
        records.push(process_row(idx as u32 + 1, phase_id, &row, shrink_factor, geometry)?);
    }

    let table = GrainTable::new(records)?;
    let total_volume = table.total_final_conti_volume();
    let estimated_box_size = total_volume.cbrt();

    info!(
        grains = table.len(),
        phase_two = table.count_phase(PHASE_TWO),
        "the total volume of the grain table is {total_volume:.3}; a box size of {estimated_box_size:.3} is recommended"
    );

    Ok(GrainStatistics {
        table,
        total_volume,
        estimated_box_size,
    })
}

fn process_row(
    grain_id: u32,
    phase_id: u8,
    row: &GrainRow,
    shrink_factor: f64,
    geometry: &GridGeometry,
) -> Result<GrainRecord, AppError> {
    for (name, v) in [("a", row.a), ("b", row.b), ("c", row.c)] {
        if !(v.is_finite() && v > 0.0) {
            return Err(AppError::configuration(format!(
                "Grain {grain_id}: axis `{name}` must be finite and > 0 (got {v})."
            )));
        }
    }
    if !row.alpha.is_finite() {
        return Err(AppError::configuration(format!("Grain {grain_id}: non-finite `alpha`.")));
    }

    let final_conti_volume = row.volume.unwrap_or_else(|| ellipsoid_volume(row.a, row.b, row.c));
    if !(final_conti_volume.is_finite() && final_conti_volume > 0.0) {
        return Err(AppError::configuration(format!(
            "Grain {grain_id}: volume must be finite and > 0."
        )));
    }

    let (a, b, c) = (row.a * shrink_factor, row.b * shrink_factor, row.c * shrink_factor);

    Ok(GrainRecord {
        grain_id,
        phase_id,
        a,
        b,
        c,
        alpha: row.alpha,
        a_final: row.a,
        b_final: row.b,
        c_final: row.c,
        volume: ellipsoid_volume(a, b, c),
        final_conti_volume,
        final_discrete_volume: discrete_volume(row, geometry),
        x_0: None,
        y_0: None,
        z_0: None,
    })
}

/// Volume of the voxels a grain covers when centered on a voxel.
fn discrete_volume(row: &GrainRow, geometry: &GridGeometry) -> f64 {
    let mid = geometry.center(geometry.n_pts / 2);
    let ellipsoid = Ellipsoid::new(Vector3::new(mid, mid, mid), row.a, row.b, row.c, row.alpha);
    ellipsoid.rasterize(geometry).len() as f64 * geometry.voxel_volume()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sphere(r: f64) -> GrainRow {
        GrainRow { a: r, b: r, c: r, alpha: 0.0, volume: None }
    }

    fn geometry() -> GridGeometry {
        GridGeometry::new(100.0, 10).unwrap()
    }

    #[test]
    fn single_phase_scenario() {
        let stats = build_grain_table(vec![sphere(5.0); 5], None, 0.5f64.cbrt(), &geometry()).unwrap();
        assert_eq!(stats.table.len(), 5);
        for (idx, r) in stats.table.iter().enumerate() {
            assert_eq!(r.grain_id, idx as u32 + 1);
            assert_eq!(r.phase_id, PHASE_ONE);
            assert!(r.seed().is_none());
        }
    }

    #[test]
    fn second_phase_rows_get_phase_two_only() {
        let stats = build_grain_table(
            vec![sphere(5.0), sphere(6.0)],
            Some(vec![sphere(7.0), sphere(8.0), sphere(9.0)]),
            1.0,
            &geometry(),
        )
        .unwrap();

        let phases: Vec<u8> = stats.table.iter().map(|r| r.phase_id).collect();
        assert_eq!(phases, vec![1, 1, 2, 2, 2]);
        let ids: Vec<u32> = stats.table.iter().map(|r| r.grain_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.table.get(3).unwrap().a_final, 7.0);
    }

    #[test]
    fn shrink_scales_axes_and_volume() {
        let s = 0.5f64.cbrt();
        let stats = build_grain_table(vec![sphere(5.0)], None, s, &geometry()).unwrap();
        let r = &stats.table.records()[0];
        assert!((r.a - 5.0 * s).abs() < 1e-12);
        assert!((r.volume - 0.5 * r.final_conti_volume).abs() < 1e-9);
        assert!((r.final_conti_volume - ellipsoid_volume(5.0, 5.0, 5.0)).abs() < 1e-9);
    }

    #[test]
    fn explicit_volume_wins() {
        let row = GrainRow { volume: Some(1234.0), ..sphere(5.0) };
        let stats = build_grain_table(vec![row], None, 1.0, &geometry()).unwrap();
        assert_eq!(stats.table.records()[0].final_conti_volume, 1234.0);
    }

    #[test]
    fn recommended_box_size_is_cube_root_of_total() {
        let stats = build_grain_table(vec![sphere(5.0); 4], None, 1.0, &geometry()).unwrap();
        let total = 4.0 * ellipsoid_volume(5.0, 5.0, 5.0);
        assert!((stats.total_volume - total).abs() < 1e-9);
        assert!((stats.estimated_box_size - total.cbrt()).abs() < 1e-9);
    }

    #[test]
    fn discrete_volume_counts_voxels() {
        // Radius 15 on a pitch of 10: offsets with squared length <= 2.25 (19 voxels).
        let stats = build_grain_table(vec![sphere(15.0)], None, 1.0, &geometry()).unwrap();
        assert!((stats.table.records()[0].final_discrete_volume - 19_000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_phase_two_is_inconsistent() {
        let err = build_grain_table(vec![sphere(5.0)], Some(vec![]), 1.0, &geometry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
