//! Identity reconciliation.
//!
//! Gives every voxel the phase of its grain and turns the band sentinel into one
//! trailing phase-2 grain with ID `N + 1`.

use tracing::info;

use crate::domain::{BAND_SENTINEL, GrainTable, PHASE_TWO};
use crate::error::AppError;
use crate::periodic::PeriodicRveTable;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRve {
    pub table: PeriodicRveTable,
    /// Grain ID assigned to the band material, when bands were requested.
    pub band_grain_id: Option<i32>,
}

impl ReconciledRve {
    /// Number of grains including the band grain.
    pub fn grain_count(&self, grains: &GrainTable) -> usize {
        grains.len() + usize::from(self.band_grain_id.is_some())
    }
}

pub fn reconcile_identities(
    mut table: PeriodicRveTable,
    grains: &GrainTable,
    number_of_bands: usize,
) -> Result<ReconciledRve, AppError> {
    let n = grains.len() as i32;
    let band_grain_id = (number_of_bands > 0).then_some(n + 1);
    let mut band_voxels = 0usize;

    for voxel in &mut table.voxels {
        match voxel.grain_id {
            BAND_SENTINEL => {
                let Some(band_id) = band_grain_id else {
                    return Err(AppError::reconciliation(
                        "Band voxels found although no bands were requested.",
                    ));
                };
                voxel.grain_id = band_id;
                voxel.phase_id = PHASE_TWO;
                band_voxels += 1;
            }
            id if (1..=n).contains(&id) => {
                let record = grains
                    .get(id as u32)
                    .ok_or_else(|| AppError::reconciliation(format!("No grain record for GrainID {id}.")))?;
                voxel.phase_id = record.phase_id;
            }
            id => {
                return Err(AppError::reconciliation(format!(
                    "Unexpected GrainID {id} (grain table has {n} grains)."
                )));
            }
        }
    }

    info!(grains = n, band_voxels, band_grain = ?band_grain_id, "grain and phase IDs reconciled");
    Ok(ReconciledRve { table, band_grain_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GrainRecord, PHASE_ONE};
    use crate::error::ErrorKind;
    use crate::geometry::{GridGeometry, VoxelGrid};
    use crate::periodic::repair_periodicity;

    fn record(grain_id: u32, phase_id: u8) -> GrainRecord {
        GrainRecord {
            grain_id,
            phase_id,
            a: 1.0,
            b: 1.0,
            c: 1.0,
            alpha: 0.0,
            a_final: 1.0,
            b_final: 1.0,
            c_final: 1.0,
            volume: 1.0,
            final_conti_volume: 1.0,
            final_discrete_volume: 1.0,
            x_0: Some(0.5),
            y_0: Some(0.5),
            z_0: Some(0.5),
        }
    }

    fn table(labels: Vec<i32>) -> PeriodicRveTable {
        let g = GridGeometry::new(2.0, 2).unwrap();
        repair_periodicity(&VoxelGrid::from_labels(2, labels).unwrap(), &g).unwrap()
    }

    #[test]
    fn phases_follow_grain_records() {
        let grains = GrainTable::new(vec![record(1, PHASE_ONE), record(2, PHASE_TWO), record(3, PHASE_ONE)]).unwrap();
        let out = reconcile_identities(table(vec![1, 2, 3, 1, 2, 3, 1, 2]), &grains, 0).unwrap();

        assert_eq!(out.band_grain_id, None);
        for v in &out.table.voxels {
            let expected = grains.get(v.grain_id as u32).unwrap().phase_id;
            assert_eq!(v.phase_id, expected);
        }
    }

    #[test]
    fn sentinel_becomes_trailing_phase_two_grain() {
        let grains = GrainTable::new(vec![record(1, PHASE_ONE), record(2, PHASE_ONE)]).unwrap();
        let labels = vec![1, 2, BAND_SENTINEL, BAND_SENTINEL, 1, 2, 1, 2];
        let out = reconcile_identities(table(labels), &grains, 1).unwrap();

        assert_eq!(out.band_grain_id, Some(3));
        assert_eq!(out.grain_count(&grains), 3);
        assert_eq!(out.table.count_grain(BAND_SENTINEL), 0);
        for v in out.table.voxels.iter().filter(|v| v.grain_id == 3) {
            assert_eq!(v.phase_id, PHASE_TWO);
        }
        assert_eq!(out.table.count_grain(3), 2);
    }

    #[test]
    fn sentinel_without_bands_is_inconsistent() {
        let grains = GrainTable::new(vec![record(1, PHASE_ONE)]).unwrap();
        let labels = vec![1, 1, 1, BAND_SENTINEL, 1, 1, 1, 1];
        let err = reconcile_identities(table(labels), &grains, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reconciliation);
    }

    #[test]
    fn unknown_grain_is_inconsistent() {
        let grains = GrainTable::new(vec![record(1, PHASE_ONE)]).unwrap();
        let err = reconcile_identities(table(vec![1, 1, 1, 1, 1, 1, 1, 9]), &grains, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reconciliation);
    }
}
