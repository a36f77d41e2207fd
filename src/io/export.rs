//! Generation-data tables.
//!
//! Everything written here is a flat comma-separated table with a header row,
//! written once per run into `Generation_Data` and overwritten when a store path
//! is reused.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::GrainTable;
use crate::error::AppError;
use crate::periodic::PeriodicRveTable;

pub const GRAIN_DATA_FILE: &str = "grain_data.csv";
pub const CONTI_VOLUME_FILE: &str = "conti_input_vol.csv";
pub const DISCRETE_VOLUME_FILE: &str = "discrete_input_vol.csv";
pub const GENERATED_VOLUME_FILE: &str = "generated_vol.csv";
pub const RVE_TABLE_FILE: &str = "periodic_rve.csv";

/// Generated size of one grain after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVolume {
    #[serde(rename = "GrainID")]
    pub grain_id: i32,
    pub voxels: usize,
    pub volume: f64,
}

/// Write the unified grain table and its two volume columns.
pub fn write_grain_data(gen_path: &Path, table: &GrainTable) -> Result<(), AppError> {
    write_rows(&gen_path.join(GRAIN_DATA_FILE), table.iter())?;

    let conti: Vec<f64> = table.iter().map(|r| r.final_conti_volume).collect();
    write_volume_column(&gen_path.join(CONTI_VOLUME_FILE), "final_conti_volume", &conti)?;

    let discrete: Vec<f64> = table.iter().map(|r| r.final_discrete_volume).collect();
    write_volume_column(&gen_path.join(DISCRETE_VOLUME_FILE), "final_discrete_volume", &discrete)?;
    Ok(())
}

/// Write a single named column.
pub fn write_volume_column(path: &Path, header: &str, values: &[f64]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;
    writer
        .write_record([header])
        .map_err(|e| AppError::io(format!("Failed to write header of '{}': {e}", path.display())))?;
    for v in values {
        writer
            .write_record([v.to_string()])
            .map_err(|e| AppError::io(format!("Failed to write row of '{}': {e}", path.display())))?;
    }
    flush(writer, path)
}

/// Read back a single-column table written by [`write_volume_column`].
pub fn read_volume_column(path: &Path) -> Result<Vec<f64>, AppError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| AppError::io(format!("Invalid row in '{}': {e}", path.display())))?;
        let value = record
            .get(0)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| AppError::io(format!("Invalid value on line {} of '{}'", idx + 2, path.display())))?;
        out.push(value);
    }
    Ok(out)
}

pub fn write_generated_volumes(gen_path: &Path, volumes: &[GeneratedVolume]) -> Result<(), AppError> {
    write_rows(&gen_path.join(GENERATED_VOLUME_FILE), volumes.iter())
}

pub fn read_generated_volumes(gen_path: &Path) -> Result<Vec<GeneratedVolume>, AppError> {
    let path = gen_path.join(GENERATED_VOLUME_FILE);
    let mut reader = csv::Reader::from_path(&path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| AppError::io(format!("Invalid row in '{}': {e}", path.display()))))
        .collect()
}

/// Write the reconciled voxel table (x, y, z, GrainID, phaseID).
pub fn write_rve_table(gen_path: &Path, table: &PeriodicRveTable) -> Result<(), AppError> {
    write_rows(&gen_path.join(RVE_TABLE_FILE), table.voxels.iter())
}

pub(crate) fn write_rows<'a, T, I>(path: &Path, rows: I) -> Result<(), AppError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = create_writer(path)?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::io(format!("Failed to write row of '{}': {e}", path.display())))?;
    }
    flush(writer, path)
}

fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, AppError> {
    csv::Writer::from_path(path).map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))
}

fn flush(mut writer: csv::Writer<std::fs::File>, path: &Path) -> Result<(), AppError> {
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GrainRow, PHASE_ONE};
    use crate::geometry::GridGeometry;
    use crate::stats::build_grain_table;

    fn rows(n: usize) -> Vec<GrainRow> {
        (0..n)
            .map(|i| GrainRow { a: 5.0 + i as f64, b: 5.0, c: 5.0, alpha: 0.0, volume: None })
            .collect()
    }

    #[test]
    fn grain_data_files_are_written() {
        let tmp = tempfile::tempdir().unwrap();
        let geometry = GridGeometry::new(100.0, 10).unwrap();
        let stats = build_grain_table(rows(3), None, 0.5f64.cbrt(), &geometry).unwrap();

        write_grain_data(tmp.path(), &stats.table).unwrap();

        let grain_data = std::fs::read_to_string(tmp.path().join(GRAIN_DATA_FILE)).unwrap();
        let header = grain_data.lines().next().unwrap();
        assert!(header.starts_with("GrainID,phaseID,a,b,c,alpha"));
        assert_eq!(grain_data.lines().count(), 4);

        let conti = read_volume_column(&tmp.path().join(CONTI_VOLUME_FILE)).unwrap();
        let expected: Vec<f64> = stats.table.iter().map(|r| r.final_conti_volume).collect();
        assert_eq!(conti, expected);

        let discrete = read_volume_column(&tmp.path().join(DISCRETE_VOLUME_FILE)).unwrap();
        assert_eq!(discrete.len(), 3);
        assert!(stats.table.iter().all(|r| r.phase_id == PHASE_ONE));
    }

    #[test]
    fn rewriting_overwrites_previous_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let geometry = GridGeometry::new(100.0, 10).unwrap();
        let big = build_grain_table(rows(5), None, 1.0, &geometry).unwrap();
        let small = build_grain_table(rows(2), None, 1.0, &geometry).unwrap();

        write_grain_data(tmp.path(), &big.table).unwrap();
        write_grain_data(tmp.path(), &small.table).unwrap();

        let conti = read_volume_column(&tmp.path().join(CONTI_VOLUME_FILE)).unwrap();
        assert_eq!(conti.len(), 2);
    }

    #[test]
    fn generated_volumes_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let volumes = vec![
            GeneratedVolume { grain_id: 1, voxels: 10, volume: 10_000.0 },
            GeneratedVolume { grain_id: 2, voxels: 3, volume: 3_000.0 },
        ];
        write_generated_volumes(tmp.path(), &volumes).unwrap();
        assert_eq!(read_generated_volumes(tmp.path()).unwrap(), volumes);
    }
}
