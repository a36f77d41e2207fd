//! Volume-distribution diagnostics.
//!
//! Compares the requested grain sizes (continuous and voxelized) with what the
//! run generated, as equivalent diameters.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::{FIG_DIR, GEN_DIR};
use crate::error::AppError;
use crate::io::export::write_rows;
use crate::io::{CONTI_VOLUME_FILE, DISCRETE_VOLUME_FILE, read_generated_volumes, read_volume_column};
use crate::report::{PostProcessor, draw_cumulative};

pub const DISTRIBUTION_TABLE_FILE: &str = "volume_distribution.csv";
pub const DISTRIBUTION_CHART_FILE: &str = "volume_distribution.svg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeDistribution;

/// Summary of one diameter series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionStats {
    pub series: String,
    pub count: usize,
    pub mean_diameter: f64,
    pub std_diameter: f64,
    pub min_diameter: f64,
    pub median_diameter: f64,
    pub max_diameter: f64,
}

/// Diameter of the sphere (`dim_flag` 3) or circle (2) of the given size.
pub fn equivalent_diameter(volume: f64, dim_flag: u8) -> Result<f64, AppError> {
    match dim_flag {
        3 => Ok((6.0 * volume / std::f64::consts::PI).cbrt()),
        2 => Ok(2.0 * (volume / std::f64::consts::PI).sqrt()),
        other => Err(AppError::configuration(format!("Unsupported dimension flag {other}."))),
    }
}

pub fn summarize(series: &str, diameters: &[f64]) -> Option<DistributionStats> {
    if diameters.is_empty() {
        return None;
    }
    let mut sorted = diameters.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let var = sorted.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    Some(DistributionStats {
        series: series.to_string(),
        count: n,
        mean_diameter: mean,
        std_diameter: var.sqrt(),
        min_diameter: sorted[0],
        median_diameter: median,
        max_diameter: sorted[n - 1],
    })
}

impl PostProcessor for VolumeDistribution {
    fn gen_plots(&self, store_path: &Path, dim_flag: u8) -> Result<(), AppError> {
        let gen_path = store_path.join(GEN_DIR);
        let conti = read_volume_column(&gen_path.join(CONTI_VOLUME_FILE))?;
        let discrete = read_volume_column(&gen_path.join(DISCRETE_VOLUME_FILE))?;

        // The band grain has no input counterpart.
        let input_grains = conti.len() as i32;
        let generated: Vec<f64> = read_generated_volumes(&gen_path)?
            .into_iter()
            .filter(|v| (1..=input_grains).contains(&v.grain_id))
            .map(|v| v.volume)
            .collect();

        let to_diameters = |volumes: &[f64]| -> Result<Vec<f64>, AppError> {
            volumes.iter().map(|&v| equivalent_diameter(v, dim_flag)).collect()
        };
        let series = [
            ("input (continuous)", to_diameters(&conti)?),
            ("input (discrete)", to_diameters(&discrete)?),
            ("generated", to_diameters(&generated)?),
        ];

        let stats: Vec<DistributionStats> = series.iter().filter_map(|(name, d)| summarize(name, d)).collect();
        let fig_path = store_path.join(FIG_DIR);
        write_rows(&fig_path.join(DISTRIBUTION_TABLE_FILE), stats.iter())?;
        draw_cumulative(
            &fig_path.join(DISTRIBUTION_CHART_FILE),
            "Equivalent diameter distribution",
            &series,
        )?;

        info!(series = stats.len(), "volume distribution written");
        Ok(())
    }
}
