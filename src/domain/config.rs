//! Run configuration.
//!
//! `RunConfiguration` is validated once at construction so every later stage can
//! rely on its invariants (even grid resolution, ratios in range, ...).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::SampleSpec;
use crate::error::AppError;

/// Default volumetric shrink applied to grains before packing.
pub const DEFAULT_SHRINK_FACTOR: f64 = 0.5;
/// Default share of each band kept reserved during packing.
pub const DEFAULT_BAND_RATIO_RSA: f64 = 0.95;
/// Default share of each band kept reserved during tessellation.
pub const DEFAULT_BAND_RATIO_FINAL: f64 = 0.95;
pub const DEFAULT_SEED: u64 = 42;

/// A full run's configuration as understood by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub box_size: f64,
    /// Voxels per axis. Always even.
    pub n_pts: usize,
    pub number_of_bands: usize,
    /// Band thickness in box units.
    pub bandwidth: f64,
    /// Linear shrink applied to every semi-axis: the cube root of the
    /// user-supplied volumetric shrink.
    shrink_factor: f64,
    pub band_ratio_rsa: f64,
    pub band_ratio_final: f64,

    pub phase1_csv: Option<PathBuf>,
    pub phase2_csv: Option<PathBuf>,
    /// Synthetic phase-1 input used when `phase1_csv` is not set.
    pub sample: Option<SampleSpec>,

    pub root_dir: PathBuf,
    /// Distinguishes runs started on the same day.
    pub epoch: u64,
    pub seed: u64,
    pub phase_two_isotropic: bool,
    pub animation: bool,
    pub debug: bool,
}

impl RunConfiguration {
    /// Build and validate a configuration; `shrink_factor` is the volumetric shrink.
    pub fn new(
        box_size: f64,
        n_pts: usize,
        number_of_bands: usize,
        bandwidth: f64,
        shrink_factor: f64,
        band_ratio_rsa: f64,
        band_ratio_final: f64,
    ) -> Result<Self, AppError> {
        let config = Self {
            box_size,
            n_pts,
            number_of_bands,
            bandwidth,
            shrink_factor: shrink_factor.cbrt(),
            band_ratio_rsa,
            band_ratio_final,
            phase1_csv: None,
            phase2_csv: None,
            sample: None,
            root_dir: PathBuf::from("."),
            epoch: 0,
            seed: DEFAULT_SEED,
            phase_two_isotropic: true,
            animation: false,
            debug: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration with default shrink and band ratios.
    pub fn with_defaults(box_size: f64, n_pts: usize, number_of_bands: usize, bandwidth: f64) -> Result<Self, AppError> {
        Self::new(
            box_size,
            n_pts,
            number_of_bands,
            bandwidth,
            DEFAULT_SHRINK_FACTOR,
            DEFAULT_BAND_RATIO_RSA,
            DEFAULT_BAND_RATIO_FINAL,
        )
    }

    /// Linear (per-axis) shrink factor.
    pub fn shrink_factor(&self) -> f64 {
        self.shrink_factor
    }

    /// The volumetric shrink the configuration was built from.
    pub fn volumetric_shrink(&self) -> f64 {
        self.shrink_factor.powi(3)
    }

    pub fn bin_size(&self) -> f64 {
        self.box_size / self.n_pts as f64
    }

    pub fn has_bands(&self) -> bool {
        self.number_of_bands > 0
    }

    pub fn with_phase_files(mut self, phase1: impl Into<PathBuf>, phase2: Option<PathBuf>) -> Self {
        self.phase1_csv = Some(phase1.into());
        self.phase2_csv = phase2;
        self
    }

    pub fn with_sample(mut self, sample: SampleSpec) -> Self {
        self.sample = Some(sample);
        self
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Re-check every invariant.
    ///
    /// Deserialized configurations bypass `new`, so callers loading one from disk
    /// should validate it before use.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.box_size.is_finite() && self.box_size > 0.0) {
            return Err(AppError::configuration(format!(
                "Invalid box size {} (must be finite and > 0).",
                self.box_size
            )));
        }
        if self.n_pts == 0 || self.n_pts % 2 != 0 {
            return Err(AppError::configuration(format!(
                "Invalid n_pts {} (must be even and > 0).",
                self.n_pts
            )));
        }
        if !(self.shrink_factor.is_finite() && self.shrink_factor > 0.0 && self.shrink_factor <= 1.0) {
            return Err(AppError::configuration(format!(
                "Invalid shrink factor {} (must be in (0, 1]).",
                self.volumetric_shrink()
            )));
        }
        for (name, ratio) in [
            ("band_ratio_rsa", self.band_ratio_rsa),
            ("band_ratio_final", self.band_ratio_final),
        ] {
            if !(ratio.is_finite() && ratio > 0.0 && ratio <= 1.0) {
                return Err(AppError::configuration(format!(
                    "Invalid {name} {ratio} (must be in (0, 1])."
                )));
            }
        }
        if self.number_of_bands > 0 {
            if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
                return Err(AppError::configuration(format!(
                    "Invalid bandwidth {} (must be > 0 when bands are requested).",
                    self.bandwidth
                )));
            }
            let layers = band_layers(self.bandwidth, self.bin_size());
            let needed = layers.checked_mul(self.number_of_bands);
            if needed.is_none_or(|needed| needed > self.n_pts) {
                return Err(AppError::configuration(format!(
                    "{} bands of {} voxel layers do not fit into {} layers.",
                    self.number_of_bands, layers, self.n_pts
                )));
            }
        }
        Ok(())
    }
}

/// Whole voxel layers covered by a band of `bandwidth` (at least one).
pub fn band_layers(bandwidth: f64, bin_size: f64) -> usize {
    ((bandwidth / bin_size).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn shrink_factor_is_stored_as_cube_root() {
        for input in [0.1, 0.4, 0.5, 0.9, 1.0] {
            let config = RunConfiguration::new(100.0, 10, 0, 0.0, input, 0.95, 0.95).unwrap();
            assert!((config.shrink_factor() - input.cbrt()).abs() < 1e-12);
            assert!((config.volumetric_shrink() - input).abs() < 1e-12);
        }
    }

    #[test]
    fn odd_resolution_is_rejected() {
        let err = RunConfiguration::with_defaults(100.0, 11, 0, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn bands_require_bandwidth() {
        let err = RunConfiguration::with_defaults(100.0, 10, 2, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn too_many_bands_are_rejected() {
        // 3 bands of 4 layers each need 12 layers.
        let err = RunConfiguration::with_defaults(100.0, 10, 3, 40.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn invalid_shrink_is_rejected() {
        assert!(RunConfiguration::new(100.0, 10, 0, 0.0, 0.0, 0.95, 0.95).is_err());
        assert!(RunConfiguration::new(100.0, 10, 0, 0.0, 1.5, 0.95, 0.95).is_err());
    }

    #[test]
    fn derived_grid_spacing() {
        let config = RunConfiguration::with_defaults(100.0, 10, 0, 0.0).unwrap();
        assert!((config.bin_size() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn huge_bandwidth_is_rejected() {
        let err = RunConfiguration::with_defaults(100.0, 10, 2, 1e300).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(band_layers(1e300, 10.0), usize::MAX);
    }
}
