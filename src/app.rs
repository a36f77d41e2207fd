//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - reads the run configuration from the environment (`.env` supported)
//! - installs logging
//! - runs the generation pipeline
//! - prints the run summary and the store path

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Local;

use crate::domain::{
    DEFAULT_BAND_RATIO_FINAL, DEFAULT_BAND_RATIO_RSA, DEFAULT_SEED, DEFAULT_SHRINK_FACTOR, RunConfiguration,
    SampleSpec,
};
use crate::error::AppError;

pub mod logging;
pub mod pipeline;

/// Entry point for the `rve-gen` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let config = config_from_env()?;

    let log_path = logging::init_logging(&config.root_dir, Local::now().date_naive(), config.debug)?;
    tracing::debug!(log = %log_path.display(), "logging initialized");

    let mut pipeline = pipeline::Pipeline::with_default_engines(config)?;
    let output = pipeline.run()?;

    println!("{}", crate::report::format_run_summary(&output, pipeline.config()));
    println!("{}", output.store_path.display());
    Ok(())
}

/// Build the run configuration from `RVE_*` environment variables.
pub fn config_from_env() -> Result<RunConfiguration, AppError> {
    config_from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`config_from_env`] with an injectable variable source.
pub fn config_from_lookup<F>(lookup: F) -> Result<RunConfiguration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let required = |key: &str| -> Result<String, AppError> {
        get(key).ok_or_else(|| AppError::configuration(format!("Missing {key} in environment (.env).")))
    };

    let box_size: f64 = parse_value("RVE_BOX_SIZE", &required("RVE_BOX_SIZE")?)?;
    let n_pts: usize = parse_value("RVE_N_PTS", &required("RVE_N_PTS")?)?;
    let number_of_bands: usize = parse_or("RVE_NUMBER_OF_BANDS", get("RVE_NUMBER_OF_BANDS"), 0)?;
    let bandwidth: f64 = parse_or("RVE_BANDWIDTH", get("RVE_BANDWIDTH"), 0.0)?;
    let shrink: f64 = parse_or("RVE_SHRINK_FACTOR", get("RVE_SHRINK_FACTOR"), DEFAULT_SHRINK_FACTOR)?;
    let ratio_rsa: f64 = parse_or("RVE_BAND_RATIO_RSA", get("RVE_BAND_RATIO_RSA"), DEFAULT_BAND_RATIO_RSA)?;
    let ratio_final: f64 = parse_or("RVE_BAND_RATIO_FINAL", get("RVE_BAND_RATIO_FINAL"), DEFAULT_BAND_RATIO_FINAL)?;

    let mut config =
        RunConfiguration::new(box_size, n_pts, number_of_bands, bandwidth, shrink, ratio_rsa, ratio_final)?;

    config.phase1_csv = get("RVE_PHASE1_CSV").map(PathBuf::from);
    config.phase2_csv = get("RVE_PHASE2_CSV").map(PathBuf::from);
    if config.phase1_csv.is_none() {
        let defaults = SampleSpec::default();
        config.sample = Some(SampleSpec {
            grain_count: parse_or("RVE_SAMPLE_GRAINS", get("RVE_SAMPLE_GRAINS"), defaults.grain_count)?,
            median_diameter: parse_or("RVE_SAMPLE_DIAMETER", get("RVE_SAMPLE_DIAMETER"), defaults.median_diameter)?,
            sigma: parse_or("RVE_SAMPLE_SIGMA", get("RVE_SAMPLE_SIGMA"), defaults.sigma)?,
            ..defaults
        });
    }

    config.root_dir = get("RVE_ROOT_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from);
    config.epoch = match get("RVE_EPOCH") {
        Some(v) => parse_value("RVE_EPOCH", &v)?,
        None => unix_now(),
    };
    config.seed = parse_or("RVE_SEED", get("RVE_SEED"), DEFAULT_SEED)?;
    config.phase_two_isotropic = parse_flag("RVE_PHASE_TWO_ISOTROPIC", get("RVE_PHASE_TWO_ISOTROPIC"), true)?;
    config.animation = parse_flag("RVE_ANIMATION", get("RVE_ANIMATION"), false)?;
    config.debug = parse_flag("RVE_DEBUG", get("RVE_DEBUG"), false)?;

    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::configuration(format!("Invalid value for {key}: '{raw}'.")))
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError> {
    raw.map_or(Ok(default), |v| parse_value(key, &v))
}

fn parse_flag(key: &str, raw: Option<String>, default: bool) -> Result<bool, AppError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(AppError::configuration(format!("Invalid flag for {key}: '{other}'."))),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ErrorKind;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = config_from_lookup(lookup(&[
            ("RVE_BOX_SIZE", "100"),
            ("RVE_N_PTS", "10"),
            ("RVE_EPOCH", "12"),
        ]))
        .unwrap();

        assert_eq!(config.n_pts, 10);
        assert_eq!(config.epoch, 12);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert!((config.volumetric_shrink() - DEFAULT_SHRINK_FACTOR).abs() < 1e-12);
        assert!(config.phase_two_isotropic);
        assert!(!config.debug);
        assert_eq!(config.sample, Some(SampleSpec::default()));
    }

    #[test]
    fn phase_file_disables_sampling() {
        let config = config_from_lookup(lookup(&[
            ("RVE_BOX_SIZE", "100"),
            ("RVE_N_PTS", "10"),
            ("RVE_PHASE1_CSV", "grains.csv"),
            ("RVE_DEBUG", "TRUE"),
            ("RVE_NUMBER_OF_BANDS", "1"),
            ("RVE_BANDWIDTH", "20"),
        ]))
        .unwrap();

        assert_eq!(config.phase1_csv, Some(PathBuf::from("grains.csv")));
        assert_eq!(config.sample, None);
        assert!(config.debug);
        assert_eq!(config.number_of_bands, 1);
    }

    #[test]
    fn missing_required_value() {
        let err = config_from_lookup(lookup(&[("RVE_BOX_SIZE", "100")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("RVE_N_PTS"));
    }

    #[test]
    fn odd_resolution_from_environment() {
        let err = config_from_lookup(lookup(&[("RVE_BOX_SIZE", "100"), ("RVE_N_PTS", "11")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let bad_number = lookup(&[("RVE_BOX_SIZE", "abc"), ("RVE_N_PTS", "10")]);
        assert!(config_from_lookup(bad_number).is_err());
        let bad_flag = lookup(&[("RVE_BOX_SIZE", "100"), ("RVE_N_PTS", "10"), ("RVE_ANIMATION", "maybe")]);
        assert!(config_from_lookup(bad_flag).is_err());
    }
}
