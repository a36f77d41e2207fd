//! Synthetic grain statistics.
//!
//! Used when no phase table is given: equivalent diameters are log-normal around
//! the median, aspect ratios normal around the mean. Each grain is a prolate
//! spheroid of the sampled equivalent volume, elongated along its local x axis.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal};

use crate::domain::{GrainRow, SampleSpec};
use crate::error::AppError;

const MIN_ASPECT: f64 = 1.0;

pub fn sample_grain_rows(spec: &SampleSpec, seed: u64) -> Result<Vec<GrainRow>, AppError> {
    if spec.grain_count == 0 {
        return Err(AppError::configuration("Sample grain count must be > 0."));
    }
    if !(spec.median_diameter.is_finite() && spec.median_diameter > 0.0) {
        return Err(AppError::configuration("Sample median diameter must be > 0."));
    }

    let diameters = LogNormal::new(spec.median_diameter.ln(), spec.sigma)
        .map_err(|e| AppError::configuration(format!("Diameter distribution error: {e}")))?;
    let aspects = Normal::new(spec.aspect_mean, spec.aspect_std)
        .map_err(|e| AppError::configuration(format!("Aspect distribution error: {e}")))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let rows = (0..spec.grain_count)
        .map(|_| {
            let r = diameters.sample(&mut rng) / 2.0;
            let aspect = aspects.sample(&mut rng).max(MIN_ASPECT);
            let alpha = rng.gen_range(0.0..180.0);
            spheroid(r, aspect, alpha)
        })
        .collect();
    Ok(rows)
}

/// Prolate spheroid with the volume of a sphere of radius `r`.
fn spheroid(r: f64, aspect: f64, alpha: f64) -> GrainRow {
    let a = r * aspect.powf(2.0 / 3.0);
    let bc = r * aspect.powf(-1.0 / 3.0);
    GrainRow {
        a,
        b: bc,
        c: bc,
        alpha,
        volume: None,
    }
}
