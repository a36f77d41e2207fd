//! Post-processing and terminal reporting.
//!
//! - volume-distribution diagnostics (`volume`) drawn as SVG charts (`plot`)
//! - the run summary printed by the binary (`format`)

use std::path::Path;

use crate::error::AppError;

pub mod format;
pub mod plot;
pub mod volume;

pub use format::*;
pub use plot::*;
pub use volume::*;

/// Diagnostics run after meshing, from the artifacts persisted in `store_path`.
pub trait PostProcessor {
    /// `dim_flag` selects how volumes become equivalent diameters (3: spheres, 2: circles).
    fn gen_plots(&self, store_path: &Path, dim_flag: u8) -> Result<(), AppError>;
}
