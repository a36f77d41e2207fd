//! Per-run output locations.
//!
//! Every run writes into its own `<root>/OutputData/<date>_<epoch>` directory.
//! The context is created once during initialization and handed to every stage
//! that persists artifacts; nothing here is global.

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::Span;

use crate::error::AppError;

pub const OUTPUT_DIR: &str = "OutputData";
pub const FIG_DIR: &str = "Figs";
pub const GEN_DIR: &str = "Generation_Data";

#[derive(Debug, Clone)]
pub struct RunContext {
    pub root_dir: PathBuf,
    pub store_path: PathBuf,
    pub fig_path: PathBuf,
    pub gen_path: PathBuf,
    span: Span,
}

impl RunContext {
    pub fn new(root_dir: &Path, date: NaiveDate, epoch: u64) -> Self {
        let store_path = store_path_for(root_dir, date, epoch);
        let span = tracing::info_span!("rve_run", epoch, date = %date);
        Self {
            root_dir: root_dir.to_path_buf(),
            fig_path: store_path.join(FIG_DIR),
            gen_path: store_path.join(GEN_DIR),
            store_path,
            span,
        }
    }

    /// Create the store, figure and generation-data directories.
    ///
    /// Existing directories are reused; their files are overwritten by the run.
    pub fn create_dirs(&self) -> Result<(), AppError> {
        for dir in [&self.store_path, &self.fig_path, &self.gen_path] {
            create_dir_all(dir)
                .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", dir.display())))?;
        }
        Ok(())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// `<root>/OutputData/<YYYY-MM-DD>_<epoch>`
pub fn store_path_for(root_dir: &Path, date: NaiveDate, epoch: u64) -> PathBuf {
    root_dir
        .join(OUTPUT_DIR)
        .join(format!("{}_{epoch}", date.format("%Y-%m-%d")))
}
