//! The generation pipeline.
//!
//! Drives every stage of one run in order:
//! statistics -> bands -> packing -> tessellation -> periodicity repair ->
//! identity reconciliation -> meshing -> diagnostics
//!
//! Engines sit behind traits so tests (and library callers) can swap them. Only
//! the pipeline decides to stop: an engine reporting `success = false` ends the
//! run with an error and no later stage executes. Meshing and diagnostics
//! failures are logged and the run still completes.

use std::path::PathBuf;

use chrono::Local;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use crate::band::generate_bands;
use crate::domain::{GrainRow, PHASE_TWO, RunConfiguration, RunContext};
use crate::error::AppError;
use crate::geometry::GridGeometry;
use crate::io::{
    GeneratedVolume, RunManifest, read_grain_rows, write_generated_volumes, write_grain_data, write_manifest,
    write_rve_table,
};
use crate::mesh::{AbaqusVoxelMesher, Mesher};
use crate::packing::{DiscreteRsa, Packer, PackingRequest};
use crate::periodic::{PeriodicRveTable, repair_periodicity};
use crate::reconcile::{ReconciledRve, reconcile_identities};
use crate::report::{PostProcessor, VolumeDistribution};
use crate::stats::{GrainStatistics, build_grain_table, sample_grain_rows};
use crate::tessellation::{DiscreteTessellation, TessellationRequest, Tessellator};

/// Diagnostics compare grains as spheres.
const DIAGNOSTICS_DIM: u8 = 3;

/// Pipeline states, recorded in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    StatsProcessed,
    Banded,
    Packed,
    AbortedPackFail,
    Tessellated,
    AbortedTessellationFail,
    Repaired,
    Reconciled,
    Meshed,
    Diagnosed,
}

pub struct Engines {
    pub packer: Box<dyn Packer>,
    pub tessellator: Box<dyn Tessellator>,
    pub mesher: Box<dyn Mesher>,
    pub post_processor: Box<dyn PostProcessor>,
}

impl Engines {
    pub fn defaults(config: &RunConfiguration) -> Self {
        Self {
            packer: Box::new(DiscreteRsa::new(config.seed)),
            tessellator: Box::new(DiscreteTessellation::default()),
            mesher: Box::new(AbaqusVoxelMesher),
            post_processor: Box::new(VolumeDistribution),
        }
    }
}

/// Result of initialization: the run's output locations and its grain table.
#[derive(Debug, Clone)]
pub struct Initialized {
    pub context: RunContext,
    pub stats: GrainStatistics,
}

/// All computed outputs of one generation run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub store_path: PathBuf,
    /// Grain table with seeds assigned.
    pub stats: GrainStatistics,
    pub rve: ReconciledRve,
    pub generated: Vec<GeneratedVolume>,
    pub meshed: bool,
    pub diagnosed: bool,
}

pub struct Pipeline {
    config: RunConfiguration,
    geometry: GridGeometry,
    engines: Engines,
    trace: Vec<Stage>,
}

impl Pipeline {
    pub fn new(config: RunConfiguration, engines: Engines) -> Result<Self, AppError> {
        config.validate()?;
        let geometry = GridGeometry::from_config(&config)?;
        Ok(Self {
            config,
            geometry,
            engines,
            trace: Vec::new(),
        })
    }

    pub fn with_default_engines(config: RunConfiguration) -> Result<Self, AppError> {
        let engines = Engines::defaults(&config);
        Self::new(config, engines)
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    /// Initialize and generate in one go.
    pub fn run(&mut self) -> Result<RunOutput, AppError> {
        let init = self.initialize()?;
        self.generate(init)
    }

    /// Load grain statistics, create the run directories and persist the
    /// grain tables and manifest.
    pub fn initialize(&mut self) -> Result<Initialized, AppError> {
        self.trace.push(Stage::Init);

        let date = Local::now().date_naive();
        let context = RunContext::new(&self.config.root_dir, date, self.config.epoch);
        let _span = context.span().clone().entered();

        let (phase1, phase2) = self.load_rows()?;
        let stats = build_grain_table(phase1, phase2, self.config.shrink_factor(), &self.geometry)?;

        context.create_dirs()?;
        write_grain_data(&context.gen_path, &stats.table)?;
        write_manifest(
            &context.store_path,
            &RunManifest {
                tool: env!("CARGO_PKG_NAME").to_string(),
                date,
                epoch: self.config.epoch,
                grain_count: stats.table.len(),
                phase_two_grains: stats.table.count_phase(PHASE_TWO),
                total_volume: stats.total_volume,
                estimated_box_size: stats.estimated_box_size,
                config: self.config.clone(),
            },
        )?;

        info!(store_path = %context.store_path.display(), "run initialized");
        self.trace.push(Stage::StatsProcessed);
        Ok(Initialized { context, stats })
    }

    /// Run every stage after initialization.
    pub fn generate(&mut self, init: Initialized) -> Result<RunOutput, AppError> {
        let Initialized { context, mut stats } = init;
        let _span = context.span().clone().entered();
        let config = &self.config;
        let geometry = &self.geometry;
        let animation_dir = config.animation.then_some(context.fig_path.as_path());

        let mut rng = StdRng::seed_from_u64(config.seed);
        let bands = if config.has_bands() {
            let field = generate_bands(geometry, config.number_of_bands, config.bandwidth, &mut rng)?;
            self.trace.push(Stage::Banded);
            Some(field)
        } else {
            None
        };

        let axes = stats.table.packing_axes();
        let packed = self.engines.packer.pack(&PackingRequest {
            geometry,
            grains: &axes,
            bands: bands.as_ref(),
            band_ratio: config.band_ratio_rsa,
            animation_dir,
        })?;
        if !packed.success {
            self.trace.push(Stage::AbortedPackFail);
            error!("Packing failed: not every grain could be placed. Try a larger box or a smaller shrink factor.");
            return Err(AppError::packing("Packing failed: not every grain could be placed."));
        }
        stats.table.assign_seeds(&packed.seeds)?;
        self.trace.push(Stage::Packed);

        let tessellated = self.engines.tessellator.tessellate(&TessellationRequest {
            geometry,
            packed: &packed.grid,
            grains: &stats.table,
            shrink_factor: config.shrink_factor(),
            band_ratio_final: config.band_ratio_final,
            animation_dir,
        })?;
        if !tessellated.success {
            self.trace.push(Stage::AbortedTessellationFail);
            error!("Tessellation failed: the grid could not be filled.");
            return Err(AppError::tessellation("Tessellation failed: the grid could not be filled."));
        }
        self.trace.push(Stage::Tessellated);

        let repaired = repair_periodicity(&tessellated.grid, geometry)?;
        self.trace.push(Stage::Repaired);

        let rve = reconcile_identities(repaired, &stats.table, config.number_of_bands)?;
        self.trace.push(Stage::Reconciled);

        let generated = generated_volumes(&rve.table);
        write_generated_volumes(&context.gen_path, &generated)?;
        if config.debug {
            write_rve_table(&context.gen_path, &rve.table)?;
        }

        let meshed = match self.engines.mesher.build_model(
            &rve.table,
            &stats.table,
            &context.store_path,
            config.phase_two_isotropic,
        ) {
            Ok(()) => {
                self.trace.push(Stage::Meshed);
                true
            }
            Err(e) => {
                error!(error = %e, "meshing failed; continuing with diagnostics");
                false
            }
        };

        let diagnosed = match self
            .engines
            .post_processor
            .gen_plots(&context.store_path, DIAGNOSTICS_DIM)
        {
            Ok(()) => {
                self.trace.push(Stage::Diagnosed);
                true
            }
            Err(e) => {
                warn!(error = %e, "diagnostics failed");
                false
            }
        };

        info!(store_path = %context.store_path.display(), "run finished");
        Ok(RunOutput {
            store_path: context.store_path.clone(),
            stats,
            rve,
            generated,
            meshed,
            diagnosed,
        })
    }

    fn load_rows(&self) -> Result<(Vec<GrainRow>, Option<Vec<GrainRow>>), AppError> {
        let phase1 = match (&self.config.phase1_csv, &self.config.sample) {
            (Some(path), _) => read_grain_rows(path)?,
            (None, Some(spec)) => {
                info!(grains = spec.grain_count, "sampling synthetic grain statistics");
                sample_grain_rows(spec, self.config.seed)?
            }
            (None, None) => {
                return Err(AppError::configuration(
                    "No grain statistics configured: set a phase-1 table or a sample.",
                ));
            }
        };
        let phase2 = self.config.phase2_csv.as_deref().map(read_grain_rows).transpose()?;
        Ok((phase1, phase2))
    }
}

/// Voxel count and volume per grain of the reconciled table.
pub fn generated_volumes(table: &PeriodicRveTable) -> Vec<GeneratedVolume> {
    let voxel_volume = table.geometry.voxel_volume();
    table
        .grain_voxel_counts()
        .into_iter()
        .map(|(grain_id, voxels)| GeneratedVolume {
            grain_id,
            voxels,
            volume: voxels as f64 * voxel_volume,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::rc::Rc;

    use super::*;
    use crate::domain::{BAND_SENTINEL, GrainTable, PHASE_ONE, SampleSpec};
    use crate::error::ErrorKind;
    use crate::io::{GENERATED_VOLUME_FILE, MANIFEST_FILE, RVE_TABLE_FILE, read_manifest};
    use crate::mesh::MESH_FILE;
    use crate::packing::PackingOutcome;
    use crate::report::DISTRIBUTION_TABLE_FILE;
    use crate::tessellation::TessellationOutcome;

    struct FailingPacker;

    impl Packer for FailingPacker {
        fn pack(&self, request: &PackingRequest<'_>) -> Result<PackingOutcome, AppError> {
            Ok(PackingOutcome {
                grid: crate::geometry::VoxelGrid::new(request.geometry.n_pts),
                seeds: Vec::new(),
                success: false,
            })
        }
    }

    struct FailingTessellator;

    impl Tessellator for FailingTessellator {
        fn tessellate(&self, request: &TessellationRequest<'_>) -> Result<TessellationOutcome, AppError> {
            Ok(TessellationOutcome {
                grid: request.packed.clone(),
                success: false,
            })
        }
    }

    struct CountingTessellator(Rc<Cell<usize>>);

    impl Tessellator for CountingTessellator {
        fn tessellate(&self, request: &TessellationRequest<'_>) -> Result<TessellationOutcome, AppError> {
            self.0.set(self.0.get() + 1);
            DiscreteTessellation::default().tessellate(request)
        }
    }

    struct CountingMesher {
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl Mesher for CountingMesher {
        fn build_model(
            &self,
            _rve: &PeriodicRveTable,
            _grains: &GrainTable,
            _store_path: &Path,
            _phase_two_isotropic: bool,
        ) -> Result<(), AppError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(AppError::io("mesher unavailable"))
            } else {
                Ok(())
            }
        }
    }

    struct CountingPostProcessor(Rc<Cell<usize>>);

    impl PostProcessor for CountingPostProcessor {
        fn gen_plots(&self, _store_path: &Path, _dim_flag: u8) -> Result<(), AppError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    struct Counters {
        tessellate: Rc<Cell<usize>>,
        mesh: Rc<Cell<usize>>,
        post: Rc<Cell<usize>>,
    }

    fn counting_engines(packer: Box<dyn Packer>, tessellator_fails: bool, mesher_fails: bool) -> (Engines, Counters) {
        let counters = Counters {
            tessellate: Rc::new(Cell::new(0)),
            mesh: Rc::new(Cell::new(0)),
            post: Rc::new(Cell::new(0)),
        };
        let tessellator: Box<dyn Tessellator> = if tessellator_fails {
            Box::new(FailingTessellator)
        } else {
            Box::new(CountingTessellator(counters.tessellate.clone()))
        };
        let engines = Engines {
            packer,
            tessellator,
            mesher: Box::new(CountingMesher {
                calls: counters.mesh.clone(),
                fail: mesher_fails,
            }),
            post_processor: Box::new(CountingPostProcessor(counters.post.clone())),
        };
        (engines, counters)
    }

    /// Scenario config: box 100, 10³ voxels, five spheres of radius 5.
    fn config(root: &Path, bands: usize) -> RunConfiguration {
        let csv = root.join("phase1.csv");
        let mut text = String::from("a,b,c,alpha\n");
        for _ in 0..5 {
            text.push_str("5,5,5,0\n");
        }
        std::fs::write(&csv, text).unwrap();

        let bandwidth = if bands > 0 { 10.0 } else { 0.0 };
        RunConfiguration::with_defaults(100.0, 10, bands, bandwidth)
            .unwrap()
            .with_phase_files(csv, None)
            .with_root_dir(root)
            .with_epoch(1_700_000_000)
    }

    #[test]
    fn single_phase_run() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::with_default_engines(config(tmp.path(), 0)).unwrap();
        let out = pipeline.run().unwrap();

        assert_eq!(out.stats.table.len(), 5);
        assert!(out.stats.table.iter().all(|r| r.phase_id == PHASE_ONE));
        assert!(out.stats.table.seeds_complete());

        let ids: BTreeSet<i32> = out.rve.table.voxels.iter().map(|v| v.grain_id).collect();
        assert_eq!(ids, (1..=5).collect());
        assert!(out.rve.table.voxels.iter().all(|v| v.phase_id == PHASE_ONE));
        assert_eq!(out.rve.table.len(), 1000);
        assert_eq!(out.rve.band_grain_id, None);

        assert!(out.meshed && out.diagnosed);
        assert_eq!(
            pipeline.trace(),
            &[
                Stage::Init,
                Stage::StatsProcessed,
                Stage::Packed,
                Stage::Tessellated,
                Stage::Repaired,
                Stage::Reconciled,
                Stage::Meshed,
                Stage::Diagnosed
            ]
        );

        let gen_path = out.store_path.join(crate::domain::GEN_DIR);
        assert!(gen_path.join(GENERATED_VOLUME_FILE).exists());
        assert!(!gen_path.join(RVE_TABLE_FILE).exists());
        assert!(out.store_path.join(MESH_FILE).exists());
        assert!(out.store_path.join(crate::domain::FIG_DIR).join(DISTRIBUTION_TABLE_FILE).exists());
        assert_eq!(read_manifest(&out.store_path).unwrap().grain_count, 5);
        assert!(out.store_path.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn banded_run_adds_trailing_phase_two_grain() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::with_default_engines(config(tmp.path(), 2)).unwrap();
        let out = pipeline.run().unwrap();

        assert_eq!(out.rve.band_grain_id, Some(6));
        assert_eq!(out.rve.table.count_grain(BAND_SENTINEL), 0);
        assert_eq!(out.rve.table.count_grain(6), 200);
        for v in &out.rve.table.voxels {
            let expected = if v.grain_id == 6 {
                PHASE_TWO
            } else {
                out.stats.table.get(v.grain_id as u32).unwrap().phase_id
            };
            assert_eq!(v.phase_id, expected);
        }
        assert!(pipeline.trace().contains(&Stage::Banded));
        assert_eq!(out.generated.last().map(|g| (g.grain_id, g.voxels)), Some((6, 200)));
    }

    #[test]
    fn packing_failure_stops_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let (engines, counters) = counting_engines(Box::new(FailingPacker), false, false);
        let mut pipeline = Pipeline::new(config(tmp.path(), 0), engines).unwrap();

        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Packing);
        assert_eq!(err.exit_code(), 3);
        assert_eq!(counters.tessellate.get(), 0);
        assert_eq!(counters.mesh.get(), 0);
        assert_eq!(counters.post.get(), 0);
        assert_eq!(pipeline.trace().last(), Some(&Stage::AbortedPackFail));
    }

    #[test]
    fn tessellation_failure_stops_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path(), 0);
        let (engines, counters) = counting_engines(Box::new(DiscreteRsa::new(cfg.seed)), true, false);
        let mut pipeline = Pipeline::new(cfg, engines).unwrap();

        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Tessellation);
        assert_eq!(counters.mesh.get(), 0);
        assert_eq!(counters.post.get(), 0);
        assert_eq!(pipeline.trace().last(), Some(&Stage::AbortedTessellationFail));
        assert!(!pipeline.trace().contains(&Stage::Repaired));
    }

    #[test]
    fn mesher_failure_still_runs_diagnostics() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path(), 0);
        let (engines, counters) = counting_engines(Box::new(DiscreteRsa::new(cfg.seed)), false, true);
        let mut pipeline = Pipeline::new(cfg, engines).unwrap();

        let out = pipeline.run().unwrap();
        assert!(!out.meshed);
        assert!(out.diagnosed);
        assert_eq!(counters.tessellate.get(), 1);
        assert_eq!(counters.mesh.get(), 1);
        assert_eq!(counters.post.get(), 1);
        assert!(!pipeline.trace().contains(&Stage::Meshed));
    }

    #[test]
    fn odd_resolution_is_rejected_before_any_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RunConfiguration::with_defaults(100.0, 11, 0, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let mut cfg = config(tmp.path(), 0);
        cfg.n_pts = 11;
        let err = Pipeline::with_default_engines(cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!tmp.path().join(crate::domain::OUTPUT_DIR).exists());
    }

    #[test]
    fn debug_run_writes_voxel_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path(), 0);
        cfg.debug = true;
        let out = Pipeline::with_default_engines(cfg).unwrap().run().unwrap();
        let text = std::fs::read_to_string(out.store_path.join(crate::domain::GEN_DIR).join(RVE_TABLE_FILE)).unwrap();
        assert_eq!(text.lines().next(), Some("x,y,z,GrainID,phaseID"));
        assert_eq!(text.lines().count(), 1001);
    }

    #[test]
    fn sampled_statistics_run() {
        let tmp = tempfile::tempdir().unwrap();
        let sample = SampleSpec {
            grain_count: 6,
            median_diameter: 12.0,
            ..SampleSpec::default()
        };
        let cfg = RunConfiguration::with_defaults(100.0, 10, 0, 0.0)
            .unwrap()
            .with_sample(sample)
            .with_root_dir(tmp.path())
            .with_epoch(7);
        let out = Pipeline::with_default_engines(cfg).unwrap().run().unwrap();
        assert_eq!(out.stats.table.len(), 6);
        assert_eq!(out.rve.table.grain_voxel_counts().len(), 6);
    }

    #[test]
    fn missing_input_is_a_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = RunConfiguration::with_defaults(100.0, 10, 0, 0.0)
            .unwrap()
            .with_root_dir(tmp.path());
        let mut pipeline = Pipeline::with_default_engines(cfg).unwrap();
        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(pipeline.trace(), &[Stage::Init]);
        assert!(!tmp.path().join(crate::domain::OUTPUT_DIR).exists());
    }

    #[test]
    fn malformed_grain_table_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let csv = tmp.path().join("phase1.csv");
        std::fs::write(&csv, "a,b,c,alpha\n5,5,oops,0\n").unwrap();
        let cfg = RunConfiguration::with_defaults(100.0, 10, 0, 0.0)
            .unwrap()
            .with_phase_files(&csv, None)
            .with_root_dir(tmp.path());

        let mut pipeline = Pipeline::with_default_engines(cfg).unwrap();
        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("Line 2"));
        assert_eq!(pipeline.trace(), &[Stage::Init]);
        assert!(!tmp.path().join(crate::domain::OUTPUT_DIR).exists());
    }
}
