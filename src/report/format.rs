//! Formatted terminal output.

use crate::app::pipeline::RunOutput;
use crate::domain::{PHASE_ONE, PHASE_TWO, RunConfiguration};

/// Format the run summary printed after a successful run.
pub fn format_run_summary(output: &RunOutput, config: &RunConfiguration) -> String {
    let table = &output.stats.table;
    let mut out = String::new();

    out.push_str("=== rve-gen - Synthetic RVE Generation ===\n");
    out.push_str(&format!(
        "Box: {} | voxels: {n}x{n}x{n} | bin: {:.4}\n",
        config.box_size,
        config.bin_size(),
        n = config.n_pts
    ));
    out.push_str(&format!(
        "Shrink: {:.3} (linear {:.4}) | seed: {}\n",
        config.volumetric_shrink(),
        config.shrink_factor(),
        config.seed
    ));

    out.push_str(&format!(
        "Grains: n={} | phase 1: {} | phase 2: {} | in RVE: {}\n",
        table.len(),
        table.count_phase(PHASE_ONE),
        table.count_phase(PHASE_TWO),
        output.rve.grain_count(table)
    ));
    out.push_str(&format!(
        "Total input volume: {:.3} | recommended box size: {:.3}\n",
        output.stats.total_volume, output.stats.estimated_box_size
    ));

    match output.rve.band_grain_id {
        Some(id) => out.push_str(&format!(
            "Bands: {} x {} | band grain: {id} ({} voxels)\n",
            config.number_of_bands,
            config.bandwidth,
            output.rve.table.count_grain(id)
        )),
        None => out.push_str("Bands: none\n"),
    }

    let input: f64 = table.iter().map(|r| r.final_discrete_volume).sum();
    let generated: f64 = output
        .generated
        .iter()
        .filter(|g| Some(g.grain_id) != output.rve.band_grain_id)
        .map(|g| g.volume)
        .sum();
    out.push_str(&format!(
        "Grain volume: input (discrete) {input:.3} | generated {generated:.3}\n"
    ));

    let status = |ok: bool| if ok { "ok" } else { "FAILED (see log)" };
    out.push_str(&format!(
        "Mesh: {} | diagnostics: {}\n",
        status(output.meshed),
        status(output.diagnosed)
    ));
    out.push_str(&format!("Output: {}\n", output.store_path.display()));

    out
}
