//! Mesher seam and the default Abaqus voxel mesher.
//!
//! Every voxel becomes one 8-node hexahedron (C3D8) on the `(n + 1)³` node
//! lattice. Each grain gets an element set, a solid section and a material;
//! phase-2 grains may share one isotropic elastic material instead.
//!
//! ```text
//! *Node             id, x, y, z
//! *Element, C3D8    id, n1..n8   (bottom face then top face, counterclockwise)
//! *Elset            Set-Grain<g>
//! *Solid Section    Section-Grain<g> -> Material-Grain<g> | Material-Phase2
//! *Material         *User Material: grain ID, phase ID, alpha
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::domain::{GrainTable, PHASE_TWO};
use crate::error::AppError;
use crate::periodic::PeriodicRveTable;

pub const MESH_FILE: &str = "rve_voxel.inp";

const PHASE_TWO_MATERIAL: &str = "Material-Phase2";
/// Young's modulus (MPa) and Poisson ratio of the shared phase-2 material.
const PHASE_TWO_ELASTIC: (f64, f64) = (210_000.0, 0.3);
/// Abaqus data lines hold at most 16 entries.
const ENTRIES_PER_LINE: usize = 16;

pub trait Mesher {
    fn build_model(
        &self,
        rve: &PeriodicRveTable,
        grains: &GrainTable,
        store_path: &Path,
        phase_two_isotropic: bool,
    ) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbaqusVoxelMesher;

/// Section data of one grain present in the RVE.
#[derive(Debug, Clone, PartialEq)]
struct GrainSection {
    grain_id: i32,
    phase_id: u8,
    alpha: f64,
    elements: Vec<usize>,
}

impl Mesher for AbaqusVoxelMesher {
    fn build_model(
        &self,
        rve: &PeriodicRveTable,
        grains: &GrainTable,
        store_path: &Path,
        phase_two_isotropic: bool,
    ) -> Result<(), AppError> {
        if rve.len() != rve.geometry.voxel_count() {
            return Err(AppError::io("RVE table does not cover the grid."));
        }
        let sections = collect_sections(rve, grains);

        let path = store_path.join(MESH_FILE);
        let file =
            File::create(&path).map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        write_model(&mut writer, rve, &sections, phase_two_isotropic)
            .and_then(|()| writer.flush())
            .map_err(|e| AppError::io(format!("Failed to write '{}': {e}", path.display())))?;

        info!(
            elements = rve.len(),
            grains = sections.len(),
            path = %path.display(),
            "voxel mesh written"
        );
        Ok(())
    }
}

fn collect_sections(rve: &PeriodicRveTable, grains: &GrainTable) -> Vec<GrainSection> {
    let mut sections: Vec<GrainSection> = Vec::new();
    for (idx, voxel) in rve.voxels.iter().enumerate() {
        let element = idx + 1;
        match sections.binary_search_by_key(&voxel.grain_id, |s| s.grain_id) {
            Ok(pos) => sections[pos].elements.push(element),
            Err(pos) => {
                // The band grain has no record and no orientation.
                let alpha = u32::try_from(voxel.grain_id)
                    .ok()
                    .and_then(|g| grains.get(g))
                    .map_or(0.0, |r| r.alpha);
                sections.insert(
                    pos,
                    GrainSection {
                        grain_id: voxel.grain_id,
                        phase_id: voxel.phase_id,
                        alpha,
                        elements: vec![element],
                    },
                );
            }
        }
    }
    sections
}

fn write_model<W: Write>(
    w: &mut W,
    rve: &PeriodicRveTable,
    sections: &[GrainSection],
    phase_two_isotropic: bool,
) -> std::io::Result<()> {
    let n = rve.geometry.n_pts;
    let bin = rve.geometry.bin_size();
    let m = n + 1;
    let node = |i: usize, j: usize, k: usize| 1 + i + m * (j + m * k);

    writeln!(w, "*Heading")?;
    writeln!(w, "** Voxel RVE: {n}x{n}x{n} elements, box size {}", rve.geometry.box_size)?;
    writeln!(w, "*Part, name=RVE")?;

    writeln!(w, "*Node")?;
    for k in 0..m {
        for j in 0..m {
            for i in 0..m {
                writeln!(
                    w,
                    "{}, {:.6}, {:.6}, {:.6}",
                    node(i, j, k),
                    i as f64 * bin,
                    j as f64 * bin,
                    k as f64 * bin
                )?;
            }
        }
    }

    writeln!(w, "*Element, type=C3D8")?;
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let element = 1 + i + n * (j + n * k);
                writeln!(
                    w,
                    "{element}, {}, {}, {}, {}, {}, {}, {}, {}",
                    node(i, j, k),
                    node(i + 1, j, k),
                    node(i + 1, j + 1, k),
                    node(i, j + 1, k),
                    node(i, j, k + 1),
                    node(i + 1, j, k + 1),
                    node(i + 1, j + 1, k + 1),
                    node(i, j + 1, k + 1)
                )?;
            }
        }
    }

    for s in sections {
        writeln!(w, "*Elset, elset=Set-Grain{}", s.grain_id)?;
        for chunk in s.elements.chunks(ENTRIES_PER_LINE) {
            let line: Vec<String> = chunk.iter().map(usize::to_string).collect();
            writeln!(w, "{}", line.join(", "))?;
        }
    }

    for s in sections {
        writeln!(w, "** Section: Section-Grain{}", s.grain_id)?;
        writeln!(
            w,
            "*Solid Section, elset=Set-Grain{}, material={}",
            s.grain_id,
            material_name(s, phase_two_isotropic)
        )?;
        writeln!(w, ",")?;
    }
    writeln!(w, "*End Part")?;

    writeln!(w, "**")?;
    writeln!(w, "** MATERIALS")?;
    if phase_two_isotropic && sections.iter().any(|s| s.phase_id == PHASE_TWO) {
        writeln!(w, "*Material, name={PHASE_TWO_MATERIAL}")?;
        writeln!(w, "*Elastic")?;
        writeln!(w, "{:.1}, {}", PHASE_TWO_ELASTIC.0, PHASE_TWO_ELASTIC.1)?;
    }
    for s in sections {
        if phase_two_isotropic && s.phase_id == PHASE_TWO {
            continue;
        }
        writeln!(w, "*Material, name={}", material_name(s, phase_two_isotropic))?;
        writeln!(w, "*User Material, constants=3")?;
        writeln!(w, "{}., {}., {}", s.grain_id, s.phase_id, s.alpha)?;
    }
    Ok(())
}

fn material_name(section: &GrainSection, phase_two_isotropic: bool) -> String {
    if phase_two_isotropic && section.phase_id == PHASE_TWO {
        PHASE_TWO_MATERIAL.to_string()
    } else {
        format!("Material-Grain{}", section.grain_id)
    }
}
