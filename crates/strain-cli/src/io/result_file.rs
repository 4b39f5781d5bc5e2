use super::frame_file::{Rows, rows_from_matrix};
use crate::error::{CliError, Result};
use elastrain::core::lattice::{LatticeFamily, StructureType};
use elastrain::core::strain::StrainFrame;
use elastrain::engine::cluster_graph::ClusterId;
use elastrain::engine::config::ElasticStrainConfig;
use elastrain::engine::tasks::deformation_fit::FitFailure;
use elastrain::workflows::elastic_strain::{ElasticStrainResult, StrainStatistics};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const JSON_SUFFIX: &str = "_elastic_strain.json";
pub const CSV_SUFFIX: &str = "_elastic_strain.csv";

/// `<base><suffix>`, keeping any directory part of `base`.
pub fn output_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct LatticeSummary {
    family: LatticeFamily,
    lattice_constant: f64,
    ca_ratio: f64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct ClusterRecord {
    id: ClusterId,
    structure_type: StructureType,
    size: usize,
    orientation: Rows,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct TransitionRecord {
    cluster_a: ClusterId,
    cluster_b: ClusterId,
    disorientation_degrees: f64,
    disorientation_axis: Option<[f64; 3]>,
    rotation: Rows,
    bond_count: usize,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct AtomColumns {
    cluster: Vec<ClusterId>,
    branch: Vec<usize>,
    fit_failure: Vec<Option<FitFailure>>,
    volumetric_strain: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deformation_gradient: Option<Vec<Option<Rows>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strain_frame: Option<StrainFrame>,
    /// Voigt order `xx, yy, zz, yz, xz, xy`.
    #[serde(skip_serializing_if = "Option::is_none")]
    strain_tensor: Option<Vec<Option<[f64; 6]>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shear_strain: Option<Vec<Option<f64>>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct ResultDocument<'a> {
    lattice: LatticeSummary,
    coverage: f64,
    statistics: &'a StrainStatistics,
    clusters: Vec<ClusterRecord>,
    transitions: Vec<TransitionRecord>,
    atoms: AtomColumns,
}

impl<'a> ResultDocument<'a> {
    fn new(result: &'a ElasticStrainResult, config: &ElasticStrainConfig) -> Self {
        let graph = &result.cluster_graph;
        let strain_frame = config.output.strain_tensors.then_some(if config.output.push_forward {
            StrainFrame::Spatial
        } else {
            StrainFrame::Reference
        });

        Self {
            lattice: LatticeSummary {
                family: config.lattice.family,
                lattice_constant: config.lattice.lattice_constant,
                ca_ratio: config.lattice.ca_ratio,
            },
            coverage: result.statistics.coverage(),
            statistics: &result.statistics,
            clusters: graph
                .clusters()
                .iter()
                .map(|c| ClusterRecord {
                    id: c.id,
                    structure_type: c.structure_type,
                    size: c.size(),
                    orientation: rows_from_matrix(&c.orientation),
                })
                .collect(),
            transitions: graph
                .transitions()
                .iter()
                .map(|t| TransitionRecord {
                    cluster_a: t.cluster_a,
                    cluster_b: t.cluster_b,
                    disorientation_degrees: t.disorientation_degrees(),
                    disorientation_axis: t.disorientation_axis.map(|a| [a.x, a.y, a.z]),
                    rotation: rows_from_matrix(&t.rotation),
                    bond_count: t.bond_count,
                })
                .collect(),
            atoms: AtomColumns {
                cluster: result.atom_clusters.clone(),
                branch: result.atom_branches.clone(),
                fit_failure: result.fit_failures.clone(),
                volumetric_strain: result.volumetric_strains.clone(),
                deformation_gradient: result.deformation_gradients.as_ref().map(|fs| {
                    fs.iter()
                        .map(|f| f.as_ref().map(rows_from_matrix))
                        .collect()
                }),
                strain_frame,
                strain_tensor: result
                    .strain_tensors
                    .as_ref()
                    .map(|ts| ts.iter().map(|t| t.map(|t| t.voigt())).collect()),
                shear_strain: result
                    .strain_tensors
                    .as_ref()
                    .map(|ts| ts.iter().map(|t| t.map(|t| t.shear_invariant())).collect()),
            },
        }
    }
}

pub fn write_json(result: &ElasticStrainResult, config: &ElasticStrainConfig, path: &Path) -> Result<()> {
    debug!("Writing JSON result to {:?}", path);
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &ResultDocument::new(result, config)).map_err(|e| {
        CliError::FileWriting {
            path: path.to_path_buf(),
            source: e.into(),
        }
    })
}

/// One row of the per-atom table. Undefined values are written as empty cells.
#[derive(Serialize, Debug, Default)]
struct AtomRow {
    atom: usize,
    cluster: u32,
    status: &'static str,
    volumetric_strain: Option<f64>,
    f_xx: Option<f64>,
    f_xy: Option<f64>,
    f_xz: Option<f64>,
    f_yx: Option<f64>,
    f_yy: Option<f64>,
    f_yz: Option<f64>,
    f_zx: Option<f64>,
    f_zy: Option<f64>,
    f_zz: Option<f64>,
    strain_xx: Option<f64>,
    strain_yy: Option<f64>,
    strain_zz: Option<f64>,
    strain_yz: Option<f64>,
    strain_xz: Option<f64>,
    strain_xy: Option<f64>,
    shear_strain: Option<f64>,
}

fn atom_rows(result: &ElasticStrainResult) -> impl Iterator<Item = AtomRow> + '_ {
    (0..result.atom_clusters.len()).map(move |atom| {
        let mut row = AtomRow {
            atom,
            cluster: result.atom_clusters[atom].0,
            status: result.fit_failures[atom].map_or("fitted", |f| f.name()),
            volumetric_strain: result.volumetric_strains[atom],
            ..Default::default()
        };
        if let Some(f) = result
            .deformation_gradients
            .as_ref()
            .and_then(|fs| fs[atom])
        {
            let [[xx, xy, xz], [yx, yy, yz], [zx, zy, zz]] = rows_from_matrix(&f);
            row.f_xx = Some(xx);
            row.f_xy = Some(xy);
            row.f_xz = Some(xz);
            row.f_yx = Some(yx);
            row.f_yy = Some(yy);
            row.f_yz = Some(yz);
            row.f_zx = Some(zx);
            row.f_zy = Some(zy);
            row.f_zz = Some(zz);
        }
        if let Some(tensor) = result.strain_tensors.as_ref().and_then(|ts| ts[atom]) {
            let [xx, yy, zz, yz, xz, xy] = tensor.voigt();
            row.strain_xx = Some(xx);
            row.strain_yy = Some(yy);
            row.strain_zz = Some(zz);
            row.strain_yz = Some(yz);
            row.strain_xz = Some(xz);
            row.strain_xy = Some(xy);
            row.shear_strain = Some(tensor.shear_invariant());
        }
        row
    })
}

pub fn write_csv(result: &ElasticStrainResult, path: &Path) -> Result<()> {
    debug!("Writing per-atom table to {:?}", path);
    let to_file_error = |e: csv::Error| CliError::FileWriting {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_file_error)?;
    for row in atom_rows(result) {
        writer.serialize(row).map_err(to_file_error)?;
    }
    writer.flush()?;
    Ok(())
}
