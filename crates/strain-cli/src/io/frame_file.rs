//! JSON representation of an identified frame.
//!
//! Per-atom data is stored column-wise. Matrices are written as three rows;
//! the cell is given by its three cell vectors.

use crate::error::{CliError, Result};
use elastrain::core::lattice::StructureType;
use elastrain::core::models::cell::SimulationCell;
use elastrain::core::models::frame::{Frame, NeighborMatch};
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

pub type Rows = [[f64; 3]; 3];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CellRecord {
    pub vectors: Rows,
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default = "all_periodic")]
    pub pbc: [bool; 3],
}

fn all_periodic() -> [bool; 3] {
    [true; 3]
}

fn default_valid() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NeighborRecord {
    pub neighbor: usize,
    pub slot: usize,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FrameFile {
    pub cell: CellRecord,
    pub positions: Vec<[f64; 3]>,
    pub structure_types: Vec<StructureType>,
    pub orientations: Vec<Rows>,
    pub neighbors: Vec<Vec<NeighborRecord>>,
}

pub fn matrix_from_rows(rows: &Rows) -> Matrix3<f64> {
    Matrix3::from_fn(|r, c| rows[r][c])
}

pub fn rows_from_matrix(m: &Matrix3<f64>) -> Rows {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

impl FrameFile {
    pub fn from_frame(frame: &Frame) -> Self {
        let cell = frame.cell();
        let m = cell.matrix();
        let column = |i: usize| [m[(0, i)], m[(1, i)], m[(2, i)]];
        let atoms = frame.atoms();

        Self {
            cell: CellRecord {
                vectors: [column(0), column(1), column(2)],
                origin: [cell.origin().x, cell.origin().y, cell.origin().z],
                pbc: cell.pbc(),
            },
            positions: atoms
                .iter()
                .map(|a| [a.position.x, a.position.y, a.position.z])
                .collect(),
            structure_types: atoms.iter().map(|a| a.structure_type).collect(),
            orientations: atoms.iter().map(|a| rows_from_matrix(&a.orientation)).collect(),
            neighbors: atoms
                .iter()
                .map(|a| {
                    a.neighbors
                        .iter()
                        .map(|m| NeighborRecord {
                            neighbor: m.neighbor,
                            slot: m.slot,
                            valid: m.valid,
                        })
                        .collect()
                })
                .collect(),
        }
    }

    pub fn into_frame(self) -> Result<Frame> {
        let [a, b, c] = self.cell.vectors;
        let matrix = Matrix3::from_columns(&[
            Vector3::from(a),
            Vector3::from(b),
            Vector3::from(c),
        ]);
        let cell = SimulationCell::new(matrix, Point3::from(self.cell.origin), self.cell.pbc)?;

        let neighbors = self
            .neighbors
            .into_iter()
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|e| NeighborMatch {
                        neighbor: e.neighbor,
                        slot: e.slot,
                        valid: e.valid,
                    })
                    .collect()
            })
            .collect();

        Ok(Frame::from_columns(
            cell,
            self.positions.into_iter().map(Point3::from).collect(),
            self.structure_types,
            self.orientations.iter().map(matrix_from_rows).collect(),
            neighbors,
        )?)
    }
}

pub fn read_frame(path: &Path) -> Result<Frame> {
    debug!("Reading frame from {:?}", path);
    let reader = BufReader::new(File::open(path)?);
    let file: FrameFile = serde_json::from_reader(reader).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    file.into_frame()
}

pub fn write_frame(frame: &Frame, path: &Path) -> Result<()> {
    debug!("Writing frame with {} atoms to {:?}", frame.len(), path);
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &FrameFile::from_frame(frame)).map_err(|e| {
        CliError::FileWriting {
            path: path.to_path_buf(),
            source: e.into(),
        }
    })
}
