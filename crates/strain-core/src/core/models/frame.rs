use super::cell::SimulationCell;
use crate::core::lattice::StructureType;
use crate::core::utils::geometry::is_proper_rotation;
use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("Frame contains no atoms")]
    Empty,
    #[error("Simulation cell contains non-finite values")]
    NonFiniteCell,
    #[error("Simulation cell is singular (volume {volume:e})")]
    SingularCell { volume: f64 },
    #[error("Atom {atom} has a non-finite position")]
    NonFinitePosition { atom: usize },
    #[error("Atom {atom} is assigned a lattice structure but its orientation is not a proper rotation")]
    InvalidOrientation { atom: usize },
    #[error("Per-atom column '{field}' has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

/// One entry of an atom's neighbor correspondence: neighbor `neighbor` sits
/// at reference template slot `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NeighborMatch {
    pub neighbor: usize,
    pub slot: usize,
    pub valid: bool,
}

impl NeighborMatch {
    pub fn new(neighbor: usize, slot: usize) -> Self {
        Self {
            neighbor,
            slot,
            valid: true,
        }
    }

    pub fn invalid(neighbor: usize, slot: usize) -> Self {
        Self {
            neighbor,
            slot,
            valid: false,
        }
    }
}

/// Per-atom output of structure identification together with the atom position.
///
/// `orientation` maps template vectors into the lab frame; it is only
/// meaningful for crystalline atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub position: Point3<f64>,
    pub structure_type: StructureType,
    pub orientation: Matrix3<f64>,
    pub neighbors: Vec<NeighborMatch>,
}

impl AtomRecord {
    pub fn new(
        position: Point3<f64>,
        structure_type: StructureType,
        orientation: Matrix3<f64>,
        neighbors: Vec<NeighborMatch>,
    ) -> Self {
        Self {
            position,
            structure_type,
            orientation,
            neighbors,
        }
    }

    /// An atom structure identification could not classify.
    pub fn unassigned(position: Point3<f64>) -> Self {
        Self::new(
            position,
            StructureType::Other,
            Matrix3::identity(),
            Vec::new(),
        )
    }
}

/// A single simulation snapshot after structure identification.
#[derive(Debug, Clone)]
pub struct Frame {
    cell: SimulationCell,
    atoms: Vec<AtomRecord>,
}

impl Frame {
    pub fn new(cell: SimulationCell, atoms: Vec<AtomRecord>) -> Self {
        Self { cell, atoms }
    }

    /// Assembles a frame from parallel per-atom columns, the layout in which
    /// identification results are usually stored as per-atom properties.
    pub fn from_columns(
        cell: SimulationCell,
        positions: Vec<Point3<f64>>,
        structure_types: Vec<StructureType>,
        orientations: Vec<Matrix3<f64>>,
        neighbors: Vec<Vec<NeighborMatch>>,
    ) -> Result<Self, FrameError> {
        let expected = positions.len();
        let check = |field: &'static str, found: usize| {
            if found == expected {
                Ok(())
            } else {
                Err(FrameError::LengthMismatch {
                    field,
                    expected,
                    found,
                })
            }
        };
        check("structure_types", structure_types.len())?;
        check("orientations", orientations.len())?;
        check("neighbors", neighbors.len())?;

        let atoms = positions
            .into_iter()
            .zip(structure_types)
            .zip(orientations)
            .zip(neighbors)
            .map(|(((position, structure_type), orientation), neighbors)| {
                AtomRecord::new(position, structure_type, orientation, neighbors)
            })
            .collect();
        Ok(Self { cell, atoms })
    }

    pub fn cell(&self) -> &SimulationCell {
        &self.cell
    }

    pub fn atoms(&self) -> &[AtomRecord] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&AtomRecord> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut AtomRecord> {
        self.atoms.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Appends `atoms`, shifting their neighbor indices past the atoms already
    /// present so that self-contained neighbor lists stay self-contained.
    pub fn append(&mut self, atoms: Vec<AtomRecord>) {
        let offset = self.atoms.len();
        self.atoms.extend(atoms.into_iter().map(|mut atom| {
            for entry in &mut atom.neighbors {
                entry.neighbor += offset;
            }
            atom
        }));
    }

    /// Bond vector from `atom` to `neighbor`, folded to the periodic image
    /// closest to `expected`.
    pub fn bond_vector(&self, atom: usize, neighbor: usize, expected: &Vector3<f64>) -> Vector3<f64> {
        let raw = self.atoms[neighbor].position - self.atoms[atom].position;
        self.cell.nearest_image(&raw, expected)
    }

    /// Structural checks that must pass before any per-atom work starts.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.atoms.is_empty() {
            return Err(FrameError::Empty);
        }
        for (index, atom) in self.atoms.iter().enumerate() {
            if !atom.position.iter().all(|v| v.is_finite()) {
                return Err(FrameError::NonFinitePosition { atom: index });
            }
            if atom.structure_type.is_crystalline() && !is_proper_rotation(&atom.orientation) {
                return Err(FrameError::InvalidOrientation { atom: index });
            }
        }
        Ok(())
    }
}
