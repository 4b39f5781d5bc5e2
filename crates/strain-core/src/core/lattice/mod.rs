//! Ideal reference lattices: families, neighbor templates and point-group symmetry.

pub mod family;
pub mod symmetry;
pub mod template;

pub use family::{IDEAL_CA_RATIO, LatticeError, LatticeFamily, StructureType};
pub use symmetry::SymmetryGroup;
pub use template::ReferenceLattice;
