//! # Core Models Module
//!
//! Data structures describing one analyzed simulation snapshot.
//!
//! - [`cell`] - Simulation cell geometry and periodic-boundary folding
//! - [`frame`] - Per-atom positions together with the output of structure identification
//! - [`builder`] - Generation of ideal (optionally rotated and strained) crystals with
//!   exact neighbor correspondences, used for synthetic inputs and validation
//!
//! ```ignore
//! use elastrain::core::lattice::{LatticeFamily, ReferenceLattice};
//! use elastrain::core::models::builder::CrystalBuilder;
//!
//! let lattice = ReferenceLattice::new(LatticeFamily::Bcc, 1.63, 1.0)?;
//! let frame = CrystalBuilder::new(&lattice, [4, 4, 4]).build()?;
//! assert_eq!(frame.len(), 128);
//! ```

pub mod builder;
pub mod cell;
pub mod frame;
