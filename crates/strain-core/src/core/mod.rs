//! # Core Module
//!
//! Stateless building blocks of the elastic strain analysis.
//!
//! ## Architecture
//!
//! - **Reference Lattices** ([`lattice`]) - Lattice families, ideal neighbor templates and
//!   the proper point-group rotations relating symmetry-equivalent orientations
//! - **Frame Representation** ([`models`]) - Simulation cell, per-atom identification
//!   results and a generator for ideal crystals
//! - **Strain Measures** ([`strain`]) - Green–Lagrange and Euler–Almansi strain, push-forward
//!   and pull-back, volumetric strain
//! - **Rotation Utilities** ([`utils`]) - Rotation angles, axes and orthonormalization
//!
//! Everything here is pure: values are computed once and shared read-only by the
//! [`engine`](crate::engine) across worker threads.

pub mod lattice;
pub mod models;
pub mod strain;
pub mod utils;
