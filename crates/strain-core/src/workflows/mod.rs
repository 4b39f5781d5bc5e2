//! # Workflows Module
//!
//! End-to-end entry points. A workflow validates its configuration and input, runs the
//! engine phases in order while reporting progress, and assembles a self-contained
//! result with aggregate statistics.
//!
//! - **Elastic Strain** ([`elastic_strain`]) - Cluster graph construction, per-atom
//!   deformation gradients and strain measures for one frame.

pub mod elastic_strain;
