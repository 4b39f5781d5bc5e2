//! # elastrain
//!
//! Per-atom elastic strain analysis for atomistic simulation snapshots.
//!
//! Given the output of structure identification (per-atom structure type, lattice
//! orientation and neighbor-to-template correspondences), the library groups atoms into
//! orientation-consistent clusters, fits a deformation gradient for every crystalline atom
//! against an ideal reference lattice, and derives strain tensors and volumetric strain.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless models and math: lattice families, neighbor
//!   templates and point-group symmetry, the simulation cell and frame, strain measures.
//!
//! - **[`engine`]: The Logic Core.** Configuration, the oriented union-find behind the
//!   cluster graph, and the data-parallel per-bond and per-atom tasks.
//!
//! - **[`workflows`]: The Public API.** [`workflows::elastic_strain::run`] ties the layers
//!   together and returns per-atom results alongside coverage statistics.
//!
//! ```ignore
//! use elastrain::core::lattice::LatticeFamily;
//! use elastrain::engine::config::ElasticStrainConfigBuilder;
//! use elastrain::engine::progress::ProgressReporter;
//! use elastrain::workflows::elastic_strain;
//!
//! let config = ElasticStrainConfigBuilder::new()
//!     .lattice_family(LatticeFamily::Bcc)
//!     .lattice_constant(2.87)
//!     .build()?;
//! let result = elastic_strain::run(&frame, &config, &ProgressReporter::new())?;
//! println!("{:.1}% of atoms got a valid strain value", 100.0 * result.statistics.coverage());
//! ```

pub mod core;
pub mod engine;
pub mod workflows;
