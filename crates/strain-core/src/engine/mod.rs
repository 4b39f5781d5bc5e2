//! # Engine Module
//!
//! The stateful part of an elastic strain analysis: everything that runs between
//! reading a frame and handing back per-atom results.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Lattice parameters, output toggles and tolerances,
//!   assembled through a validating builder
//! - **Cluster Graph** ([`cluster_graph`]) - Oriented union-find merging of symmetry-consistent
//!   neighbors, cluster finalization and inter-cluster transitions
//! - **Tasks** - Per-bond consistency testing, per-atom deformation fits and strain
//!   derivation, data-parallel under the `parallel` feature
//! - **Progress Monitoring** ([`progress`]) and **Cancellation** ([`cancel`])
//! - **Error Handling** ([`error`]) - Engine-level error type aggregating configuration,
//!   lattice and frame errors
//!
//! Bond tests, fits and strain derivation only read shared state and write to disjoint
//! per-atom slots. The merge pass of the cluster graph is the single sequential stage,
//! which keeps cluster assignments identical for any thread count.

pub mod cancel;
pub mod cluster_graph;
pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod tasks;
