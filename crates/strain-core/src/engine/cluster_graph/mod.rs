//! Orientation-consistent atom clusters and the misorientations between them.

pub mod builder;
pub mod union_find;

use crate::core::lattice::StructureType;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Dense cluster identifier, assigned in ascending order of each cluster's
/// lowest member atom index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl ClusterId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    /// `Other` for singleton clusters of unassigned or isolated atoms.
    pub structure_type: StructureType,
    /// Lattice-to-lab rotation representing the whole cluster.
    pub orientation: Matrix3<f64>,
    /// Member atom indices in ascending order.
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_crystalline(&self) -> bool {
        self.structure_type.is_crystalline()
    }
}

/// Relative orientation between two adjacent crystalline clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTransition {
    /// Always the lower of the two ids.
    pub cluster_a: ClusterId,
    pub cluster_b: ClusterId,
    /// `R_Aᵀ · R_B`: maps vectors in B's lattice frame into A's lattice frame.
    pub rotation: Matrix3<f64>,
    /// Smallest rotation angle among the symmetry equivalents of `rotation`, in radians.
    pub disorientation_angle: f64,
    /// Axis of that smallest equivalent; `None` when it is the identity.
    pub disorientation_axis: Option<Vector3<f64>>,
    /// Number of atom-pair bonds across the boundary that agree on `rotation`.
    pub bond_count: usize,
}

impl ClusterTransition {
    pub fn disorientation_degrees(&self) -> f64 {
        self.disorientation_angle.to_degrees()
    }
}

/// Frozen clusters and transitions of one analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterGraph {
    clusters: Vec<Cluster>,
    transitions: Vec<ClusterTransition>,
}

impl ClusterGraph {
    pub(crate) fn new(clusters: Vec<Cluster>, transitions: Vec<ClusterTransition>) -> Self {
        Self {
            clusters,
            transitions,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    pub fn crystalline_clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| c.is_crystalline())
    }

    /// Transitions ordered by `(cluster_a, cluster_b)`.
    pub fn transitions(&self) -> &[ClusterTransition] {
        &self.transitions
    }

    /// Looks up the transition between two clusters in either order.
    pub fn transition_between(&self, a: ClusterId, b: ClusterId) -> Option<&ClusterTransition> {
        let key = (a.min(b), a.max(b));
        self.transitions
            .binary_search_by(|t| (t.cluster_a, t.cluster_b).cmp(&key))
            .ok()
            .map(|index| &self.transitions[index])
    }
}

/// Bond tallies from cluster-graph construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondStatistics {
    /// Bonds with valid correspondences on both sides.
    pub examined: usize,
    /// Bonds that joined two previously separate sets.
    pub merged: usize,
    /// Bonds failing the local symmetry test, i.e. boundary candidates.
    pub boundary: usize,
    /// Bonds contradicting an established relation; excluded from fitting.
    pub inconsistent: usize,
}

/// Everything cluster-graph construction hands on to the fitting stage.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub graph: ClusterGraph,
    pub atom_clusters: Vec<ClusterId>,
    /// Symmetry operation `b` with `R_atom ≈ R_cluster · G[b]`; `0` for `Other` atoms.
    pub atom_branches: Vec<usize>,
    /// `(atom, neighbor entry)` pairs of inconsistent bonds, recorded from both sides.
    pub excluded_entries: BTreeSet<(usize, usize)>,
    pub bonds: BondStatistics,
}

impl ClusterAssignment {
    pub fn cluster_of(&self, atom: usize) -> Option<&Cluster> {
        self.atom_clusters
            .get(atom)
            .and_then(|&id| self.graph.cluster(id))
    }

    pub fn is_excluded(&self, atom: usize, entry: usize) -> bool {
        self.excluded_entries.contains(&(atom, entry))
    }
}
