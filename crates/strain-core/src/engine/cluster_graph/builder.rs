use super::union_find::{OrientedUnionFind, UnionOutcome};
use super::{
    BondStatistics, Cluster, ClusterAssignment, ClusterGraph, ClusterId, ClusterTransition,
};
use crate::core::lattice::{StructureType, SymmetryGroup};
use crate::core::utils::geometry::{misorientation_angle, orthonormalize, rotation_axis};
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::tasks::bond_consistency::BondCandidate;
use nalgebra::Matrix3;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const PHASE: &str = "Cluster Graph";
const REPORT_INTERVAL: usize = 4096;

/// Running sum of the per-bond rotations observed across one cluster boundary.
struct TransitionAccumulator {
    first: Matrix3<f64>,
    sum: Matrix3<f64>,
    count: usize,
}

/// Groups lattice atoms into orientation-consistent clusters and records the
/// transitions between adjacent clusters.
///
/// `candidates` must be in ascending `(atom, entry)` order; the merge pass is
/// sequential over that order, which makes the result independent of how the
/// candidates were computed.
#[instrument(skip_all, name = "cluster_graph_builder")]
pub fn build(
    context: &AnalysisContext,
    candidates: &[BondCandidate],
) -> Result<ClusterAssignment, EngineError> {
    let group = context.lattice.symmetry();
    let atom_count = context.frame.len();

    let mut bonds = BondStatistics {
        examined: candidates.len(),
        ..Default::default()
    };
    let mut excluded_entries = BTreeSet::new();
    let mut boundary = Vec::new();

    // === Merge pass ===
    context.reporter.report(Progress::TaskStart {
        total_steps: candidates.len() as u64,
    });
    let mut sets = OrientedUnionFind::new(atom_count);
    for (index, candidate) in candidates.iter().enumerate() {
        if index % REPORT_INTERVAL == 0 {
            context.check_cancelled(PHASE)?;
            if index > 0 {
                context.reporter.report(Progress::TaskAdvance {
                    steps: REPORT_INTERVAL as u64,
                });
            }
        }

        if !candidate.consistent {
            bonds.boundary += 1;
            boundary.push(candidate);
            continue;
        }
        match sets.union(group, candidate.atom, candidate.neighbor, candidate.symmetry_op) {
            UnionOutcome::Merged => bonds.merged += 1,
            UnionOutcome::Consistent => {}
            UnionOutcome::Inconsistent => {
                debug!(
                    atom = candidate.atom,
                    neighbor = candidate.neighbor,
                    "Bond contradicts established cluster relation."
                );
                exclude(&mut excluded_entries, candidate);
                bonds.inconsistent += 1;
            }
        }
    }
    context.reporter.report(Progress::TaskFinish);

    // === Finalization ===
    context.check_cancelled(PHASE)?;
    let roots: Vec<(usize, usize)> = (0..atom_count).map(|atom| sets.find(group, atom)).collect();
    let mut set_sizes = vec![0usize; atom_count];
    for &(root, _) in &roots {
        set_sizes[root] += 1;
    }

    let mut atom_clusters = vec![ClusterId::default(); atom_count];
    let mut root_clusters: Vec<Option<ClusterId>> = vec![None; atom_count];
    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut crystalline: Vec<bool> = Vec::new();

    for (atom, &(root, _)) in roots.iter().enumerate() {
        let in_cluster = context.is_lattice_atom(atom) && set_sizes[root] >= 2;
        let id = match root_clusters[root] {
            Some(id) if in_cluster => id,
            _ => {
                let id = ClusterId(members.len() as u32);
                if in_cluster {
                    root_clusters[root] = Some(id);
                }
                members.push(Vec::new());
                crystalline.push(in_cluster);
                id
            }
        };
        members[id.index()].push(atom);
        atom_clusters[atom] = id;
    }

    let frame = context.frame;
    let preferred = &context.config.preferred_orientations;
    let structure_type = context.lattice_structure();

    #[cfg(not(feature = "parallel"))]
    let iterator = members.into_iter().zip(crystalline).enumerate();

    #[cfg(feature = "parallel")]
    let iterator = members.into_par_iter().zip(crystalline).enumerate();

    let finalized: Vec<(Cluster, Vec<(usize, usize)>)> = iterator
        .map(|(index, (members, is_crystalline))| {
            let id = ClusterId(index as u32);
            if !is_crystalline {
                let branches = members.iter().map(|&atom| (atom, 0)).collect();
                return (
                    Cluster {
                        id,
                        structure_type: StructureType::Other,
                        orientation: Matrix3::identity(),
                        members,
                    },
                    branches,
                );
            }

            let mut sum = Matrix3::zeros();
            for &atom in &members {
                let branch = roots[atom].1;
                sum += frame.atoms()[atom].orientation * group.operation(branch).transpose();
            }
            let root_orientation = frame.atoms()[members[0]].orientation;
            let mean = orthonormalize(&sum).unwrap_or(root_orientation);
            let (shift, orientation) = preferred_equivalent(group, &mean, preferred);

            let to_cluster = group.inverse(shift);
            let branches = members
                .iter()
                .map(|&atom| (atom, group.compose(to_cluster, roots[atom].1)))
                .collect();
            (
                Cluster {
                    id,
                    structure_type,
                    orientation,
                    members,
                },
                branches,
            )
        })
        .collect();

    let mut atom_branches = vec![0usize; atom_count];
    let mut clusters = Vec::with_capacity(finalized.len());
    for (cluster, branches) in finalized {
        for (atom, branch) in branches {
            atom_branches[atom] = branch;
        }
        clusters.push(cluster);
    }

    // === Transitions ===
    let tolerance = context.orientation_tolerance();
    let mut accumulators: BTreeMap<(ClusterId, ClusterId), TransitionAccumulator> = BTreeMap::new();
    for candidate in boundary {
        let cluster_i = atom_clusters[candidate.atom];
        let cluster_j = atom_clusters[candidate.neighbor];

        if cluster_i == cluster_j {
            // Joined through other paths, yet directly misoriented.
            exclude(&mut excluded_entries, candidate);
            bonds.inconsistent += 1;
            continue;
        }
        if !clusters[cluster_i.index()].is_crystalline() || !clusters[cluster_j.index()].is_crystalline() {
            continue;
        }

        let r_i = &frame.atoms()[candidate.atom].orientation;
        let r_j = &frame.atoms()[candidate.neighbor].orientation;
        let g_i = group.operation(atom_branches[candidate.atom]);
        let g_j = group.operation(atom_branches[candidate.neighbor]);
        let observed = g_i * r_i.transpose() * r_j * g_j.transpose();
        let (key, rotation) = if cluster_i < cluster_j {
            ((cluster_i, cluster_j), observed)
        } else {
            ((cluster_j, cluster_i), observed.transpose())
        };

        match accumulators.get_mut(&key) {
            None => {
                accumulators.insert(
                    key,
                    TransitionAccumulator {
                        first: rotation,
                        sum: rotation,
                        count: 1,
                    },
                );
            }
            Some(acc) if misorientation_angle(&acc.first, &rotation) <= tolerance => {
                acc.sum += rotation;
                acc.count += 1;
            }
            Some(_) => {
                debug!(
                    atom = candidate.atom,
                    neighbor = candidate.neighbor,
                    cluster_a = %key.0,
                    cluster_b = %key.1,
                    "Boundary bond disagrees with recorded transition."
                );
                exclude(&mut excluded_entries, candidate);
                bonds.inconsistent += 1;
            }
        }
    }

    let transitions: Vec<ClusterTransition> = accumulators
        .into_iter()
        .map(|((cluster_a, cluster_b), acc)| {
            let rotation = orthonormalize(&acc.sum).unwrap_or(acc.first);
            let (op, disorientation_angle) = group.reduce(&rotation);
            ClusterTransition {
                cluster_a,
                cluster_b,
                rotation,
                disorientation_angle,
                disorientation_axis: rotation_axis(&(rotation * group.operation(op))),
                bond_count: acc.count,
            }
        })
        .collect();

    if bonds.inconsistent > 0 {
        warn!(
            inconsistent = bonds.inconsistent,
            "Some bonds were inconsistent and are excluded from fitting."
        );
    }

    let graph = ClusterGraph::new(clusters, transitions);
    info!(
        clusters = graph.clusters().len(),
        crystalline = graph.crystalline_clusters().count(),
        transitions = graph.transitions().len(),
        merged = bonds.merged,
        "Cluster graph finalized."
    );

    Ok(ClusterAssignment {
        graph,
        atom_clusters,
        atom_branches,
        excluded_entries,
        bonds,
    })
}

fn exclude(excluded: &mut BTreeSet<(usize, usize)>, candidate: &BondCandidate) {
    excluded.insert((candidate.atom, candidate.entry));
    excluded.insert((candidate.neighbor, candidate.reverse_entry));
}

/// Picks the symmetry equivalent `mean · G[k]` closest to any preferred
/// orientation; ties go to the lower preferred index, then the lower `k`.
fn preferred_equivalent(
    group: &SymmetryGroup,
    mean: &Matrix3<f64>,
    preferred: &[Matrix3<f64>],
) -> (usize, Matrix3<f64>) {
    let mut best = (0, *mean, f64::INFINITY);
    for target in preferred {
        for (k, op) in group.operations().iter().enumerate() {
            let candidate = mean * op;
            let angle = misorientation_angle(target, &candidate);
            if angle < best.2 {
                best = (k, candidate, angle);
            }
        }
    }
    (best.0, best.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lattice::{LatticeFamily, ReferenceLattice};
    use crate::core::models::builder::CrystalBuilder;
    use crate::core::models::frame::{Frame, NeighborMatch};
    use crate::core::utils::geometry::{rotation_angle, rotation_from_axis_angle};
    use crate::engine::cancel::CancellationToken;
    use crate::engine::config::{ElasticStrainConfig, ElasticStrainConfigBuilder};
    use crate::engine::progress::ProgressReporter;
    use crate::engine::tasks::bond_consistency;
    use crate::engine::tasks::deformation_fit::correspondences;
    use nalgebra::{Point3, Vector3};

    fn config(family: LatticeFamily) -> ElasticStrainConfig {
        ElasticStrainConfigBuilder::new()
            .lattice_family(family)
            .lattice_constant(2.0)
            .build()
            .unwrap()
    }

    fn assign(frame: &Frame, lattice: &ReferenceLattice, config: &ElasticStrainConfig) -> ClusterAssignment {
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let context = AnalysisContext::new(frame, lattice, config, &reporter, &cancel);
        let candidates = bond_consistency::run(&context).unwrap();
        build(&context, &candidates).unwrap()
    }

    #[test]
    fn perfect_crystal_forms_one_cluster_with_preferred_orientation() {
        let config = config(LatticeFamily::CubicDiamond);
        let lattice = config.validate().unwrap();
        let rotation = rotation_from_axis_angle(&Vector3::new(1.0, 1.0, 0.0), 12.0);
        let frame = CrystalBuilder::new(&lattice, [2, 2, 2])
            .orientation(rotation)
            .build()
            .unwrap();

        let assignment = assign(&frame, &lattice, &config);
        assert_eq!(assignment.graph.clusters().len(), 1);
        assert!(assignment.graph.transitions().is_empty());
        assert!(assignment.excluded_entries.is_empty());

        let cluster = &assignment.graph.clusters()[0];
        assert_eq!(cluster.size(), frame.len());
        assert!(misorientation_angle(&cluster.orientation, &rotation) < 1e-9);
        for (atom, record) in frame.atoms().iter().enumerate() {
            let branch = group_op(&lattice, assignment.atom_branches[atom]);
            let implied = cluster.orientation * branch;
            assert!(misorientation_angle(&implied, &record.orientation) < 1e-9);
        }
    }

    fn group_op(lattice: &ReferenceLattice, index: usize) -> Matrix3<f64> {
        *lattice.symmetry().operation(index)
    }

    #[test]
    fn unassigned_and_isolated_atoms_become_singleton_other_clusters() {
        let config = config(LatticeFamily::Sc);
        let lattice = config.validate().unwrap();
        let mut frame = CrystalBuilder::new(&lattice, [3, 3, 3]).build().unwrap();

        frame.atom_mut(5).unwrap().structure_type = StructureType::Other;
        frame.atom_mut(13).unwrap().orientation = rotation_from_axis_angle(&Vector3::z(), 30.0);

        let assignment = assign(&frame, &lattice, &config);
        let graph = &assignment.graph;
        assert_eq!(graph.crystalline_clusters().count(), 1);
        assert_eq!(graph.clusters().len(), 3);

        let main = graph.cluster(assignment.atom_clusters[0]).unwrap();
        assert_eq!(main.size(), 25);
        for atom in [5, 13] {
            let cluster = assignment.cluster_of(atom).unwrap();
            assert_eq!(cluster.structure_type, StructureType::Other);
            assert_eq!(cluster.members, vec![atom]);
            assert_eq!(assignment.atom_branches[atom], 0);
        }
        assert!(graph.transitions().is_empty());
    }

    #[test]
    fn cluster_ids_follow_lowest_member_index() {
        let config = config(LatticeFamily::Sc);
        let lattice = config.validate().unwrap();
        let mut frame = CrystalBuilder::new(&lattice, [3, 3, 3]).build().unwrap();
        frame.atom_mut(0).unwrap().structure_type = StructureType::Other;

        let assignment = assign(&frame, &lattice, &config);
        assert_eq!(assignment.atom_clusters[0], ClusterId(0));
        assert_eq!(assignment.atom_clusters[1], ClusterId(1));
        for cluster in assignment.graph.clusters() {
            assert!(cluster.members.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn intra_cluster_bonds_satisfy_their_branches() {
        let config = config(LatticeFamily::Hcp);
        let lattice = config.validate().unwrap();
        let frame = CrystalBuilder::new(&lattice, [3, 3, 2]).build().unwrap();
        let assignment = assign(&frame, &lattice, &config);
        let group = lattice.symmetry();

        assert_eq!(assignment.graph.clusters().len(), 1);
        for (atom, record) in frame.atoms().iter().enumerate() {
            for entry in &record.neighbors {
                let j = entry.neighbor;
                let relative = record.orientation.transpose() * frame.atoms()[j].orientation;
                let implied = group.compose(
                    group.inverse(assignment.atom_branches[atom]),
                    assignment.atom_branches[j],
                );
                assert!(rotation_angle(&(group.operation(implied).transpose() * relative)) < 1e-9);
            }
        }
    }

    /// Links `a` and `b` through their first unused template slots and returns
    /// the new entry indices on both sides.
    fn link(frame: &mut Frame, lattice: &ReferenceLattice, a: usize, b: usize) -> (usize, usize) {
        let free_slot = |frame: &Frame, atom: usize| {
            let used: BTreeSet<usize> = frame.atoms()[atom].neighbors.iter().map(|m| m.slot).collect();
            (0..lattice.neighbor_count()).find(|s| !used.contains(s)).unwrap()
        };
        let (slot_a, slot_b) = (free_slot(frame, a), free_slot(frame, b));
        let atom_a = frame.atom_mut(a).unwrap();
        atom_a.neighbors.push(NeighborMatch::new(b, slot_a));
        let entry_a = atom_a.neighbors.len() - 1;
        let atom_b = frame.atom_mut(b).unwrap();
        atom_b.neighbors.push(NeighborMatch::new(a, slot_b));
        (entry_a, atom_b.neighbors.len() - 1)
    }

    fn tilt(frame: &mut Frame, atom: usize, degrees: f64) {
        let record = frame.atom_mut(atom).unwrap();
        record.orientation = rotation_from_axis_angle(&Vector3::x(), degrees) * record.orientation;
    }

    #[test]
    fn boundary_bond_disagreeing_with_the_transition_is_excluded() {
        let config = config(LatticeFamily::Bcc);
        let lattice = config.validate().unwrap();
        let twist = rotation_from_axis_angle(&Vector3::z(), 30.0);
        let grain_a = CrystalBuilder::new(&lattice, [4, 4, 4])
            .periodic([false; 3])
            .build()
            .unwrap();
        let grain_b = CrystalBuilder::new(&lattice, [4, 4, 4])
            .periodic([false; 3])
            .orientation(twist)
            .origin(Point3::new(20.0, 0.0, 0.0))
            .build()
            .unwrap();
        let n = grain_a.len();
        let mut frame = grain_a;
        frame.append(grain_b.atoms().to_vec());

        // The first link fixes the transition; the second is tilted 9 degrees
        // away from it while each end stays within tolerance of its own grain.
        let (agreeing_a, agreeing_b) = (n - 2, n);
        let (tilted_a, tilted_b) = (n - 1, n + 1);
        link(&mut frame, &lattice, agreeing_a, agreeing_b);
        let (entry_a, entry_b) = link(&mut frame, &lattice, tilted_a, tilted_b);
        tilt(&mut frame, tilted_a, 4.5);
        tilt(&mut frame, tilted_b, -4.5);

        let assignment = assign(&frame, &lattice, &config);
        let graph = &assignment.graph;
        assert_eq!(graph.crystalline_clusters().count(), 2);
        assert_eq!(assignment.bonds.boundary, 2);
        assert_eq!(assignment.bonds.inconsistent, 1);
        assert_eq!(graph.transitions().len(), 1);

        let transition = &graph.transitions()[0];
        assert_eq!(transition.bond_count, 1);
        assert!((transition.disorientation_degrees() - 30.0).abs() < 1e-6);

        assert_eq!(
            assignment.excluded_entries,
            BTreeSet::from([(tilted_a, entry_a), (tilted_b, entry_b)])
        );

        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let context = AnalysisContext::new(&frame, &lattice, &config, &reporter, &cancel);
        for (atom, excluded) in [(agreeing_a, 0), (agreeing_b, 0), (tilted_a, 1), (tilted_b, 1)] {
            let pairs = correspondences(&context, &assignment, atom).unwrap();
            assert_eq!(pairs.len(), frame.atoms()[atom].neighbors.len() - excluded, "atom {atom}");
        }
    }

    #[test]
    fn misoriented_bond_inside_one_cluster_is_excluded() {
        let config = config(LatticeFamily::Sc);
        let lattice = config.validate().unwrap();
        let mut frame = CrystalBuilder::new(&lattice, [3, 3, 3]).build().unwrap();
        // Atoms 13 and 14 are z neighbors; each is 3 degrees off the crystal
        // but 6 degrees off the other.
        for (atom, degrees) in [(13, 3.0), (14, -3.0)] {
            frame.atom_mut(atom).unwrap().orientation = rotation_from_axis_angle(&Vector3::z(), degrees);
        }
        let entry = |atom: usize, other: usize| {
            frame.atoms()[atom]
                .neighbors
                .iter()
                .position(|m| m.neighbor == other)
                .unwrap()
        };
        let expected = BTreeSet::from([(13, entry(13, 14)), (14, entry(14, 13))]);

        let assignment = assign(&frame, &lattice, &config);
        assert_eq!(assignment.graph.clusters().len(), 1);
        assert!(assignment.graph.transitions().is_empty());
        assert_eq!(assignment.bonds.boundary, 1);
        assert_eq!(assignment.bonds.inconsistent, 1);
        assert_eq!(assignment.excluded_entries, expected);
    }

    #[test]
    fn preferred_equivalent_breaks_ties_by_lowest_operation() {
        let config = config(LatticeFamily::Sc);
        let lattice = config.validate().unwrap();
        let group = lattice.symmetry();
        let (k, chosen) = preferred_equivalent(group, &Matrix3::identity(), &[Matrix3::identity()]);
        assert_eq!(k, 0);
        assert_eq!(chosen, Matrix3::identity());

        let twisted = rotation_from_axis_angle(&Vector3::z(), 80.0);
        let (_, chosen) = preferred_equivalent(group, &twisted, &[Matrix3::identity()]);
        assert!((rotation_angle(&chosen).to_degrees() - 10.0).abs() < 1e-9);
    }
}
