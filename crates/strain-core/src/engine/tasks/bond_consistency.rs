use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A bond with valid correspondences on both sides and the outcome of the
/// local symmetry test between its two atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondCandidate {
    pub atom: usize,
    /// Index into `atom`'s neighbor list.
    pub entry: usize,
    pub neighbor: usize,
    /// Index into `neighbor`'s neighbor list of the entry pointing back at `atom`.
    pub reverse_entry: usize,
    /// Symmetry operation `S` with `R_atomᵀ · R_neighbor ≈ S`.
    pub symmetry_op: usize,
    /// Residual misorientation after removing `S`, in radians.
    pub residual: f64,
    pub consistent: bool,
}

#[instrument(skip_all, name = "bond_consistency_task")]
pub fn run(context: &AnalysisContext) -> Result<Vec<BondCandidate>, EngineError> {
    const PHASE: &str = "Bond Consistency";

    let endpoints = enumerate_bonds(context);
    info!(bonds = endpoints.len(), "Testing local orientation consistency.");

    if endpoints.is_empty() {
        return Ok(Vec::new());
    }

    context.reporter.report(Progress::TaskStart {
        total_steps: endpoints.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = endpoints.iter();

    #[cfg(feature = "parallel")]
    let iterator = endpoints.par_iter();

    let candidates: Vec<BondCandidate> = iterator
        .filter_map(|&(atom, entry)| {
            if context.cancel.is_cancelled() {
                return None;
            }
            let candidate = examine_bond(context, atom, entry);
            context.reporter.report(Progress::TaskIncrement);
            candidate
        })
        .collect();

    context.reporter.report(Progress::TaskFinish);
    context.check_cancelled(PHASE)?;

    let consistent = candidates.iter().filter(|c| c.consistent).count();
    info!(
        examined = candidates.len(),
        consistent,
        boundary = candidates.len() - consistent,
        "Local consistency test complete."
    );
    Ok(candidates)
}

/// `(atom, entry)` pairs in ascending atom then entry order, each unordered
/// bond taken from its lower-index side only.
fn enumerate_bonds(context: &AnalysisContext) -> Vec<(usize, usize)> {
    let frame = context.frame;
    let slots = context.lattice.neighbor_count();

    frame
        .atoms()
        .iter()
        .enumerate()
        .filter(|&(atom, _)| context.is_lattice_atom(atom))
        .flat_map(|(atom, record)| {
            record
                .neighbors
                .iter()
                .enumerate()
                .filter(move |(_, m)| {
                    m.valid
                        && m.slot < slots
                        && m.neighbor > atom
                        && context.is_lattice_atom(m.neighbor)
                })
                .map(move |(entry, _)| (atom, entry))
        })
        .collect()
}

fn examine_bond(context: &AnalysisContext, atom: usize, entry: usize) -> Option<BondCandidate> {
    let frame = context.frame;
    let lattice = context.lattice;
    let record = &frame.atoms()[atom];
    let forward = record.neighbors[entry];
    let other = &frame.atoms()[forward.neighbor];

    let expected = record.orientation * lattice.template()[forward.slot];
    let bond = frame.bond_vector(atom, forward.neighbor, &expected);

    let reverse_entry = best_reverse_entry(context, forward.neighbor, atom, &(-bond));
    let Some(reverse_entry) = reverse_entry else {
        debug!(atom, neighbor = forward.neighbor, "Bond is not reciprocated; skipping.");
        return None;
    };

    let relative = record.orientation.transpose() * other.orientation;
    let (symmetry_op, residual) = lattice.symmetry().closest(&relative);

    Some(BondCandidate {
        atom,
        entry,
        neighbor: forward.neighbor,
        reverse_entry,
        symmetry_op,
        residual,
        consistent: residual <= context.orientation_tolerance(),
    })
}

/// Valid entry of `atom` pointing at `target` whose ideal vector best matches
/// `bond`; several entries can point at the same atom in small periodic cells.
fn best_reverse_entry(
    context: &AnalysisContext,
    atom: usize,
    target: usize,
    bond: &Vector3<f64>,
) -> Option<usize> {
    let record = &context.frame.atoms()[atom];
    let template = context.lattice.template();

    let mut best: Option<(usize, f64)> = None;
    for (index, entry) in record.neighbors.iter().enumerate() {
        if !entry.valid || entry.neighbor != target || entry.slot >= template.len() {
            continue;
        }
        let mismatch = (record.orientation * template[entry.slot] - bond).norm();
        if best.is_none_or(|(_, current)| mismatch < current) {
            best = Some((index, mismatch));
        }
    }
    best.map(|(index, _)| index)
}
