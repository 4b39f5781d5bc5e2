use crate::engine::cluster_graph::ClusterAssignment;
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Below this `|det F|` a fitted gradient is treated as singular.
const SINGULAR_DETERMINANT: f64 = 1e-12;
/// Observed bond vectors shorter than this fraction of the nearest-neighbor
/// distance are degenerate.
const DEGENERATE_BOND_FRACTION: f64 = 1e-6;

/// Why an atom did not receive a deformation gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitFailure {
    /// The atom was not identified as the analyzed lattice family.
    NotCrystalline,
    /// The atom has the lattice structure but no consistent neighbor, so it
    /// belongs to no crystalline cluster.
    Isolated,
    /// Fewer usable correspondences than the configured minimum.
    InsufficientCorrespondences,
    /// The reference vectors are (nearly) coplanar.
    IllConditioned,
    /// The fitted gradient is non-finite or has a vanishing determinant.
    SingularGradient,
}

impl FitFailure {
    pub const ALL: [FitFailure; 5] = [
        FitFailure::NotCrystalline,
        FitFailure::Isolated,
        FitFailure::InsufficientCorrespondences,
        FitFailure::IllConditioned,
        FitFailure::SingularGradient,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FitFailure::NotCrystalline => "not-crystalline",
            FitFailure::Isolated => "isolated",
            FitFailure::InsufficientCorrespondences => "insufficient-correspondences",
            FitFailure::IllConditioned => "ill-conditioned",
            FitFailure::SingularGradient => "singular-gradient",
        }
    }
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ideal reference vector in the cluster frame and the observed bond it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub reference: Vector3<f64>,
    pub observed: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitCriteria {
    pub min_correspondences: usize,
    pub min_normal_determinant: f64,
}

/// Least-squares `F` minimizing `Σ |F r_k − o_k|²`, i.e. `F = W V⁻¹` with
/// `V = Σ r rᵀ` and `W = Σ o rᵀ`.
pub fn fit_deformation_gradient(
    pairs: &[Correspondence],
    criteria: &FitCriteria,
) -> Result<Matrix3<f64>, FitFailure> {
    if pairs.len() < criteria.min_correspondences {
        return Err(FitFailure::InsufficientCorrespondences);
    }

    let mut v = Matrix3::zeros();
    let mut w = Matrix3::zeros();
    for pair in pairs {
        v += pair.reference * pair.reference.transpose();
        w += pair.observed * pair.reference.transpose();
    }

    // Scale-free conditioning measure: 1 for an isotropic set, 0 when coplanar.
    let mean_eigenvalue = v.trace() / 3.0;
    if mean_eigenvalue <= 0.0 {
        return Err(FitFailure::IllConditioned);
    }
    let normalized = v.determinant() / mean_eigenvalue.powi(3);
    if !(normalized >= criteria.min_normal_determinant) {
        return Err(FitFailure::IllConditioned);
    }
    let v_inv = v.try_inverse().ok_or(FitFailure::IllConditioned)?;

    let f = w * v_inv;
    if !f.iter().all(|x| x.is_finite()) || f.determinant().abs() < SINGULAR_DETERMINANT {
        return Err(FitFailure::SingularGradient);
    }
    Ok(f)
}

/// Usable correspondences of `atom`: reference vectors rotated into the
/// cluster frame through the atom's branch, paired with periodically folded
/// observed bonds.
pub fn correspondences(
    context: &AnalysisContext,
    assignment: &ClusterAssignment,
    atom: usize,
) -> Result<Vec<Correspondence>, FitFailure> {
    if !context.is_lattice_atom(atom) {
        return Err(FitFailure::NotCrystalline);
    }
    let cluster = assignment
        .cluster_of(atom)
        .filter(|c| c.is_crystalline())
        .ok_or(FitFailure::Isolated)?;

    let frame = context.frame;
    let template = context.lattice.template();
    let lattice_frame = cluster.orientation
        * context
            .lattice
            .symmetry()
            .operation(assignment.atom_branches[atom]);
    let degenerate = DEGENERATE_BOND_FRACTION * context.lattice.nearest_neighbor_distance();

    Ok(frame.atoms()[atom]
        .neighbors
        .iter()
        .enumerate()
        .filter(|(entry, m)| {
            m.valid
                && m.neighbor < frame.len()
                && m.slot < template.len()
                && !assignment.is_excluded(atom, *entry)
        })
        .filter_map(|(_, m)| {
            let reference = lattice_frame * template[m.slot];
            let observed = frame.bond_vector(atom, m.neighbor, &reference);
            (observed.norm() > degenerate).then_some(Correspondence {
                reference,
                observed,
            })
        })
        .collect())
}

#[instrument(skip_all, name = "deformation_fit_task")]
pub fn run(
    context: &AnalysisContext,
    assignment: &ClusterAssignment,
) -> Result<Vec<Result<Matrix3<f64>, FitFailure>>, EngineError> {
    const PHASE: &str = "Deformation Fit";

    let criteria = FitCriteria {
        min_correspondences: context.config.required_correspondences(context.lattice),
        min_normal_determinant: context.config.tolerances.min_normal_determinant,
    };
    info!(
        atoms = context.frame.len(),
        min_correspondences = criteria.min_correspondences,
        "Fitting per-atom deformation gradients."
    );

    context.reporter.report(Progress::TaskStart {
        total_steps: context.frame.len() as u64,
    });

    let atoms: Vec<usize> = (0..context.frame.len()).collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = atoms.iter();

    #[cfg(feature = "parallel")]
    let iterator = atoms.par_iter();

    let fits: Option<Vec<Result<Matrix3<f64>, FitFailure>>> = iterator
        .map(|&atom| {
            if context.cancel.is_cancelled() {
                return None;
            }
            let fit = correspondences(context, assignment, atom)
                .and_then(|pairs| fit_deformation_gradient(&pairs, &criteria));
            context.reporter.report(Progress::TaskIncrement);
            Some(fit)
        })
        .collect();

    context.reporter.report(Progress::TaskFinish);
    let fits = fits.ok_or(EngineError::Cancelled { phase: PHASE })?;

    let fitted = fits.iter().filter(|f| f.is_ok()).count();
    info!(
        fitted,
        failed = fits.len() - fitted,
        "Deformation fit complete."
    );
    Ok(fits)
}
