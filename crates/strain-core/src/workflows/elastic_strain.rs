use crate::core::models::frame::Frame;
use crate::core::strain::StrainTensor;
use crate::engine::cancel::CancellationToken;
use crate::engine::cluster_graph::{self, BondStatistics, ClusterGraph, ClusterId};
use crate::engine::config::ElasticStrainConfig;
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::deformation_fit::FitFailure;
use crate::engine::tasks::strain_derivation::AtomStrain;
use crate::engine::tasks;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Number of atoms that failed the fit, per failure kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailureCounts {
    pub not_crystalline: usize,
    pub isolated: usize,
    pub insufficient_correspondences: usize,
    pub ill_conditioned: usize,
    pub singular_gradient: usize,
}

impl FailureCounts {
    pub fn record(&mut self, failure: FitFailure) {
        match failure {
            FitFailure::NotCrystalline => self.not_crystalline += 1,
            FitFailure::Isolated => self.isolated += 1,
            FitFailure::InsufficientCorrespondences => self.insufficient_correspondences += 1,
            FitFailure::IllConditioned => self.ill_conditioned += 1,
            FitFailure::SingularGradient => self.singular_gradient += 1,
        }
    }

    pub fn get(&self, failure: FitFailure) -> usize {
        match failure {
            FitFailure::NotCrystalline => self.not_crystalline,
            FitFailure::Isolated => self.isolated,
            FitFailure::InsufficientCorrespondences => self.insufficient_correspondences,
            FitFailure::IllConditioned => self.ill_conditioned,
            FitFailure::SingularGradient => self.singular_gradient,
        }
    }

    pub fn total(&self) -> usize {
        FitFailure::ALL.iter().map(|&f| self.get(f)).sum()
    }
}

/// Aggregate counts describing how much of the frame received valid results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrainStatistics {
    pub atoms_total: usize,
    /// Atoms with a defined deformation gradient.
    pub atoms_fitted: usize,
    pub atoms_excluded: usize,
    pub failures: FailureCounts,
    /// Fitted atoms whose requested strain tensor could not be formed.
    pub strain_undefined: usize,
    pub clusters: usize,
    pub crystalline_clusters: usize,
    pub transitions: usize,
    pub bonds: BondStatistics,
    /// Mean of `det(F) − 1` over fitted atoms; `None` if none were fitted.
    pub mean_volumetric_strain: Option<f64>,
}

impl StrainStatistics {
    /// Fraction of atoms with a valid strain value, in `[0, 1]`.
    pub fn coverage(&self) -> f64 {
        if self.atoms_total == 0 {
            0.0
        } else {
            (self.atoms_fitted - self.strain_undefined) as f64 / self.atoms_total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElasticStrainResult {
    pub atom_clusters: Vec<ClusterId>,
    /// Symmetry branch of every atom relative to its cluster orientation.
    pub atom_branches: Vec<usize>,
    pub cluster_graph: ClusterGraph,
    /// Present when deformation-gradient output is enabled.
    pub deformation_gradients: Option<Vec<Option<Matrix3<f64>>>>,
    /// Present when strain-tensor output is enabled.
    pub strain_tensors: Option<Vec<Option<StrainTensor>>>,
    pub volumetric_strains: Vec<Option<f64>>,
    /// Why each unfitted atom has no deformation gradient.
    pub fit_failures: Vec<Option<FitFailure>>,
    pub statistics: StrainStatistics,
}

/// Phase names in the order [`run`] reports them through [`Progress::PhaseStart`].
pub const PHASES: &[&str] = &[
    "Preparation",
    "Bond Consistency",
    "Cluster Graph",
    "Deformation Fit",
    "Strain Derivation",
];

#[instrument(skip_all, name = "elastic_strain_workflow")]
pub fn run(
    frame: &Frame,
    config: &ElasticStrainConfig,
    reporter: &ProgressReporter,
) -> Result<ElasticStrainResult, EngineError> {
    run_with_cancellation(frame, config, reporter, &CancellationToken::new())
}

/// Like [`run`], but polls `cancel` between atoms and bonds and returns
/// [`EngineError::Cancelled`] as soon as it is set.
#[instrument(skip_all, name = "elastic_strain_workflow")]
pub fn run_with_cancellation(
    frame: &Frame,
    config: &ElasticStrainConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<ElasticStrainResult, EngineError> {
    // === Phase 0: Validation ===
    reporter.report(Progress::PhaseStart { name: PHASES[0] });
    let lattice = config.validate()?;
    frame.validate()?;
    info!(
        atoms = frame.len(),
        family = %lattice.family(),
        lattice_constant = lattice.lattice_constant(),
        ca_ratio = lattice.ca_ratio(),
        symmetry_ops = lattice.symmetry().len(),
        "Starting elastic strain analysis."
    );
    let context = AnalysisContext::new(frame, &lattice, config, reporter, cancel);
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Local orientation consistency ===
    reporter.report(Progress::PhaseStart { name: PHASES[1] });
    let candidates = tasks::bond_consistency::run(&context)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Cluster graph ===
    reporter.report(Progress::PhaseStart { name: PHASES[2] });
    let assignment = cluster_graph::builder::build(&context, &candidates)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Deformation gradients ===
    reporter.report(Progress::PhaseStart { name: PHASES[3] });
    let fits = tasks::deformation_fit::run(&context, &assignment)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Strain measures ===
    reporter.report(Progress::PhaseStart { name: PHASES[4] });
    let strains = tasks::strain_derivation::run(&context, &fits)?;
    reporter.report(Progress::PhaseFinish);

    let result = assemble(config, assignment, fits, strains);
    info!(
        fitted = result.statistics.atoms_fitted,
        excluded = result.statistics.atoms_excluded,
        clusters = result.statistics.clusters,
        coverage = result.statistics.coverage(),
        "Elastic strain analysis complete."
    );
    Ok(result)
}

fn assemble(
    config: &ElasticStrainConfig,
    assignment: cluster_graph::ClusterAssignment,
    fits: Vec<Result<Matrix3<f64>, FitFailure>>,
    strains: Vec<Option<AtomStrain>>,
) -> ElasticStrainResult {
    let graph = assignment.graph;
    let mut statistics = StrainStatistics {
        atoms_total: fits.len(),
        clusters: graph.clusters().len(),
        crystalline_clusters: graph.crystalline_clusters().count(),
        transitions: graph.transitions().len(),
        bonds: assignment.bonds,
        ..Default::default()
    };

    let mut fit_failures = Vec::with_capacity(fits.len());
    for fit in &fits {
        match fit {
            Ok(_) => {
                statistics.atoms_fitted += 1;
                fit_failures.push(None);
            }
            Err(failure) => {
                statistics.failures.record(*failure);
                fit_failures.push(Some(*failure));
            }
        }
    }
    statistics.atoms_excluded = statistics.atoms_total - statistics.atoms_fitted;

    let volumetric_strains: Vec<Option<f64>> =
        strains.iter().map(|s| s.map(|s| s.volumetric)).collect();
    let (sum, count) = volumetric_strains
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    statistics.mean_volumetric_strain = (count > 0).then(|| sum / count as f64);

    let strain_tensors = config.output.strain_tensors.then(|| {
        strains
            .iter()
            .map(|s| s.and_then(|s| s.tensor))
            .collect::<Vec<_>>()
    });
    if let Some(tensors) = &strain_tensors {
        statistics.strain_undefined = strains
            .iter()
            .zip(tensors)
            .filter(|(s, t)| s.is_some() && t.is_none())
            .count();
    }

    let deformation_gradients = config
        .output
        .deformation_gradients
        .then(|| fits.iter().map(|f| f.ok()).collect());

    ElasticStrainResult {
        atom_clusters: assignment.atom_clusters,
        atom_branches: assignment.atom_branches,
        cluster_graph: graph,
        deformation_gradients,
        strain_tensors,
        volumetric_strains,
        fit_failures,
        statistics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_counts_only_atoms_with_valid_strain() {
        let statistics = StrainStatistics {
            atoms_total: 50,
            atoms_fitted: 47,
            strain_undefined: 1,
            ..Default::default()
        };
        assert!((statistics.coverage() - 0.92).abs() < 1e-12);
        assert_eq!(StrainStatistics::default().coverage(), 0.0);
    }

    #[test]
    fn failure_counts_record_every_kind() {
        let mut counts = FailureCounts::default();
        for failure in FitFailure::ALL {
            counts.record(failure);
        }
        counts.record(FitFailure::Isolated);
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.get(FitFailure::Isolated), 2);
    }
}
