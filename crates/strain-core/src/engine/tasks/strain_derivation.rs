use crate::core::strain::{self, StrainTensor};
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::tasks::deformation_fit::FitFailure;
use nalgebra::Matrix3;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Strain measures of one successfully fitted atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomStrain {
    /// `None` when strain tensors are disabled or the push-forward failed.
    pub tensor: Option<StrainTensor>,
    pub volumetric: f64,
}

#[instrument(skip_all, name = "strain_derivation_task")]
pub fn run(
    context: &AnalysisContext,
    fits: &[Result<Matrix3<f64>, FitFailure>],
) -> Result<Vec<Option<AtomStrain>>, EngineError> {
    const PHASE: &str = "Strain Derivation";

    let output = context.config.output;
    info!(
        strain_tensors = output.strain_tensors,
        push_forward = output.push_forward,
        "Deriving strain measures."
    );

    context.reporter.report(Progress::TaskStart {
        total_steps: fits.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = fits.iter();

    #[cfg(feature = "parallel")]
    let iterator = fits.par_iter();

    let strains: Option<Vec<Option<AtomStrain>>> = iterator
        .map(|fit| {
            if context.cancel.is_cancelled() {
                return None;
            }
            let derived = fit.as_ref().ok().map(|f| AtomStrain {
                tensor: if output.strain_tensors {
                    strain::derive(f, output.push_forward)
                } else {
                    None
                },
                volumetric: strain::volumetric_strain(f),
            });
            context.reporter.report(Progress::TaskIncrement);
            Some(derived)
        })
        .collect();

    context.reporter.report(Progress::TaskFinish);
    strains.ok_or(EngineError::Cancelled { phase: PHASE })
}
