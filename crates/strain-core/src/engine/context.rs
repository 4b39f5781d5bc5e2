use super::cancel::CancellationToken;
use super::config::ElasticStrainConfig;
use super::error::EngineError;
use super::progress::ProgressReporter;
use crate::core::lattice::{ReferenceLattice, StructureType};
use crate::core::models::frame::Frame;

/// Read-only inputs shared by every phase of one analysis run.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub frame: &'a Frame,
    pub lattice: &'a ReferenceLattice,
    pub config: &'a ElasticStrainConfig,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        frame: &'a Frame,
        lattice: &'a ReferenceLattice,
        config: &'a ElasticStrainConfig,
        reporter: &'a ProgressReporter<'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            frame,
            lattice,
            config,
            reporter,
            cancel,
        }
    }

    /// Structure type that atoms must carry to take part in the analysis.
    pub fn lattice_structure(&self) -> StructureType {
        StructureType::from(self.lattice.family())
    }

    /// Whether `atom` was identified as the analyzed lattice family.
    pub fn is_lattice_atom(&self, atom: usize) -> bool {
        self.frame
            .atom(atom)
            .is_some_and(|a| a.structure_type == self.lattice_structure())
    }

    pub fn orientation_tolerance(&self) -> f64 {
        self.config.orientation_tolerance_radians()
    }

    #[inline]
    pub fn check_cancelled(&self, phase: &'static str) -> Result<(), EngineError> {
        self.cancel.check(phase)
    }
}
