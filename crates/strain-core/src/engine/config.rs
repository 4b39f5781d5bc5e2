use crate::core::lattice::{LatticeError, LatticeFamily, ReferenceLattice};
use crate::core::utils::geometry::is_proper_rotation;
use nalgebra::Matrix3;
use thiserror::Error;

/// Smallest correspondence count that can determine all nine components of `F`.
pub const MIN_FIT_CORRESPONDENCES: usize = 3;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("Invalid lattice parameters: {0}")]
    Lattice(#[from] LatticeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatticeConfig {
    pub family: LatticeFamily,
    pub lattice_constant: f64,
    /// Axial ratio `c/a`; only meaningful for hexagonal families.
    pub ca_ratio: f64,
}

impl LatticeConfig {
    pub fn reference_lattice(&self) -> Result<ReferenceLattice, LatticeError> {
        ReferenceLattice::new(self.family, self.lattice_constant, self.ca_ratio)
    }
}

/// Which per-atom quantities are materialized in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub deformation_gradients: bool,
    pub strain_tensors: bool,
    /// Report strain in the deformed (spatial) frame instead of the reference frame.
    pub push_forward: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            deformation_gradients: true,
            strain_tensors: true,
            push_forward: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceConfig {
    /// Largest residual misorientation, in degrees, for two neighbors to be
    /// considered symmetry-consistent.
    pub orientation_degrees: f64,
    /// Lower bound on `det(V) / (tr(V)/3)³` of the fit's normal matrix `V`.
    pub min_normal_determinant: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            orientation_degrees: 5.0,
            min_normal_determinant: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElasticStrainConfig {
    pub lattice: LatticeConfig,
    /// `None` requires the full neighbor shell of the lattice.
    pub min_correspondences: Option<usize>,
    pub output: OutputConfig,
    pub tolerances: ToleranceConfig,
    /// Cluster orientations are chosen among their symmetry equivalents to lie
    /// closest to one of these rotations.
    pub preferred_orientations: Vec<Matrix3<f64>>,
}

impl ElasticStrainConfig {
    /// Checks every parameter and returns the reference lattice they describe.
    pub fn validate(&self) -> Result<ReferenceLattice, ConfigError> {
        let lattice = self.lattice.reference_lattice()?;

        if let Some(min) = self.min_correspondences {
            let shell = lattice.neighbor_count();
            if !(MIN_FIT_CORRESPONDENCES..=shell).contains(&min) {
                return Err(ConfigError::InvalidValue {
                    parameter: "min_correspondences",
                    reason: format!(
                        "must be between {MIN_FIT_CORRESPONDENCES} and {shell} for {}, got {min}",
                        lattice.family()
                    ),
                });
            }
        }

        let tolerance = self.tolerances.orientation_degrees;
        if !(tolerance.is_finite() && tolerance > 0.0 && tolerance < 180.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "orientation_tolerance_degrees",
                reason: format!("must lie in (0, 180), got {tolerance}"),
            });
        }

        let determinant = self.tolerances.min_normal_determinant;
        if !(determinant.is_finite() && (0.0..1.0).contains(&determinant)) {
            return Err(ConfigError::InvalidValue {
                parameter: "min_normal_determinant",
                reason: format!("must lie in [0, 1), got {determinant}"),
            });
        }

        if self.preferred_orientations.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "preferred_orientations",
                reason: "at least one orientation is required".to_string(),
            });
        }
        if let Some(index) = self
            .preferred_orientations
            .iter()
            .position(|m| !is_proper_rotation(m))
        {
            return Err(ConfigError::InvalidValue {
                parameter: "preferred_orientations",
                reason: format!("entry {index} is not a proper rotation"),
            });
        }

        Ok(lattice)
    }

    pub fn required_correspondences(&self, lattice: &ReferenceLattice) -> usize {
        self.min_correspondences
            .unwrap_or_else(|| lattice.neighbor_count())
    }

    pub fn orientation_tolerance_radians(&self) -> f64 {
        self.tolerances.orientation_degrees.to_radians()
    }
}

#[derive(Default)]
pub struct ElasticStrainConfigBuilder {
    lattice_family: Option<LatticeFamily>,
    lattice_constant: Option<f64>,
    ca_ratio: Option<f64>,
    min_correspondences: Option<usize>,
    output: OutputConfig,
    tolerances: ToleranceConfig,
    preferred_orientations: Vec<Matrix3<f64>>,
}

impl ElasticStrainConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lattice_family(mut self, family: LatticeFamily) -> Self {
        self.lattice_family = Some(family);
        self
    }
    pub fn lattice_constant(mut self, a: f64) -> Self {
        self.lattice_constant = Some(a);
        self
    }
    pub fn ca_ratio(mut self, ratio: f64) -> Self {
        self.ca_ratio = Some(ratio);
        self
    }
    pub fn min_correspondences(mut self, count: usize) -> Self {
        self.min_correspondences = Some(count);
        self
    }
    pub fn calculate_deformation_gradients(mut self, enabled: bool) -> Self {
        self.output.deformation_gradients = enabled;
        self
    }
    pub fn calculate_strain_tensors(mut self, enabled: bool) -> Self {
        self.output.strain_tensors = enabled;
        self
    }
    pub fn push_forward(mut self, enabled: bool) -> Self {
        self.output.push_forward = enabled;
        self
    }
    pub fn orientation_tolerance_degrees(mut self, degrees: f64) -> Self {
        self.tolerances.orientation_degrees = degrees;
        self
    }
    pub fn min_normal_determinant(mut self, threshold: f64) -> Self {
        self.tolerances.min_normal_determinant = threshold;
        self
    }
    pub fn preferred_orientation(mut self, orientation: Matrix3<f64>) -> Self {
        self.preferred_orientations.push(orientation);
        self
    }

    pub fn build(self) -> Result<ElasticStrainConfig, ConfigError> {
        let family = self
            .lattice_family
            .ok_or(ConfigError::MissingParameter("lattice_family"))?;
        let config = ElasticStrainConfig {
            lattice: LatticeConfig {
                family,
                lattice_constant: self
                    .lattice_constant
                    .ok_or(ConfigError::MissingParameter("lattice_constant"))?,
                ca_ratio: self.ca_ratio.unwrap_or_else(|| family.default_ca_ratio()),
            },
            min_correspondences: self.min_correspondences,
            output: self.output,
            tolerances: self.tolerances,
            preferred_orientations: if self.preferred_orientations.is_empty() {
                vec![Matrix3::identity()]
            } else {
                self.preferred_orientations
            },
        };
        config.validate()?;
        Ok(config)
    }
}
