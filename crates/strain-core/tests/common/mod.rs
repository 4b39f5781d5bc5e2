#![allow(dead_code)]

use elastrain::core::lattice::{LatticeFamily, ReferenceLattice};
use elastrain::core::models::builder::CrystalBuilder;
use elastrain::core::models::frame::Frame;
use elastrain::engine::config::{ElasticStrainConfig, ElasticStrainConfigBuilder};
use elastrain::engine::progress::ProgressReporter;
use elastrain::workflows::elastic_strain::{self, ElasticStrainResult};
use nalgebra::Matrix3;

pub const BCC_IRON: f64 = 2.87;

pub fn config(family: LatticeFamily, lattice_constant: f64) -> ElasticStrainConfig {
    ElasticStrainConfigBuilder::new()
        .lattice_family(family)
        .lattice_constant(lattice_constant)
        .build()
        .unwrap()
}

pub fn lattice(config: &ElasticStrainConfig) -> ReferenceLattice {
    config.validate().unwrap()
}

pub fn perfect_crystal(config: &ElasticStrainConfig, repeats: [usize; 3]) -> Frame {
    CrystalBuilder::new(&lattice(config), repeats).build().unwrap()
}

pub fn analyze(frame: &Frame, config: &ElasticStrainConfig) -> ElasticStrainResult {
    elastic_strain::run(frame, config, &ProgressReporter::new()).unwrap()
}

pub fn assert_matrix_close(actual: &Matrix3<f64>, expected: &Matrix3<f64>, tolerance: f64) {
    let deviation = (actual - expected).amax();
    assert!(
        deviation < tolerance,
        "matrices differ by {deviation:e} (tolerance {tolerance:e}):\nactual {actual}\nexpected {expected}"
    );
}

/// Every reported number is finite; undefined values are `None`, never NaN.
pub fn assert_all_finite(result: &ElasticStrainResult) {
    if let Some(gradients) = &result.deformation_gradients {
        for f in gradients.iter().flatten() {
            assert!(f.iter().all(|v| v.is_finite()));
        }
    }
    if let Some(tensors) = &result.strain_tensors {
        for t in tensors.iter().flatten() {
            assert!(t.tensor.iter().all(|v| v.is_finite()));
        }
    }
    for v in result.volumetric_strains.iter().flatten() {
        assert!(v.is_finite());
    }
}

pub fn fitted_gradients(result: &ElasticStrainResult) -> Vec<(usize, Matrix3<f64>)> {
    result
        .deformation_gradients
        .as_ref()
        .unwrap()
        .iter()
        .enumerate()
        .filter_map(|(atom, f)| f.map(|f| (atom, f)))
        .collect()
}
