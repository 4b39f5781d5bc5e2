//! End-to-end scenarios for the elastic strain workflow on synthetic crystals.

mod common;

use common::*;
use elastrain::core::lattice::{LatticeFamily, StructureType};
use elastrain::core::models::builder::CrystalBuilder;
use elastrain::core::models::frame::{FrameError, NeighborMatch};
use elastrain::core::strain::{self, StrainFrame};
use elastrain::core::utils::geometry::rotation_from_axis_angle;
use elastrain::engine::cancel::CancellationToken;
use elastrain::engine::config::{ConfigError, ElasticStrainConfigBuilder};
use elastrain::engine::error::EngineError;
use elastrain::engine::progress::{Progress, ProgressReporter};
use elastrain::engine::tasks::deformation_fit::FitFailure;
use elastrain::workflows::elastic_strain;
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::BTreeSet;
use std::sync::Mutex;

#[test]
fn perfect_bcc_crystal_has_zero_strain_everywhere() {
    let config = config(LatticeFamily::Bcc, 1.63);
    let frame = perfect_crystal(&config, [4, 4, 4]);
    let result = analyze(&frame, &config);

    assert_eq!(result.statistics.atoms_total, 128);
    assert_eq!(result.statistics.atoms_fitted, 128);
    assert_eq!(result.statistics.clusters, 1);
    assert_eq!(result.statistics.transitions, 0);
    assert!((result.statistics.coverage() - 1.0).abs() < 1e-12);

    let cluster = &result.cluster_graph.clusters()[0];
    assert_eq!(cluster.size(), 128);
    assert_matrix_close(&cluster.orientation, &Matrix3::identity(), 1e-9);

    for (_, f) in fitted_gradients(&result) {
        assert_matrix_close(&f, &Matrix3::identity(), 1e-9);
    }
    for tensor in result.strain_tensors.as_ref().unwrap().iter() {
        let tensor = tensor.unwrap();
        assert_eq!(tensor.frame, StrainFrame::Reference);
        assert!(tensor.tensor.amax() < 1e-9);
    }
    assert!(result.statistics.mean_volumetric_strain.unwrap().abs() < 1e-9);
}

#[test]
fn every_family_recognizes_its_own_perfect_crystal() {
    for family in LatticeFamily::ALL {
        let config = config(family, 2.5);
        let frame = perfect_crystal(&config, [3, 3, 3]);
        let result = analyze(&frame, &config);

        assert_eq!(result.statistics.clusters, 1, "{family}");
        assert_eq!(result.statistics.atoms_fitted, frame.len(), "{family}");
        assert_eq!(result.statistics.bonds.inconsistent, 0, "{family}");
        for (atom, f) in fitted_gradients(&result) {
            assert!(
                (f - Matrix3::identity()).amax() < 1e-9,
                "{family} atom {atom}: {f}"
            );
        }
    }
}

#[test]
fn uniform_expansion_gives_expected_volumetric_strain() {
    let config = config(LatticeFamily::Bcc, 1.63);
    let lattice = lattice(&config);
    let frame = CrystalBuilder::new(&lattice, [3, 3, 3])
        .deformation(Matrix3::identity() * 1.01)
        .build()
        .unwrap();
    let result = analyze(&frame, &config);

    let expected = 1.01f64.powi(3) - 1.0;
    assert_eq!(result.statistics.atoms_fitted, frame.len());
    for v in result.volumetric_strains.iter() {
        assert!((v.unwrap() - 0.030301).abs() < 1e-9);
    }
    assert!((result.statistics.mean_volumetric_strain.unwrap() - expected).abs() < 1e-9);

    let green = 0.5 * (1.01f64 * 1.01 - 1.0);
    for tensor in result.strain_tensors.as_ref().unwrap().iter().flatten() {
        assert_matrix_close(&tensor.tensor, &(Matrix3::identity() * green), 1e-9);
    }
}

#[test]
fn recovers_general_deformation_of_a_rotated_crystal() {
    let config = config(LatticeFamily::Fcc, 3.6);
    let lattice = lattice(&config);
    let rotation = rotation_from_axis_angle(&Vector3::new(1.0, 2.0, 3.0), 17.0);
    let applied = Matrix3::new(1.02, 0.01, -0.005, 0.0, 0.98, 0.015, 0.01, -0.02, 1.03);
    let frame = CrystalBuilder::new(&lattice, [3, 3, 3])
        .orientation(rotation)
        .deformation(applied)
        .build()
        .unwrap();
    let result = analyze(&frame, &config);

    assert_eq!(result.statistics.clusters, 1);
    assert_matrix_close(&result.cluster_graph.clusters()[0].orientation, &rotation, 1e-9);
    assert_eq!(result.statistics.atoms_fitted, frame.len());
    for (_, f) in fitted_gradients(&result) {
        assert_matrix_close(&f, &applied, 1e-9);
    }
    let expected = applied.determinant() - 1.0;
    for v in result.volumetric_strains.iter().flatten() {
        assert!((v - expected).abs() < 1e-9);
    }
}

#[test]
fn two_atom_periodic_cell_folds_bonds_to_the_right_images() {
    let config = config(LatticeFamily::Bcc, 2.0);
    let frame = perfect_crystal(&config, [1, 1, 1]);
    assert_eq!(frame.len(), 2);
    // Eight first-shell entries point at the other atom, six second-shell
    // entries at periodic images of the atom itself.
    assert!(frame.atoms().iter().all(|a| a.neighbors.len() == 14));
    for (atom, record) in frame.atoms().iter().enumerate() {
        let to_self = record.neighbors.iter().filter(|m| m.neighbor == atom).count();
        assert_eq!(to_self, 6);
    }

    let result = analyze(&frame, &config);
    assert_eq!(result.statistics.clusters, 1);
    assert_eq!(result.statistics.bonds.examined, 8);
    assert_eq!(result.statistics.atoms_fitted, 2);
    for (_, f) in fitted_gradients(&result) {
        assert_matrix_close(&f, &Matrix3::identity(), 1e-9);
    }
}

#[test]
fn twisted_grains_form_two_clusters_joined_by_one_transition() {
    let config = config(LatticeFamily::Bcc, 1.63);
    let lattice = lattice(&config);
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

    let mut frame = grain_a.clone();
    frame.append(grain_b.atoms().to_vec());
    let a = grain_a.len() - 1;
    let b = grain_a.len();

    let free_slot = |atom: usize| -> usize {
        let used: BTreeSet<usize> = frame.atoms()[atom].neighbors.iter().map(|m| m.slot).collect();
        (0..lattice.neighbor_count()).find(|s| !used.contains(s)).unwrap()
    };
    let (slot_a, slot_b) = (free_slot(a), free_slot(b));
    frame.atom_mut(a).unwrap().neighbors.push(NeighborMatch::new(b, slot_a));
    frame.atom_mut(b).unwrap().neighbors.push(NeighborMatch::new(a, slot_b));

    let result = analyze(&frame, &config);

    assert_eq!(result.statistics.clusters, 2);
    assert_eq!(result.statistics.crystalline_clusters, 2);
    assert_eq!(result.statistics.bonds.boundary, 1);
    assert_eq!(result.statistics.bonds.inconsistent, 0);

    let cluster_a = result.atom_clusters[0];
    let cluster_b = result.atom_clusters[b];
    assert_ne!(cluster_a, cluster_b);
    assert!(result.atom_clusters[..b].iter().all(|&c| c == cluster_a));
    assert!(result.atom_clusters[b..].iter().all(|&c| c == cluster_b));
    assert_matrix_close(
        &result.cluster_graph.cluster(cluster_b).unwrap().orientation,
        &twist,
        1e-9,
    );

    let transition = result
        .cluster_graph
        .transition_between(cluster_a, cluster_b)
        .unwrap();
    assert_eq!(transition.bond_count, 1);
    assert!((transition.disorientation_degrees() - 30.0).abs() < 1e-6);
    let axis = transition.disorientation_axis.unwrap();
    assert!((axis.z.abs() - 1.0).abs() < 1e-6);
    assert_matrix_close(&transition.rotation, &twist, 1e-9);

    // Only atoms with both neighbor shells inside their block are fitted:
    // 8 corner and 8 body-center sites per 4x4x4 block.
    assert_eq!(frame.len(), 256);
    assert_eq!(result.statistics.atoms_fitted, 32);
    assert_eq!(
        result.statistics.failures.get(FitFailure::InsufficientCorrespondences),
        frame.len() - 32
    );
    for (_, f) in fitted_gradients(&result) {
        assert_matrix_close(&f, &Matrix3::identity(), 1e-9);
    }
}

#[test]
fn truncated_correspondences_leave_the_atom_undefined_without_nan() {
    let config = config(LatticeFamily::Bcc, 2.0);
    let mut frame = perfect_crystal(&config, [3, 3, 3]);
    frame.atom_mut(0).unwrap().neighbors.truncate(4);

    let result = analyze(&frame, &config);

    assert_eq!(
        result.fit_failures[0],
        Some(FitFailure::InsufficientCorrespondences)
    );
    assert!(result.deformation_gradients.as_ref().unwrap()[0].is_none());
    assert!(result.strain_tensors.as_ref().unwrap()[0].is_none());
    assert!(result.volumetric_strains[0].is_none());
    assert_eq!(result.statistics.atoms_fitted, frame.len() - 1);
    assert_eq!(result.statistics.atoms_excluded, 1);
    assert_all_finite(&result);
}

#[test]
fn coplanar_correspondences_are_ill_conditioned() {
    let config = ElasticStrainConfigBuilder::new()
        .lattice_family(LatticeFamily::Sc)
        .lattice_constant(2.0)
        .min_correspondences(3)
        .build()
        .unwrap();
    let lattice = lattice(&config);
    let mut frame = perfect_crystal(&config, [3, 3, 3]);
    let template = lattice.template().to_vec();
    frame
        .atom_mut(13)
        .unwrap()
        .neighbors
        .retain(|m| template[m.slot].z.abs() < 1e-9);
    assert_eq!(frame.atoms()[13].neighbors.len(), 4);

    let result = analyze(&frame, &config);
    assert_eq!(result.fit_failures[13], Some(FitFailure::IllConditioned));
    assert_eq!(result.statistics.failures.ill_conditioned, 1);
    assert_all_finite(&result);
}

#[test]
fn unidentified_atoms_are_reported_as_not_crystalline() {
    let config = config(LatticeFamily::Sc, 2.0);
    let mut frame = perfect_crystal(&config, [3, 3, 3]);
    frame.atom_mut(5).unwrap().structure_type = StructureType::Other;

    let result = analyze(&frame, &config);
    assert_eq!(result.fit_failures[5], Some(FitFailure::NotCrystalline));
    assert_eq!(result.statistics.failures.not_crystalline, 1);
    assert_eq!(result.statistics.atoms_fitted, 26);
    assert_eq!(result.statistics.clusters, 2);
    assert_eq!(result.statistics.crystalline_clusters, 1);
    assert!(!result.cluster_graph.clusters()[result.atom_clusters[5].index()].is_crystalline());
}

#[test]
fn push_forward_reports_euler_almansi_strain() {
    let mut config = config(LatticeFamily::Fcc, 3.6);
    config.output.push_forward = true;
    let lattice = lattice(&config);
    let applied = Matrix3::new(1.03, 0.02, 0.0, 0.0, 0.99, 0.01, 0.0, 0.0, 1.0);
    let frame = CrystalBuilder::new(&lattice, [3, 3, 3])
        .deformation(applied)
        .build()
        .unwrap();
    let result = analyze(&frame, &config);

    let expected = strain::euler_almansi(&applied).unwrap();
    let gradients = result.deformation_gradients.as_ref().unwrap();
    for (atom, tensor) in result.strain_tensors.as_ref().unwrap().iter().enumerate() {
        let tensor = tensor.unwrap();
        assert_eq!(tensor.frame, StrainFrame::Spatial);
        assert_matrix_close(&tensor.tensor, &expected, 1e-9);

        let f = gradients[atom].unwrap();
        assert_matrix_close(
            &strain::pull_back(&tensor.tensor, &f),
            &strain::green_lagrange(&f),
            1e-9,
        );
    }
}

#[test]
fn disabled_outputs_are_absent_but_volumetric_strain_remains() {
    let config = ElasticStrainConfigBuilder::new()
        .lattice_family(LatticeFamily::Bcc)
        .lattice_constant(BCC_IRON)
        .calculate_deformation_gradients(false)
        .calculate_strain_tensors(false)
        .build()
        .unwrap();
    let frame = perfect_crystal(&config, [2, 2, 2]);
    let result = analyze(&frame, &config);

    assert!(result.deformation_gradients.is_none());
    assert!(result.strain_tensors.is_none());
    assert!(result.volumetric_strains.iter().all(|v| v.is_some()));
}

#[test]
fn results_do_not_depend_on_thread_count() {
    let config = config(LatticeFamily::Hcp, 3.2);
    let lattice = lattice(&config);
    let mut frame = CrystalBuilder::new(&lattice, [6, 6, 4])
        .deformation(Matrix3::new(1.01, 0.002, 0.0, 0.0, 0.995, 0.0, 0.003, 0.0, 1.0))
        .build()
        .unwrap();
    for (atom, axis, degrees) in [
        (7, Vector3::x(), 12.0),
        (90, Vector3::y(), 3.0),
        (211, Vector3::new(1.0, 1.0, 1.0), 40.0),
    ] {
        let tilted = rotation_from_axis_angle(&axis, degrees) * frame.atoms()[atom].orientation;
        frame.atom_mut(atom).unwrap().orientation = tilted;
    }

    let run_with_threads = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| analyze(&frame, &config))
    };
    let serial = run_with_threads(1);
    let parallel = run_with_threads(8);

    assert_eq!(serial.atom_clusters, parallel.atom_clusters);
    assert_eq!(serial.atom_branches, parallel.atom_branches);
    let orientations = |result: &elastic_strain::ElasticStrainResult| {
        result
            .cluster_graph
            .clusters()
            .iter()
            .map(|c| c.orientation)
            .collect::<Vec<_>>()
    };
    assert_eq!(orientations(&serial), orientations(&parallel));
    assert_eq!(serial.deformation_gradients, parallel.deformation_gradients);
    assert_eq!(serial.strain_tensors, parallel.strain_tensors);
    assert_eq!(serial.volumetric_strains, parallel.volumetric_strains);
    assert_eq!(serial.fit_failures, parallel.fit_failures);
    assert_eq!(serial.statistics, parallel.statistics);
    assert!(serial.statistics.clusters > 1);
}

#[test]
fn phases_are_reported_in_order() {
    let config = config(LatticeFamily::Bcc, BCC_IRON);
    let frame = perfect_crystal(&config, [2, 2, 2]);
    let phases = Mutex::new(Vec::new());
    let reporter = ProgressReporter::with_callback(Box::new(|event| {
        if let Progress::PhaseStart { name } = event {
            phases.lock().unwrap().push(name);
        }
    }));

    elastic_strain::run(&frame, &config, &reporter).unwrap();
    drop(reporter);
    assert_eq!(
        phases.into_inner().unwrap(),
        vec![
            "Preparation",
            "Bond Consistency",
            "Cluster Graph",
            "Deformation Fit",
            "Strain Derivation"
        ]
    );
}

#[test]
fn cancelled_run_returns_cancelled_error() {
    let config = config(LatticeFamily::Bcc, BCC_IRON);
    let frame = perfect_crystal(&config, [3, 3, 3]);
    let token = CancellationToken::new();
    token.cancel();

    let result =
        elastic_strain::run_with_cancellation(&frame, &config, &ProgressReporter::new(), &token);
    assert!(matches!(result, Err(EngineError::Cancelled { .. })));
}

#[test]
fn invalid_inputs_are_rejected_before_analysis() {
    assert_eq!(
        ElasticStrainConfigBuilder::new()
            .lattice_family(LatticeFamily::Fcc)
            .build()
            .unwrap_err(),
        ConfigError::MissingParameter("lattice_constant")
    );

    let config = config(LatticeFamily::Bcc, BCC_IRON);
    let mut frame = perfect_crystal(&config, [2, 2, 2]);
    frame.atom_mut(3).unwrap().orientation = Matrix3::identity() * 2.0;
    let result = elastic_strain::run(&frame, &config, &ProgressReporter::new());
    assert!(matches!(
        result,
        Err(EngineError::Frame {
            source: FrameError::InvalidOrientation { atom: 3 }
        })
    ));

    let mut broken = config.clone();
    broken.tolerances.orientation_degrees = -1.0;
    let result = elastic_strain::run(&frame, &broken, &ProgressReporter::new());
    assert!(matches!(result, Err(EngineError::Config { .. })));
}
