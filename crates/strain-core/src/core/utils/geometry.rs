use nalgebra::{Matrix3, Rotation3, Unit, Vector3};

const ORTHONORMAL_TOLERANCE: f64 = 1e-2;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians()).into_inner()
}

/// Rotation angle in radians of a (near-)rotation matrix.
///
/// Uses both the trace and the antisymmetric part so that small angles keep
/// full precision.
pub fn rotation_angle(m: &Matrix3<f64>) -> f64 {
    let axial = Vector3::new(
        m[(2, 1)] - m[(1, 2)],
        m[(0, 2)] - m[(2, 0)],
        m[(1, 0)] - m[(0, 1)],
    );
    (0.5 * axial.norm()).atan2(0.5 * (m.trace() - 1.0))
}

/// Misorientation angle in radians between two orientations, `angle(aᵀ b)`.
pub fn misorientation_angle(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
    rotation_angle(&(a.transpose() * b))
}

/// Unit rotation axis of `m`, or `None` when the rotation is (near) the identity.
pub fn rotation_axis(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    Rotation3::from_matrix_unchecked(*m)
        .axis_angle()
        .map(|(axis, _)| axis.into_inner())
}

/// Closest proper rotation to `m` (polar factor via SVD).
///
/// Returns `None` for degenerate input, e.g. a zero matrix from cancelling sums.
pub fn orthonormalize(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    if !m.iter().all(|v| v.is_finite()) || m.norm() < f64::EPSILON {
        return None;
    }
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut u_flipped = u;
        let mut column = u_flipped.column_mut(2);
        column.neg_mut();
        rotation = u_flipped * v_t;
    }
    Some(rotation)
}

/// Checks that `m` is a proper rotation to within a loose tolerance suited to
/// orientations reported by structure identification.
pub fn is_proper_rotation(m: &Matrix3<f64>) -> bool {
    if !m.iter().all(|v| v.is_finite()) {
        return false;
    }
    let deviation = (m.transpose() * m - Matrix3::identity()).abs().max();
    deviation < ORTHONORMAL_TOLERANCE && (m.determinant() - 1.0).abs() < ORTHONORMAL_TOLERANCE
}

pub fn is_finite_matrix(m: &Matrix3<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_angle_recovers_axis_angle_input() {
        let r = rotation_from_axis_angle(&Vector3::new(1.0, 1.0, 0.0), 37.0);
        assert!((rotation_angle(&r).to_degrees() - 37.0).abs() < 1e-9);
        assert!(rotation_angle(&Matrix3::identity()).abs() < 1e-12);
    }

    #[test]
    fn misorientation_angle_is_symmetric() {
        let a = rotation_from_axis_angle(&Vector3::z(), 10.0);
        let b = rotation_from_axis_angle(&Vector3::z(), 40.0);
        assert!((misorientation_angle(&a, &b).to_degrees() - 30.0).abs() < 1e-9);
        assert!((misorientation_angle(&b, &a).to_degrees() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_axis_is_none_for_identity() {
        assert!(rotation_axis(&Matrix3::identity()).is_none());
        let axis = rotation_axis(&rotation_from_axis_angle(&Vector3::y(), 25.0)).unwrap();
        assert!((axis - Vector3::y()).norm() < 1e-9);
    }

    #[test]
    fn orthonormalize_projects_scaled_rotation_back_onto_rotation() {
        let r = rotation_from_axis_angle(&Vector3::new(0.3, -0.2, 0.9), 52.0);
        let projected = orthonormalize(&(r * 3.5)).unwrap();
        assert!((projected - r).norm() < 1e-9);
        assert!((projected.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthonormalize_rejects_zero_matrix() {
        assert!(orthonormalize(&Matrix3::zeros()).is_none());
    }

    #[test]
    fn is_proper_rotation_rejects_reflections_and_stretches() {
        assert!(is_proper_rotation(&Matrix3::identity()));
        assert!(!is_proper_rotation(&Matrix3::from_diagonal(&Vector3::new(
            1.0, 1.0, -1.0
        ))));
        assert!(!is_proper_rotation(&(Matrix3::identity() * 1.1)));
        assert!(!is_proper_rotation(&Matrix3::from_element(f64::NAN)));
    }
}
