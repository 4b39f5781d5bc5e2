//! Strain measures derived from a deformation gradient `F`.

use crate::core::utils::geometry::is_finite_matrix;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Configuration in which a strain tensor is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrainFrame {
    /// Undeformed (Lagrangian) frame: Green–Lagrange strain.
    Reference,
    /// Deformed (Eulerian) frame: Euler–Almansi strain.
    Spatial,
}

/// A symmetric strain tensor tagged with the frame it lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainTensor {
    pub tensor: Matrix3<f64>,
    pub frame: StrainFrame,
}

impl StrainTensor {
    /// Components in Voigt order `xx, yy, zz, yz, xz, xy`.
    pub fn voigt(&self) -> [f64; 6] {
        let t = &self.tensor;
        [
            t[(0, 0)],
            t[(1, 1)],
            t[(2, 2)],
            t[(1, 2)],
            t[(0, 2)],
            t[(0, 1)],
        ]
    }

    /// Von Mises equivalent shear strain.
    pub fn shear_invariant(&self) -> f64 {
        let [xx, yy, zz, yz, xz, xy] = self.voigt();
        (xy * xy
            + xz * xz
            + yz * yz
            + ((xx - yy).powi(2) + (yy - zz).powi(2) + (zz - xx).powi(2)) / 6.0)
            .sqrt()
    }
}

fn symmetrized(m: &Matrix3<f64>) -> Matrix3<f64> {
    (m + m.transpose()) * 0.5
}

/// Green–Lagrange strain `E = ½(FᵀF − I)`.
pub fn green_lagrange(f: &Matrix3<f64>) -> Matrix3<f64> {
    symmetrized(&((f.transpose() * f - Matrix3::identity()) * 0.5))
}

/// Pushes a reference-frame tensor forward into the deformed frame,
/// `F⁻ᵀ E F⁻¹`. Returns `None` if `F` cannot be inverted to finite values.
pub fn push_forward(reference: &Matrix3<f64>, f: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let f_inv = f.try_inverse().filter(is_finite_matrix)?;
    let spatial = symmetrized(&(f_inv.transpose() * reference * f_inv));
    is_finite_matrix(&spatial).then_some(spatial)
}

/// Pulls a spatial-frame tensor back into the reference frame, `Fᵀ e F`.
pub fn pull_back(spatial: &Matrix3<f64>, f: &Matrix3<f64>) -> Matrix3<f64> {
    symmetrized(&(f.transpose() * spatial * f))
}

/// Euler–Almansi strain `e = ½(I − (F Fᵀ)⁻¹)`, computed as the push-forward of
/// the Green–Lagrange strain.
pub fn euler_almansi(f: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    push_forward(&green_lagrange(f), f)
}

/// Signed local volume change `det(F) − 1`.
pub fn volumetric_strain(f: &Matrix3<f64>) -> f64 {
    f.determinant() - 1.0
}

/// Strain tensor of `f` in the requested frame.
pub fn derive(f: &Matrix3<f64>, push_forward: bool) -> Option<StrainTensor> {
    if push_forward {
        euler_almansi(f).map(|tensor| StrainTensor {
            tensor,
            frame: StrainFrame::Spatial,
        })
    } else {
        let tensor = green_lagrange(f);
        is_finite_matrix(&tensor).then_some(StrainTensor {
            tensor,
            frame: StrainFrame::Reference,
        })
    }
}
