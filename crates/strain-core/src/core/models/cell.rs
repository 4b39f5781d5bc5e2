use super::frame::FrameError;
use nalgebra::{Matrix3, Point3, Vector3};

/// Parallelepiped simulation cell with per-axis periodic boundary flags.
///
/// The cell vectors are the columns of `matrix`. Only periodic axes take part
/// in minimum-image folding and point wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationCell {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
    origin: Point3<f64>,
    pbc: [bool; 3],
}

impl SimulationCell {
    /// Creates a cell from its column-vector matrix.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NonFiniteCell`] for NaN/infinite entries and
    /// [`FrameError::SingularCell`] when the cell vectors are (nearly) linearly
    /// dependent.
    pub fn new(
        matrix: Matrix3<f64>,
        origin: Point3<f64>,
        pbc: [bool; 3],
    ) -> Result<Self, FrameError> {
        if !matrix.iter().chain(origin.coords.iter()).all(|v| v.is_finite()) {
            return Err(FrameError::NonFiniteCell);
        }

        let volume = matrix.determinant().abs();
        let scale: f64 = matrix.column_iter().map(|c| c.norm()).product();
        if scale == 0.0 || volume <= 1e-10 * scale {
            return Err(FrameError::SingularCell { volume });
        }
        let inverse = matrix
            .try_inverse()
            .ok_or(FrameError::SingularCell { volume })?;

        Ok(Self {
            matrix,
            inverse,
            origin,
            pbc,
        })
    }

    /// Axis-aligned box with edge lengths `lengths`, periodic along every axis.
    pub fn orthorhombic(lengths: Vector3<f64>) -> Result<Self, FrameError> {
        Self::new(
            Matrix3::from_diagonal(&lengths),
            Point3::origin(),
            [true; 3],
        )
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    /// Shortest periodic image of `vector`, reduced along periodic axes only.
    pub fn minimum_image(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        let mut fractional = self.inverse * vector;
        for axis in 0..3 {
            if self.pbc[axis] {
                fractional[axis] -= fractional[axis].round();
            }
        }
        self.matrix * fractional
    }

    /// Periodic image of `raw` that lies closest to `expected`.
    ///
    /// This is the minimum image of the deviation from the expected bond
    /// vector, which stays unambiguous in cells only a couple of neighbor
    /// shells wide where the plain minimum image of `raw` may not be.
    pub fn nearest_image(&self, raw: &Vector3<f64>, expected: &Vector3<f64>) -> Vector3<f64> {
        expected + self.minimum_image(&(raw - expected))
    }
}
