use crate::core::utils::geometry::rotation_angle;
use nalgebra::{Matrix3, Vector3};

const MATCH_TOLERANCE: f64 = 1e-6;

/// A finite group of proper rotations with precomputed composition and inverse tables.
///
/// Operation `0` is always the identity. Operation indices are stable for the
/// lifetime of the group, so they can be stored per atom and per cluster as
/// compact symmetry branches.
#[derive(Debug, Clone)]
pub struct SymmetryGroup {
    operations: Vec<Matrix3<f64>>,
    /// `product[a * n + b]` is the index of `operations[a] * operations[b]`.
    product: Vec<usize>,
    inverse: Vec<usize>,
}

impl SymmetryGroup {
    /// Collects every proper rotation that maps `vectors` onto itself.
    ///
    /// The candidate rotations are enumerated from all images of a
    /// non-coplanar reference triple, so the search is exhaustive for any
    /// vector set that spans three dimensions.
    pub fn from_invariant_vectors(vectors: &[Vector3<f64>]) -> Self {
        let mut operations = vec![Matrix3::identity()];

        if let Some((basis, indices)) = reference_triple(vectors) {
            if let Some(basis_inverse) = basis.try_inverse() {
                let v = |k: usize| &vectors[indices[k]];
                for w0 in vectors.iter().filter(|w| same_length(w, v(0))) {
                    for w1 in vectors.iter().filter(|w| {
                        same_length(w, v(1)) && close(w.dot(w0), v(1).dot(v(0)))
                    }) {
                        for w2 in vectors.iter().filter(|w| {
                            same_length(w, v(2))
                                && close(w.dot(w0), v(2).dot(v(0)))
                                && close(w.dot(w1), v(2).dot(v(1)))
                        }) {
                            let image = Matrix3::from_columns(&[*w0, *w1, *w2]);
                            let candidate = image * basis_inverse;
                            if is_new_rotation(&candidate, &operations)
                                && maps_set_onto_itself(&candidate, vectors)
                            {
                                operations.push(candidate);
                            }
                        }
                    }
                }
            }
        }

        Self::from_operations(operations)
    }

    fn from_operations(operations: Vec<Matrix3<f64>>) -> Self {
        let n = operations.len();
        let find = |m: &Matrix3<f64>| {
            operations
                .iter()
                .position(|op| (op - m).amax() < MATCH_TOLERANCE)
        };

        let mut product = Vec::with_capacity(n * n);
        for a in &operations {
            for b in &operations {
                // Closure under multiplication holds for any complete search result.
                product.push(find(&(a * b)).unwrap_or(0));
            }
        }
        let inverse = operations
            .iter()
            .map(|op| find(&op.transpose()).unwrap_or(0))
            .collect();

        Self {
            operations,
            product,
            inverse,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[Matrix3<f64>] {
        &self.operations
    }

    pub fn operation(&self, index: usize) -> &Matrix3<f64> {
        &self.operations[index]
    }

    /// Index of `operations[a] * operations[b]`.
    #[inline]
    pub fn compose(&self, a: usize, b: usize) -> usize {
        self.product[a * self.operations.len() + b]
    }

    #[inline]
    pub fn inverse(&self, a: usize) -> usize {
        self.inverse[a]
    }

    /// Finds the operation `S` that best explains `relative ≈ S`, returning its
    /// index and the residual rotation angle `angle(Sᵀ · relative)` in radians.
    ///
    /// Ties are broken by the lowest operation index.
    pub fn closest(&self, relative: &Matrix3<f64>) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (index, op) in self.operations.iter().enumerate() {
            let residual = rotation_angle(&(op.transpose() * relative));
            if residual < best.1 {
                best = (index, residual);
            }
        }
        best
    }

    /// Finds the operation `S` minimizing `angle(m · S)`, i.e. the symmetry
    /// equivalent of `m` with the smallest rotation angle.
    pub fn reduce(&self, m: &Matrix3<f64>) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (index, op) in self.operations.iter().enumerate() {
            let angle = rotation_angle(&(m * op));
            if angle < best.1 {
                best = (index, angle);
            }
        }
        best
    }
}

fn reference_triple(vectors: &[Vector3<f64>]) -> Option<(Matrix3<f64>, [usize; 3])> {
    let first = vectors.iter().position(|v| v.norm() > MATCH_TOLERANCE)?;
    let second = vectors
        .iter()
        .position(|v| v.cross(&vectors[first]).norm() > MATCH_TOLERANCE)?;
    let third = vectors.iter().position(|v| {
        vectors[first].cross(&vectors[second]).dot(v).abs() > MATCH_TOLERANCE
    })?;
    let basis = Matrix3::from_columns(&[vectors[first], vectors[second], vectors[third]]);
    Some((basis, [first, second, third]))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < MATCH_TOLERANCE
}

fn same_length(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    close(a.norm(), b.norm())
}

fn is_new_rotation(candidate: &Matrix3<f64>, known: &[Matrix3<f64>]) -> bool {
    let orthogonal = (candidate.transpose() * candidate - Matrix3::identity()).amax() < MATCH_TOLERANCE;
    orthogonal
        && candidate.determinant() > 0.0
        && known.iter().all(|op| (op - candidate).amax() >= MATCH_TOLERANCE)
}

fn maps_set_onto_itself(rotation: &Matrix3<f64>, vectors: &[Vector3<f64>]) -> bool {
    vectors.iter().all(|v| {
        let image = rotation * v;
        vectors.iter().any(|w| (w - image).amax() < MATCH_TOLERANCE)
    })
}
