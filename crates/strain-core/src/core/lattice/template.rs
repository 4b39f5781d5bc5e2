use super::family::{LatticeError, LatticeFamily};
use super::symmetry::SymmetryGroup;
use nalgebra::Vector3;

/// An ideal reference lattice: the ordered neighbor template and the proper
/// rotations of the lattice point group.
///
/// Template vectors are Cartesian and already scaled by the lattice constant
/// (and by the c/a ratio along `z` for hexagonal families). The slot order is
/// the order in which structure identification reports correspondences.
#[derive(Debug, Clone)]
pub struct ReferenceLattice {
    family: LatticeFamily,
    lattice_constant: f64,
    ca_ratio: f64,
    template: Vec<Vector3<f64>>,
    symmetry: SymmetryGroup,
}

impl ReferenceLattice {
    /// Builds the reference lattice for `family`.
    ///
    /// For cubic families `lattice_constant` is the cubic cell edge. For
    /// hexagonal families it is the basal lattice parameter `a` and the axial
    /// length is `c = ca_ratio * a`; `ca_ratio` is validated but otherwise
    /// ignored for cubic families.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError`] for non-positive or non-finite scale parameters.
    pub fn new(
        family: LatticeFamily,
        lattice_constant: f64,
        ca_ratio: f64,
    ) -> Result<Self, LatticeError> {
        if !(lattice_constant.is_finite() && lattice_constant > 0.0) {
            return Err(LatticeError::InvalidLatticeConstant(lattice_constant));
        }
        if !(ca_ratio.is_finite() && ca_ratio > 0.0) {
            return Err(LatticeError::InvalidAxialRatio(ca_ratio));
        }

        let a = lattice_constant;
        let c = ca_ratio * a;
        let template = match family {
            LatticeFamily::Sc => sc_template(a),
            LatticeFamily::Fcc => fcc_template(a),
            LatticeFamily::Bcc => bcc_template(a),
            LatticeFamily::CubicDiamond => cubic_diamond_template(a),
            LatticeFamily::Hcp => hcp_template(a, c),
            LatticeFamily::HexDiamond => hex_diamond_template(a, c),
        };
        let symmetry = SymmetryGroup::from_invariant_vectors(&point_group_generators(family));

        Ok(Self {
            family,
            lattice_constant,
            ca_ratio: if family.is_hexagonal() { ca_ratio } else { 1.0 },
            template,
            symmetry,
        })
    }

    pub fn family(&self) -> LatticeFamily {
        self.family
    }

    pub fn lattice_constant(&self) -> f64 {
        self.lattice_constant
    }

    pub fn ca_ratio(&self) -> f64 {
        self.ca_ratio
    }

    pub fn template(&self) -> &[Vector3<f64>] {
        &self.template
    }

    pub fn vector(&self, slot: usize) -> Option<&Vector3<f64>> {
        self.template.get(slot)
    }

    /// Number of template slots, i.e. the full neighbor-shell count.
    pub fn neighbor_count(&self) -> usize {
        self.template.len()
    }

    pub fn symmetry(&self) -> &SymmetryGroup {
        &self.symmetry
    }

    pub fn nearest_neighbor_distance(&self) -> f64 {
        self.template
            .iter()
            .map(|v| v.norm())
            .fold(f64::INFINITY, f64::min)
    }
}

/// Vectors whose symmetry is the lattice point group: the cube axes for cubic
/// families, the basal hexagon plus the `c` axis for hexagonal families.
fn point_group_generators(family: LatticeFamily) -> Vec<Vector3<f64>> {
    if family.is_hexagonal() {
        let mut vectors: Vec<_> = (0..6)
            .map(|k| {
                let phi = (60.0 * k as f64).to_radians();
                Vector3::new(phi.cos(), phi.sin(), 0.0)
            })
            .collect();
        vectors.push(Vector3::z());
        vectors.push(-Vector3::z());
        vectors
    } else {
        sc_template(1.0)
    }
}

fn sc_template(a: f64) -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(a, 0.0, 0.0),
        Vector3::new(-a, 0.0, 0.0),
        Vector3::new(0.0, a, 0.0),
        Vector3::new(0.0, -a, 0.0),
        Vector3::new(0.0, 0.0, a),
        Vector3::new(0.0, 0.0, -a),
    ]
}

fn fcc_template(a: f64) -> Vec<Vector3<f64>> {
    let h = 0.5 * a;
    vec![
        Vector3::new(h, h, 0.0),
        Vector3::new(h, -h, 0.0),
        Vector3::new(-h, h, 0.0),
        Vector3::new(-h, -h, 0.0),
        Vector3::new(h, 0.0, h),
        Vector3::new(h, 0.0, -h),
        Vector3::new(-h, 0.0, h),
        Vector3::new(-h, 0.0, -h),
        Vector3::new(0.0, h, h),
        Vector3::new(0.0, h, -h),
        Vector3::new(0.0, -h, h),
        Vector3::new(0.0, -h, -h),
    ]
}

fn bcc_template(a: f64) -> Vec<Vector3<f64>> {
    let h = 0.5 * a;
    let mut vectors = Vec::with_capacity(14);
    for sx in [1.0, -1.0] {
        for sy in [1.0, -1.0] {
            for sz in [1.0, -1.0] {
                vectors.push(Vector3::new(sx * h, sy * h, sz * h));
            }
        }
    }
    vectors.extend(sc_template(a));
    vectors
}

fn cubic_diamond_template(a: f64) -> Vec<Vector3<f64>> {
    let q = 0.25 * a;
    let mut vectors = vec![
        Vector3::new(q, q, q),
        Vector3::new(q, -q, -q),
        Vector3::new(-q, q, -q),
        Vector3::new(-q, -q, q),
    ];
    vectors.extend(fcc_template(a));
    vectors
}

/// The three in-plane offsets of the out-of-plane neighbors of an `A`-layer atom.
fn stacking_offsets(a: f64) -> [Vector3<f64>; 3] {
    let s3 = 3.0f64.sqrt();
    [
        Vector3::new(0.5 * a, 0.5 * a / s3, 0.0),
        Vector3::new(-0.5 * a, 0.5 * a / s3, 0.0),
        Vector3::new(0.0, -a / s3, 0.0),
    ]
}

fn hcp_template(a: f64, c: f64) -> Vec<Vector3<f64>> {
    let mut vectors: Vec<_> = (0..6)
        .map(|k| {
            let phi = (60.0 * k as f64).to_radians();
            Vector3::new(a * phi.cos(), a * phi.sin(), 0.0)
        })
        .collect();
    let offsets = stacking_offsets(a);
    vectors.extend(offsets.iter().map(|p| p + Vector3::new(0.0, 0.0, 0.5 * c)));
    vectors.extend(offsets.iter().map(|p| p - Vector3::new(0.0, 0.0, 0.5 * c)));
    vectors
}

/// Axial bond along `+c`, three oblique bonds below, then the hcp-like second shell.
fn hex_diamond_template(a: f64, c: f64) -> Vec<Vector3<f64>> {
    let mut vectors = vec![Vector3::new(0.0, 0.0, 0.375 * c)];
    vectors.extend(
        stacking_offsets(a)
            .iter()
            .map(|p| p - Vector3::new(0.0, 0.0, 0.125 * c)),
    );
    vectors.extend(hcp_template(a, c));
    vectors
}
