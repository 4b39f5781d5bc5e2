use super::cell::SimulationCell;
use super::frame::{AtomRecord, Frame, FrameError, NeighborMatch};
use crate::core::lattice::{ReferenceLattice, StructureType};
use itertools::iproduct;
use nalgebra::{Matrix3, Point3, Vector3};

const SITE_TOLERANCE: f64 = 1e-6;

/// Conventional unit cell: cell vectors as columns and the motif in
/// fractional coordinates.
struct UnitCell {
    basis: Matrix3<f64>,
    motif: Vec<Vector3<f64>>,
}

impl UnitCell {
    fn for_lattice(lattice: &ReferenceLattice) -> Self {
        use crate::core::lattice::LatticeFamily::*;

        let a = lattice.lattice_constant();
        let c = lattice.ca_ratio() * a;
        let cubic = Matrix3::from_diagonal_element(a);
        let hexagonal = Matrix3::from_columns(&[
            Vector3::new(a, 0.0, 0.0),
            Vector3::new(0.5 * a, 0.5 * 3.0f64.sqrt() * a, 0.0),
            Vector3::new(0.0, 0.0, c),
        ]);
        let fcc = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.5),
            Vector3::new(0.5, 0.0, 0.5),
            Vector3::new(0.5, 0.5, 0.0),
        ];
        let third = 1.0 / 3.0;

        match lattice.family() {
            Sc => Self {
                basis: cubic,
                motif: vec![Vector3::zeros()],
            },
            Bcc => Self {
                basis: cubic,
                motif: vec![Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5)],
            },
            Fcc => Self {
                basis: cubic,
                motif: fcc,
            },
            CubicDiamond => {
                let shift = Vector3::new(0.25, 0.25, 0.25);
                let shifted: Vec<_> = fcc.iter().map(|p| p + shift).collect();
                Self {
                    basis: cubic,
                    motif: fcc.into_iter().chain(shifted).collect(),
                }
            }
            Hcp => Self {
                basis: hexagonal,
                motif: vec![Vector3::zeros(), Vector3::new(third, third, 0.5)],
            },
            HexDiamond => Self {
                basis: hexagonal,
                motif: vec![
                    Vector3::zeros(),
                    Vector3::new(0.0, 0.0, 0.375),
                    Vector3::new(third, third, 0.5),
                    Vector3::new(third, third, 0.875),
                ],
            },
        }
    }

    /// Integer cell offset and motif index of the site at `fractional`, if any.
    fn locate(&self, fractional: &Vector3<f64>) -> Option<([i64; 3], usize)> {
        self.motif.iter().enumerate().find_map(|(index, site)| {
            let offset = fractional - site;
            let rounded = offset.map(f64::round);
            ((offset - rounded).amax() < SITE_TOLERANCE).then(|| {
                (
                    [rounded.x as i64, rounded.y as i64, rounded.z as i64],
                    index,
                )
            })
        })
    }
}

/// Generates ideal, optionally rotated and homogeneously deformed crystals
/// together with the exact neighbor correspondences structure identification
/// would report for them.
#[derive(Debug, Clone)]
pub struct CrystalBuilder {
    lattice: ReferenceLattice,
    repeats: [usize; 3],
    periodic: [bool; 3],
    orientation: Matrix3<f64>,
    deformation: Matrix3<f64>,
    origin: Point3<f64>,
}

impl CrystalBuilder {
    /// A periodic, unrotated, undeformed block of `repeats` conventional cells.
    pub fn new(lattice: &ReferenceLattice, repeats: [usize; 3]) -> Self {
        Self {
            lattice: lattice.clone(),
            repeats,
            periodic: [true; 3],
            orientation: Matrix3::identity(),
            deformation: Matrix3::identity(),
            origin: Point3::origin(),
        }
    }

    pub fn periodic(mut self, periodic: [bool; 3]) -> Self {
        self.periodic = periodic;
        self
    }

    /// Lattice rotation applied before the deformation.
    pub fn orientation(mut self, orientation: Matrix3<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Homogeneous deformation gradient applied to the rotated crystal.
    pub fn deformation(mut self, deformation: Matrix3<f64>) -> Self {
        self.deformation = deformation;
        self
    }

    pub fn origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Builds the frame. Atoms are ordered by cell (x slowest, z fastest), then
    /// by motif site. Neighbors that fall outside a non-periodic block are
    /// omitted from the correspondence list.
    pub fn build(&self) -> Result<Frame, FrameError> {
        let [nx, ny, nz] = self.repeats;
        if nx * ny * nz == 0 {
            return Err(FrameError::Empty);
        }

        let unit = UnitCell::for_lattice(&self.lattice);
        let basis_inverse = unit
            .basis
            .try_inverse()
            .ok_or(FrameError::SingularCell { volume: 0.0 })?;
        let site_orientations = self.site_orientations(&unit, &basis_inverse);

        let placement = self.deformation * self.orientation;
        let supercell =
            unit.basis * Matrix3::from_diagonal(&Vector3::new(nx as f64, ny as f64, nz as f64));
        let cell = SimulationCell::new(placement * supercell, self.origin, self.periodic)?;
        let structure_type = StructureType::from(self.lattice.family());
        let motif_len = unit.motif.len();

        let index_of = |cell_index: [i64; 3], motif: usize| -> Option<usize> {
            let mut wrapped = [0usize; 3];
            for axis in 0..3 {
                let n = self.repeats[axis] as i64;
                let c = cell_index[axis];
                wrapped[axis] = if self.periodic[axis] {
                    c.rem_euclid(n) as usize
                } else if (0..n).contains(&c) {
                    c as usize
                } else {
                    return None;
                };
            }
            Some(((wrapped[0] * ny + wrapped[1]) * nz + wrapped[2]) * motif_len + motif)
        };

        let mut atoms = Vec::with_capacity(nx * ny * nz * motif_len);
        for ((ix, iy, iz), (motif, site)) in
            iproduct!(iproduct!(0..nx, 0..ny, 0..nz), unit.motif.iter().enumerate())
        {
            let fractional = Vector3::new(ix as f64, iy as f64, iz as f64) + site;
            let g = &site_orientations[motif];
            let neighbors = self
                .lattice
                .template()
                .iter()
                .enumerate()
                .filter_map(|(slot, t)| {
                    let target = fractional + basis_inverse * (g * t);
                    unit.locate(&target)
                        .and_then(|(offset, m)| index_of(offset, m))
                        .map(|neighbor| NeighborMatch::new(neighbor, slot))
                })
                .collect();

            atoms.push(AtomRecord::new(
                self.origin + placement * (unit.basis * fractional),
                structure_type,
                self.orientation * g,
                neighbors,
            ));
        }

        Ok(Frame::new(cell, atoms))
    }

    /// For each motif site, the first point-group rotation that maps the
    /// template onto the site's actual neighbor shell.
    fn site_orientations(&self, unit: &UnitCell, basis_inverse: &Matrix3<f64>) -> Vec<Matrix3<f64>> {
        unit.motif
            .iter()
            .map(|site| {
                self.lattice
                    .symmetry()
                    .operations()
                    .iter()
                    .find(|g| {
                        self.lattice
                            .template()
                            .iter()
                            .all(|t| unit.locate(&(site + basis_inverse * (*g * t))).is_some())
                    })
                    .copied()
                    .unwrap_or_else(Matrix3::identity)
            })
            .collect()
    }
}
