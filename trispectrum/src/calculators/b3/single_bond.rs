use std::cell::RefCell;

use ndarray::{Array2, ArrayViewMut1, ArrayViewMut2, Axis};
use rayon::prelude::*;
use thread_local::ThreadLocal;

use log::{debug, warn};

use crate::{Error, System};
use crate::math::{SphericalHarmonicsCache, harmonics_count, lm_index};
use crate::systems::check_system;

use super::radial::RadialBasis;
use super::cutoff::CutoffFunction;

/// Per-thread scratch buffers for the single bond expansion
struct SingleBondCache {
    spherical_harmonics: SphericalHarmonicsCache,
    radial_values: Vec<f64>,
    radial_derivatives: Vec<f64>,
}

/// Radial and angular basis used to expand the neighbor density of each atom
/// into single bond coefficients.
pub struct SingleBondBasis {
    n_species: usize,
    n_radial: usize,
    max_angular: usize,
    radial_basis: RadialBasis,
    cutoff_function: CutoffFunction,
    cache: ThreadLocal<RefCell<SingleBondCache>>,
}

impl std::fmt::Debug for SingleBondBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleBondBasis")
            .field("n_species", &self.n_species)
            .field("n_radial", &self.n_radial)
            .field("max_angular", &self.max_angular)
            .field("radial_basis", &self.radial_basis)
            .field("cutoff_function", &self.cutoff_function)
            .finish()
    }
}

impl SingleBondBasis {
    /// Create a new basis with `n_species` species, `n_radial` radial
    /// functions and spherical harmonics up to `max_angular`.
    pub fn new(
        n_species: usize,
        n_radial: usize,
        max_angular: usize,
        radial_basis: RadialBasis,
        cutoff_function: CutoffFunction,
    ) -> SingleBondBasis {
        SingleBondBasis {
            n_species,
            n_radial,
            max_angular,
            radial_basis,
            cutoff_function,
            cache: ThreadLocal::new(),
        }
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    pub fn n_radial(&self) -> usize {
        self.n_radial
    }

    pub fn max_angular(&self) -> usize {
        self.max_angular
    }

    /// Neighbors further away than this distance are ignored
    pub fn cutoff(&self) -> f64 {
        self.radial_basis.r_cut()
    }

    /// Number of single bond coefficients for each atom
    pub fn n_coefficients(&self) -> usize {
        self.n_species * self.n_radial * harmonics_count(self.max_angular)
    }

    /// Column of the `(species, n, l, m)` coefficient in the single bond
    /// tables, with `-l <= m <= l`
    #[inline]
    pub fn coefficient_index(&self, species: usize, n: usize, l: usize, m: isize) -> usize {
        let n_harmonics = harmonics_count(self.max_angular);
        (species * self.n_radial + n) * n_harmonics + lm_index(l, m)
    }

    /// Evaluate the radial functions multiplied by the cutoff function, and
    /// their derivatives with respect to the distance
    fn compute_radial(&self, distance: f64, values: &mut [f64], derivatives: &mut [f64]) {
        self.radial_basis.compute(distance, values, derivatives);

        let cutoff = self.cutoff();
        let f_cut = self.cutoff_function.value(distance, cutoff);
        let df_cut = self.cutoff_function.derivative(distance, cutoff);
        for (value, derivative) in values.iter_mut().zip(derivatives.iter_mut()) {
            *derivative = *derivative * f_cut + *value * df_cut;
            *value *= f_cut;
        }
    }
}

/// Single bond coefficients for all atoms in a system, and their gradients
/// with respect to the positions of the neighbors inside the cutoff.
#[derive(Debug, Clone)]
pub struct SingleBond {
    /// Coefficients summed over neighbors, with shape `n_atoms x
    /// n_coefficients`. See [`SingleBondBasis::coefficient_index`] for the
    /// column layout.
    pub values: Array2<f64>,
    /// Gradients of the coefficients with respect to each retained neighbor
    /// vector, with shape `3 n_slots x n_coefficients`. Row `3 * slot + axis`
    /// contains the derivative along `axis` for the neighbor in `slot`.
    pub gradients: Array2<f64>,
    /// Vectors from the central atom to each retained neighbor, with shape
    /// `n_slots x 3`
    pub neighbor_coordinates: Array2<f64>,
    /// Number of retained neighbors of each atom
    pub neighbor_counts: Vec<usize>,
    /// Running sum of `neighbor_counts`, starting at 0 (`n_atoms + 1` entries)
    pub cumulative_neighbor_counts: Vec<usize>,
    /// Global index of each retained neighbor
    pub neighbor_indices: Vec<usize>,
}

/// Output of a single atom, pointing inside the full `SingleBond` arrays
struct AtomSingleBond<'a> {
    atom: usize,
    values: ArrayViewMut1<'a, f64>,
    gradients: ArrayViewMut2<'a, f64>,
    coordinates: ArrayViewMut2<'a, f64>,
    indices: &'a mut [usize],
}

/// Compute the single bond coefficients of all atoms in `system`.
#[time_graph::instrument(name = "compute_single_bond")]
pub fn compute_single_bond(system: &dyn System, basis: &SingleBondBasis) -> Result<SingleBond, Error> {
    check_system(system, basis.n_species)?;

    let n_atoms = system.size()?;
    let cutoff = basis.cutoff();

    let neighbor_counts = (0..n_atoms).into_par_iter()
        .map(|atom| {
            let neighbors = system.neighbors_of(atom)?;
            Ok(neighbors.iter().filter(|neighbor| neighbor.distance <= cutoff).count())
        })
        .collect::<Result<Vec<usize>, Error>>()?;

    let mut cumulative_neighbor_counts = Vec::with_capacity(n_atoms + 1);
    cumulative_neighbor_counts.push(0);
    let mut n_slots = 0;
    for &count in &neighbor_counts {
        n_slots += count;
        cumulative_neighbor_counts.push(n_slots);
    }

    let isolated = neighbor_counts.iter().filter(|&&count| count == 0).count();
    if isolated != 0 {
        warn!(
            "{} atoms out of {} have no neighbors inside the cutoff of {}",
            isolated, n_atoms, cutoff
        );
    }

    let n_coefficients = basis.n_coefficients();
    debug!(
        "computing single bond coefficients for {} atoms with {} neighbors and {} coefficients",
        n_atoms, n_slots, n_coefficients
    );

    let mut values = Array2::zeros((n_atoms, n_coefficients));
    let mut gradients = Array2::zeros((3 * n_slots, n_coefficients));
    let mut neighbor_coordinates = Array2::zeros((n_slots, 3));
    let mut neighbor_indices = vec![0; n_slots];

    // split the output in disjoint per-atom views, to be filled in parallel
    let mut tasks = Vec::with_capacity(n_atoms);
    let mut remaining_gradients = gradients.view_mut();
    let mut remaining_coordinates = neighbor_coordinates.view_mut();
    let mut remaining_indices = neighbor_indices.as_mut_slice();
    for ((atom, row), &count) in values.axis_iter_mut(Axis(0)).enumerate().zip(&neighbor_counts) {
        let (atom_gradients, rest) = remaining_gradients.split_at(Axis(0), 3 * count);
        remaining_gradients = rest;

        let (atom_coordinates, rest) = remaining_coordinates.split_at(Axis(0), count);
        remaining_coordinates = rest;

        let (atom_indices, rest) = std::mem::take(&mut remaining_indices).split_at_mut(count);
        remaining_indices = rest;

        tasks.push(AtomSingleBond {
            atom: atom,
            values: row,
            gradients: atom_gradients,
            coordinates: atom_coordinates,
            indices: atom_indices,
        });
    }

    tasks.into_par_iter().try_for_each(|mut task| {
        let mut cache = basis.cache.get_or(|| RefCell::new(SingleBondCache {
            spherical_harmonics: SphericalHarmonicsCache::new(basis.max_angular),
            radial_values: vec![0.0; basis.n_radial],
            radial_derivatives: vec![0.0; basis.n_radial],
        })).borrow_mut();
        let SingleBondCache { spherical_harmonics, radial_values, radial_derivatives } = &mut *cache;

        let n_harmonics = harmonics_count(basis.max_angular);
        let retained = system.neighbors_of(task.atom)?.iter()
            .filter(|neighbor| neighbor.distance <= cutoff);

        for (slot, neighbor) in retained.enumerate() {
            let distance = neighbor.distance;
            let vector = neighbor.vector;

            basis.compute_radial(distance, radial_values, radial_derivatives);
            spherical_harmonics.compute(vector);

            task.indices[slot] = neighbor.index;
            for axis in 0..3 {
                task.coordinates[[slot, axis]] = vector[axis];
            }

            let direction = vector / distance;
            for n in 0..basis.n_radial {
                let radial = radial_values[n];
                let radial_gradient = [
                    radial_derivatives[n] * direction[0],
                    radial_derivatives[n] * direction[1],
                    radial_derivatives[n] * direction[2],
                ];

                let start = basis.coefficient_index(neighbor.species, n, 0, 0);
                for lm in 0..n_harmonics {
                    let harmonic = spherical_harmonics.values[lm];
                    task.values[start + lm] += radial * harmonic;

                    for axis in 0..3 {
                        task.gradients[[3 * slot + axis, start + lm]] =
                            radial_gradient[axis] * harmonic
                            + radial * spherical_harmonics.gradients[axis][lm];
                    }
                }
            }
        }

        Ok::<(), Error>(())
    })?;

    return Ok(SingleBond {
        values,
        gradients,
        neighbor_coordinates,
        neighbor_counts,
        cumulative_neighbor_counts,
        neighbor_indices,
    });
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{SimpleSystem, Neighbor, Vector3D};
    use crate::systems::test_utils::test_system;
    use crate::calculators::b3::{RadialBasisKind, CutoffFunctionKind};

    use super::*;

    fn basis(n_species: usize, n_radial: usize, max_angular: usize) -> SingleBondBasis {
        let radial = RadialBasis::new(RadialBasisKind::Chebyshev, &[0.0, 3.5]).unwrap();
        let cutoff = CutoffFunction::new(CutoffFunctionKind::Quadratic, &[]).unwrap();
        SingleBondBasis::new(n_species, n_radial, max_angular, radial, cutoff)
    }

    #[test]
    fn shapes() {
        let basis = basis(2, 3, 2);
        assert_eq!(basis.n_coefficients(), 2 * 3 * 9);
        assert_eq!(basis.coefficient_index(1, 2, 1, -1), (3 + 2) * 9 + 1);

        let system = test_system("methane");
        let single_bond = compute_single_bond(&system, &basis).unwrap();

        // all pairs in methane are inside 3.5
        assert_eq!(single_bond.neighbor_counts, [4, 4, 4, 4, 4]);
        assert_eq!(single_bond.cumulative_neighbor_counts, [0, 4, 8, 12, 16, 20]);
        assert_eq!(single_bond.values.shape(), [5, 54]);
        assert_eq!(single_bond.gradients.shape(), [60, 54]);
        assert_eq!(single_bond.neighbor_coordinates.shape(), [20, 3]);
        assert_eq!(&single_bond.neighbor_indices[..4], [1, 2, 3, 4]);
    }

    #[test]
    fn cutoff_filtering() {
        let system = test_system("methane");
        let radial = RadialBasis::new(RadialBasisKind::Chebyshev, &[0.0, 1.5]).unwrap();
        let cutoff = CutoffFunction::new(CutoffFunctionKind::Quadratic, &[]).unwrap();
        let basis = SingleBondBasis::new(2, 2, 1, radial, cutoff);

        let single_bond = compute_single_bond(&system, &basis).unwrap();
        // only C-H bonds are shorter than 1.5
        assert_eq!(single_bond.neighbor_counts, [4, 1, 1, 1, 1]);
        assert_eq!(&single_bond.neighbor_indices[4..], [0, 0, 0, 0]);

        // hydrogen atoms only see carbon
        for atom in 1..5 {
            for n in 0..2 {
                for lm in 0..4 {
                    assert_eq!(single_bond.values[[atom, basis.coefficient_index(1, n, 0, 0) + lm]], 0.0);
                }
            }
        }
    }

    #[test]
    fn species_channels() {
        let basis = basis(2, 2, 1);
        let system = test_system("CH");
        let single_bond = compute_single_bond(&system, &basis).unwrap();
        assert_eq!(single_bond.neighbor_counts, [1, 1]);

        for n in 0..2 {
            for l in 0..=1 {
                for m in -(l as isize)..=(l as isize) {
                    // carbon only sees hydrogen, and the other way around
                    assert_eq!(single_bond.values[[0, basis.coefficient_index(0, n, l, m)]], 0.0);
                    assert_eq!(single_bond.values[[1, basis.coefficient_index(1, n, l, m)]], 0.0);

                    // the two bond vectors are opposite, Y_lm(-r) = (-1)^l Y_lm(r)
                    let parity = if l % 2 == 0 { 1.0 } else { -1.0 };
                    assert_relative_eq!(
                        single_bond.values[[1, basis.coefficient_index(0, n, l, m)]],
                        parity * single_bond.values[[0, basis.coefficient_index(1, n, l, m)]],
                        epsilon = 1e-14
                    );
                }
            }
        }
    }

    #[test]
    fn single_neighbor_values() {
        let mut system = SimpleSystem::new(0.0);
        system.add_atom(0, vec![Neighbor::new(1, 0, Vector3D::new(0.0, 0.0, 1.5))]);
        system.add_atom(0, vec![Neighbor::new(0, 0, Vector3D::new(0.0, 0.0, -1.5))]);

        let basis = basis(1, 1, 0);
        let single_bond = compute_single_bond(&system, &basis).unwrap();

        // T_0 = 1, quadratic cutoff (3.5 - 1.5)^2 = 4, Y_00 = 1 / sqrt(4π)
        let expected = 4.0 / f64::sqrt(4.0 * std::f64::consts::PI);
        assert_relative_eq!(single_bond.values[[0, 0]], expected, max_relative = 1e-12);
        assert_relative_eq!(single_bond.values[[1, 0]], expected, max_relative = 1e-12);

        // d/dz (3.5 - z)^2 Y_00 = -2 (3.5 - 1.5) Y_00
        let expected_gradient = -4.0 / f64::sqrt(4.0 * std::f64::consts::PI);
        assert_relative_eq!(single_bond.gradients[[0, 0]], 0.0, epsilon = 1e-14);
        assert_relative_eq!(single_bond.gradients[[1, 0]], 0.0, epsilon = 1e-14);
        assert_relative_eq!(single_bond.gradients[[2, 0]], expected_gradient, max_relative = 1e-12);
        assert_relative_eq!(single_bond.gradients[[5, 0]], -expected_gradient, max_relative = 1e-12);

        assert_eq!(single_bond.neighbor_coordinates[[1, 2]], -1.5);
    }

    #[test]
    fn finite_differences() {
        let basis = basis(2, 3, 3);
        let mut system = test_system("water");
        let reference = compute_single_bond(&system, &basis).unwrap();

        let delta = 1e-5;
        let atom = 0;
        let slot = 1;
        let original = system.neighbors_of(atom).unwrap()[slot];
        for axis in 0..3 {
            let mut vector = original.vector;
            vector[axis] += delta;
            system.neighbors_mut(atom)[slot] = Neighbor::new(original.index, original.species, vector);
            let forward = compute_single_bond(&system, &basis).unwrap();

            vector[axis] -= 2.0 * delta;
            system.neighbors_mut(atom)[slot] = Neighbor::new(original.index, original.species, vector);
            let backward = compute_single_bond(&system, &basis).unwrap();

            system.neighbors_mut(atom)[slot] = original;

            for column in 0..basis.n_coefficients() {
                let finite_difference = (forward.values[[atom, column]] - backward.values[[atom, column]]) / (2.0 * delta);
                assert_relative_eq!(
                    reference.gradients[[3 * slot + axis, column]], finite_difference,
                    epsilon = 1e-5, max_relative = 1e-4
                );
            }
        }
    }

    #[test]
    fn invalid_system() {
        let mut system = SimpleSystem::new(0.0);
        system.add_atom(0, vec![Neighbor::new(1, 3, Vector3D::new(0.0, 0.0, 1.5))]);

        let error = compute_single_bond(&system, &basis(2, 1, 0)).unwrap_err();
        assert!(matches!(error, Error::InvalidSystem(_)));
    }
}
