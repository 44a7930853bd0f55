use ndarray::{Array1, Array2, ArrayViewMut1, ArrayViewMut2, Axis};
use rayon::prelude::*;

use log::debug;

use crate::Error;
use crate::math::{coupling_tensor, harmonics_count};

use super::single_bond::SingleBond;

/// Key of a single B3 descriptor component: sorted triplets of combined
/// species/radial indexes and of angular orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct B3Feature {
    pub n1: usize,
    pub n2: usize,
    pub n3: usize,
    pub l1: usize,
    pub l2: usize,
    pub l3: usize,
}

/// Number of B3 components for `n_radial` combined species/radial indexes and
/// angular orders up to `max_angular`
pub fn b3_size(n_radial: usize, max_angular: usize) -> usize {
    let n_l = max_angular + 1;
    n_radial * (n_radial + 1) * (n_radial + 2) / 6 * (n_l * (n_l + 1) * (n_l + 2) / 6)
}

/// Get all B3 components, in the order used for the descriptor values.
///
/// `n_radial` is the number of combined species and radial indexes, i.e.
/// `n_species * n_radial` for the single bond basis. The components are sorted
/// by `n1 <= n2 <= n3` first, and then by `l1 <= l2 <= l3`.
pub fn b3_features(n_radial: usize, max_angular: usize) -> Vec<B3Feature> {
    let mut features = Vec::with_capacity(b3_size(n_radial, max_angular));
    for n1 in 0..n_radial {
        for n2 in n1..n_radial {
            for n3 in n2..n_radial {
                for l1 in 0..=max_angular {
                    for l2 in l1..=max_angular {
                        for l3 in l2..=max_angular {
                            features.push(B3Feature { n1, n2, n3, l1, l2, l3 });
                        }
                    }
                }
            }
        }
    }
    return features;
}

/// B3 descriptor values for all atoms in a system, together with their
/// gradients with respect to the retained neighbors.
#[derive(Debug, Clone)]
pub struct Bispectrum {
    /// Descriptor values, with shape `n_atoms x n_descriptors`
    pub values: Array2<f64>,
    /// Gradients of the descriptor, with shape `3 n_slots x n_descriptors`,
    /// using the same rows as [`SingleBond::gradients`]
    pub gradients: Array2<f64>,
    /// Norm of the descriptor of each atom
    pub norms: Array1<f64>,
    /// Dot product of each row of `gradients` with the corresponding
    /// descriptor values
    pub force_dots: Array1<f64>,
}

/// Output of a single atom, pointing inside the full `Bispectrum` arrays
struct AtomBispectrum<'a> {
    atom: usize,
    values: ArrayViewMut1<'a, f64>,
    gradients: ArrayViewMut2<'a, f64>,
    norm: &'a mut f64,
    force_dots: ArrayViewMut1<'a, f64>,
}

/// Compute the B3 descriptor from single bond coefficients.
///
/// `n_species`, `n_radial` and `max_angular` must be the same as the ones
/// used to compute `single_bond`.
#[time_graph::instrument(name = "compute_bispectrum")]
pub fn compute_bispectrum(
    single_bond: &SingleBond,
    n_species: usize,
    n_radial: usize,
    max_angular: usize,
) -> Result<Bispectrum, Error> {
    let coupling = coupling_tensor(max_angular)?;

    let n_harmonics = harmonics_count(max_angular);
    let n_coefficients = n_species * n_radial * n_harmonics;
    if single_bond.values.ncols() != n_coefficients || single_bond.gradients.ncols() != n_coefficients {
        return Err(Error::InvalidParameter(format!(
            "expected {} single bond coefficients for n_species={}, n_radial={} \
            and max_angular={}, got {}",
            n_coefficients, n_species, n_radial, max_angular, single_bond.values.ncols()
        )));
    }

    let n_atoms = single_bond.values.nrows();
    let n_slots = single_bond.gradients.nrows() / 3;
    let features = b3_features(n_species * n_radial, max_angular);
    let n_descriptors = features.len();
    debug!(
        "computing {} B3 components for {} atoms with {} neighbors",
        n_descriptors, n_atoms, n_slots
    );

    let mut values = Array2::zeros((n_atoms, n_descriptors));
    let mut gradients = Array2::zeros((3 * n_slots, n_descriptors));
    let mut norms = Array1::zeros(n_atoms);
    let mut force_dots = Array1::zeros(3 * n_slots);

    let mut tasks = Vec::with_capacity(n_atoms);
    let mut remaining_gradients = gradients.view_mut();
    let mut remaining_force_dots = force_dots.view_mut();
    let rows = values.axis_iter_mut(Axis(0)).zip(norms.iter_mut());
    for ((atom, (row, norm)), &count) in rows.enumerate().zip(&single_bond.neighbor_counts) {
        let (atom_gradients, rest) = remaining_gradients.split_at(Axis(0), 3 * count);
        remaining_gradients = rest;

        let (atom_force_dots, rest) = remaining_force_dots.split_at(Axis(0), 3 * count);
        remaining_force_dots = rest;

        tasks.push(AtomBispectrum {
            atom: atom,
            values: row,
            gradients: atom_gradients,
            norm: norm,
            force_dots: atom_force_dots,
        });
    }

    // index of the first coefficient for the combined radial index n and l
    let first_coefficient = |n: usize, l: usize| n * n_harmonics + l * l;

    tasks.into_par_iter().for_each(|mut task| {
        let coefficients = single_bond.values.index_axis(Axis(0), task.atom);
        let first_row = 3 * single_bond.cumulative_neighbor_counts[task.atom];
        let n_rows = task.gradients.nrows();
        let derivatives = single_bond.gradients.slice(ndarray::s![first_row..first_row + n_rows, ..]);

        for (k, feature) in features.iter().enumerate() {
            let start_1 = first_coefficient(feature.n1, feature.l1);
            let start_2 = first_coefficient(feature.n2, feature.l2);
            let start_3 = first_coefficient(feature.n3, feature.l3);

            let mut value = 0.0;
            for entry in coupling.entries(feature.l1, feature.l2, feature.l3) {
                let i1 = start_1 + entry.m1;
                let i2 = start_2 + entry.m2;
                let i3 = start_3 + entry.m3;

                let c1 = coefficients[i1];
                let c2 = coefficients[i2];
                let c3 = coefficients[i3];
                value += entry.value * c1 * c2 * c3;

                for row in 0..n_rows {
                    let d1 = derivatives[[row, i1]];
                    let d2 = derivatives[[row, i2]];
                    let d3 = derivatives[[row, i3]];
                    task.gradients[[row, k]] += entry.value * (d1 * c2 * c3 + c1 * d2 * c3 + c1 * c2 * d3);
                }
            }
            task.values[k] = value;
        }

        *task.norm = task.values.dot(&task.values).sqrt();
        task.force_dots.assign(&task.gradients.dot(&task.values));
    });

    return Ok(Bispectrum { values, gradients, norms, force_dots });
}
