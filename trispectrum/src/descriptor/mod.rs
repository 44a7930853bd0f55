//! Containers for the final descriptor values, grouped by species of the
//! central atom.

use ndarray::{Array1, Array2, Axis, s};

use crate::Error;
use crate::calculators::b3::{SingleBond, Bispectrum};

/// Descriptor values and gradients for all atoms of a given species
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesBlock {
    /// Number of atoms of this species
    pub n_atoms: usize,
    /// Total number of retained neighbors of the atoms of this species
    pub n_neighbors: usize,
    /// Descriptor values, with shape `n_atoms x n_descriptors`
    pub descriptors: Array2<f64>,
    /// Descriptor gradients, with shape `3 n_neighbors x n_descriptors`. Row
    /// `3 * slot + axis` is the gradient with respect to the `axis` component
    /// of the neighbor in `slot`.
    pub descriptor_force_dervs: Array2<f64>,
    /// Vectors from the central atoms to their neighbors, with shape
    /// `n_neighbors x 3`
    pub neighbor_coordinates: Array2<f64>,
    /// Norm of the descriptor of each atom
    pub descriptor_norms: Array1<f64>,
    /// Dot product of each row of `descriptor_force_dervs` with the
    /// descriptor of the corresponding central atom
    pub descriptor_force_dots: Array1<f64>,
    /// Global cutoff value of each atom. The B3 descriptor has no global
    /// cutoff, so these are all 1.
    pub cutoff_values: Array1<f64>,
    /// Gradients of the global cutoff, with the same rows as
    /// `descriptor_force_dervs`. These are all 0 for B3.
    pub cutoff_dervs: Array1<f64>,
    /// Number of neighbors of each atom
    pub neighbor_counts: Vec<usize>,
    /// Running sum of `neighbor_counts`, starting at 0
    pub cumulative_neighbor_counts: Vec<usize>,
    /// Index of each atom in the full system
    pub atom_indices: Vec<usize>,
    /// Global index of each neighbor
    pub neighbor_indices: Vec<usize>,
}

impl SpeciesBlock {
    fn zeros(n_atoms: usize, n_neighbors: usize, n_descriptors: usize) -> SpeciesBlock {
        SpeciesBlock {
            n_atoms: n_atoms,
            n_neighbors: n_neighbors,
            descriptors: Array2::zeros((n_atoms, n_descriptors)),
            descriptor_force_dervs: Array2::zeros((3 * n_neighbors, n_descriptors)),
            neighbor_coordinates: Array2::zeros((n_neighbors, 3)),
            descriptor_norms: Array1::zeros(n_atoms),
            descriptor_force_dots: Array1::zeros(3 * n_neighbors),
            cutoff_values: Array1::ones(n_atoms),
            cutoff_dervs: Array1::zeros(3 * n_neighbors),
            neighbor_counts: vec![0; n_atoms],
            cumulative_neighbor_counts: vec![0; n_atoms + 1],
            atom_indices: vec![0; n_atoms],
            neighbor_indices: vec![0; n_neighbors],
        }
    }
}

/// Descriptor values for a full system, split by species of the central atom
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorValues {
    /// Number of descriptor components
    pub n_descriptors: usize,
    /// Number of species, and number of entries in `blocks`
    pub n_species: usize,
    /// Total number of atoms
    pub n_atoms: usize,
    /// Volume of the system
    pub volume: f64,
    /// Descriptors for each species
    pub blocks: Vec<SpeciesBlock>,
}

impl DescriptorValues {
    /// Group the atom-indexed `single_bond` neighbor data and `bispectrum`
    /// values by the species of the central atoms. Inside each block, atoms
    /// are kept in the same order as in the system.
    #[time_graph::instrument(name = "DescriptorValues::from_atoms")]
    pub fn from_atoms(
        species: &[usize],
        n_species: usize,
        volume: f64,
        single_bond: &SingleBond,
        bispectrum: &Bispectrum,
    ) -> Result<DescriptorValues, Error> {
        let n_atoms = species.len();
        let n_descriptors = bispectrum.values.ncols();

        if bispectrum.values.nrows() != n_atoms || single_bond.neighbor_counts.len() != n_atoms {
            return Err(Error::InvalidParameter(format!(
                "expected data for {} atoms, got {} descriptors and {} neighbor counts",
                n_atoms, bispectrum.values.nrows(), single_bond.neighbor_counts.len()
            )));
        }

        let n_slots = single_bond.neighbor_indices.len();
        if bispectrum.gradients.nrows() != 3 * n_slots || bispectrum.force_dots.len() != 3 * n_slots {
            return Err(Error::InvalidParameter(format!(
                "expected gradients for {} neighbors, got {} rows",
                n_slots, bispectrum.gradients.nrows()
            )));
        }

        // first pass: count atoms and neighbors in each species
        let mut atoms_per_species = vec![0; n_species];
        let mut neighbors_per_species = vec![0; n_species];
        for (atom, (&s, &count)) in species.iter().zip(&single_bond.neighbor_counts).enumerate() {
            if s >= n_species {
                return Err(Error::InvalidSystem(format!(
                    "atom {} has species {}, but there are only {} species", atom, s, n_species
                )));
            }
            atoms_per_species[s] += 1;
            neighbors_per_species[s] += count;
        }

        let mut blocks = atoms_per_species.iter().zip(&neighbors_per_species)
            .map(|(&atoms, &neighbors)| SpeciesBlock::zeros(atoms, neighbors, n_descriptors))
            .collect::<Vec<_>>();

        // second pass: copy data to the next free position in each block
        let mut atom_counters = vec![0; n_species];
        let mut neighbor_counters = vec![0; n_species];
        for (atom, &s) in species.iter().enumerate() {
            let block = &mut blocks[s];
            let i = atom_counters[s];
            let slot = neighbor_counters[s];

            let count = single_bond.neighbor_counts[atom];
            let first = single_bond.cumulative_neighbor_counts[atom];

            block.descriptors.row_mut(i).assign(&bispectrum.values.row(atom));
            block.descriptor_norms[i] = bispectrum.norms[atom];
            block.neighbor_counts[i] = count;
            block.cumulative_neighbor_counts[i + 1] = slot + count;
            block.atom_indices[i] = atom;

            block.descriptor_force_dervs.slice_mut(s![3 * slot..3 * (slot + count), ..])
                .assign(&bispectrum.gradients.slice(s![3 * first..3 * (first + count), ..]));
            block.descriptor_force_dots.slice_mut(s![3 * slot..3 * (slot + count)])
                .assign(&bispectrum.force_dots.slice(s![3 * first..3 * (first + count)]));
            block.neighbor_coordinates.slice_mut(s![slot..slot + count, ..])
                .assign(&single_bond.neighbor_coordinates.slice(s![first..first + count, ..]));
            block.neighbor_indices[slot..slot + count]
                .copy_from_slice(&single_bond.neighbor_indices[first..first + count]);

            atom_counters[s] += 1;
            neighbor_counters[s] += count;
        }

        debug_assert!(blocks.iter().all(|b| b.descriptors.len_of(Axis(0)) == b.n_atoms));

        return Ok(DescriptorValues {
            n_descriptors,
            n_species,
            n_atoms,
            volume,
            blocks,
        });
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2, Array2};

    use super::*;

    fn fake_data() -> (SingleBond, Bispectrum) {
        // 3 atoms with 1, 0 and 2 neighbors, 2 descriptor components
        let single_bond = SingleBond {
            values: Array2::zeros((3, 1)),
            gradients: Array2::zeros((9, 1)),
            neighbor_coordinates: arr2(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]),
            neighbor_counts: vec![1, 0, 2],
            cumulative_neighbor_counts: vec![0, 1, 1, 3],
            neighbor_indices: vec![10, 11, 12],
        };

        let bispectrum = Bispectrum {
            values: arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]),
            gradients: Array2::from_shape_fn((9, 2), |(i, j)| (10 * i + j) as f64),
            norms: arr1(&[1.0, 2.0, 3.0]),
            force_dots: Array1::from_shape_fn(9, |i| i as f64),
        };

        (single_bond, bispectrum)
    }

    #[test]
    fn partition() {
        let (single_bond, bispectrum) = fake_data();
        let values = DescriptorValues::from_atoms(&[1, 0, 1], 2, 12.0, &single_bond, &bispectrum).unwrap();

        assert_eq!(values.n_descriptors, 2);
        assert_eq!(values.n_species, 2);
        assert_eq!(values.n_atoms, 3);
        assert_eq!(values.volume, 12.0);

        let block = &values.blocks[0];
        assert_eq!(block.n_atoms, 1);
        assert_eq!(block.n_neighbors, 0);
        assert_eq!(block.descriptors, arr2(&[[3.0, 4.0]]));
        assert_eq!(block.descriptor_norms, arr1(&[2.0]));
        assert_eq!(block.atom_indices, [1]);
        assert_eq!(block.cumulative_neighbor_counts, [0, 0]);
        assert_eq!(block.descriptor_force_dervs.shape(), [0, 2]);
        assert_eq!(block.cutoff_values, arr1(&[1.0]));
        assert_eq!(block.cutoff_dervs.len(), 0);

        let block = &values.blocks[1];
        assert_eq!(block.n_atoms, 2);
        assert_eq!(block.n_neighbors, 3);
        assert_eq!(block.descriptors, arr2(&[[1.0, 2.0], [5.0, 6.0]]));
        assert_eq!(block.descriptor_norms, arr1(&[1.0, 3.0]));
        assert_eq!(block.atom_indices, [0, 2]);
        assert_eq!(block.neighbor_counts, [1, 2]);
        assert_eq!(block.cumulative_neighbor_counts, [0, 1, 3]);
        assert_eq!(block.neighbor_indices, [10, 11, 12]);
        assert_eq!(block.neighbor_coordinates.column(0), arr1(&[1.0, 2.0, 3.0]));
        assert_eq!(block.descriptor_force_dervs, bispectrum.gradients);
        assert_eq!(block.descriptor_force_dots, bispectrum.force_dots);
        assert_eq!(block.cutoff_values, arr1(&[1.0, 1.0]));
        assert_eq!(block.cutoff_dervs, Array1::<f64>::zeros(9));

        let total_atoms: usize = values.blocks.iter().map(|b| b.n_atoms).sum();
        let total_neighbors: usize = values.blocks.iter().map(|b| b.n_neighbors).sum();
        assert_eq!(total_atoms, 3);
        assert_eq!(total_neighbors, 3);
    }

    #[test]
    fn empty_species() {
        let (single_bond, bispectrum) = fake_data();
        let values = DescriptorValues::from_atoms(&[0, 0, 0], 3, 0.0, &single_bond, &bispectrum).unwrap();

        assert_eq!(values.blocks.len(), 3);
        assert_eq!(values.blocks[0].n_atoms, 3);
        assert_eq!(values.blocks[1].n_atoms, 0);
        assert_eq!(values.blocks[1].descriptors.shape(), [0, 2]);
        assert_eq!(values.blocks[2].cumulative_neighbor_counts, [0]);
    }

    #[test]
    fn invalid_inputs() {
        let (single_bond, bispectrum) = fake_data();

        let error = DescriptorValues::from_atoms(&[0, 3, 0], 2, 0.0, &single_bond, &bispectrum).unwrap_err();
        assert_eq!(error.to_string(), "invalid system: atom 1 has species 3, but there are only 2 species");

        let error = DescriptorValues::from_atoms(&[0, 0], 2, 0.0, &single_bond, &bispectrum).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid parameter: expected data for 2 atoms, got 3 descriptors and 3 neighbor counts"
        );
    }
}
