use crate::{Error, Vector3D};

mod simple_system;
pub use self::simple_system::SimpleSystem;

#[cfg(test)]
pub(crate) mod test_utils;

/// A single neighbor of a central atom, coming from a neighbor list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// global identifier of the neighbor, usually the index of the
    /// corresponding atom in the structure (or of one of its periodic images)
    pub index: usize,
    /// species of the neighbor, in `[0, n_species)`
    pub species: usize,
    /// distance between the central atom and the neighbor
    pub distance: f64,
    /// vector from the central atom to the neighbor. The norm of this vector
    /// must be equal to `distance`.
    pub vector: Vector3D,
}

impl Neighbor {
    /// Create a new `Neighbor`, computing the distance from the vector
    pub fn new(index: usize, species: usize, vector: Vector3D) -> Neighbor {
        Neighbor {
            index: index,
            species: species,
            distance: vector.norm(),
            vector: vector,
        }
    }
}

/// A `System` gives access to the atoms in a structure and their neighbors.
///
/// The neighbors of all atoms are stored in a single flattened table, and the
/// neighbors of atom `i` are the entries from `cumulative_neighbor_counts()[i]`
/// to `cumulative_neighbor_counts()[i + 1]`.
pub trait System: Send + Sync {
    /// Get the number of atoms in this system
    fn size(&self) -> Result<usize, Error>;

    /// Get the species of all atoms in this system. The returned slice must
    /// have `self.size()` entries, with values in `[0, n_species)`.
    fn species(&self) -> Result<&[usize], Error>;

    /// Get the volume of this system. This is only forwarded to the output of
    /// the calculators, and can be zero for non-periodic structures.
    fn volume(&self) -> Result<f64, Error>;

    /// Get the flattened neighbor table for all atoms
    fn neighbors(&self) -> Result<&[Neighbor], Error>;

    /// Get the number of neighbors of each atom
    fn neighbor_counts(&self) -> Result<&[usize], Error>;

    /// Get the running sum of `neighbor_counts`, starting at 0. The returned
    /// slice must have `self.size() + 1` entries, the last one being the total
    /// size of the neighbor table.
    fn cumulative_neighbor_counts(&self) -> Result<&[usize], Error>;

    /// Get the neighbors of the atom at index `atom`
    fn neighbors_of(&self, atom: usize) -> Result<&[Neighbor], Error> {
        let cumulative = self.cumulative_neighbor_counts()?;
        let (start, stop) = match (cumulative.get(atom), cumulative.get(atom + 1)) {
            (Some(&start), Some(&stop)) => (start, stop),
            _ => return Err(Error::InvalidSystem(format!(
                "atom index {} is out of bounds for a system with {} atoms",
                atom, cumulative.len().saturating_sub(1)
            ))),
        };

        return self.neighbors()?.get(start..stop).ok_or_else(|| Error::InvalidSystem(format!(
            "neighbors of atom {} ({}..{}) are outside of the neighbor table",
            atom, start, stop
        )));
    }
}

/// Relative tolerance when checking that neighbor distances match the norm of
/// the corresponding vectors
const DISTANCE_TOLERANCE: f64 = 1e-6;

/// Check that the given `system` is consistent, and that all species are
/// smaller than `n_species`.
///
/// This checks the neighbor offsets against the neighbor counts and the size
/// of the neighbor table, the species of atoms and neighbors, and the
/// distances of all neighbors.
pub fn check_system(system: &dyn System, n_species: usize) -> Result<(), Error> {
    let size = system.size()?;

    let species = system.species()?;
    if species.len() != size {
        return Err(Error::InvalidSystem(format!(
            "expected {} species, got {}", size, species.len()
        )));
    }

    if let Some((atom, &s)) = species.iter().enumerate().find(|(_, &s)| s >= n_species) {
        return Err(Error::InvalidSystem(format!(
            "atom {} has species {}, but there are only {} species", atom, s, n_species
        )));
    }

    let counts = system.neighbor_counts()?;
    if counts.len() != size {
        return Err(Error::InvalidSystem(format!(
            "expected {} neighbor counts, got {}", size, counts.len()
        )));
    }

    let cumulative = system.cumulative_neighbor_counts()?;
    if cumulative.len() != size + 1 {
        return Err(Error::InvalidSystem(format!(
            "expected {} cumulative neighbor counts, got {}", size + 1, cumulative.len()
        )));
    }

    if cumulative[0] != 0 {
        return Err(Error::InvalidSystem(format!(
            "cumulative neighbor counts must start at 0, got {}", cumulative[0]
        )));
    }

    for (atom, &count) in counts.iter().enumerate() {
        if cumulative[atom + 1] < cumulative[atom] || cumulative[atom + 1] - cumulative[atom] != count {
            return Err(Error::InvalidSystem(format!(
                "cumulative neighbor counts do not match the neighbor count \
                for atom {}: expected {} neighbors, got offsets {}..{}",
                atom, count, cumulative[atom], cumulative[atom + 1]
            )));
        }
    }

    let neighbors = system.neighbors()?;
    if cumulative[size] != neighbors.len() {
        return Err(Error::InvalidSystem(format!(
            "the neighbor table contains {} entries, but the cumulative \
            neighbor counts end at {}", neighbors.len(), cumulative[size]
        )));
    }

    for (i, neighbor) in neighbors.iter().enumerate() {
        if neighbor.species >= n_species {
            return Err(Error::InvalidSystem(format!(
                "neighbor {} has species {}, but there are only {} species",
                i, neighbor.species, n_species
            )));
        }

        if !neighbor.distance.is_finite() || neighbor.distance <= 0.0 {
            return Err(Error::InvalidSystem(format!(
                "neighbor {} has an invalid distance ({})", i, neighbor.distance
            )));
        }

        let norm = neighbor.vector.norm();
        if (norm - neighbor.distance).abs() > DISTANCE_TOLERANCE * neighbor.distance {
            return Err(Error::InvalidSystem(format!(
                "neighbor {} has distance {} but the norm of its vector is {}",
                i, neighbor.distance, norm
            )));
        }
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A system with hand-written (and possibly broken) neighbor offsets
    struct RawSystem {
        species: Vec<usize>,
        neighbors: Vec<Neighbor>,
        counts: Vec<usize>,
        cumulative: Vec<usize>,
    }

    impl System for RawSystem {
        fn size(&self) -> Result<usize, Error> { Ok(self.species.len()) }
        fn species(&self) -> Result<&[usize], Error> { Ok(&self.species) }
        fn volume(&self) -> Result<f64, Error> { Ok(0.0) }
        fn neighbors(&self) -> Result<&[Neighbor], Error> { Ok(&self.neighbors) }
        fn neighbor_counts(&self) -> Result<&[usize], Error> { Ok(&self.counts) }
        fn cumulative_neighbor_counts(&self) -> Result<&[usize], Error> { Ok(&self.cumulative) }
    }

    fn raw_system() -> RawSystem {
        RawSystem {
            species: vec![0, 1],
            neighbors: vec![
                Neighbor::new(1, 1, Vector3D::new(0.0, 1.2, 0.0)),
                Neighbor::new(0, 0, Vector3D::new(0.0, -1.2, 0.0)),
            ],
            counts: vec![1, 1],
            cumulative: vec![0, 1, 2],
        }
    }

    #[test]
    fn valid_system() {
        let system = raw_system();
        check_system(&system, 2).unwrap();

        assert_eq!(system.neighbors_of(1).unwrap(), &system.neighbors[1..2]);
        assert!(system.neighbors_of(2).is_err());
    }

    #[test]
    fn invalid_offsets() {
        let mut system = raw_system();
        system.cumulative = vec![0, 2, 2];
        let error = check_system(&system, 2).unwrap_err();
        assert!(error.to_string().contains("do not match the neighbor count for atom 0"));

        let mut system = raw_system();
        system.cumulative = vec![1, 2, 3];
        let error = check_system(&system, 2).unwrap_err();
        assert_eq!(error.to_string(), "invalid system: cumulative neighbor counts must start at 0, got 1");

        let mut system = raw_system();
        system.cumulative = vec![0, 1];
        assert!(check_system(&system, 2).is_err());

        let mut system = raw_system();
        system.neighbors.pop();
        let error = check_system(&system, 2).unwrap_err();
        assert!(error.to_string().contains("the neighbor table contains 1 entries"));
        // out of bounds reads are errors, not panics
        assert!(system.neighbors_of(1).is_err());
    }

    #[test]
    fn invalid_species() {
        let system = raw_system();
        let error = check_system(&system, 1).unwrap_err();
        assert_eq!(error.to_string(), "invalid system: atom 1 has species 1, but there are only 1 species");

        let mut system = raw_system();
        system.species = vec![0, 0];
        let error = check_system(&system, 1).unwrap_err();
        assert_eq!(error.to_string(), "invalid system: neighbor 0 has species 1, but there are only 1 species");
    }

    #[test]
    fn invalid_distances() {
        let mut system = raw_system();
        system.neighbors[0].distance = 0.0;
        let error = check_system(&system, 2).unwrap_err();
        assert_eq!(error.to_string(), "invalid system: neighbor 0 has an invalid distance (0)");

        let mut system = raw_system();
        system.neighbors[1].distance = 1.5;
        let error = check_system(&system, 2).unwrap_err();
        assert!(error.to_string().contains("neighbor 1 has distance 1.5 but the norm of its vector is"));
    }
}
