use crate::{Error, Vector3D};

use super::{System, Neighbor};

/// A simple implementation of `System`, owning its atoms and neighbor table
#[derive(Clone, Debug)]
pub struct SimpleSystem {
    volume: f64,
    species: Vec<usize>,
    neighbors: Vec<Neighbor>,
    neighbor_counts: Vec<usize>,
    cumulative_neighbor_counts: Vec<usize>,
}

impl SimpleSystem {
    /// Create a new empty system with the given volume
    pub fn new(volume: f64) -> SimpleSystem {
        SimpleSystem {
            volume: volume,
            species: Vec::new(),
            neighbors: Vec::new(),
            neighbor_counts: Vec::new(),
            cumulative_neighbor_counts: vec![0],
        }
    }

    /// Create a system from atomic positions without periodic boundary
    /// conditions. All pairs of atoms closer than `cutoff` are included in the
    /// neighbor list, in both directions.
    pub fn from_positions(
        species: &[usize],
        positions: &[Vector3D],
        cutoff: f64,
        volume: f64,
    ) -> Result<SimpleSystem, Error> {
        if species.len() != positions.len() {
            return Err(Error::InvalidParameter(format!(
                "got {} species but {} positions", species.len(), positions.len()
            )));
        }

        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "neighbor list cutoff must be a positive number, got {}", cutoff
            )));
        }

        let cutoff2 = cutoff * cutoff;
        let mut system = SimpleSystem::new(volume);
        for (i, (&center_species, &center)) in species.iter().zip(positions).enumerate() {
            let mut neighbors = Vec::new();
            for (j, (&neighbor_species, &position)) in species.iter().zip(positions).enumerate() {
                if i == j {
                    continue;
                }

                let vector = position - center;
                let distance2 = vector.norm2();
                if distance2 > 0.0 && distance2 < cutoff2 {
                    neighbors.push(Neighbor::new(j, neighbor_species, vector));
                }
            }
            system.add_atom(center_species, neighbors);
        }

        return Ok(system);
    }

    /// Add an atom with the given species and neighbors to this system
    pub fn add_atom(&mut self, species: usize, neighbors: Vec<Neighbor>) {
        let total = self.neighbors.len() + neighbors.len();
        self.species.push(species);
        self.neighbor_counts.push(neighbors.len());
        self.cumulative_neighbor_counts.push(total);
        self.neighbors.extend(neighbors);
    }

    /// Get mutable access to the neighbors of the atom at index `atom`. This
    /// can be used to displace neighbors, in which case the caller is
    /// responsible for keeping the distances in sync with the vectors.
    pub fn neighbors_mut(&mut self, atom: usize) -> &mut [Neighbor] {
        let start = self.cumulative_neighbor_counts[atom];
        let stop = self.cumulative_neighbor_counts[atom + 1];
        return &mut self.neighbors[start..stop];
    }
}

impl System for SimpleSystem {
    fn size(&self) -> Result<usize, Error> {
        Ok(self.species.len())
    }

    fn species(&self) -> Result<&[usize], Error> {
        Ok(&self.species)
    }

    fn volume(&self) -> Result<f64, Error> {
        Ok(self.volume)
    }

    fn neighbors(&self) -> Result<&[Neighbor], Error> {
        Ok(&self.neighbors)
    }

    fn neighbor_counts(&self) -> Result<&[usize], Error> {
        Ok(&self.neighbor_counts)
    }

    fn cumulative_neighbor_counts(&self) -> Result<&[usize], Error> {
        Ok(&self.cumulative_neighbor_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::check_system;

    #[test]
    fn add_atoms() {
        let mut system = SimpleSystem::new(1000.0);
        system.add_atom(1, vec![
            Neighbor::new(1, 0, Vector3D::new(1.0, 0.0, 0.0)),
            Neighbor::new(2, 1, Vector3D::new(0.0, 2.0, 0.0)),
        ]);
        system.add_atom(0, vec![]);
        system.add_atom(1, vec![Neighbor::new(0, 1, Vector3D::new(0.0, 0.0, -3.0))]);

        assert_eq!(system.size().unwrap(), 3);
        assert_eq!(system.species().unwrap(), &[1, 0, 1]);
        assert_eq!(system.volume().unwrap(), 1000.0);
        assert_eq!(system.neighbor_counts().unwrap(), &[2, 0, 1]);
        assert_eq!(system.cumulative_neighbor_counts().unwrap(), &[0, 2, 2, 3]);
        assert_eq!(system.neighbors().unwrap().len(), 3);

        assert!(system.neighbors_of(1).unwrap().is_empty());
        assert_eq!(system.neighbors_of(2).unwrap()[0].distance, 3.0);

        check_system(&system, 2).unwrap();
    }

    #[test]
    fn from_positions() {
        let positions = [
            Vector3D::new(0.0, 0.0, 0.0),
            Vector3D::new(0.0, 1.5, 0.0),
            Vector3D::new(0.0, 0.0, 4.0),
        ];
        let system = SimpleSystem::from_positions(&[0, 1, 1], &positions, 3.0, 0.0).unwrap();
        check_system(&system, 2).unwrap();

        assert_eq!(system.neighbor_counts().unwrap(), &[1, 1, 0]);

        let neighbors = system.neighbors_of(0).unwrap();
        assert_eq!(neighbors[0].index, 1);
        assert_eq!(neighbors[0].species, 1);
        assert_eq!(neighbors[0].distance, 1.5);
        assert_eq!(neighbors[0].vector, Vector3D::new(0.0, 1.5, 0.0));

        let neighbors = system.neighbors_of(1).unwrap();
        assert_eq!(neighbors[0].index, 0);
        assert_eq!(neighbors[0].vector, Vector3D::new(0.0, -1.5, 0.0));

        let error = SimpleSystem::from_positions(&[0], &positions, 3.0, 0.0).unwrap_err();
        assert_eq!(error.to_string(), "invalid parameter: got 1 species but 3 positions");
    }

    #[test]
    fn displace_neighbors() {
        let mut system = SimpleSystem::new(0.0);
        system.add_atom(0, vec![Neighbor::new(1, 0, Vector3D::new(1.0, 0.0, 0.0))]);
        system.add_atom(0, vec![Neighbor::new(0, 0, Vector3D::new(-1.0, 0.0, 0.0))]);

        let neighbor = &mut system.neighbors_mut(1)[0];
        *neighbor = Neighbor::new(neighbor.index, neighbor.species, Vector3D::new(0.0, -2.0, 0.0));

        assert_eq!(system.neighbors_of(0).unwrap()[0].distance, 1.0);
        assert_eq!(system.neighbors_of(1).unwrap()[0].distance, 2.0);
    }
}
