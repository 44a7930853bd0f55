//! Third-order bispectrum (B3) descriptor: triple products of single bond
//! coefficients contracted with rotation-invariant coupling tensors.

use log::debug;

use crate::{Error, System};
use crate::descriptor::DescriptorValues;
use crate::math::coupling_tensor;

use super::CalculatorBase;

mod radial;
pub use self::radial::{RadialBasis, RadialBasisKind};

mod cutoff;
pub use self::cutoff::{CutoffFunction, CutoffFunctionKind};

mod single_bond;
pub use self::single_bond::{SingleBond, SingleBondBasis, compute_single_bond};

mod bispectrum;
pub use self::bispectrum::{Bispectrum, B3Feature, b3_features, b3_size, compute_bispectrum};

/// Parameters for the B3 calculator
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct B3Parameters {
    /// Number of species. Species of atoms and neighbors must be in `[0,
    /// n_species)`.
    pub n_species: usize,
    /// Number of radial basis functions
    pub n_radial: usize,
    /// Maximal angular order of the spherical harmonics, at most 3
    pub max_angular: usize,
    /// Radial basis functions family
    pub radial_basis: RadialBasisKind,
    /// Hyper-parameters of the radial basis, starting with `[r_min, r_cut]`.
    /// `r_cut` is also the cutoff radius of the descriptor.
    pub radial_hyps: Vec<f64>,
    /// Cutoff function multiplying the radial basis
    pub cutoff_function: CutoffFunctionKind,
    /// Hyper-parameters of the cutoff function
    #[serde(default)]
    pub cutoff_hyps: Vec<f64>,
}

/// Calculator for the B3 descriptor
#[derive(Debug)]
pub struct B3 {
    parameters: B3Parameters,
    basis: SingleBondBasis,
    n_descriptors: usize,
}

impl B3 {
    /// Create a new B3 calculator, checking all parameters
    pub fn new(parameters: B3Parameters) -> Result<B3, Error> {
        if parameters.n_species == 0 {
            return Err(Error::InvalidParameter(
                "n_species must be at least 1, got 0".into()
            ));
        }

        if parameters.n_radial == 0 {
            return Err(Error::InvalidParameter(
                "n_radial must be at least 1, got 0".into()
            ));
        }

        coupling_tensor(parameters.max_angular)?;

        let radial_basis = RadialBasis::new(parameters.radial_basis, &parameters.radial_hyps)?;
        let cutoff_function = CutoffFunction::new(parameters.cutoff_function, &parameters.cutoff_hyps)?;

        let basis = SingleBondBasis::new(
            parameters.n_species,
            parameters.n_radial,
            parameters.max_angular,
            radial_basis,
            cutoff_function,
        );
        let n_descriptors = b3_size(parameters.n_species * parameters.n_radial, parameters.max_angular);

        return Ok(B3 { parameters, basis, n_descriptors });
    }

    /// Get the parameters used to create this calculator
    pub fn parameters(&self) -> &B3Parameters {
        &self.parameters
    }

    /// Number of descriptor components per atom
    pub fn n_descriptors(&self) -> usize {
        self.n_descriptors
    }

    /// Cutoff radius of the descriptor
    pub fn cutoff(&self) -> f64 {
        self.basis.cutoff()
    }

    /// Compute the B3 descriptor for all atoms in `system`
    #[time_graph::instrument(name = "B3::compute")]
    pub fn compute(&self, system: &dyn System) -> Result<DescriptorValues, Error> {
        let n_species = self.parameters.n_species;
        // the system is validated while computing single bond coefficients
        let single_bond = compute_single_bond(system, &self.basis)?;
        let bispectrum = compute_bispectrum(
            &single_bond,
            n_species,
            self.parameters.n_radial,
            self.parameters.max_angular,
        )?;
        debug_assert_eq!(bispectrum.values.ncols(), self.n_descriptors);

        debug!("partitioning B3 descriptor for {} species", n_species);
        return DescriptorValues::from_atoms(
            system.species()?,
            n_species,
            system.volume()?,
            &single_bond,
            &bispectrum,
        );
    }
}

impl CalculatorBase for B3 {
    fn name(&self) -> String {
        "B3".into()
    }

    fn parameters(&self) -> String {
        serde_json::to_string(&self.parameters).expect("failed to serialize to JSON")
    }

    fn compute(&self, system: &dyn System) -> Result<DescriptorValues, Error> {
        B3::compute(self, system)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::systems::test_utils::test_system;

    use super::*;

    fn parameters(n_species: usize, n_radial: usize, max_angular: usize) -> B3Parameters {
        B3Parameters {
            n_species,
            n_radial,
            max_angular,
            radial_basis: RadialBasisKind::Chebyshev,
            radial_hyps: vec![0.0, 3.5],
            cutoff_function: CutoffFunctionKind::Quadratic,
            cutoff_hyps: vec![],
        }
    }

    #[test]
    fn json_parameters() {
        let json = r#"{
            "n_species": 2,
            "n_radial": 4,
            "max_angular": 3,
            "radial_basis": "weighted_chebyshev",
            "radial_hyps": [0.5, 5.0, 3.0],
            "cutoff_function": "cosine"
        }"#;
        let parameters = serde_json::from_str::<B3Parameters>(json).unwrap();
        assert_eq!(parameters.radial_basis, RadialBasisKind::WeightedChebyshev);
        assert!(parameters.cutoff_hyps.is_empty());

        let calculator = B3::new(parameters).unwrap();
        assert_eq!(calculator.cutoff(), 5.0);
        assert_eq!(calculator.n_descriptors(), 120 * 20);

        let error = serde_json::from_str::<B3Parameters>(
            &json.replace("weighted_chebyshev", "bessel")
        ).unwrap_err();
        assert!(error.to_string().contains("unknown variant `bessel`"));

        let error = serde_json::from_str::<B3Parameters>(
            &json.replace("\"n_species\"", "\"cutoff\": 3, \"n_species\"")
        ).unwrap_err();
        assert!(error.to_string().contains("unknown field `cutoff`"));
    }

    #[test]
    fn invalid_parameters() {
        let error = B3::new(parameters(1, 1, 5)).unwrap_err();
        assert!(matches!(error, Error::UnsupportedMaxAngular { max_angular: 5, max_supported: 3 }));

        let error = B3::new(parameters(0, 1, 1)).unwrap_err();
        assert_eq!(error.to_string(), "invalid parameter: n_species must be at least 1, got 0");

        let error = B3::new(parameters(1, 0, 1)).unwrap_err();
        assert_eq!(error.to_string(), "invalid parameter: n_radial must be at least 1, got 0");

        let mut invalid = parameters(1, 1, 1);
        invalid.radial_hyps = vec![];
        assert!(B3::new(invalid).is_err());

        let mut invalid = parameters(1, 1, 1);
        invalid.cutoff_hyps = vec![1.0];
        assert!(B3::new(invalid).is_err());
    }

    #[test]
    fn norms() {
        let calculator = B3::new(parameters(2, 3, 2)).unwrap();
        let values = calculator.compute(&test_system("methane")).unwrap();

        assert_eq!(values.n_atoms, 5);
        assert_eq!(values.n_descriptors, calculator.n_descriptors());
        assert_eq!(values.blocks[0].n_atoms, 1);
        assert_eq!(values.blocks[1].n_atoms, 4);

        for block in &values.blocks {
            for (row, &norm) in block.descriptors.rows().into_iter().zip(&block.descriptor_norms) {
                assert_relative_eq!(row.dot(&row).sqrt(), norm, max_relative = 1e-12);
            }

            let dots = block.descriptor_force_dervs.rows().into_iter().enumerate()
                .map(|(i, gradient)| {
                    let slot = i / 3;
                    let atom = block.cumulative_neighbor_counts.iter()
                        .rposition(|&start| start <= slot)
                        .expect("missing atom");
                    gradient.dot(&block.descriptors.row(atom))
                });

            for (dot, &expected) in dots.zip(&block.descriptor_force_dots) {
                assert_relative_eq!(dot, expected, max_relative = 1e-12, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn calculator_base() {
        let calculator: Box<dyn CalculatorBase> = Box::new(B3::new(parameters(1, 2, 1)).unwrap());
        assert_eq!(calculator.name(), "B3");

        let parameters = serde_json::from_str::<B3Parameters>(&calculator.parameters()).unwrap();
        assert_eq!(parameters, self::parameters(1, 2, 1));
    }
}
