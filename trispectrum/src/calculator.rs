use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::{System, Error};
use crate::descriptor::DescriptorValues;
use crate::calculators::CalculatorBase;

use crate::calculators::{B3, B3Parameters};

/// The `Calculator` type is the main entry point of this library, wrapping
/// one of the registered calculators, created from its name and JSON
/// parameters.
pub struct Calculator {
    implementation: Box<dyn CalculatorBase>,
    parameters: String,
}

impl std::fmt::Debug for Calculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Calculator({}, {})", self.name(), self.parameters)
    }
}

impl Calculator {
    /// Create a new calculator with the given `name` and `parameters`.
    ///
    /// The list of available calculators and the corresponding parameters are
    /// in the main documentation. The `parameters` should be formatted as JSON,
    /// according to the calculator's parameters type.
    pub fn new(name: &str, parameters: String) -> Result<Calculator, Error> {
        let creator = match REGISTERED_CALCULATORS.get(name) {
            Some(creator) => creator,
            None => {
                return Err(Error::InvalidParameter(
                    format!("unknown calculator with name '{}'", name)
                ));
            }
        };

        return Ok(Calculator {
            implementation: creator(&parameters)?,
            parameters: parameters,
        });
    }

    /// Get the name associated with this Calculator
    pub fn name(&self) -> String {
        self.implementation.name()
    }

    /// Get the parameters used to create this calculator in a string, formatted
    /// as JSON.
    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    /// Compute the descriptor for all atoms in `system`
    #[time_graph::instrument(name = "Calculator::compute")]
    pub fn compute(&self, system: &dyn System) -> Result<DescriptorValues, Error> {
        self.implementation.compute(system)
    }
}

type CalculatorCreator = fn(&str) -> Result<Box<dyn CalculatorBase>, Error>;

macro_rules! add_calculator {
    ($map :expr, $name :literal, $type :ty, $parameters :ty) => (
        $map.insert($name, (|json| {
            let parameters = serde_json::from_str::<$parameters>(json)?;
            Ok(Box::new(<$type>::new(parameters)?))
        }) as CalculatorCreator);
    );
}

static REGISTERED_CALCULATORS: Lazy<BTreeMap<&'static str, CalculatorCreator>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    add_calculator!(map, "b3", B3, B3Parameters);
    return map;
});
