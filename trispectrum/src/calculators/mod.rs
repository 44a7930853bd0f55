use crate::{Error, System};
use crate::descriptor::DescriptorValues;

/// The `CalculatorBase` trait is the interface shared by all calculators.
pub trait CalculatorBase: Send + Sync {
    /// Get the name of this Calculator
    fn name(&self) -> String;

    /// Get the parameters used to create this Calculator as a JSON string
    fn parameters(&self) -> String;

    /// Compute the descriptor for all atoms in the given `system`
    fn compute(&self, system: &dyn System) -> Result<DescriptorValues, Error>;
}

pub mod b3;
pub use self::b3::{B3, B3Parameters};
