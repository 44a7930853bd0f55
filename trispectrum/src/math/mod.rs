//! Mathematical building blocks: real spherical harmonics and the coupling
//! tensors used to build rotation invariants from them.

mod spherical_harmonics;
pub use self::spherical_harmonics::{lm_index, harmonics_count};
pub use self::spherical_harmonics::{SphericalHarmonics, SphericalHarmonicsCache};

mod coupling;
pub use self::coupling::{wigner_3j, MAX_SUPPORTED_ANGULAR};
pub use self::coupling::{CouplingTensor, CouplingEntry, coupling_tensor};
