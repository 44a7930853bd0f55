use std::f64::consts::PI;
use std::str::FromStr;

use crate::Error;

/// Name of the cutoff function family, used in the parameters of the
/// calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CutoffFunctionKind {
    /// `f(r) = (r_cut - r)^2`, without hyper-parameters
    Quadratic,
    /// Step function, `f(r) = 1` inside the cutoff, without hyper-parameters
    Hard,
    /// Cosine cutoff `f(r) = 1/2 (1 + cos(π r / r_cut))` without
    /// hyper-parameters, or shifted cosine `f(r) = 1/2 (1 + cos(π (r - r_cut +
    /// width) / width))` when given a single `[width]` hyper-parameter.
    Cosine,
}

impl CutoffFunctionKind {
    /// Get the name of this cutoff function, as used in JSON parameters
    pub fn name(self) -> &'static str {
        match self {
            CutoffFunctionKind::Quadratic => "quadratic",
            CutoffFunctionKind::Hard => "hard",
            CutoffFunctionKind::Cosine => "cosine",
        }
    }
}

impl FromStr for CutoffFunctionKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "quadratic" => Ok(CutoffFunctionKind::Quadratic),
            "hard" => Ok(CutoffFunctionKind::Hard),
            "cosine" => Ok(CutoffFunctionKind::Cosine),
            _ => Err(Error::InvalidParameter(format!(
                "unknown cutoff function '{}'", name
            ))),
        }
    }
}

/// Smooth envelope multiplying the radial basis, going to zero at the cutoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutoffFunction {
    Quadratic,
    Hard,
    Cosine,
    ShiftedCosine { width: f64 },
}

impl CutoffFunction {
    /// Create a cutoff function of the given `kind` from its hyper-parameters
    pub fn new(kind: CutoffFunctionKind, hyps: &[f64]) -> Result<CutoffFunction, Error> {
        match (kind, hyps) {
            (CutoffFunctionKind::Quadratic, []) => Ok(CutoffFunction::Quadratic),
            (CutoffFunctionKind::Hard, []) => Ok(CutoffFunction::Hard),
            (CutoffFunctionKind::Cosine, []) => Ok(CutoffFunction::Cosine),
            (CutoffFunctionKind::Cosine, &[width]) => {
                if width <= 0.0 || !width.is_finite() {
                    return Err(Error::InvalidParameter(format!(
                        "expected positive width for shifted cosine cutoff function, got {}",
                        width
                    )));
                }
                Ok(CutoffFunction::ShiftedCosine { width })
            }
            (CutoffFunctionKind::Cosine, _) => Err(Error::InvalidParameter(format!(
                "expected 0 or 1 hyper-parameters for the 'cosine' cutoff function, got {}",
                hyps.len()
            ))),
            _ => Err(Error::InvalidParameter(format!(
                "expected no hyper-parameters for the '{}' cutoff function, got {}",
                kind.name(), hyps.len()
            ))),
        }
    }

    /// Evaluate the cutoff function at distance `r`
    pub fn value(&self, r: f64, cutoff: f64) -> f64 {
        if r > cutoff {
            return 0.0;
        }

        match *self {
            CutoffFunction::Quadratic => (cutoff - r) * (cutoff - r),
            CutoffFunction::Hard => 1.0,
            CutoffFunction::Cosine => 0.5 * (1.0 + f64::cos(PI * r / cutoff)),
            CutoffFunction::ShiftedCosine { width } => {
                if r <= cutoff - width {
                    1.0
                } else {
                    let s = PI * (r - cutoff + width) / width;
                    0.5 * (1.0 + f64::cos(s))
                }
            }
        }
    }

    /// Evaluate the derivative of the cutoff function with respect to `r`
    pub fn derivative(&self, r: f64, cutoff: f64) -> f64 {
        if r > cutoff {
            return 0.0;
        }

        match *self {
            CutoffFunction::Quadratic => -2.0 * (cutoff - r),
            CutoffFunction::Hard => 0.0,
            CutoffFunction::Cosine => -0.5 * PI / cutoff * f64::sin(PI * r / cutoff),
            CutoffFunction::ShiftedCosine { width } => {
                if r <= cutoff - width {
                    0.0
                } else {
                    let s = PI * (r - cutoff + width) / width;
                    -0.5 * PI * f64::sin(s) / width
                }
            }
        }
    }
}
