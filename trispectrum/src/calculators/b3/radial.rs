use std::str::FromStr;

use crate::Error;

/// Name of the radial basis functions family, used in the parameters of the
/// calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RadialBasisKind {
    /// Chebyshev polynomials of the first kind, `T_n(x)` with `x` going
    /// linearly from -1 at `r_min` to 1 at `r_cut`. Hyper-parameters are
    /// `[r_min, r_cut]`.
    Chebyshev,
    /// Shifted Chebyshev polynomials `(1 + T_n(x)) / 2`, which are always
    /// positive. Hyper-parameters are `[r_min, r_cut]`.
    PositiveChebyshev,
    /// Chebyshev polynomials with an exponential scaling of the distance,
    /// giving more resolution at small distances. Hyper-parameters are
    /// `[r_min, r_cut, λ]`.
    WeightedChebyshev,
    /// Positive version of the weighted Chebyshev polynomials.
    /// Hyper-parameters are `[r_min, r_cut, λ]`.
    WeightedPositiveChebyshev,
    /// Gaussian functions of width `σ`, centered on equispaced points between
    /// `r_min` and `r_cut`. Hyper-parameters are `[r_min, r_cut, σ]`.
    EquispacedGaussians,
}

impl RadialBasisKind {
    /// Get the name of this radial basis, as used in JSON parameters
    pub fn name(self) -> &'static str {
        match self {
            RadialBasisKind::Chebyshev => "chebyshev",
            RadialBasisKind::PositiveChebyshev => "positive_chebyshev",
            RadialBasisKind::WeightedChebyshev => "weighted_chebyshev",
            RadialBasisKind::WeightedPositiveChebyshev => "weighted_positive_chebyshev",
            RadialBasisKind::EquispacedGaussians => "equispaced_gaussians",
        }
    }

    fn expected_hyps(self) -> usize {
        match self {
            RadialBasisKind::Chebyshev | RadialBasisKind::PositiveChebyshev => 2,
            RadialBasisKind::WeightedChebyshev |
            RadialBasisKind::WeightedPositiveChebyshev |
            RadialBasisKind::EquispacedGaussians => 3,
        }
    }
}

impl FromStr for RadialBasisKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "chebyshev" => Ok(RadialBasisKind::Chebyshev),
            "positive_chebyshev" => Ok(RadialBasisKind::PositiveChebyshev),
            "weighted_chebyshev" => Ok(RadialBasisKind::WeightedChebyshev),
            "weighted_positive_chebyshev" => Ok(RadialBasisKind::WeightedPositiveChebyshev),
            "equispaced_gaussians" => Ok(RadialBasisKind::EquispacedGaussians),
            _ => Err(Error::InvalidParameter(format!(
                "unknown radial basis '{}'", name
            ))),
        }
    }
}

/// A fully specified radial basis, mapping a distance to `n_radial` values
/// and their derivatives. All functions are zero outside of `[r_min, r_cut]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RadialBasis {
    Chebyshev { r_min: f64, r_cut: f64 },
    PositiveChebyshev { r_min: f64, r_cut: f64 },
    WeightedChebyshev { r_min: f64, r_cut: f64, lambda: f64 },
    WeightedPositiveChebyshev { r_min: f64, r_cut: f64, lambda: f64 },
    EquispacedGaussians { r_min: f64, r_cut: f64, sigma: f64 },
}

impl RadialBasis {
    /// Create a radial basis of the given `kind` from its hyper-parameters,
    /// checking that they are valid.
    pub fn new(kind: RadialBasisKind, hyps: &[f64]) -> Result<RadialBasis, Error> {
        if hyps.len() != kind.expected_hyps() {
            return Err(Error::InvalidParameter(format!(
                "expected {} hyper-parameters for the '{}' radial basis, got {}",
                kind.expected_hyps(), kind.name(), hyps.len()
            )));
        }

        if hyps.iter().any(|h| !h.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "radial basis hyper-parameters must be finite, got {:?}", hyps
            )));
        }

        let (r_min, r_cut) = (hyps[0], hyps[1]);
        if r_min < 0.0 || r_cut <= r_min {
            return Err(Error::InvalidParameter(format!(
                "expected 0 <= r_min < r_cut for the radial basis, got r_min={} and r_cut={}",
                r_min, r_cut
            )));
        }

        let basis = match kind {
            RadialBasisKind::Chebyshev => RadialBasis::Chebyshev { r_min, r_cut },
            RadialBasisKind::PositiveChebyshev => RadialBasis::PositiveChebyshev { r_min, r_cut },
            RadialBasisKind::WeightedChebyshev | RadialBasisKind::WeightedPositiveChebyshev => {
                let lambda = hyps[2];
                if lambda <= 0.0 {
                    return Err(Error::InvalidParameter(format!(
                        "expected a positive λ for the '{}' radial basis, got {}",
                        kind.name(), lambda
                    )));
                }

                if kind == RadialBasisKind::WeightedChebyshev {
                    RadialBasis::WeightedChebyshev { r_min, r_cut, lambda }
                } else {
                    RadialBasis::WeightedPositiveChebyshev { r_min, r_cut, lambda }
                }
            }
            RadialBasisKind::EquispacedGaussians => {
                let sigma = hyps[2];
                if sigma <= 0.0 {
                    return Err(Error::InvalidParameter(format!(
                        "expected a positive σ for the 'equispaced_gaussians' radial basis, got {}",
                        sigma
                    )));
                }
                RadialBasis::EquispacedGaussians { r_min, r_cut, sigma }
            }
        };

        return Ok(basis);
    }

    /// Get the range `[r_min, r_cut]` of this basis
    pub fn range(&self) -> (f64, f64) {
        match *self {
            RadialBasis::Chebyshev { r_min, r_cut } |
            RadialBasis::PositiveChebyshev { r_min, r_cut } |
            RadialBasis::WeightedChebyshev { r_min, r_cut, .. } |
            RadialBasis::WeightedPositiveChebyshev { r_min, r_cut, .. } |
            RadialBasis::EquispacedGaussians { r_min, r_cut, .. } => (r_min, r_cut),
        }
    }

    /// Get the outer cutoff radius of this basis
    pub fn r_cut(&self) -> f64 {
        self.range().1
    }

    /// Evaluate all radial functions and their derivatives with respect to
    /// `r` at the given distance. The number of functions is given by the
    /// size of `values`.
    pub fn compute(&self, r: f64, values: &mut [f64], derivatives: &mut [f64]) {
        assert_eq!(values.len(), derivatives.len());

        let (r_min, r_cut) = self.range();
        if r < r_min || r > r_cut {
            values.fill(0.0);
            derivatives.fill(0.0);
            return;
        }

        let width = r_cut - r_min;
        let u = (r - r_min) / width;

        match *self {
            RadialBasis::Chebyshev { .. } => {
                chebyshev(2.0 * u - 1.0, 2.0 / width, values, derivatives);
            }
            RadialBasis::PositiveChebyshev { .. } => {
                chebyshev(2.0 * u - 1.0, 2.0 / width, values, derivatives);
                make_positive(values, derivatives);
            }
            RadialBasis::WeightedChebyshev { lambda, .. } => {
                let (x, dx_dr) = exponential_scaling(u, width, lambda);
                chebyshev(x, dx_dr, values, derivatives);
            }
            RadialBasis::WeightedPositiveChebyshev { lambda, .. } => {
                let (x, dx_dr) = exponential_scaling(u, width, lambda);
                chebyshev(x, dx_dr, values, derivatives);
                make_positive(values, derivatives);
            }
            RadialBasis::EquispacedGaussians { sigma, .. } => {
                let n_radial = values.len();
                let spacing = if n_radial > 1 { width / (n_radial - 1) as f64 } else { 0.0 };
                let sigma2 = sigma * sigma;
                for (n, (value, derivative)) in values.iter_mut().zip(derivatives.iter_mut()).enumerate() {
                    let delta = r - (r_min + n as f64 * spacing);
                    *value = f64::exp(-0.5 * delta * delta / sigma2);
                    *derivative = -delta / sigma2 * *value;
                }
            }
        }
    }
}

/// Evaluate Chebyshev polynomials `T_n(x)` and their derivatives with respect
/// to `r`, where `dx_dr` is the derivative of `x` with respect to `r`.
fn chebyshev(x: f64, dx_dr: f64, values: &mut [f64], derivatives: &mut [f64]) {
    let n_radial = values.len();
    if n_radial == 0 {
        return;
    }

    // derivatives are first computed with respect to x
    values[0] = 1.0;
    derivatives[0] = 0.0;
    if n_radial > 1 {
        values[1] = x;
        derivatives[1] = 1.0;
    }

    for n in 2..n_radial {
        values[n] = 2.0 * x * values[n - 1] - values[n - 2];
        derivatives[n] = 2.0 * values[n - 1] + 2.0 * x * derivatives[n - 1] - derivatives[n - 2];
    }

    for derivative in derivatives {
        *derivative *= dx_dr;
    }
}

fn make_positive(values: &mut [f64], derivatives: &mut [f64]) {
    for (value, derivative) in values.iter_mut().zip(derivatives) {
        *value = 0.5 * (1.0 + *value);
        *derivative *= 0.5;
    }
}

/// Exponential mapping from `u in [0, 1]` to `x in [-1, 1]`, returning `x` and
/// its derivative with respect to `r`
fn exponential_scaling(u: f64, width: f64, lambda: f64) -> (f64, f64) {
    let normalization = 1.0 - f64::exp(-lambda);
    let exp = f64::exp(-lambda * u);
    let x = 1.0 - 2.0 * (1.0 - exp) / normalization;
    let dx_dr = -2.0 * lambda * exp / (normalization * width);
    return (x, dx_dr);
}
