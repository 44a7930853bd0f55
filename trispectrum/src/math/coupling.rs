use ndarray::Array2;
use num_complex::Complex64;
use once_cell::sync::Lazy;

use log::info;

use crate::Error;

/// Largest maximal angular order for which coupling tensors are available
pub const MAX_SUPPORTED_ANGULAR: usize = 3;

fn factorial(n: i32) -> f64 {
    debug_assert!(n >= 0);
    (1..=n).fold(1.0, |acc, i| acc * i as f64)
}

/// Wigner 3j symbol `(l1 l2 l3; m1 m2 m3)`, computed with the Racah formula.
///
/// This uses floating point factorials, and is only accurate for the small
/// angular orders used in this crate (up to l ≈ 20).
pub fn wigner_3j(l1: i32, l2: i32, l3: i32, m1: i32, m2: i32, m3: i32) -> f64 {
    if m1 + m2 + m3 != 0 {
        return 0.0;
    }

    if l3 < (l1 - l2).abs() || l3 > l1 + l2 {
        return 0.0;
    }

    if m1.abs() > l1 || m2.abs() > l2 || m3.abs() > l3 {
        return 0.0;
    }

    let triangle = factorial(l1 + l2 - l3) * factorial(l1 - l2 + l3) * factorial(-l1 + l2 + l3)
        / factorial(l1 + l2 + l3 + 1);

    let prefactor = triangle
        * factorial(l1 + m1) * factorial(l1 - m1)
        * factorial(l2 + m2) * factorial(l2 - m2)
        * factorial(l3 + m3) * factorial(l3 - m3);

    let t_min = 0.max(l2 - l3 - m1).max(l1 - l3 + m2);
    let t_max = (l1 + l2 - l3).min(l1 - m1).min(l2 + m2);

    let mut sum = 0.0;
    for t in t_min..=t_max {
        let sign = if t % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign / (
            factorial(t)
            * factorial(l3 - l2 + t + m1)
            * factorial(l3 - l1 + t - m2)
            * factorial(l1 + l2 - l3 - t)
            * factorial(l1 - t - m1)
            * factorial(l2 - t + m2)
        );
    }

    let sign = if (l1 - l2 - m3).rem_euclid(2) == 0 { 1.0 } else { -1.0 };
    return sign * f64::sqrt(prefactor) * sum;
}

/// Non-zero entries of the complex conjugate of row `m` of the matrix `U`
/// transforming complex spherical harmonics (with Condon-Shortley phase) into
/// the real spherical harmonics of [`crate::math::SphericalHarmonics`]:
///
/// `Y_l^m (real) = sum_μ U[m, μ] Y_l^μ (complex)`
///
/// Each entry is given as `(μ, conj(U[m, μ]))`.
fn real_to_complex_row(m: i32) -> [(i32, Complex64); 2] {
    let inv_sqrt_2 = std::f64::consts::FRAC_1_SQRT_2;
    let parity = if m % 2 == 0 { 1.0 } else { -1.0 };
    if m > 0 {
        [
            (m, Complex64::new(parity * inv_sqrt_2, 0.0)),
            (-m, Complex64::new(inv_sqrt_2, 0.0)),
        ]
    } else if m < 0 {
        [
            (m, Complex64::new(0.0, -inv_sqrt_2)),
            (-m, Complex64::new(0.0, parity * inv_sqrt_2)),
        ]
    } else {
        // second entry has a zero weight
        [(0, Complex64::new(1.0, 0.0)), (0, Complex64::new(0.0, 0.0))]
    }
}

/// Coupling coefficient between real spherical harmonics of orders `l1, l2,
/// l3` and magnetic orders `m1, m2, m3` (each `-l <= m <= l`).
///
/// This is the Wigner 3j symbol expressed in the basis of real spherical
/// harmonics. The transformed tensor is either purely real or purely
/// imaginary depending on the parity of `l1 + l2 + l3`; both parts are
/// invariant under rotations so we use their sum.
fn real_coupling(l1: i32, l2: i32, l3: i32, m1: i32, m2: i32, m3: i32) -> f64 {
    let mut total = Complex64::new(0.0, 0.0);
    for (mu1, u1) in real_to_complex_row(m1) {
        for (mu2, u2) in real_to_complex_row(m2) {
            for (mu3, u3) in real_to_complex_row(m3) {
                if mu1 + mu2 + mu3 != 0 {
                    continue;
                }
                let w3j = wigner_3j(l1, l2, l3, mu1, mu2, mu3);
                total += w3j * u1 * u2 * u3;
            }
        }
    }

    // cleanup rounding noise so that the sparse entries are exact
    let clean = |x: f64| if x.abs() < 1e-14 { 0.0 } else { x };
    return clean(total.re) + clean(total.im);
}

/// A single non-zero entry in a coupling tensor block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingEntry {
    /// shifted magnetic index `m1 + l1`, in `[0, 2 l1 + 1)`
    pub m1: usize,
    /// shifted magnetic index `m2 + l2`, in `[0, 2 l2 + 1)`
    pub m2: usize,
    /// shifted magnetic index `m3 + l3`, in `[0, 2 l3 + 1)`
    pub m3: usize,
    /// value of the coupling coefficient
    pub value: f64,
}

/// Rotation-invariant coupling tensor for three real spherical harmonics
/// expansions with `l <= max_angular`.
///
/// The dense table has one row per `(l1, l2, l3)` with index `l1 (L + 1)^2 +
/// l2 (L + 1) + l3` and one column per `(m1, m2, m3)` with index `m1 (2L +
/// 1)^2 + m2 (2L + 1) + m3`, where the `m` are shifted magnetic indexes in
/// `[0, 2l + 1)` and `L = max_angular`.
#[derive(Debug, Clone)]
pub struct CouplingTensor {
    max_angular: usize,
    table: Array2<f64>,
    /// non-zero entries for each row of the table
    entries: Vec<Vec<CouplingEntry>>,
}

impl CouplingTensor {
    /// Generate the coupling tensor for the given `max_angular`
    pub fn new(max_angular: usize) -> CouplingTensor {
        let n_l = max_angular + 1;
        let n_m = 2 * max_angular + 1;
        let mut table = Array2::zeros((n_l * n_l * n_l, n_m * n_m * n_m));
        let mut entries = vec![Vec::new(); n_l * n_l * n_l];

        for l1 in 0..n_l {
            for l2 in 0..n_l {
                for l3 in 0..n_l {
                    let row = l1 * n_l * n_l + l2 * n_l + l3;
                    for m1 in 0..(2 * l1 + 1) {
                        for m2 in 0..(2 * l2 + 1) {
                            for m3 in 0..(2 * l3 + 1) {
                                let value = real_coupling(
                                    l1 as i32, l2 as i32, l3 as i32,
                                    m1 as i32 - l1 as i32,
                                    m2 as i32 - l2 as i32,
                                    m3 as i32 - l3 as i32,
                                );

                                if value != 0.0 {
                                    table[[row, m1 * n_m * n_m + m2 * n_m + m3]] = value;
                                    entries[row].push(CouplingEntry { m1, m2, m3, value });
                                }
                            }
                        }
                    }
                }
            }
        }

        CouplingTensor { max_angular, table, entries }
    }

    /// Maximal angular order of this coupling tensor
    pub fn max_angular(&self) -> usize {
        self.max_angular
    }

    /// Row of the dense table corresponding to `(l1, l2, l3)`
    #[inline]
    pub fn angular_key(&self, l1: usize, l2: usize, l3: usize) -> usize {
        let n_l = self.max_angular + 1;
        debug_assert!(l1 < n_l && l2 < n_l && l3 < n_l);
        l1 * n_l * n_l + l2 * n_l + l3
    }

    /// Column of the dense table corresponding to the shifted magnetic
    /// indexes `(m1, m2, m3)`
    #[inline]
    pub fn magnetic_key(&self, m1: usize, m2: usize, m3: usize) -> usize {
        let n_m = 2 * self.max_angular + 1;
        m1 * n_m * n_m + m2 * n_m + m3
    }

    /// Get a single coupling coefficient, using shifted magnetic indexes `mi`
    /// in `[0, 2 li + 1)`.
    pub fn get(&self, l1: usize, l2: usize, l3: usize, m1: usize, m2: usize, m3: usize) -> f64 {
        debug_assert!(m1 < 2 * l1 + 1 && m2 < 2 * l2 + 1 && m3 < 2 * l3 + 1);
        self.table[[self.angular_key(l1, l2, l3), self.magnetic_key(m1, m2, m3)]]
    }

    /// Get all non-zero coefficients for `(l1, l2, l3)`
    pub fn entries(&self, l1: usize, l2: usize, l3: usize) -> &[CouplingEntry] {
        &self.entries[self.angular_key(l1, l2, l3)]
    }

    /// Get the full dense table
    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }
}

static COUPLING_TENSORS: Lazy<Vec<CouplingTensor>> = Lazy::new(|| {
    info!("generating coupling tensors for max_angular up to {}", MAX_SUPPORTED_ANGULAR);
    (0..=MAX_SUPPORTED_ANGULAR).map(CouplingTensor::new).collect()
});

/// Get the coupling tensor for the given `max_angular`, or an error if there
/// is no such tensor.
pub fn coupling_tensor(max_angular: usize) -> Result<&'static CouplingTensor, Error> {
    if max_angular > MAX_SUPPORTED_ANGULAR {
        return Err(Error::UnsupportedMaxAngular {
            max_angular: max_angular,
            max_supported: MAX_SUPPORTED_ANGULAR,
        });
    }

    return Ok(&COUPLING_TENSORS[max_angular]);
}
