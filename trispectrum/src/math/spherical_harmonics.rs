use std::f64::consts::SQRT_2;

use crate::Vector3D;

/// `\sqrt{\frac{1}{2 \pi}}`
const SQRT_1_OVER_2PI: f64 = 0.3989422804014327;
/// `\sqrt{3}`
const SQRT_3: f64 = 1.7320508075688772;
/// `\sqrt{3 / 2}`
const SQRT_3_OVER_2: f64 = 1.224744871391589;

/// Position of the `(l, m)` spherical harmonic in a flat array containing all
/// spherical harmonics up to some `l_max`, ordered by `l` and then by `m` from
/// `-l` to `l`.
#[inline]
pub fn lm_index(l: usize, m: isize) -> usize {
    debug_assert!(m.unsigned_abs() <= l);
    ((l * l + l) as isize + m) as usize
}

/// Number of spherical harmonics with `l <= max_angular`
#[inline]
pub fn harmonics_count(max_angular: usize) -> usize {
    (max_angular + 1) * (max_angular + 1)
}

/// Storage for quantities defined for `0 <= m <= l <= l_max`, used for the
/// associated Legendre polynomials and related factors.
#[derive(Debug, Clone)]
struct LegendreArray {
    max_angular: usize,
    data: Vec<f64>,
}

impl LegendreArray {
    fn new(max_angular: usize) -> LegendreArray {
        LegendreArray {
            max_angular: max_angular,
            data: vec![0.0; (max_angular + 1) * (max_angular + 2) / 2],
        }
    }
}

impl std::ops::Index<[usize; 2]> for LegendreArray {
    type Output = f64;
    #[inline]
    fn index(&self, [l, m]: [usize; 2]) -> &f64 {
        debug_assert!(l <= self.max_angular && m <= l);
        &self.data[m + l * (l + 1) / 2]
    }
}

impl std::ops::IndexMut<[usize; 2]> for LegendreArray {
    #[inline]
    fn index_mut(&mut self, [l, m]: [usize; 2]) -> &mut f64 {
        debug_assert!(l <= self.max_angular && m <= l);
        &mut self.data[m + l * (l + 1) / 2]
    }
}

/// Evaluator of real spherical harmonics `Y_l^m` and their Cartesian
/// gradients for all `l <= max_angular`.
///
/// The real spherical harmonics follow the convention from
/// <https://en.wikipedia.org/wiki/Spherical_harmonics#Real_form>, i.e.
/// `Y_1^{-1} ∝ y`, `Y_1^0 ∝ z` and `Y_1^1 ∝ x`. Values are computed with the
/// recurrence relations for normalized associated Legendre polynomials from
/// <https://arxiv.org/abs/1410.1748>.
#[derive(Debug, Clone)]
pub struct SphericalHarmonics {
    max_angular: usize,
    /// normalized associated Legendre polynomials `P_l^m(cos θ)`, including
    /// the Condon-Shortley phase
    legendre: LegendreArray,
    /// 'A' coefficient of the Legendre recurrence
    coefficient_a: LegendreArray,
    /// 'B' coefficient of the Legendre recurrence
    coefficient_b: LegendreArray,
    /// `sqrt((l + m)(l - m + 1)) P_l^{m - 1} - sqrt((l - m)(l + m + 1)) P_l^{m + 1}`
    delta_legendre: LegendreArray,
    /// `m / sin(θ) P_l^m`, evaluated as `-1 / (2 cos θ) ∆P_l^m` close to the
    /// poles to avoid dividing by `sin(θ) ~ 0`
    legendre_over_sin: LegendreArray,
}

impl SphericalHarmonics {
    /// Create a new evaluator for all `l <= max_angular`
    pub fn new(max_angular: usize) -> SphericalHarmonics {
        let mut coefficient_a = LegendreArray::new(max_angular);
        let mut coefficient_b = LegendreArray::new(max_angular);
        for l in 2..=max_angular {
            let l2 = (l * l) as f64;
            let lm1_2 = ((l - 1) * (l - 1)) as f64;
            for m in 0..(l - 1) {
                let m2 = (m * m) as f64;
                coefficient_a[[l, m]] = f64::sqrt((4.0 * l2 - 1.0) / (l2 - m2));
                coefficient_b[[l, m]] = -f64::sqrt((lm1_2 - m2) / (4.0 * lm1_2 - 1.0));
            }
        }

        SphericalHarmonics {
            max_angular: max_angular,
            legendre: LegendreArray::new(max_angular),
            coefficient_a: coefficient_a,
            coefficient_b: coefficient_b,
            delta_legendre: LegendreArray::new(max_angular),
            legendre_over_sin: LegendreArray::new(max_angular),
        }
    }

    /// Get the maximal angular order of this evaluator
    pub fn max_angular(&self) -> usize {
        self.max_angular
    }

    fn compute_legendre(&mut self, cos_theta: f64, sin_theta: f64) {
        let p = &mut self.legendre;
        let a = &self.coefficient_a;
        let b = &self.coefficient_b;

        let mut diagonal = SQRT_1_OVER_2PI;
        p[[0, 0]] = diagonal;
        if self.max_angular == 0 {
            return;
        }

        p[[1, 0]] = SQRT_3 * cos_theta * diagonal;
        diagonal *= -SQRT_3_OVER_2 * sin_theta;
        p[[1, 1]] = diagonal;

        for l in 2..=self.max_angular {
            for m in 0..(l - 1) {
                p[[l, m]] = a[[l, m]] * (cos_theta * p[[l - 1, m]] + b[[l, m]] * p[[l - 2, m]]);
            }

            p[[l, l - 1]] = f64::sqrt(2.0 * l as f64 + 1.0) * cos_theta * diagonal;
            diagonal *= -f64::sqrt(1.0 + 0.5 / l as f64) * sin_theta;
            p[[l, l]] = diagonal;
        }
    }

    fn compute_gradient_factors(&mut self, cos_theta: f64, sin_theta: f64) {
        let p = &self.legendre;
        let delta = |l: usize, m: usize, p_below: f64, p_above: f64| {
            f64::sqrt(((l + m) * (l - m + 1)) as f64) * p_below
            - f64::sqrt(((l - m) * (l + m + 1)) as f64) * p_above
        };

        self.delta_legendre[[0, 0]] = 0.0;
        for l in 1..=self.max_angular {
            // P_l^{-1} = - (l - 1)! / (l + 1)! P_l^1
            let p_minus_1 = -p[[l, 1]] / ((l * l + l) as f64);
            self.delta_legendre[[l, 0]] = delta(l, 0, p_minus_1, p[[l, 1]]);

            for m in 1..l {
                self.delta_legendre[[l, m]] = delta(l, m, p[[l, m - 1]], p[[l, m + 1]]);
            }

            self.delta_legendre[[l, l]] = delta(l, l, p[[l, l - 1]], 0.0);
        }

        for l in 0..=self.max_angular {
            for m in 0..=l {
                self.legendre_over_sin[[l, m]] = if sin_theta > 0.1 {
                    m as f64 / sin_theta * p[[l, m]]
                } else {
                    -0.5 / cos_theta * self.delta_legendre[[l, m]]
                };
            }
        }
    }

    /// Evaluate all spherical harmonics in the direction of `vector` (which
    /// does not need to be normalized), storing them in `values` at the
    /// position given by [`lm_index`].
    ///
    /// If `gradients` is `Some`, the gradients with respect to the Cartesian
    /// components of `vector` are stored there as well. Since the spherical
    /// harmonics only depend on the direction, these gradients scale as `1 /
    /// |vector|`.
    #[allow(clippy::too_many_lines)]
    pub fn compute(&mut self, vector: Vector3D, values: &mut [f64], mut gradients: Option<[&mut [f64]; 3]>) {
        let size = harmonics_count(self.max_angular);
        assert_eq!(
            values.len(), size,
            "wrong size for the values array, expected {}, got {}", size, values.len()
        );
        if let Some(ref gradients) = gradients {
            for gradient in gradients {
                assert_eq!(
                    gradient.len(), size,
                    "wrong size for one gradient array, expected {}, got {}", size, gradient.len()
                );
            }
        }

        let distance = vector.norm();
        assert!(distance > 0.0, "can not compute spherical harmonics for a zero vector");
        let direction = vector / distance;

        let sin_theta = f64::hypot(direction[0], direction[1]);
        let cos_theta = direction[2];
        let (cos_phi, sin_phi) = if sin_theta > f64::EPSILON {
            (direction[0] / sin_theta, direction[1] / sin_theta)
        } else {
            (1.0, 0.0)
        };

        self.compute_legendre(cos_theta, sin_theta);
        if gradients.is_some() {
            self.compute_gradient_factors(cos_theta, sin_theta);
        }

        for l in 0..=self.max_angular {
            values[lm_index(l, 0)] = self.legendre[[l, 0]] / SQRT_2;
        }

        if let Some([ref mut dx, ref mut dy, ref mut dz]) = gradients {
            dx[0] = 0.0;
            dy[0] = 0.0;
            dz[0] = 0.0;
            for l in 1..=self.max_angular {
                let factor = f64::sqrt(0.5 * (l * (l + 1)) as f64) * self.legendre[[l, 1]];
                let i = lm_index(l, 0);
                dx[i] = cos_phi * cos_theta * factor;
                dy[i] = sin_phi * cos_theta * factor;
                dz[i] = -sin_theta * factor;
            }
        }

        // cos(m ϕ) and sin(m ϕ) from the angle addition formulas
        let mut cos_m_phi = 1.0;
        let mut sin_m_phi = 0.0;
        for m in 1..=self.max_angular {
            let previous_cos = cos_m_phi;
            cos_m_phi = previous_cos * cos_phi - sin_m_phi * sin_phi;
            sin_m_phi = sin_m_phi * cos_phi + previous_cos * sin_phi;

            // removes the Condon-Shortley phase included in the Legendre
            // polynomials
            let phase = if m % 2 == 0 { 1.0 } else { -1.0 };
            let cos_m = phase * cos_m_phi;
            let sin_m = phase * sin_m_phi;

            let m_positive = m as isize;
            let m_negative = -(m as isize);
            for l in m..=self.max_angular {
                let p_lm = self.legendre[[l, m]];
                values[lm_index(l, m_positive)] = p_lm * cos_m;
                values[lm_index(l, m_negative)] = p_lm * sin_m;
            }

            if let Some([ref mut dx, ref mut dy, ref mut dz]) = gradients {
                for l in m..=self.max_angular {
                    let delta = self.delta_legendre[[l, m]];
                    let over_sin = self.legendre_over_sin[[l, m]];

                    let positive = lm_index(l, m_positive);
                    let negative = lm_index(l, m_negative);

                    dx[positive] = sin_phi * over_sin * sin_m - 0.5 * cos_theta * cos_phi * cos_m * delta;
                    dx[negative] = -sin_phi * over_sin * cos_m - 0.5 * cos_theta * cos_phi * sin_m * delta;

                    dy[positive] = -cos_phi * over_sin * sin_m - 0.5 * cos_theta * sin_phi * cos_m * delta;
                    dy[negative] = cos_phi * over_sin * cos_m - 0.5 * cos_theta * sin_phi * sin_m * delta;

                    dz[positive] = 0.5 * sin_theta * cos_m * delta;
                    dz[negative] = 0.5 * sin_theta * sin_m * delta;
                }
            }
        }

        if let Some(gradients) = gradients {
            for gradient in gradients {
                for value in gradient.iter_mut() {
                    *value /= distance;
                }
            }
        }
    }
}

/// Spherical harmonics evaluator together with pre-allocated values and
/// gradients, to be re-used for many directions.
#[derive(Debug, Clone)]
pub struct SphericalHarmonicsCache {
    code: SphericalHarmonics,
    /// Values of all spherical harmonics, see [`lm_index`] for the layout
    pub values: Vec<f64>,
    /// Gradients of all spherical harmonics along x, y and z
    pub gradients: [Vec<f64>; 3],
}

impl SphericalHarmonicsCache {
    /// Create a new cache for the given `max_angular`
    pub fn new(max_angular: usize) -> SphericalHarmonicsCache {
        let size = harmonics_count(max_angular);
        SphericalHarmonicsCache {
            code: SphericalHarmonics::new(max_angular),
            values: vec![0.0; size],
            gradients: [vec![0.0; size], vec![0.0; size], vec![0.0; size]],
        }
    }

    /// Compute values and gradients in the direction of `vector`
    pub fn compute(&mut self, vector: Vector3D) {
        let [dx, dy, dz] = &mut self.gradients;
        self.code.compute(vector, &mut self.values, Some([dx.as_mut_slice(), dy.as_mut_slice(), dz.as_mut_slice()]));
    }
}
