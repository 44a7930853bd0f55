use std::ops::{Index, IndexMut, Mul};

use super::Vector3D;

/// A 3x3 matrix, stored in row-major order. This is mostly used to represent
/// rotations of atomic environments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix3([[f64; 3]; 3]);

impl Matrix3 {
    /// Create a new `Matrix3` from the given rows
    pub const fn new(data: [[f64; 3]; 3]) -> Matrix3 {
        Matrix3(data)
    }

    /// Create the identity matrix
    pub const fn one() -> Matrix3 {
        Matrix3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Create a matrix with all elements set to zero
    pub const fn zero() -> Matrix3 {
        Matrix3([[0.0; 3]; 3])
    }

    /// Rotation matrix of the given `angle` (in radians) around `axis`, using
    /// Rodrigues' formula. The axis does not need to be normalized.
    pub fn rotation(axis: Vector3D, angle: f64) -> Matrix3 {
        let u = axis.normalized();
        let (sin, cos) = angle.sin_cos();
        let c = 1.0 - cos;

        Matrix3([
            [cos + u[0] * u[0] * c, u[0] * u[1] * c - u[2] * sin, u[0] * u[2] * c + u[1] * sin],
            [u[1] * u[0] * c + u[2] * sin, cos + u[1] * u[1] * c, u[1] * u[2] * c - u[0] * sin],
            [u[2] * u[0] * c - u[1] * sin, u[2] * u[1] * c + u[0] * sin, cos + u[2] * u[2] * c],
        ])
    }

    /// Get the transpose of this matrix
    pub fn transposed(&self) -> Matrix3 {
        let m = &self.0;
        Matrix3([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    /// Compute the determinant of this matrix
    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[2][1] * m[1][2])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }
}

impl Index<usize> for Matrix3 {
    type Output = [f64; 3];
    #[inline]
    fn index(&self, index: usize) -> &[f64; 3] {
        &self.0[index]
    }
}

impl IndexMut<usize> for Matrix3 {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut [f64; 3] {
        &mut self.0[index]
    }
}

impl_arithmetic!(
    Matrix3, Vector3D, Mul, mul, Vector3D, self, other,
    Vector3D::new(
        self[0][0] * other[0] + self[0][1] * other[1] + self[0][2] * other[2],
        self[1][0] * other[0] + self[1][1] * other[1] + self[1][2] * other[2],
        self[2][0] * other[0] + self[2][1] * other[1] + self[2][2] * other[2],
    )
);

impl_arithmetic!(
    Matrix3, Matrix3, Mul, mul, Matrix3, self, other,
    {
        let mut result = Matrix3::zero();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    result[i][j] += self[i][k] * other[k][j];
                }
            }
        }
        result
    }
);
