//! An immutable n-dimensional vector value type.
//!
//! Most of the runtime works in 2-D (grid coordinates, planar goals) or
//! 3-D (positions, Euler rotations). Components beyond a vector's
//! dimensionality read as `0.0`, which lets 2-D and 3-D values mix at the
//! seams without ceremony.

use crate::error::{WorldError, WorldResult};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Index, Mul, Neg, Sub};

const NEAR_ZERO: f64 = 1e-10;

/// An immutable sequence of `f64` components with vector arithmetic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    /// Create a vector from raw components.
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    /// 2-D constructor.
    pub fn xy(x: f64, y: f64) -> Self {
        Self { data: vec![x, y] }
    }

    /// 3-D constructor.
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            data: vec![x, y, z],
        }
    }

    /// Zero vector of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: vec![0.0; dim],
        }
    }

    /// All-ones vector of the given dimension.
    pub fn ones(dim: usize) -> Self {
        Self {
            data: vec![1.0; dim],
        }
    }

    /// Unit vector along x.
    pub fn unit_x(dim: usize) -> Self {
        let mut v = vec![0.0; dim.max(1)];
        v[0] = 1.0;
        Self { data: v }
    }

    /// Unit vector along y.
    pub fn unit_y(dim: usize) -> Self {
        let mut v = vec![0.0; dim.max(2)];
        v[1] = 1.0;
        Self { data: v }
    }

    /// Unit vector along z.
    pub fn unit_z(dim: usize) -> Self {
        let mut v = vec![0.0; dim.max(3)];
        v[2] = 1.0;
        Self { data: v }
    }

    /// X component, `0.0` when absent.
    pub fn x(&self) -> f64 {
        self.data.first().copied().unwrap_or(0.0)
    }

    /// Y component, `0.0` when absent.
    pub fn y(&self) -> f64 {
        self.data.get(1).copied().unwrap_or(0.0)
    }

    /// Z component, `0.0` when absent.
    pub fn z(&self) -> f64 {
        self.data.get(2).copied().unwrap_or(0.0)
    }

    /// Yaw alias for 1-D rotation vectors.
    pub fn yaw(&self) -> f64 {
        self.x()
    }

    /// Dimensionality.
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw component slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Truncate to the x and y components.
    pub fn to_2d(&self) -> Self {
        Self::xy(self.x(), self.y())
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Squared length, cheaper than [`length`](Self::length).
    pub fn length_squared(&self) -> f64 {
        self.data.iter().map(|c| c * c).sum()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len < NEAR_ZERO {
            return Self::zeros(self.dim());
        }
        Self::new(self.data.iter().map(|c| c / len).collect())
    }

    /// Dot product over the shared components.
    pub fn dot(&self, other: &Self) -> f64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Cross product, defined for 3-D vectors only.
    pub fn cross(&self, other: &Self) -> WorldResult<Self> {
        if self.dim() != 3 {
            return Err(WorldError::DimensionMismatch {
                expected: 3,
                got: self.dim(),
            });
        }
        if other.dim() != 3 {
            return Err(WorldError::DimensionMismatch {
                expected: 3,
                got: other.dim(),
            });
        }
        let (a, b) = (&self.data, &other.data);
        Ok(Self::xyz(
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ))
    }

    /// Euclidean distance to another vector.
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance, cheaper than [`distance`](Self::distance).
    pub fn distance_squared(&self, other: &Self) -> f64 {
        let dim = self.dim().max(other.dim());
        (0..dim)
            .map(|i| {
                let d = self.component(i) - other.component(i);
                d * d
            })
            .sum()
    }

    /// Angle in radians between this vector and another.
    pub fn angle(&self, other: &Self) -> f64 {
        let denom = self.length() * other.length();
        if denom < NEAR_ZERO {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos()
    }

    /// Projection of this vector onto `onto`.
    pub fn project(&self, onto: &Self) -> Self {
        let onto_len_sq = onto.length_squared();
        if onto_len_sq < NEAR_ZERO {
            return Self::zeros(self.dim());
        }
        let scale = self.dot(onto) / onto_len_sq;
        onto.clone() * scale
    }

    fn component(&self, i: usize) -> f64 {
        self.data.get(i).copied().unwrap_or(0.0)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let dim = self.dim().max(other.dim());
        Self::new(
            (0..dim)
                .map(|i| f(self.component(i), other.component(i)))
                .collect(),
        )
    }
}

impl From<(f64, f64)> for Vector {
    fn from((x, y): (f64, f64)) -> Self {
        Self::xy(x, y)
    }
}

impl From<(f64, f64, f64)> for Vector {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::xyz(x, y, z)
    }
}

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Self::new(data)
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.data[index]
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, other: Vector) -> Vector {
        self.zip_with(&other, |a, b| a + b)
    }
}

impl Add for &Vector {
    type Output = Vector;

    fn add(self, other: &Vector) -> Vector {
        self.zip_with(other, |a, b| a + b)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, other: Vector) -> Vector {
        self.zip_with(&other, |a, b| a - b)
    }
}

impl Sub for &Vector {
    type Output = Vector;

    fn sub(self, other: &Vector) -> Vector {
        self.zip_with(other, |a, b| a - b)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, scalar: f64) -> Vector {
        Vector::new(self.data.iter().map(|c| c * scalar).collect())
    }
}

impl Mul<f64> for &Vector {
    type Output = Vector;

    fn mul(self, scalar: f64) -> Vector {
        Vector::new(self.data.iter().map(|c| c * scalar).collect())
    }
}

impl Div<f64> for Vector {
    type Output = Vector;

    fn div(self, scalar: f64) -> Vector {
        Vector::new(self.data.iter().map(|c| c / scalar).collect())
    }
}

impl Div<f64> for &Vector {
    type Output = Vector;

    fn div(self, scalar: f64) -> Vector {
        Vector::new(self.data.iter().map(|c| c / scalar).collect())
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(self.data.iter().map(|c| -c).collect())
    }
}

impl std::fmt::Display for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{c:.6}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Vector::xyz(1.0, 2.0, 3.0);
        let b = Vector::xyz(4.0, 5.0, 6.0);
        assert_eq!(&a + &b, Vector::xyz(5.0, 7.0, 9.0));
        assert_eq!(&b - &a, Vector::xyz(3.0, 3.0, 3.0));
        assert_eq!(&a * 2.0, Vector::xyz(2.0, 4.0, 6.0));
        assert_eq!(b.clone() / 2.0, Vector::xyz(2.0, 2.5, 3.0));
        assert_eq!(-a, Vector::xyz(-1.0, -2.0, -3.0));
    }

    #[test]
    fn mixed_dimensionality_reads_missing_components_as_zero() {
        let a = Vector::xy(1.0, 2.0);
        let b = Vector::xyz(1.0, 2.0, 3.0);
        assert_eq!(a.z(), 0.0);
        assert_eq!((&b - &a), Vector::xyz(0.0, 0.0, 3.0));
        assert!((a.distance(&b) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn length_and_normalize() {
        let v = Vector::xy(3.0, 4.0);
        assert!((v.length() - 5.0).abs() < 1e-12);
        assert!((v.normalize().length() - 1.0).abs() < 1e-12);
        assert_eq!(Vector::zeros(2).normalize(), Vector::zeros(2));
    }

    #[test]
    fn dot_cross_angle() {
        let x = Vector::unit_x(3);
        let y = Vector::unit_y(3);
        assert_eq!(x.dot(&y), 0.0);
        assert_eq!(x.cross(&y).unwrap(), Vector::unit_z(3));
        assert!((x.angle(&y) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn cross_rejects_non_3d() {
        let a = Vector::xy(1.0, 0.0);
        let b = Vector::xyz(0.0, 1.0, 0.0);
        assert!(matches!(
            a.cross(&b),
            Err(WorldError::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn projection() {
        let v = Vector::xy(2.0, 2.0);
        let onto = Vector::xy(1.0, 0.0);
        assert_eq!(v.project(&onto), Vector::xy(2.0, 0.0));
        assert_eq!(v.project(&Vector::zeros(2)), Vector::zeros(2));
    }

    #[test]
    fn serde_roundtrip_is_transparent() {
        let v = Vector::xyz(1.5, -2.0, 0.25);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[1.5,-2.0,0.25]");
        let back: Vector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
