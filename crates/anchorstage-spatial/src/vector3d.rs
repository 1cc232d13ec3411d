//! Directions, offsets and per-axis scale factors

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::Point3D;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3D {
    pub const ZERO: Self = Self::splat(0.0);
    pub const ONE: Self = Self::splat(1.0);
    /// +X
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    /// +Y, the anchor normal once content is laid flat
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    /// +Z
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn magnitude(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero
    pub fn normalize(&self) -> Self {
        match self.magnitude() {
            mag if mag > 0.0 => *self * mag.recip(),
            _ => Self::ZERO,
        }
    }

    pub fn dot(&self, other: &Vector3D) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3D) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Component-wise product, used to apply per-axis scale
    pub fn scale_by(&self, other: &Vector3D) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn to_point(&self) -> Point3D {
        Point3D::new(self.x, self.y, self.z)
    }
}

impl Add for Vector3D {
    type Output = Vector3D;

    fn add(self, rhs: Vector3D) -> Vector3D {
        Vector3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3D {
    type Output = Vector3D;

    fn sub(self, rhs: Vector3D) -> Vector3D {
        Vector3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3D {
    type Output = Vector3D;

    fn mul(self, factor: f32) -> Vector3D {
        Vector3D::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let n = Vector3D::new(0.0, 0.0, -4.0).normalize();
        assert_eq!(n, Vector3D::new(0.0, 0.0, -1.0));
        assert_eq!(Vector3D::ZERO.normalize(), Vector3D::ZERO);
    }

    #[test]
    fn test_right_cross_up_is_forward() {
        assert_eq!(Vector3D::RIGHT.cross(&Vector3D::UP), Vector3D::FORWARD);
        assert_eq!(Vector3D::UP.dot(&Vector3D::FORWARD), 0.0);
    }

    #[test]
    fn test_scale_by() {
        let v = Vector3D::new(1.0, 2.0, 3.0).scale_by(&Vector3D::splat(0.5));
        assert_eq!(v, Vector3D::new(0.5, 1.0, 1.5));
    }
}
