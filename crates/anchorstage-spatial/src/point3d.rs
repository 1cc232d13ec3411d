//! Positions in anchor and world space

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::Vector3D;

/// A position in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3D) -> f32 {
        (*self - *other).magnitude()
    }

    /// Offset of this point from the origin
    pub fn to_vector(&self) -> Vector3D {
        Vector3D::new(self.x, self.y, self.z)
    }
}

impl Add<Vector3D> for Point3D {
    type Output = Point3D;

    fn add(self, offset: Vector3D) -> Point3D {
        Point3D::new(self.x + offset.x, self.y + offset.y, self.z + offset.z)
    }
}

impl Sub for Point3D {
    type Output = Vector3D;

    fn sub(self, rhs: Point3D) -> Vector3D {
        Vector3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_between_anchor_positions() {
        let camera = Point3D::ORIGIN;
        let anchor = Point3D::new(0.3, 0.0, 0.4);
        assert!((camera.distance(&anchor) - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn test_offset_by_vector() {
        let p = Point3D::new(-0.1, 0.0, 0.2) + Vector3D::new(0.1, 1.0, 0.0);
        assert_eq!(p, Point3D::new(0.0, 1.0, 0.2));
    }
}
