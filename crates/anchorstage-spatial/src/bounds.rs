//! Axis-aligned bounding boxes for model assets

use serde::{Deserialize, Serialize};

use super::{Point3D, Vector3D};

/// Axis-aligned bounding box in a node's local space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3D,
    pub max: Point3D,
}

impl Aabb {
    pub fn new(min: Point3D, max: Point3D) -> Self {
        Self { min, max }
    }

    /// Create an AABB from center and half-extents
    pub fn centered(center: Point3D, half_extents: Vector3D) -> Self {
        Self {
            min: Point3D::new(
                center.x - half_extents.x,
                center.y - half_extents.y,
                center.z - half_extents.z,
            ),
            max: Point3D::new(
                center.x + half_extents.x,
                center.y + half_extents.y,
                center.z + half_extents.z,
            ),
        }
    }

    /// Extent along each axis (`max - min`)
    pub fn size(&self) -> Vector3D {
        self.max - self.min
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Point3D; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3D::new(a.x, a.y, a.z),
            Point3D::new(b.x, a.y, a.z),
            Point3D::new(a.x, b.y, a.z),
            Point3D::new(b.x, b.y, a.z),
            Point3D::new(a.x, a.y, b.z),
            Point3D::new(b.x, a.y, b.z),
            Point3D::new(a.x, b.y, b.z),
            Point3D::new(b.x, b.y, b.z),
        ]
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3D::ORIGIN, Point3D::ORIGIN)
    }
}
