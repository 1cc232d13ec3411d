//! Local node transforms and their composition down the scene graph

use serde::{Deserialize, Serialize};

use crate::{Point3D, Quaternion, Vector3D};

/// Translation, rotation and per-axis scale of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Point3D,
    pub rotation: Quaternion,
    pub scale: Vector3D,
}

impl Transform {
    pub fn identity() -> Self {
        Self::from_position_rotation(Point3D::ORIGIN, Quaternion::IDENTITY)
    }

    pub fn from_position(position: Point3D) -> Self {
        Self::from_position_rotation(position, Quaternion::IDENTITY)
    }

    pub fn from_position_rotation(position: Point3D, rotation: Quaternion) -> Self {
        Self {
            position,
            rotation,
            scale: Vector3D::ONE,
        }
    }

    /// Replace the scale with a uniform factor
    pub fn with_uniform_scale(mut self, factor: f32) -> Self {
        self.scale = Vector3D::splat(factor);
        self
    }

    /// Local point to parent space
    pub fn transform_point(&self, local: Point3D) -> Point3D {
        let scaled = local.to_vector().scale_by(&self.scale);
        self.position + self.rotation.rotate_vector(scaled)
    }

    /// Parent-space point back to local space
    pub fn inverse_transform_point(&self, parent: Point3D) -> Point3D {
        let v = self.rotation.inverse().rotate_vector(parent - self.position);
        let s = self.scale;
        let inv_scale = Vector3D::new(s.x.recip(), s.y.recip(), s.z.recip());
        v.scale_by(&inv_scale).to_point()
    }

    /// Compose `self` (parent) with a child's local transform.
    ///
    /// Exact for uniform parent scale, which is all the scene graph produces.
    pub fn then(&self, child: &Transform) -> Transform {
        Transform {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale.scale_by(&child.scale),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
