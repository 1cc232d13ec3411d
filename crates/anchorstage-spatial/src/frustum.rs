//! Perspective view frustum used for "is this node on screen" checks

use serde::{Deserialize, Serialize};

use crate::{Aabb, Point3D, Transform};

/// A symmetric perspective frustum looking down the camera's +Z axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Vertical field of view in radians
    pub fov: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
}

impl Frustum {
    pub fn perspective(fov_degrees: f32, aspect: f32) -> Self {
        Self {
            fov: fov_degrees.to_radians(),
            near: 0.01,
            far: 100.0,
            aspect,
        }
    }

    /// Signed distances of a camera-space point to the six clip planes,
    /// in the order near, far, right, left, top, bottom. A point is inside
    /// when every value is non-negative. Side planes are scaled by depth,
    /// not normalized.
    fn plane_distances(&self, local: Point3D) -> [f32; 6] {
        let ty = (self.fov * 0.5).tan();
        let tx = ty * self.aspect;
        [
            local.z - self.near,
            self.far - local.z,
            local.z * tx - local.x,
            local.z * tx + local.x,
            local.z * ty - local.y,
            local.z * ty + local.y,
        ]
    }

    pub fn contains_point(&self, point: Point3D, camera: &Transform) -> bool {
        let local = camera.inverse_transform_point(point);
        self.plane_distances(local).iter().all(|d| *d >= 0.0)
    }

    /// Box test against the clip planes. The box is hidden only when all
    /// eight transformed corners lie outside the same plane, so a box that
    /// spans the view with every corner off screen still counts as visible.
    /// May report a box near a frustum edge as visible when it is not.
    pub fn intersects_box(&self, bounds: &Aabb, world: &Transform, camera: &Transform) -> bool {
        let distances = bounds.corners().map(|corner| {
            let local = camera.inverse_transform_point(world.transform_point(corner));
            self.plane_distances(local)
        });

        (0..6).all(|plane| distances.iter().any(|d| d[plane] >= 0.0))
    }
}

impl Default for Frustum {
    fn default() -> Self {
        Self::perspective(60.0, 9.0 / 16.0)
    }
}
