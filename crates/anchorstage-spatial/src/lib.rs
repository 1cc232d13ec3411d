//! anchorstage-spatial: spatial primitives for image-anchored content
//!
//! This crate provides:
//! - Points, vectors, quaternions and decomposed transforms
//! - Column-major 4x4 rigid matrices as delivered by image trackers
//! - Axis-aligned bounding boxes for model assets
//! - A perspective view frustum for visibility tests
//! - Tweens and easing curves for timed node actions
//!
//! Uses a right-handed coordinate system:
//! - X: Right (+) / Left (-)
//! - Y: Up (+) / Down (-)
//! - Z: Forward (+) / Backward (-)

pub mod animation;
mod bounds;
mod error;
mod frustum;
mod matrix;
mod point3d;
mod quaternion;
mod transform;
mod vector3d;

pub use animation::{Easing, Tween};
pub use bounds::Aabb;
pub use error::SpatialError;
pub use frustum::Frustum;
pub use matrix::Matrix4;
pub use point3d::Point3D;
pub use quaternion::Quaternion;
pub use transform::Transform;
pub use vector3d::Vector3D;

/// Tolerance used for floating point comparisons on rigid transforms
pub const EPSILON: f32 = 1.0e-4;
