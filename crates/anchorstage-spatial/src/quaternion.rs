//! Quaternion rotations

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::Vector3D;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle_radians` about `axis` (normalized here)
    pub fn from_axis_angle(axis: Vector3D, angle_radians: f32) -> Self {
        let (sin, cos) = (angle_radians * 0.5).sin_cos();
        let v = axis.normalize() * sin;
        Self::new(v.x, v.y, v.z, cos)
    }

    /// Rotation about the X axis
    pub fn from_pitch(angle_radians: f32) -> Self {
        Self::from_axis_angle(Vector3D::RIGHT, angle_radians)
    }

    /// Build a rotation from the columns of an orthonormal 3x3 matrix.
    ///
    /// Uses the trace-based branch selection so the largest diagonal term
    /// drives the division, which keeps the result stable near 180 degrees.
    pub fn from_rotation_columns(c0: Vector3D, c1: Vector3D, c2: Vector3D) -> Self {
        let (m00, m01, m02) = (c0.x, c1.x, c2.x);
        let (m10, m11, m12) = (c0.y, c1.y, c2.y);
        let (m20, m21, m22) = (c0.z, c1.z, c2.z);
        let trace = m00 + m11 + m22;

        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new((m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s, 0.25 * s)
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Self::new(0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Self::new((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Self::new((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
        };
        q.normalize()
    }

    fn dot(&self, other: &Quaternion) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn magnitude(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit quaternion; a zero quaternion becomes the identity
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            let inv = mag.recip();
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// Conjugate, which is the inverse for unit quaternions
    pub fn inverse(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn rotate_vector(&self, v: Vector3D) -> Vector3D {
        let q_vec = Vector3D::new(self.x, self.y, self.z);
        let uv = q_vec.cross(&v);
        let uuv = q_vec.cross(&uv);
        v + (uv * self.w + uuv) * 2.0
    }

    /// True when both quaternions describe the same rotation within `eps`
    pub fn approx_eq(&self, other: &Quaternion, eps: f32) -> bool {
        (self.dot(other).abs() - 1.0).abs() <= eps
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Self) -> Self::Output {
        Quaternion::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}
