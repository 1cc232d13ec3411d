//! Column-major 4x4 matrices as reported by image trackers
//!
//! Trackers hand over anchor poses as homogeneous matrices with the
//! rotation in the upper 3x3 block and the translation in column 3.
//! Placement only accepts rigid matrices, so this module also carries the
//! validation and decomposition into a [`Transform`].

use serde::{Deserialize, Serialize};

use super::{Point3D, Quaternion, SpatialError, Transform, Vector3D, EPSILON};

/// A column-major 4x4 matrix: `columns[c][r]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4 {
    pub columns: [[f32; 4]; 4],
}

impl Matrix4 {
    pub const IDENTITY: Self = Self {
        columns: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Pure translation
    pub fn from_translation(t: Point3D) -> Self {
        let mut m = Self::IDENTITY;
        m.columns[3] = [t.x, t.y, t.z, 1.0];
        m
    }

    /// Build a homogeneous matrix from a decomposed transform
    pub fn from_transform(t: &Transform) -> Self {
        let c0 = t.rotation.rotate_vector(Vector3D::RIGHT) * t.scale.x;
        let c1 = t.rotation.rotate_vector(Vector3D::UP) * t.scale.y;
        let c2 = t.rotation.rotate_vector(Vector3D::FORWARD) * t.scale.z;
        Self {
            columns: [
                [c0.x, c0.y, c0.z, 0.0],
                [c1.x, c1.y, c1.z, 0.0],
                [c2.x, c2.y, c2.z, 0.0],
                [t.position.x, t.position.y, t.position.z, 1.0],
            ],
        }
    }

    fn axis(&self, c: usize) -> Vector3D {
        Vector3D::new(self.columns[c][0], self.columns[c][1], self.columns[c][2])
    }

    /// Translation part (column 3)
    pub fn translation(&self) -> Point3D {
        let t = self.columns[3];
        Point3D::new(t[0], t[1], t[2])
    }

    /// Determinant of the upper-left 3x3 block
    pub fn determinant3(&self) -> f32 {
        let (a, b, c) = (self.axis(0), self.axis(1), self.axis(2));
        a.dot(&b.cross(&c))
    }

    pub fn is_finite(&self) -> bool {
        self.columns.iter().flatten().all(|v| v.is_finite())
    }

    /// Check that this matrix is a proper rigid transform (rotation + translation)
    pub fn validate_rigid(&self) -> Result<(), SpatialError> {
        if !self.is_finite() {
            return Err(SpatialError::NonFinite);
        }

        let det = self.determinant3();
        if det.abs() < EPSILON {
            return Err(SpatialError::Singular(det));
        }

        let bottom = [
            self.columns[0][3],
            self.columns[1][3],
            self.columns[2][3],
            self.columns[3][3],
        ];
        if bottom != [0.0, 0.0, 0.0, 1.0] {
            return Err(SpatialError::NotRigid(format!(
                "bottom row {:?} is not [0, 0, 0, 1]",
                bottom
            )));
        }

        let tolerance = EPSILON * 10.0;
        for c in 0..3 {
            let len = self.axis(c).magnitude();
            if (len - 1.0).abs() > tolerance {
                return Err(SpatialError::NotRigid(format!(
                    "axis {} has length {}",
                    c, len
                )));
            }
        }
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let dot = self.axis(i).dot(&self.axis(j));
            if dot.abs() > tolerance {
                return Err(SpatialError::NotRigid(format!(
                    "axes {} and {} are not orthogonal (dot {})",
                    i, j, dot
                )));
            }
        }
        if det < 0.0 {
            return Err(SpatialError::NotRigid("matrix contains a reflection".into()));
        }

        Ok(())
    }

    pub fn is_rigid(&self) -> bool {
        self.validate_rigid().is_ok()
    }

    /// Decompose a rigid matrix into a [`Transform`]
    pub fn to_rigid_transform(&self) -> Result<Transform, SpatialError> {
        self.validate_rigid()?;
        let rotation = Quaternion::from_rotation_columns(self.axis(0), self.axis(1), self.axis(2));
        Ok(Transform::from_position_rotation(self.translation(), rotation))
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_translation_column() {
        let m = Matrix4::from_translation(Point3D::new(0.1, -0.2, -0.5));
        assert_eq!(m.translation(), Point3D::new(0.1, -0.2, -0.5));
        assert!(m.is_rigid());
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let mut m = Matrix4::IDENTITY;
        m.columns[2] = [0.0, 0.0, 0.0, 0.0];
        assert!(matches!(m.validate_rigid(), Err(SpatialError::Singular(_))));
    }

    #[test]
    fn test_scaled_matrix_is_not_rigid() {
        let t = Transform::identity().with_uniform_scale(2.0);
        let m = Matrix4::from_transform(&t);
        assert!(matches!(m.validate_rigid(), Err(SpatialError::NotRigid(_))));
    }

    #[test]
    fn test_nan_rejected() {
        let mut m = Matrix4::IDENTITY;
        m.columns[3][0] = f32::NAN;
        assert_eq!(m.validate_rigid(), Err(SpatialError::NonFinite));
    }

    #[test]
    fn test_decompose_round_trip() {
        let t = Transform::from_position_rotation(
            Point3D::new(0.3, 0.0, -1.2),
            Quaternion::from_axis_angle(Vector3D::new(1.0, 1.0, 0.0), PI / 3.0),
        );
        let back = Matrix4::from_transform(&t).to_rigid_transform().unwrap();
        assert!(back.position.distance(&t.position) < 0.0001);
        assert!(back.rotation.approx_eq(&t.rotation, 0.0001));
    }
}
