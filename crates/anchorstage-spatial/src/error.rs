//! Spatial error types

/// Errors raised when a transform cannot be used for placement
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error("Matrix contains non-finite components")]
    NonFinite,

    #[error("Matrix is singular (determinant {0})")]
    Singular(f32),

    #[error("Matrix is not a rigid transform: {0}")]
    NotRigid(String),
}
