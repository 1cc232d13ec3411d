//! Error types for the content stage

use std::path::PathBuf;

use anchorstage_config::ConfigError;
use anchorstage_spatial::SpatialError;

use crate::scene::SceneError;

/// Errors raised while building or running the stage
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Missing expected asset catalog resources: no reference images in group '{0}'")]
    MissingCatalog(String),

    #[error("Missing bundled asset '{name}' at {path}")]
    MissingAsset { name: String, path: PathBuf },

    #[error("Unknown asset '{0}'")]
    UnknownAsset(String),

    #[error("No content binding for reference image '{0}'")]
    UnboundImage(String),

    #[error("No video player registered for video '{0}'")]
    MissingPlayer(String),

    #[error("Scene queue is closed")]
    QueueClosed,

    #[error("Status controller is closed")]
    StatusClosed,

    #[error("Tracking session error: {0}")]
    Tracking(String),

    #[error("Web content error: {0}")]
    Web(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub type Result<T> = std::result::Result<T, StageError>;
