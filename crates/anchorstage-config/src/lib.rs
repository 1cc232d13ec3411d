//! Configuration for the anchorstage content stage.
//!
//! Everything the stage needs at startup is described here: the reference
//! image catalog, model and video assets, the per-image content bindings,
//! and tuning for placement, status messages and the runtime queues.

pub mod config;
mod error;

pub use config::{
    AppConfig, BindingConfig, CameraConfig, ModelConfig, PlacementConfig, PlaneDetection,
    ReferenceImageConfig, RuntimeConfig, StatusConfig, TrackingConfig, TrackingMode, VideoConfig,
    WebConfig, CONFIG_ENV_VAR, DEFAULT_CATALOG_GROUP, seconds,
};
pub use error::ConfigError;

pub type Result<T> = std::result::Result<T, ConfigError>;
