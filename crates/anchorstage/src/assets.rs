//! Bundled model and video assets
//!
//! Assets are declared in configuration and loaded exactly once at startup.
//! When an asset root is given, every declared file must exist under it;
//! a missing file is a startup configuration fault.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anchorstage_config::{seconds, AppConfig};
use anchorstage_spatial::Aabb;

use crate::error::{Result, StageError};

/// A 3D model and its bounding box in authoring space (Y-up)
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub name: String,
    pub path: PathBuf,
    /// Node inside the model scene that gets instantiated
    pub node: String,
    pub bounds: Aabb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub name: String,
    pub path: PathBuf,
    pub duration: Duration,
}

/// Immutable set of loaded assets, shared across the stage
#[derive(Debug, Default)]
pub struct AssetLibrary {
    models: HashMap<String, Arc<ModelAsset>>,
    videos: HashMap<String, Arc<VideoAsset>>,
}

impl AssetLibrary {
    /// Load every model and video declared in `config`
    pub fn load(config: &AppConfig, root: Option<&Path>) -> Result<Self> {
        let mut library = Self::default();

        for model in &config.models {
            let path = resolve(root, &model.name, &model.path)?;
            library.models.insert(
                model.name.clone(),
                Arc::new(ModelAsset {
                    name: model.name.clone(),
                    path,
                    node: model.node.clone().unwrap_or_else(|| model.name.clone()),
                    bounds: model.bounds(),
                }),
            );
        }

        for video in &config.videos {
            let path = resolve(root, &video.name, &video.path)?;
            library.videos.insert(
                video.name.clone(),
                Arc::new(VideoAsset {
                    name: video.name.clone(),
                    path,
                    duration: seconds("videos.duration_secs", video.duration_secs)?,
                }),
            );
        }

        tracing::info!(
            "Loaded {} models and {} videos",
            library.models.len(),
            library.videos.len()
        );
        Ok(library)
    }

    pub fn model(&self, name: &str) -> Option<Arc<ModelAsset>> {
        self.models.get(name).cloned()
    }

    pub fn video(&self, name: &str) -> Option<Arc<VideoAsset>> {
        self.videos.get(name).cloned()
    }

    pub fn videos(&self) -> impl Iterator<Item = &Arc<VideoAsset>> {
        self.videos.values()
    }
}

fn resolve(root: Option<&Path>, name: &str, path: &Path) -> Result<PathBuf> {
    let Some(root) = root else {
        return Ok(path.to_path_buf());
    };

    let full = root.join(path);
    if !full.exists() {
        return Err(StageError::MissingAsset {
            name: name.to_string(),
            path: full,
        });
    }
    Ok(full)
}
