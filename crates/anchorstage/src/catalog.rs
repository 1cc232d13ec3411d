//! Reference image catalog and per-image content bindings

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anchorstage_config::AppConfig;

use crate::assets::{AssetLibrary, ModelAsset, VideoAsset};
use crate::error::{Result, StageError};

/// A known 2D image pattern the tracker can detect
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub name: String,
    /// Physical width in metres
    pub physical_width: f32,
    /// Physical height in metres
    pub physical_height: f32,
    pub source: Option<PathBuf>,
}

impl ReferenceImage {
    pub fn new(name: impl Into<String>, physical_width: f32, physical_height: f32) -> Self {
        Self {
            name: name.into(),
            physical_width,
            physical_height,
            source: None,
        }
    }
}

/// The group of reference images handed to the tracker at startup
#[derive(Debug, Clone)]
pub struct ReferenceImageCatalog {
    group: String,
    images: Vec<ReferenceImage>,
}

impl ReferenceImageCatalog {
    /// Collect the configured tracking group. An empty group is fatal.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let group = config.tracking.catalog_group.clone();
        let images: Vec<ReferenceImage> = config
            .catalog_images()
            .map(|img| ReferenceImage {
                name: img.name.clone(),
                physical_width: img.physical_width,
                physical_height: img.physical_height,
                source: img.source.clone(),
            })
            .collect();

        if images.is_empty() {
            return Err(StageError::MissingCatalog(group));
        }

        tracing::info!("Reference image group '{}' has {} images", group, images.len());
        Ok(Self { group, images })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceImage> {
        self.images.iter().find(|img| img.name == name)
    }

    pub fn images(&self) -> &[ReferenceImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Resolved content for one reference image
#[derive(Debug, Clone)]
pub struct ContentBinding {
    pub image: String,
    pub model: Arc<ModelAsset>,
    pub video: Arc<VideoAsset>,
}

/// Image name -> content, resolved once and immutable afterwards
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    bindings: HashMap<String, ContentBinding>,
}

impl ContentRegistry {
    /// Resolve every configured binding against the asset library.
    ///
    /// Fails unless every catalog image has a binding whose assets exist,
    /// so a run-time miss can only come from an image outside the catalog.
    pub fn build(
        config: &AppConfig,
        catalog: &ReferenceImageCatalog,
        library: &AssetLibrary,
    ) -> Result<Self> {
        let mut bindings = HashMap::new();

        for binding in &config.bindings {
            let model = library
                .model(&binding.model)
                .ok_or_else(|| StageError::UnknownAsset(binding.model.clone()))?;
            let video = library
                .video(&binding.video)
                .ok_or_else(|| StageError::UnknownAsset(binding.video.clone()))?;
            bindings.insert(
                binding.image.clone(),
                ContentBinding {
                    image: binding.image.clone(),
                    model,
                    video,
                },
            );
        }

        if let Some(unbound) = catalog
            .images()
            .iter()
            .find(|img| !bindings.contains_key(&img.name))
        {
            return Err(StageError::UnboundImage(unbound.name.clone()));
        }

        Ok(Self { bindings })
    }

    pub fn binding(&self, image: &str) -> Option<&ContentBinding> {
        self.bindings.get(image)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &ContentBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
