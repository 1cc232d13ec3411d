//! Configuration model, defaults and validation

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anchorstage_spatial::{Aabb, Point3D};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

const CONFIG_FILE_NAME: &str = "anchorstage.toml";

/// Environment variable naming a config file to use when no path is given
pub const CONFIG_ENV_VAR: &str = "ANCHORSTAGE_CONFIG";

/// Reference image group used by the tracker and by images that name none
pub const DEFAULT_CATALOG_GROUP: &str = "AR Resources";

fn default_catalog_group() -> String {
    DEFAULT_CATALOG_GROUP.to_string()
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracking: TrackingConfig,
    pub reference_images: Vec<ReferenceImageConfig>,
    pub models: Vec<ModelConfig>,
    pub videos: Vec<VideoConfig>,
    pub bindings: Vec<BindingConfig>,
    pub placement: PlacementConfig,
    pub web: WebConfig,
    pub status: StatusConfig,
    pub runtime: RuntimeConfig,
    pub camera: CameraConfig,
}

/// Which tracking configuration the session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// World tracking with plane detection and image detection
    World,
    /// Image-only tracking; fewer features but steadier image tracking
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneDetection {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,
    /// Name of the reference image group in the asset catalog
    pub catalog_group: String,
    /// Upper bound on simultaneously tracked images. Defaults to 1 for
    /// world tracking and 3 for image tracking when unset.
    pub max_tracked_images: Option<usize>,
    pub plane_detection: Vec<PlaneDetection>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::World,
            catalog_group: default_catalog_group(),
            max_tracked_images: None,
            plane_detection: vec![PlaneDetection::Vertical, PlaneDetection::Horizontal],
        }
    }
}

impl TrackingConfig {
    pub fn effective_max_tracked_images(&self) -> usize {
        self.max_tracked_images.unwrap_or(match self.mode {
            TrackingMode::World => 1,
            TrackingMode::Image => 3,
        })
    }
}

/// A reference image the tracker can detect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceImageConfig {
    pub name: String,
    /// Physical width in metres
    pub physical_width: f32,
    /// Physical height in metres
    pub physical_height: f32,
    /// Optional source image for the tracker's catalog
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Catalog group this image belongs to
    #[serde(default = "default_catalog_group")]
    pub group: String,
}

/// A 3D model asset and its authoring-space bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub path: PathBuf,
    /// Name of the node inside the model scene to instantiate
    #[serde(default)]
    pub node: Option<String>,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
}

impl ModelConfig {
    pub fn bounds(&self) -> Aabb {
        let [ax, ay, az] = self.bounds_min;
        let [bx, by, bz] = self.bounds_max;
        Aabb::new(Point3D::new(ax, ay, az), Point3D::new(bx, by, bz))
    }
}

/// A bundled video asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub name: String,
    pub path: PathBuf,
    pub duration_secs: f32,
}

/// Content shown for one reference image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub image: String,
    pub model: String,
    pub video: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Lift of the model along the anchor's up axis, in metres
    pub model_vertical_offset: f32,
    /// When set, the model grows from zero to its fitted scale over this time
    pub appear_seconds: Option<f32>,
    /// Flash a translucent plane where the image was detected
    pub highlight_detection: bool,
    pub info_panel: bool,
    pub web_panel: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            model_vertical_offset: 0.0,
            appear_seconds: None,
            highlight_detection: true,
            info_panel: true,
            web_panel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub url: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            url: "https://en.wikipedia.org/wiki/African_elephant".to_string(),
            viewport_width: 400,
            viewport_height: 672,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// How long a shown message stays up before hiding itself
    pub display_seconds: f32,
    /// Delay before the "look around" hint after tracking resets
    pub look_around_delay_seconds: f32,
    /// Minimum time between two experience restarts
    pub restart_cooldown_seconds: f32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            display_seconds: 6.0,
            look_around_delay_seconds: 7.5,
            restart_cooldown_seconds: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bounded capacity of the tracker -> router channel
    pub anchor_channel_capacity: usize,
    /// Bounded capacity of the scene writer queue
    pub scene_queue_capacity: usize,
    /// Bounded capacity of the status controller channel
    pub status_channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            anchor_channel_capacity: 32,
            scene_queue_capacity: 64,
            status_channel_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub aspect: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            aspect: 9.0 / 16.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            reference_images: vec![
                ReferenceImageConfig {
                    name: "elephant".to_string(),
                    physical_width: 0.2,
                    physical_height: 0.15,
                    source: Some(PathBuf::from("AR Resources/elephant.jpg")),
                    group: default_catalog_group(),
                },
                ReferenceImageConfig {
                    name: "iphone-5.5".to_string(),
                    physical_width: 0.068,
                    physical_height: 0.121,
                    source: Some(PathBuf::from("AR Resources/iphone-5.5.png")),
                    group: default_catalog_group(),
                },
            ],
            models: vec![ModelConfig {
                name: "ship".to_string(),
                path: PathBuf::from("art.scnassets/ship.scn"),
                node: Some("ship".to_string()),
                bounds_min: [-0.5, -0.2, -0.6],
                bounds_max: [0.5, 0.2, 0.6],
            }],
            videos: vec![
                VideoConfig {
                    name: "piggy".to_string(),
                    path: PathBuf::from("piggy.mp4"),
                    duration_secs: 12.0,
                },
                VideoConfig {
                    name: "rose".to_string(),
                    path: PathBuf::from("rose.mp4"),
                    duration_secs: 15.0,
                },
            ],
            bindings: vec![
                BindingConfig {
                    image: "elephant".to_string(),
                    model: "ship".to_string(),
                    video: "piggy".to_string(),
                },
                BindingConfig {
                    image: "iphone-5.5".to_string(),
                    model: "ship".to_string(),
                    video: "rose".to_string(),
                },
            ],
            placement: PlacementConfig::default(),
            web: WebConfig::default(),
            status: StatusConfig::default(),
            runtime: RuntimeConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded config from {} ({} reference images, {} bindings)",
            path.display(),
            config.reference_images.len(),
            config.bindings.len()
        );
        Ok(config)
    }

    /// Default location of the config file for this platform
    pub fn default_path() -> Result<PathBuf> {
        let dirs =
            ProjectDirs::from("", "", "anchorstage").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, else from `$ANCHORSTAGE_CONFIG`, else from the
    /// platform default path if it exists, else fall back to the built-in
    /// defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        if let Some(path) = path.map(Path::to_path_buf).or(from_env) {
            return Self::load(&path);
        }

        match Self::default_path() {
            Ok(default) if default.exists() => Self::load(&default),
            Ok(default) => {
                tracing::debug!("No config at {}, using defaults", default.display());
                Ok(Self::default())
            }
            Err(e) => {
                tracing::debug!("{}; using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Reference images belonging to the configured tracking group
    pub fn catalog_images(&self) -> impl Iterator<Item = &ReferenceImageConfig> {
        self.reference_images
            .iter()
            .filter(move |img| img.group == self.tracking.catalog_group)
    }

    pub fn binding_for(&self, image: &str) -> Option<&BindingConfig> {
        self.bindings.iter().find(|b| b.image == image)
    }

    /// Check sizes, uniqueness and that every image has a complete binding
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.tracking.catalog_group.trim().is_empty() {
            return invalid("tracking.catalog_group must not be empty".into());
        }
        if self.tracking.effective_max_tracked_images() == 0 {
            return invalid("tracking.max_tracked_images must be at least 1".into());
        }

        let mut image_names = HashSet::new();
        for img in &self.reference_images {
            if !image_names.insert(img.name.as_str()) {
                return invalid(format!("duplicate reference image '{}'", img.name));
            }
            if !is_positive(img.physical_width) || !is_positive(img.physical_height) {
                return invalid(format!(
                    "reference image '{}' must have a positive physical size, got {}x{}",
                    img.name, img.physical_width, img.physical_height
                ));
            }
        }

        let mut model_names = HashSet::new();
        for model in &self.models {
            if !model_names.insert(model.name.as_str()) {
                return invalid(format!("duplicate model '{}'", model.name));
            }
            let ordered = model
                .bounds_min
                .iter()
                .zip(model.bounds_max.iter())
                .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo <= hi);
            if !ordered {
                return invalid(format!(
                    "model '{}' bounds_min must not exceed bounds_max",
                    model.name
                ));
            }
        }

        let mut video_names = HashSet::new();
        for video in &self.videos {
            if !video_names.insert(video.name.as_str()) {
                return invalid(format!("duplicate video '{}'", video.name));
            }
            if !is_positive(video.duration_secs) || !fits_duration(video.duration_secs) {
                return invalid(format!(
                    "video '{}' must have a positive finite duration, got {}",
                    video.name, video.duration_secs
                ));
            }
        }

        let mut bound = HashSet::new();
        for binding in &self.bindings {
            if !image_names.contains(binding.image.as_str()) {
                return invalid(format!("binding for unknown image '{}'", binding.image));
            }
            if !bound.insert(binding.image.as_str()) {
                return invalid(format!("image '{}' is bound more than once", binding.image));
            }
            if !model_names.contains(binding.model.as_str()) {
                return invalid(format!(
                    "binding for '{}' references unknown model '{}'",
                    binding.image, binding.model
                ));
            }
            if !video_names.contains(binding.video.as_str()) {
                return invalid(format!(
                    "binding for '{}' references unknown video '{}'",
                    binding.image, binding.video
                ));
            }
        }
        if let Some(unbound) = self
            .catalog_images()
            .find(|img| !bound.contains(img.name.as_str()))
        {
            return invalid(format!("reference image '{}' has no content binding", unbound.name));
        }

        if self.runtime.anchor_channel_capacity == 0
            || self.runtime.scene_queue_capacity == 0
            || self.runtime.status_channel_capacity == 0
        {
            return invalid("runtime channel capacities must be at least 1".into());
        }
        let status = &self.status;
        if !is_positive(status.display_seconds)
            || !fits_duration(status.display_seconds)
            || !fits_duration(status.look_around_delay_seconds)
            || !fits_duration(status.restart_cooldown_seconds)
        {
            return invalid(format!(
                "status timings must be finite and non-negative with display_seconds > 0, got \
                 display {} / look around {} / restart cooldown {}",
                status.display_seconds,
                status.look_around_delay_seconds,
                status.restart_cooldown_seconds
            ));
        }
        if let Some(secs) = self.placement.appear_seconds {
            if !is_positive(secs) || !fits_duration(secs) {
                return invalid(
                    "placement.appear_seconds must be positive and finite when set".into(),
                );
            }
        }
        if !self.placement.model_vertical_offset.is_finite() {
            return invalid("placement.model_vertical_offset must be finite".into());
        }
        if !is_positive(self.camera.fov_degrees)
            || self.camera.fov_degrees >= 180.0
            || !is_positive(self.camera.aspect)
        {
            return invalid("camera.fov_degrees must be in (0, 180) and aspect positive".into());
        }

        Ok(())
    }
}

fn is_positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

/// Non-negative, finite and small enough for a `Duration`
fn fits_duration(secs: f32) -> bool {
    Duration::try_from_secs_f32(secs).is_ok()
}

/// Convert a seconds field to a `Duration`, naming the field on failure
pub fn seconds(field: &str, secs: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(secs).map_err(|_| {
        ConfigError::Invalid(format!(
            "{} must be finite and non-negative, got {}",
            field, secs
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tracking.effective_max_tracked_images(), 1);
        assert_eq!(config.binding_for("elephant").unwrap().video, "piggy");
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = AppConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_image_mode_defaults_to_three_tracked_images() {
        let config = AppConfig::from_toml_str(
            r#"
            [tracking]
            mode = "image"
            "#,
        )
        .unwrap();
        assert_eq!(config.tracking.mode, TrackingMode::Image);
        assert_eq!(config.tracking.effective_max_tracked_images(), 3);
        // Unlisted sections keep their defaults
        assert_eq!(config.status.display_seconds, 6.0);
    }

    #[test]
    fn test_missing_binding_rejected() {
        let mut config = AppConfig::default();
        config.bindings.retain(|b| b.image != "iphone-5.5");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("iphone-5.5"));
    }

    #[test]
    fn test_binding_to_unknown_video_rejected() {
        let mut config = AppConfig::default();
        config.bindings[0].video = "missing".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_positive_size_rejected() {
        let mut config = AppConfig::default();
        config.reference_images[0].physical_height = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = AppConfig::default();
        config.models[0].bounds_min = [1.0, 0.0, 0.0];
        config.models[0].bounds_max = [0.0, 0.0, 0.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = AppConfig::default();
        config.runtime.scene_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_images_outside_group_need_no_binding() {
        let mut config = AppConfig::default();
        config.reference_images.push(ReferenceImageConfig {
            name: "poster".to_string(),
            physical_width: 0.5,
            physical_height: 0.7,
            source: None,
            group: "Other Resources".to_string(),
        });
        config.validate().unwrap();
        assert_eq!(config.catalog_images().count(), 2);
    }

    #[test]
    fn test_images_default_to_the_tracking_group() {
        let image: ReferenceImageConfig = toml::from_str(
            r#"
            name = "poster"
            physical_width = 0.5
            physical_height = 0.7
            "#,
        )
        .unwrap();
        assert_eq!(image.group, DEFAULT_CATALOG_GROUP);

        let mut config = AppConfig::default();
        config.tracking.catalog_group = "Nothing Here".to_string();
        assert_eq!(config.catalog_images().count(), 0);
    }

    #[test]
    fn test_non_finite_status_timings_rejected() {
        for toml in [
            "[status]\nlook_around_delay_seconds = nan\n",
            "[status]\nrestart_cooldown_seconds = inf\n",
            "[status]\ndisplay_seconds = -inf\n",
            "[status]\nlook_around_delay_seconds = 1e30\n",
            "[status]\nrestart_cooldown_seconds = -1.0\n",
        ] {
            let err = AppConfig::from_toml_str(toml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}: {:?}", toml, err);
        }
    }

    #[test]
    fn test_unrepresentable_video_duration_rejected() {
        let mut config = AppConfig::default();
        config.videos[0].duration_secs = 1.0e30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.videos[0].duration_secs = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.placement.appear_seconds = Some(f32::INFINITY);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            r#"
            [placement]
            appear_seconds = 0.4

            [web]
            url = "https://example.com/"
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.placement.appear_seconds, Some(0.4));
        assert_eq!(config.web.url, "https://example.com/");
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    #[serial]
    fn test_env_var_names_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[status]\ndisplay_seconds = 3.0\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = AppConfig::load_or_default(None);
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(config.unwrap().status.display_seconds, 3.0);
    }

    #[test]
    #[serial]
    fn test_explicit_path_beats_env_var() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[status]\ndisplay_seconds = 2.0\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, "/definitely/not/here.toml");
        let config = AppConfig::load_or_default(Some(file.path()));
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(config.unwrap().status.display_seconds, 2.0);
    }
}
