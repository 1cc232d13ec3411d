//! anchorstage: image-anchored AR content
//!
//! Receives anchor events from an image tracker, places a scaled model and
//! two sliding HUD panels on every detected reference image, plays a
//! looping video on the image itself and reports progress through a status
//! overlay. The output is a scene graph for a renderer to draw.
//!
//! ```text
//! tracker -> AnchorSender -> AnchorEventRouter -> SceneQueue -> SceneGraph
//!                                 |                                 ^
//!                                 +-> PlaybackBinder   VisibilityProbe
//!                                 +-> StatusController
//! ```

pub mod assets;
pub mod catalog;
pub mod error;
pub mod experience;
pub mod placement;
pub mod playback;
pub mod queue;
pub mod router;
pub mod scene;
pub mod stage;
pub mod status;
pub mod tracking;
pub mod visibility;
pub mod web;

pub use assets::{AssetLibrary, ModelAsset, VideoAsset};
pub use catalog::{ContentBinding, ContentRegistry, ReferenceImage, ReferenceImageCatalog};
pub use error::{Result, StageError};
pub use experience::Experience;
pub use placement::{scale_ratio, ContentPlacer, PlacedNodes, PlacementError};
pub use playback::{PlaybackBinder, PlaybackOutcome, SimulatedPlayer, VideoPlayer};
pub use queue::{SceneHandle, SceneQueue};
pub use router::{AnchorEventRouter, PlacedContentNode, RouterContext, RouterStats};
pub use scene::{Action, Geometry, Material, Node, NodeId, SceneError, SceneGraph};
pub use stage::{Stage, StageBuilder};
pub use status::{MessageKind, MessageLog, StatusController, StatusHandle, StatusOverlay};
pub use tracking::{
    anchor_channel, AnchorEvent, AnchorId, AnchorKind, AnchorLifecycle, AnchorSender, RunOptions,
    SimulatedTracker, TrackingConfiguration, TrackingSession,
};
pub use visibility::{FrustumProbe, VisibilityProbe};
#[cfg(feature = "web-fetch")]
pub use web::HttpWebSource;
pub use web::{StaticWebSource, WebContentSource, WebPage};

pub use anchorstage_config::AppConfig;
