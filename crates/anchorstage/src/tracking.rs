//! Anchor events and tracking session control
//!
//! The tracker is an external collaborator. It reports anchors through an
//! [`AnchorSender`] and is driven through the [`TrackingSession`] trait.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use anchorstage_config::{PlaneDetection, TrackingConfig, TrackingMode};
use anchorstage_spatial::Matrix4;

use crate::catalog::{ReferenceImage, ReferenceImageCatalog};
use crate::error::{Result, StageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(Uuid);

impl AnchorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorLifecycle {
    Added,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnchorKind {
    Image(ReferenceImage),
    Plane,
    Generic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorEvent {
    pub anchor_id: AnchorId,
    pub lifecycle: AnchorLifecycle,
    pub kind: AnchorKind,
    /// Anchor pose in world space, column-major
    pub transform: Matrix4,
}

impl AnchorEvent {
    pub fn image(&self) -> Option<&ReferenceImage> {
        match &self.kind {
            AnchorKind::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// Create the bounded tracker -> router channel
pub fn anchor_channel(capacity: usize) -> (AnchorSender, mpsc::Receiver<AnchorEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AnchorSender { tx }, rx)
}

/// Tracker side of the anchor channel. Delivery never blocks.
#[derive(Debug, Clone)]
pub struct AnchorSender {
    tx: mpsc::Sender<AnchorEvent>,
}

impl AnchorSender {
    /// Hand an event to the router; returns false when it was dropped
    pub fn deliver(&self, event: AnchorEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "Anchor channel full, dropping {:?} for {}",
                    event.lifecycle,
                    event.anchor_id
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Anchor channel closed");
                false
            }
        }
    }
}

/// What the tracker should look for
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingConfiguration {
    /// World tracking with plane detection; images are detected, not tracked
    World {
        plane_detection: Vec<PlaneDetection>,
        detection_images: Vec<ReferenceImage>,
        max_tracked_images: usize,
    },
    /// Image-only tracking
    Image {
        tracking_images: Vec<ReferenceImage>,
        max_tracked_images: usize,
    },
}

impl TrackingConfiguration {
    pub fn from_config(config: &TrackingConfig, catalog: &ReferenceImageCatalog) -> Self {
        let images = catalog.images().to_vec();
        let max_tracked_images = config.effective_max_tracked_images();
        match config.mode {
            TrackingMode::World => TrackingConfiguration::World {
                plane_detection: config.plane_detection.clone(),
                detection_images: images,
                max_tracked_images,
            },
            TrackingMode::Image => TrackingConfiguration::Image {
                tracking_images: images,
                max_tracked_images,
            },
        }
    }

    pub fn images(&self) -> &[ReferenceImage] {
        match self {
            TrackingConfiguration::World {
                detection_images, ..
            } => detection_images,
            TrackingConfiguration::Image {
                tracking_images, ..
            } => tracking_images,
        }
    }

    pub fn max_tracked_images(&self) -> usize {
        match self {
            TrackingConfiguration::World {
                max_tracked_images, ..
            }
            | TrackingConfiguration::Image {
                max_tracked_images, ..
            } => *max_tracked_images,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub reset_tracking: bool,
    pub remove_existing_anchors: bool,
}

impl RunOptions {
    /// Start over: forget the world map and every anchor
    pub fn reset() -> Self {
        Self {
            reset_tracking: true,
            remove_existing_anchors: true,
        }
    }
}

#[async_trait]
pub trait TrackingSession: Send + Sync {
    async fn run(&self, configuration: TrackingConfiguration, options: RunOptions) -> Result<()>;
    async fn pause(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct TrackerState {
    configuration: Option<TrackingConfiguration>,
    running: bool,
    run_count: usize,
    last_options: Option<RunOptions>,
    anchors: HashMap<AnchorId, (AnchorKind, Matrix4)>,
}

/// Scripted tracker: anchors appear when the caller says so
#[derive(Debug)]
pub struct SimulatedTracker {
    sender: AnchorSender,
    state: Mutex<TrackerState>,
}

impl SimulatedTracker {
    pub fn new(sender: AnchorSender) -> Self {
        Self {
            sender,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(
        &self,
        anchor_id: AnchorId,
        lifecycle: AnchorLifecycle,
        kind: AnchorKind,
        transform: Matrix4,
    ) -> bool {
        self.sender.deliver(AnchorEvent {
            anchor_id,
            lifecycle,
            kind,
            transform,
        })
    }

    /// Report the named reference image at `transform`
    pub fn detect(&self, image: &str, transform: Matrix4) -> Result<AnchorId> {
        let kind = {
            let state = self.state();
            if !state.running {
                return Err(StageError::Tracking("session is not running".to_string()));
            }
            let configuration = state
                .configuration
                .as_ref()
                .ok_or_else(|| StageError::Tracking("session has no configuration".to_string()))?;
            let reference = configuration
                .images()
                .iter()
                .find(|img| img.name == image)
                .cloned()
                .ok_or_else(|| {
                    StageError::Tracking(format!("'{}' is not a configured reference image", image))
                })?;

            let max = configuration.max_tracked_images();
            let tracked = state
                .anchors
                .values()
                .filter(|(kind, _)| matches!(kind, AnchorKind::Image(_)))
                .count();
            if tracked >= max {
                return Err(StageError::Tracking(format!(
                    "already tracking {} of {} images",
                    tracked, max
                )));
            }

            AnchorKind::Image(reference)
        };

        let id = AnchorId::new();
        self.state().anchors.insert(id, (kind.clone(), transform));
        self.emit(id, AnchorLifecycle::Added, kind, transform);
        Ok(id)
    }

    /// Report a detected plane; plane anchors carry no content
    pub fn detect_plane(&self, transform: Matrix4) -> Result<AnchorId> {
        if !self.is_running() {
            return Err(StageError::Tracking("session is not running".to_string()));
        }
        let id = AnchorId::new();
        self.state()
            .anchors
            .insert(id, (AnchorKind::Plane, transform));
        self.emit(id, AnchorLifecycle::Added, AnchorKind::Plane, transform);
        Ok(id)
    }

    /// Report a refined pose for an existing anchor
    pub fn refresh(&self, id: AnchorId, transform: Matrix4) -> Result<()> {
        let kind = {
            let mut state = self.state();
            let entry = state
                .anchors
                .get_mut(&id)
                .ok_or_else(|| StageError::Tracking(format!("unknown anchor {}", id)))?;
            entry.1 = transform;
            entry.0.clone()
        };
        self.emit(id, AnchorLifecycle::Updated, kind, transform);
        Ok(())
    }

    /// Drop an anchor, as when the tracker loses it for good
    pub fn lose(&self, id: AnchorId) -> Result<()> {
        let (kind, transform) = self
            .state()
            .anchors
            .remove(&id)
            .ok_or_else(|| StageError::Tracking(format!("unknown anchor {}", id)))?;
        self.emit(id, AnchorLifecycle::Removed, kind, transform);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn run_count(&self) -> usize {
        self.state().run_count
    }

    pub fn last_options(&self) -> Option<RunOptions> {
        self.state().last_options
    }

    pub fn anchor_count(&self) -> usize {
        self.state().anchors.len()
    }
}

#[async_trait]
impl TrackingSession for SimulatedTracker {
    async fn run(&self, configuration: TrackingConfiguration, options: RunOptions) -> Result<()> {
        let removed: Vec<(AnchorId, (AnchorKind, Matrix4))> = {
            let mut state = self.state();
            state.configuration = Some(configuration);
            state.running = true;
            state.run_count += 1;
            state.last_options = Some(options);
            if options.remove_existing_anchors {
                state.anchors.drain().collect()
            } else {
                Vec::new()
            }
        };

        tracing::info!(
            "Tracking session running (reset: {}, {} anchors removed)",
            options.reset_tracking,
            removed.len()
        );
        for (id, (kind, transform)) in removed {
            self.emit(id, AnchorLifecycle::Removed, kind, transform);
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.state().running = false;
        tracing::info!("Tracking session paused");
        Ok(())
    }
}
