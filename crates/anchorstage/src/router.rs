//! Anchor event routing
//!
//! The router is the only consumer of tracker events. It decides, per
//! anchor, whether content has to be created, checked for playback or torn
//! down, and hands the scene work to the single-writer queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use anchorstage_spatial::Matrix4;

use crate::catalog::{ContentRegistry, ReferenceImage};
use crate::error::{Result, StageError};
use crate::placement::{ContentPlacer, PlacedNodes};
use crate::playback::{PlaybackBinder, PlaybackOutcome};
use crate::queue::SceneHandle;
use crate::scene::{Material, Node, NodeId};
use crate::status::StatusHandle;
use crate::tracking::{AnchorEvent, AnchorId, AnchorKind, AnchorLifecycle};
use crate::visibility::VisibilityProbe;
use crate::web::WebContentSource;

/// Scene nodes owned by one live image anchor
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedContentNode {
    pub anchor_id: AnchorId,
    pub image: String,
    pub root: NodeId,
    pub highlight: Option<NodeId>,
    pub video_surface: Option<NodeId>,
    /// `None` when the model could not be fitted onto the image
    pub content: Option<PlacedNodes>,
}

/// Counters describing what the router has done so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterStats {
    pub events: u64,
    pub placed: u64,
    pub updated: u64,
    pub removed: u64,
    /// Image anchors without usable content
    pub skipped: u64,
    /// Plane and generic anchors
    pub ignored: u64,
    pub playback_started: u64,
}

/// Collaborators the router drives
pub struct RouterContext {
    pub scene: SceneHandle,
    pub placer: Arc<ContentPlacer>,
    pub binder: Arc<PlaybackBinder>,
    pub registry: Arc<ContentRegistry>,
    pub status: StatusHandle,
    pub visibility: Arc<dyn VisibilityProbe>,
    pub web: Arc<dyn WebContentSource>,
}

pub struct AnchorEventRouter {
    ctx: RouterContext,
    placed: HashMap<AnchorId, PlacedContentNode>,
    stats: RouterStats,
    stats_tx: watch::Sender<RouterStats>,
}

impl AnchorEventRouter {
    pub fn new(ctx: RouterContext) -> Self {
        let (stats_tx, _) = watch::channel(RouterStats::default());
        Self {
            ctx,
            placed: HashMap::new(),
            stats: RouterStats::default(),
            stats_tx,
        }
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<RouterStats> {
        self.stats_tx.subscribe()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn placed(&self, anchor_id: &AnchorId) -> Option<&PlacedContentNode> {
        self.placed.get(anchor_id)
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    /// Consume events until every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<AnchorEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                tracing::error!("Failed to handle anchor event: {}", e);
                if matches!(e, StageError::QueueClosed) {
                    break;
                }
            }
        }
        tracing::info!(
            "Anchor event stream closed with {} anchors placed",
            self.placed.len()
        );
    }

    pub async fn handle(&mut self, event: AnchorEvent) -> Result<()> {
        self.stats.events += 1;
        let result = self.dispatch(event).await;
        self.stats_tx.send_replace(self.stats);
        result
    }

    async fn dispatch(&mut self, event: AnchorEvent) -> Result<()> {
        let image = match &event.kind {
            AnchorKind::Image(image) => image.clone(),
            AnchorKind::Plane | AnchorKind::Generic => {
                tracing::debug!(
                    "Ignoring {:?} for non-image anchor {}",
                    event.lifecycle,
                    event.anchor_id
                );
                self.stats.ignored += 1;
                return Ok(());
            }
        };

        match event.lifecycle {
            AnchorLifecycle::Removed => self.remove(event.anchor_id).await,
            AnchorLifecycle::Added | AnchorLifecycle::Updated
                if !self.placed.contains_key(&event.anchor_id) =>
            {
                self.place(event.anchor_id, image, event.transform).await
            }
            AnchorLifecycle::Added | AnchorLifecycle::Updated => {
                self.refresh(event.anchor_id, event.transform).await
            }
        }
    }

    async fn place(
        &mut self,
        anchor_id: AnchorId,
        image: ReferenceImage,
        transform: Matrix4,
    ) -> Result<()> {
        let Some(binding) = self.ctx.registry.binding(&image.name).cloned() else {
            tracing::warn!(
                "No content bound to reference image '{}', skipping anchor {}",
                image.name,
                anchor_id
            );
            self.stats.skipped += 1;
            return Ok(());
        };

        let pose = match transform.to_rigid_transform() {
            Ok(pose) => pose,
            Err(e) => {
                tracing::warn!("Rejected pose for '{}' ({}): {}", image.name, anchor_id, e);
                self.stats.skipped += 1;
                return Ok(());
            }
        };

        let placer = Arc::clone(&self.ctx.placer);
        let binder = Arc::clone(&self.ctx.binder);
        let job_image = image.clone();
        let node = self
            .ctx
            .scene
            .call(move |graph| -> Result<PlacedContentNode> {
                let parent = graph.root();
                let root = graph.add_child(
                    parent,
                    Node::new(format!("anchor:{}", job_image.name)).with_transform(pose),
                )?;
                let video_surface = binder.attach_surface(graph, root, &job_image)?;
                let highlight = placer
                    .highlight(graph, root, &job_image)
                    .unwrap_or_else(|e| {
                        tracing::warn!("No highlight for '{}': {}", job_image.name, e);
                        None
                    });
                let content = match placer.place(
                    graph,
                    root,
                    &job_image,
                    &transform,
                    &binding.model,
                ) {
                    Ok(nodes) => Some(nodes),
                    Err(e) => {
                        tracing::warn!(
                            "Skipping content for '{}', model '{}' not placed: {}",
                            job_image.name,
                            binding.model.name,
                            e
                        );
                        None
                    }
                };
                Ok(PlacedContentNode {
                    anchor_id,
                    image: job_image.name.clone(),
                    root,
                    highlight,
                    video_surface,
                    content,
                })
            })
            .await??;

        if node.content.is_some() {
            self.stats.placed += 1;
        } else {
            self.stats.skipped += 1;
        }

        if let Some(web_panel) = node.content.and_then(|c| c.web) {
            self.load_web_panel(web_panel);
        }

        self.ctx.status.cancel_all_scheduled().await?;
        self.ctx
            .status
            .show(format!("Detected image \u{201c}{}\u{201d}", image.name), true)
            .await?;

        tracing::info!("Anchored content for '{}' ({})", image.name, anchor_id);
        self.placed.insert(anchor_id, node);
        Ok(())
    }

    /// Load the web page off the router task; the panel keeps its
    /// placeholder material until the page arrives
    fn load_web_panel(&self, panel: NodeId) {
        let web = Arc::clone(&self.ctx.web);
        let scene = self.ctx.scene.clone();
        let url = self.ctx.placer.web_url().to_string();

        tokio::spawn(async move {
            let page = match web.fetch(&url).await {
                Ok(page) => Arc::new(page),
                Err(e) => {
                    tracing::warn!("Web panel stays blank: {}", e);
                    return;
                }
            };
            let submitted = scene
                .submit(move |graph| {
                    let material = Material::Web {
                        url,
                        page: Some(page),
                    };
                    if graph.set_material(panel, material).is_err() {
                        tracing::debug!("Web panel {} was removed before its page loaded", panel);
                    }
                })
                .await;
            if let Err(e) = submitted {
                tracing::debug!("Dropped web page: {}", e);
            }
        });
    }

    async fn refresh(&mut self, anchor_id: AnchorId, transform: Matrix4) -> Result<()> {
        let Some(node) = self.placed.get(&anchor_id) else {
            return Ok(());
        };
        let root = node.root;
        let image = node.image.clone();
        self.stats.updated += 1;

        match transform.to_rigid_transform() {
            Ok(pose) => {
                self.ctx
                    .scene
                    .submit(move |graph| {
                        if let Err(e) = graph.set_transform(root, pose) {
                            tracing::debug!("Anchor root gone before pose update: {}", e);
                        }
                    })
                    .await?;
            }
            Err(e) => tracing::debug!("Keeping previous pose for {}: {}", anchor_id, e),
        }

        if self.ctx.visibility.is_visible(root).await
            && self.ctx.binder.on_anchor_visible(&image) == PlaybackOutcome::Started
        {
            self.stats.playback_started += 1;
        }
        Ok(())
    }

    async fn remove(&mut self, anchor_id: AnchorId) -> Result<()> {
        let Some(node) = self.placed.remove(&anchor_id) else {
            tracing::debug!("Removal of unknown anchor {}", anchor_id);
            return Ok(());
        };

        let root = node.root;
        self.ctx
            .scene
            .submit(move |graph| {
                if let Err(e) = graph.remove(root) {
                    tracing::debug!("Anchor root already gone: {}", e);
                }
            })
            .await?;

        if !self.placed.values().any(|p| p.image == node.image) {
            self.ctx.binder.pause(&node.image);
        }

        self.stats.removed += 1;
        tracing::info!("Removed content for '{}' ({})", node.image, anchor_id);
        Ok(())
    }
}
