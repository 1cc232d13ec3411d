//! Wiring of the whole content stage from configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use anchorstage_config::{seconds, AppConfig};
use anchorstage_spatial::Transform;

use crate::assets::AssetLibrary;
use crate::catalog::{ContentRegistry, ReferenceImageCatalog};
use crate::error::Result;
use crate::experience::Experience;
use crate::placement::ContentPlacer;
use crate::playback::{PlaybackBinder, SimulatedPlayer, VideoPlayer};
use crate::queue::{SceneHandle, SceneQueue};
use crate::router::{AnchorEventRouter, RouterContext, RouterStats};
use crate::scene::SceneGraph;
use crate::status::{MessageLog, StatusController, StatusHandle, StatusOverlay};
use crate::tracking::{AnchorEvent, TrackingConfiguration, TrackingSession};
use crate::visibility::{FrustumProbe, VisibilityProbe};
use crate::web::{StaticWebSource, WebContentSource};

pub struct StageBuilder {
    config: AppConfig,
    asset_root: Option<PathBuf>,
    overlay: Option<Box<dyn StatusOverlay>>,
    web: Option<Arc<dyn WebContentSource>>,
    players: Option<Vec<Arc<dyn VideoPlayer>>>,
    visibility: Option<Arc<dyn VisibilityProbe>>,
}

impl StageBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            asset_root: None,
            overlay: None,
            web: None,
            players: None,
            visibility: None,
        }
    }

    /// Require every asset file to exist under `root`
    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn overlay(mut self, overlay: impl StatusOverlay) -> Self {
        self.overlay = Some(Box::new(overlay));
        self
    }

    pub fn web_source(mut self, web: Arc<dyn WebContentSource>) -> Self {
        self.web = Some(web);
        self
    }

    /// Use these players instead of simulated ones
    pub fn players(mut self, players: Vec<Arc<dyn VideoPlayer>>) -> Self {
        self.players = Some(players);
        self
    }

    /// Use this probe instead of the camera frustum test
    pub fn visibility(mut self, probe: Arc<dyn VisibilityProbe>) -> Self {
        self.visibility = Some(probe);
        self
    }

    /// Load assets, spawn the stage tasks and start tracking.
    ///
    /// `events` is the receiving end of the channel the tracking session
    /// reports anchors on.
    pub async fn start(
        self,
        session: Arc<dyn TrackingSession>,
        events: mpsc::Receiver<AnchorEvent>,
    ) -> Result<Stage> {
        let config = self.config;
        config.validate()?;

        let catalog = ReferenceImageCatalog::from_config(&config)?;
        let library = AssetLibrary::load(&config, self.asset_root.as_deref())?;
        let registry = ContentRegistry::build(&config, &catalog, &library)?;

        let mut simulated = Vec::new();
        let players = match self.players {
            Some(players) => players,
            None => library
                .videos()
                .map(|video| {
                    let player = Arc::new(SimulatedPlayer::from_asset(video));
                    simulated.push(Arc::clone(&player));
                    player as Arc<dyn VideoPlayer>
                })
                .collect(),
        };
        let binder = Arc::new(PlaybackBinder::new(&registry, players)?);

        let mut tasks = binder.spawn_loop_observers();

        let (scene, scene_task) =
            SceneQueue::spawn(SceneGraph::new(), config.runtime.scene_queue_capacity);
        tasks.push(scene_task);

        let overlay = self
            .overlay
            .unwrap_or_else(|| Box::new(MessageLog::new()));
        let (status, status_task) = StatusController::new(
            overlay,
            seconds("status.display_seconds", config.status.display_seconds)?,
        )
        .spawn(config.runtime.status_channel_capacity);
        tasks.push(status_task);

        let (camera, camera_rx) = watch::channel(Transform::identity());
        let visibility = self.visibility.unwrap_or_else(|| {
            Arc::new(FrustumProbe::from_config(
                scene.clone(),
                &config.camera,
                camera_rx,
            ))
        });
        let web = self
            .web
            .unwrap_or_else(|| Arc::new(StaticWebSource::new(&config.web)));

        let router = AnchorEventRouter::new(RouterContext {
            scene: scene.clone(),
            placer: Arc::new(ContentPlacer::from_config(&config)),
            binder: Arc::clone(&binder),
            registry: Arc::new(registry),
            status: status.clone(),
            visibility,
            web,
        });
        let stats = router.subscribe_stats();
        tasks.push(tokio::spawn(router.run(events)));

        let experience = Experience::new(
            session,
            TrackingConfiguration::from_config(&config.tracking, &catalog),
            status.clone(),
            &config.status,
        )?;
        experience.reset_tracking().await?;

        tracing::info!(
            "Stage started with {} reference images in '{}'",
            catalog.len(),
            catalog.group()
        );

        Ok(Stage {
            scene,
            status,
            experience,
            binder,
            simulated,
            camera,
            stats,
            tasks,
        })
    }
}

/// A running stage
pub struct Stage {
    scene: SceneHandle,
    status: StatusHandle,
    experience: Experience,
    binder: Arc<PlaybackBinder>,
    simulated: Vec<Arc<SimulatedPlayer>>,
    camera: watch::Sender<Transform>,
    stats: watch::Receiver<RouterStats>,
    tasks: Vec<JoinHandle<()>>,
}

impl Stage {
    pub fn builder(config: AppConfig) -> StageBuilder {
        StageBuilder::new(config)
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    pub fn experience(&self) -> &Experience {
        &self.experience
    }

    pub fn binder(&self) -> &PlaybackBinder {
        &self.binder
    }

    pub fn stats(&self) -> RouterStats {
        *self.stats.borrow()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<RouterStats> {
        self.stats.clone()
    }

    pub fn set_camera(&self, pose: Transform) {
        self.camera.send_replace(pose);
    }

    /// Advance one frame: node actions and simulated media clocks
    pub async fn tick(&self, dt: Duration) -> Result<()> {
        self.scene.advance(dt).await?;
        for player in &self.simulated {
            player.advance(dt);
        }
        Ok(())
    }

    /// Pause tracking and stop the stage tasks
    pub async fn shutdown(self) -> Result<()> {
        self.experience.pause().await?;
        self.scene.flush().await?;
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("Stage shut down");
        Ok(())
    }
}
