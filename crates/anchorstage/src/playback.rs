//! Looping video playback bound to reference images

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::assets::VideoAsset;
use crate::catalog::{ContentRegistry, ReferenceImage};
use crate::error::{Result, StageError};
use crate::scene::{Geometry, Material, Node, NodeId, SceneError, SceneGraph};

/// A media player driving one video texture
pub trait VideoPlayer: Send + Sync + fmt::Debug {
    /// Name of the video asset this player renders
    fn name(&self) -> &str;
    fn play(&self);
    fn pause(&self);
    /// Current playback rate; zero when paused or stopped at the end
    fn rate(&self) -> f32;
    fn seek(&self, position: Duration);
    fn position(&self) -> Duration;
    fn duration(&self) -> Duration;
    /// Notifications fired each time playback reaches the end of the media
    fn subscribe_end_of_media(&self) -> broadcast::Receiver<()>;
}

#[derive(Debug)]
struct PlayerState {
    rate: f32,
    position: Duration,
}

/// In-process player with a manually advanced media clock
#[derive(Debug)]
pub struct SimulatedPlayer {
    name: String,
    duration: Duration,
    state: Mutex<PlayerState>,
    end_of_media: broadcast::Sender<()>,
}

impl SimulatedPlayer {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        let (end_of_media, _) = broadcast::channel(8);
        Self {
            name: name.into(),
            duration,
            state: Mutex::new(PlayerState {
                rate: 0.0,
                position: Duration::ZERO,
            }),
            end_of_media,
        }
    }

    pub fn from_asset(asset: &VideoAsset) -> Self {
        Self::new(asset.name.clone(), asset.duration)
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Advance the media clock; reaching the end stops playback and fires
    /// an end-of-media notification
    pub fn advance(&self, dt: Duration) {
        let reached_end = {
            let mut state = self.state();
            if state.rate <= 0.0 {
                return;
            }
            let rate = state.rate;
            state.position += dt.mul_f32(rate);
            if state.position >= self.duration {
                state.position = self.duration;
                state.rate = 0.0;
                true
            } else {
                false
            }
        };

        if reached_end {
            tracing::debug!("Video '{}' reached end of media", self.name);
            // No receivers just means nobody loops this player
            let _ = self.end_of_media.send(());
        }
    }
}

impl VideoPlayer for SimulatedPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn play(&self) {
        self.state().rate = 1.0;
    }

    fn pause(&self) {
        self.state().rate = 0.0;
    }

    fn rate(&self) -> f32 {
        self.state().rate
    }

    fn seek(&self, position: Duration) {
        self.state().position = position.min(self.duration);
    }

    fn position(&self) -> Duration {
        self.state().position
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn subscribe_end_of_media(&self) -> broadcast::Receiver<()> {
        self.end_of_media.subscribe()
    }
}

/// What happened when an anchor was reported visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Started,
    AlreadyPlaying,
    Unbound,
}

/// Maps reference images to their video players
#[derive(Debug)]
pub struct PlaybackBinder {
    by_image: HashMap<String, Arc<dyn VideoPlayer>>,
}

impl PlaybackBinder {
    /// Resolve a player for every binding in `registry`.
    ///
    /// Players are matched by video name; a binding without a player is a
    /// startup error.
    pub fn new(
        registry: &ContentRegistry,
        players: impl IntoIterator<Item = Arc<dyn VideoPlayer>>,
    ) -> Result<Self> {
        let by_video: HashMap<String, Arc<dyn VideoPlayer>> = players
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();

        let mut by_image = HashMap::new();
        for binding in registry.bindings() {
            let player = by_video
                .get(&binding.video.name)
                .ok_or_else(|| StageError::MissingPlayer(binding.video.name.clone()))?;
            by_image.insert(binding.image.clone(), Arc::clone(player));
        }

        Ok(Self { by_image })
    }

    pub fn player(&self, image: &str) -> Option<&Arc<dyn VideoPlayer>> {
        self.by_image.get(image)
    }

    /// Resume the image's video if it is not already playing
    pub fn on_anchor_visible(&self, image: &str) -> PlaybackOutcome {
        let Some(player) = self.by_image.get(image) else {
            tracing::warn!("No video bound to reference image '{}'", image);
            return PlaybackOutcome::Unbound;
        };

        if player.rate() == 0.0 {
            tracing::debug!("Starting video '{}' for '{}'", player.name(), image);
            player.play();
            PlaybackOutcome::Started
        } else {
            PlaybackOutcome::AlreadyPlaying
        }
    }

    /// Add a plane showing the image's video on top of the image and start
    /// playback. Returns `None` when the image has no bound player.
    pub fn attach_surface(
        &self,
        graph: &mut SceneGraph,
        anchor: NodeId,
        image: &ReferenceImage,
    ) -> std::result::Result<Option<NodeId>, SceneError> {
        let Some(player) = self.by_image.get(&image.name) else {
            tracing::warn!("No video bound to reference image '{}'", image.name);
            return Ok(None);
        };

        let surface = Node::new("video-surface")
            .with_geometry(Geometry::Plane {
                width: image.physical_width,
                height: image.physical_height,
            })
            .with_material(Material::Video(player.name().to_string()))
            .with_pitch(-FRAC_PI_2);
        let id = graph.add_child(anchor, surface)?;

        player.play();
        Ok(Some(id))
    }

    pub fn pause(&self, image: &str) {
        if let Some(player) = self.by_image.get(image) {
            player.pause();
        }
    }

    /// Loop: rewind a player that reached the end of its media
    pub fn handle_end_of_media(player: &dyn VideoPlayer) {
        player.seek(Duration::ZERO);
        tracing::trace!("Rewound video '{}'", player.name());
    }

    /// Spawn one loop observer per distinct player
    pub fn spawn_loop_observers(&self) -> Vec<JoinHandle<()>> {
        let mut seen = Vec::new();
        let mut tasks = Vec::new();
        for player in self.by_image.values() {
            if seen.contains(&player.name()) {
                continue;
            }
            seen.push(player.name());
            tasks.push(spawn_loop_observer(Arc::clone(player)));
        }
        tasks
    }
}

/// Rewind `player` every time it reports end of media
pub fn spawn_loop_observer(player: Arc<dyn VideoPlayer>) -> JoinHandle<()> {
    // Subscribe before spawning so no notification is missed
    let mut events = player.subscribe_end_of_media();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(()) => PlaybackBinder::handle_end_of_media(player.as_ref()),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("Loop observer for '{}' skipped {}", player.name(), missed);
                    PlaybackBinder::handle_end_of_media(player.as_ref());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::catalog::ReferenceImageCatalog;
    use anchorstage_config::AppConfig;

    fn binder_with_players() -> (PlaybackBinder, Vec<Arc<SimulatedPlayer>>) {
        let config = AppConfig::default();
        let catalog = ReferenceImageCatalog::from_config(&config).unwrap();
        let library = AssetLibrary::load(&config, None).unwrap();
        let registry = ContentRegistry::build(&config, &catalog, &library).unwrap();

        let players: Vec<Arc<SimulatedPlayer>> = library
            .videos()
            .map(|v| Arc::new(SimulatedPlayer::from_asset(v)))
            .collect();
        let binder = PlaybackBinder::new(
            &registry,
            players.iter().map(|p| Arc::clone(p) as Arc<dyn VideoPlayer>),
        )
        .unwrap();
        (binder, players)
    }

    #[test]
    fn test_visible_anchor_starts_stopped_video() {
        let (binder, _) = binder_with_players();
        assert_eq!(binder.on_anchor_visible("elephant"), PlaybackOutcome::Started);
        assert_eq!(
            binder.on_anchor_visible("elephant"),
            PlaybackOutcome::AlreadyPlaying
        );
        assert_eq!(binder.player("elephant").unwrap().name(), "piggy");
    }

    #[test]
    fn test_unknown_image_is_noop() {
        let (binder, _) = binder_with_players();
        assert_eq!(binder.on_anchor_visible("giraffe"), PlaybackOutcome::Unbound);
    }

    #[test]
    fn test_missing_player_is_error() {
        let config = AppConfig::default();
        let catalog = ReferenceImageCatalog::from_config(&config).unwrap();
        let library = AssetLibrary::load(&config, None).unwrap();
        let registry = ContentRegistry::build(&config, &catalog, &library).unwrap();

        let only_piggy: Vec<Arc<dyn VideoPlayer>> = vec![Arc::new(SimulatedPlayer::new(
            "piggy",
            Duration::from_secs(12),
        ))];
        let err = PlaybackBinder::new(&registry, only_piggy).unwrap_err();
        assert!(matches!(err, StageError::MissingPlayer(name) if name == "rose"));
    }

    #[test]
    fn test_attach_surface_plays_video() {
        let (binder, _) = binder_with_players();
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let anchor = graph.add_child(root, Node::new("anchor")).unwrap();

        let surface = binder
            .attach_surface(&mut graph, anchor, &ReferenceImage::new("iphone-5.5", 0.068, 0.121))
            .unwrap()
            .unwrap();
        assert_eq!(
            graph.get(surface).unwrap().material,
            Material::Video("rose".to_string())
        );
        assert_eq!(binder.player("iphone-5.5").unwrap().rate(), 1.0);
    }

    #[test]
    fn test_advance_moves_clock_only_while_playing() {
        let player = SimulatedPlayer::new("clip", Duration::from_secs(10));
        player.advance(Duration::from_secs(1));
        assert_eq!(player.position(), Duration::ZERO);

        player.play();
        player.advance(Duration::from_millis(1500));
        player.advance(Duration::from_millis(500));
        assert_eq!(player.position(), Duration::from_secs(2));
        assert_eq!(player.rate(), 1.0);
    }

    #[test]
    fn test_player_stops_at_end() {
        let player = SimulatedPlayer::new("clip", Duration::from_secs(2));
        let mut end = player.subscribe_end_of_media();
        player.play();
        player.advance(Duration::from_secs(3));
        assert_eq!(player.rate(), 0.0);
        assert_eq!(player.position(), Duration::from_secs(2));
        assert!(end.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_loop_observer_rewinds() {
        let player = Arc::new(SimulatedPlayer::new("clip", Duration::from_secs(2)));
        let _observer = spawn_loop_observer(Arc::clone(&player) as Arc<dyn VideoPlayer>);

        player.play();
        player.advance(Duration::from_secs(2));

        for _ in 0..50 {
            if player.position() == Duration::ZERO {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(player.position(), Duration::ZERO);
    }
}
