//! Scripted run of the content stage
//!
//! A simulated tracker "finds" each reference image in turn in front of the
//! camera, refreshes its pose, loses it again and finally restarts the
//! experience. The resulting scene and status history are printed at the end.
//!
//! Usage:
//!   anchorstage-demo                         # built-in configuration
//!   anchorstage-demo --config stage.toml     # custom configuration
//!   anchorstage-demo --print-default-config  # dump the defaults as TOML

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use anchorstage::{
    anchor_channel, AnchorId, MessageLog, SceneGraph, SimulatedTracker, Stage, StageBuilder,
};
use anchorstage_config::AppConfig;
use anchorstage_spatial::{Matrix4, Point3D, Quaternion, Transform, Vector3D};

#[derive(Parser, Debug)]
#[command(name = "anchorstage-demo")]
#[command(about = "Run the image-anchored content stage against a simulated tracker")]
#[command(version)]
struct Cli {
    /// Config file; defaults to $ANCHORSTAGE_CONFIG or the platform config dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve asset paths under this directory and require them to exist
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of frames to simulate
    #[arg(long, default_value_t = 900)]
    frames: u32,

    /// Simulated frame duration in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Print the built-in configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", AppConfig::default().to_toml_string()?);
        return Ok(());
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let images: Vec<String> = config.catalog_images().map(|i| i.name.clone()).collect();

    let (sender, events) = anchor_channel(config.runtime.anchor_channel_capacity);
    let tracker = Arc::new(SimulatedTracker::new(sender));
    let log = MessageLog::new();

    let mut builder = Stage::builder(config.clone()).overlay(log.clone());
    if let Some(root) = &cli.assets {
        builder = builder.asset_root(root);
    }
    builder = with_web_source(builder, &config)?;

    let stage = builder
        .start(tracker.clone(), events)
        .await
        .context("Failed to start the content stage")?;

    let frame = Duration::from_millis(cli.frame_ms.max(1));
    let script = Script::new(cli.frames, images);
    let mut current: Option<AnchorId> = None;

    for n in 0..cli.frames {
        match script.step(n) {
            Some(Cue::Detect(image)) => {
                match tracker.detect(image, pose_in_front(n)) {
                    Ok(id) => current = Some(id),
                    Err(e) => tracing::warn!("Tracker did not report '{}': {}", image, e),
                }
            }
            Some(Cue::Refresh) => {
                if let Some(id) = current {
                    if let Err(e) = tracker.refresh(id, pose_in_front(n)) {
                        tracing::debug!("Refresh skipped: {}", e);
                    }
                }
            }
            Some(Cue::Lose) => {
                if let Some(id) = current.take() {
                    if let Err(e) = tracker.lose(id) {
                        tracing::debug!("Lose skipped: {}", e);
                    }
                }
            }
            Some(Cue::Restart) => {
                current = None;
                if !stage.experience().restart().await? {
                    tracing::info!("Restart still cooling down");
                }
            }
            None => {}
        }

        stage.tick(frame).await?;
        tokio::task::yield_now().await;
    }

    stage.scene().flush().await?;
    let graph = stage.scene().snapshot().await;
    let stats = stage.stats();
    stage.shutdown().await?;

    println!("{}", describe(&graph));
    println!(
        "events: {}  placed: {}  updated: {}  removed: {}  skipped: {}  ignored: {}",
        stats.events, stats.placed, stats.updated, stats.removed, stats.skipped, stats.ignored
    );
    println!("status messages:");
    for message in log.history() {
        println!("  {}", message);
    }

    Ok(())
}

#[cfg(feature = "web-fetch")]
fn with_web_source(builder: StageBuilder, config: &AppConfig) -> Result<StageBuilder> {
    let source = anchorstage::HttpWebSource::new(&config.web)
        .context("Failed to build the HTTP client")?;
    Ok(builder.web_source(Arc::new(source)))
}

#[cfg(not(feature = "web-fetch"))]
fn with_web_source(builder: StageBuilder, _config: &AppConfig) -> Result<StageBuilder> {
    Ok(builder)
}

/// Something the simulated tracker does on a given frame
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cue<'a> {
    Detect(&'a str),
    Refresh,
    Lose,
    Restart,
}

/// Frame timeline: each image gets an equal slot in the first 80% of the
/// run (detected at the start of its slot, refreshed periodically, lost at
/// the end); the experience restarts at 90%.
struct Script {
    frames: u32,
    images: Vec<String>,
}

impl Script {
    const REFRESH_EVERY: u32 = 30;

    fn new(frames: u32, images: Vec<String>) -> Self {
        Self { frames, images }
    }

    fn step(&self, n: u32) -> Option<Cue<'_>> {
        if self.images.is_empty() || self.frames == 0 {
            return None;
        }
        if n == self.frames * 9 / 10 {
            return Some(Cue::Restart);
        }

        let active = self.frames * 8 / 10;
        let slot = (active / self.images.len() as u32).max(1);
        if n >= slot * self.images.len() as u32 {
            return None;
        }

        let index = (n / slot) as usize;
        let offset = n % slot;
        if offset == 0 {
            Some(Cue::Detect(&self.images[index]))
        } else if offset == slot - 1 {
            Some(Cue::Lose)
        } else if offset % Self::REFRESH_EVERY == 0 {
            Some(Cue::Refresh)
        } else {
            None
        }
    }
}

/// Half a metre in front of the camera, drifting and turning slightly
fn pose_in_front(frame: u32) -> Matrix4 {
    let wobble = ((frame as f32) * 0.01).sin();
    Matrix4::from_transform(&Transform::from_position_rotation(
        Point3D::new(wobble * 0.02, 0.0, 0.5),
        Quaternion::from_axis_angle(Vector3D::UP, wobble * 0.05),
    ))
}

fn describe(graph: &SceneGraph) -> String {
    let mut out = format!("scene: {} nodes", graph.len());
    for anchor in graph.children(graph.root()) {
        out.push_str(&format!("\n  {}", anchor.name));
        for child in graph.children(anchor.id) {
            out.push_str(&format!(
                "\n    {} (opacity {:.2}, scale {:.3})",
                child.name, child.opacity, child.transform.scale.x
            ));
        }
    }
    out
}
