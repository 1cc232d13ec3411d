use std::sync::Arc;
use std::time::Duration;

use anchorstage::{
    anchor_channel, AnchorEvent, AnchorId, AnchorKind, AnchorLifecycle, AnchorSender, AppConfig,
    Geometry, Material, MessageLog, ReferenceImage, SimulatedTracker, Stage,
};
use anchorstage_spatial::{Matrix4, Point3D};

struct Harness {
    stage: Stage,
    tracker: Arc<SimulatedTracker>,
    sender: AnchorSender,
    log: MessageLog,
}

async fn start(config: AppConfig) -> Harness {
    let (sender, events) = anchor_channel(config.runtime.anchor_channel_capacity);
    let tracker = Arc::new(SimulatedTracker::new(sender.clone()));
    let log = MessageLog::new();
    let stage = Stage::builder(config)
        .overlay(log.clone())
        .start(tracker.clone(), events)
        .await
        .unwrap();
    Harness {
        stage,
        tracker,
        sender,
        log,
    }
}

/// Wait until the router has handled `events` events and the scene queue
/// has drained
async fn settle(stage: &Stage, events: u64) {
    let mut stats = stage.subscribe_stats();
    stats.wait_for(|s| s.events >= events).await.unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    stage.scene().flush().await.unwrap();
}

fn in_front() -> Matrix4 {
    Matrix4::from_translation(Point3D::new(0.0, 0.0, 0.5))
}

#[tokio::test]
async fn detected_image_gets_model_panels_and_video() {
    let h = start(AppConfig::default()).await;
    h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 1).await;

    let graph = h.stage.scene().snapshot().await;
    let anchors: Vec<_> = graph.children(graph.root()).collect();
    assert_eq!(anchors.len(), 1);
    let anchor = anchors[0].id;

    let ship = graph.child_named(anchor, "ship").unwrap();
    // 0.2 / 1.0 wide vs 0.15 / 1.2 deep
    assert!((ship.transform.scale.x - 0.125).abs() < 1.0e-6);

    let surface = graph.child_named(anchor, "video-surface").unwrap();
    assert_eq!(surface.material, Material::Video("piggy".to_string()));
    assert_eq!(
        surface.geometry,
        Geometry::Plane {
            width: 0.2,
            height: 0.15
        }
    );
    assert!(graph.child_named(anchor, "info-panel").is_some());
    assert!(graph.child_named(anchor, "highlight").is_some());

    let web = graph.child_named(anchor, "web-panel").unwrap();
    assert!(matches!(&web.material, Material::Web { page: Some(_), .. }));

    assert_eq!(h.stage.binder().player("elephant").unwrap().rate(), 1.0);
    assert_eq!(h.stage.stats().placed, 1);
}

#[tokio::test]
async fn repeated_events_place_content_once() {
    let h = start(AppConfig::default()).await;
    let id = h.tracker.detect("elephant", in_front()).unwrap();
    for _ in 0..5 {
        h.tracker.refresh(id, in_front()).unwrap();
    }
    settle(&h.stage, 6).await;

    let graph = h.stage.scene().snapshot().await;
    assert_eq!(graph.children(graph.root()).count(), 1);
    let stats = h.stage.stats();
    assert_eq!(stats.placed, 1);
    assert_eq!(stats.updated, 5);
}

#[tokio::test]
async fn update_moves_anchor_root() {
    let h = start(AppConfig::default()).await;
    let id = h.tracker.detect("elephant", in_front()).unwrap();
    h.tracker
        .refresh(id, Matrix4::from_translation(Point3D::new(0.1, 0.0, 0.6)))
        .unwrap();
    settle(&h.stage, 2).await;

    let graph = h.stage.scene().snapshot().await;
    let anchor = graph.children(graph.root()).next().unwrap();
    assert!((anchor.transform.position.x - 0.1).abs() < 1.0e-6);
    assert!((anchor.transform.position.z - 0.6).abs() < 1.0e-6);
}

#[tokio::test]
async fn unbound_image_is_skipped_and_stage_keeps_running() {
    let h = start(AppConfig::default()).await;
    h.sender.deliver(AnchorEvent {
        anchor_id: AnchorId::new(),
        lifecycle: AnchorLifecycle::Added,
        kind: AnchorKind::Image(ReferenceImage::new("giraffe", 0.3, 0.2)),
        transform: in_front(),
    });
    h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 2).await;

    let stats = h.stage.stats();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.placed, 1);
}

#[tokio::test]
async fn plane_anchors_are_ignored() {
    let h = start(AppConfig::default()).await;
    h.tracker.detect_plane(Matrix4::IDENTITY).unwrap();
    settle(&h.stage, 1).await;

    assert_eq!(h.stage.stats().ignored, 1);
    assert_eq!(h.stage.scene().read(|g| g.len()).await, 1);
}

#[tokio::test]
async fn highlight_removes_itself() {
    let h = start(AppConfig::default()).await;
    h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 1).await;

    let anchor = h
        .stage
        .scene()
        .read(|g| g.children(g.root()).next().map(|n| n.id))
        .await
        .unwrap();

    for _ in 0..4 {
        h.stage.tick(Duration::from_millis(500)).await.unwrap();
    }
    h.stage.scene().flush().await.unwrap();

    let graph = h.stage.scene().snapshot().await;
    assert!(graph.child_named(anchor, "highlight").is_none());
    assert!(graph.child_named(anchor, "ship").is_some());
}

#[tokio::test]
async fn video_loops_back_to_start() {
    let h = start(AppConfig::default()).await;
    let id = h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 1).await;

    let player = Arc::clone(h.stage.binder().player("elephant").unwrap());
    for _ in 0..13 {
        h.stage.tick(Duration::from_secs(1)).await.unwrap();
    }
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(player.position(), Duration::ZERO);
    assert_eq!(player.rate(), 0.0);

    // Next visible update resumes playback
    h.tracker.refresh(id, in_front()).unwrap();
    settle(&h.stage, 2).await;
    assert_eq!(player.rate(), 1.0);
    assert_eq!(h.stage.stats().playback_started, 1);
}

#[tokio::test]
async fn removed_anchor_drops_content_and_pauses_video() {
    let h = start(AppConfig::default()).await;
    let id = h.tracker.detect("elephant", in_front()).unwrap();
    h.tracker.lose(id).unwrap();
    settle(&h.stage, 2).await;

    assert_eq!(h.stage.scene().read(|g| g.len()).await, 1);
    assert_eq!(h.stage.binder().player("elephant").unwrap().rate(), 0.0);
    assert_eq!(h.stage.stats().removed, 1);
}

#[tokio::test]
async fn flat_model_keeps_video_but_skips_content() {
    let mut config = AppConfig::default();
    config.models[0].bounds_min[2] = 0.0;
    config.models[0].bounds_max[2] = 0.0;

    let h = start(config).await;
    h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 1).await;

    let graph = h.stage.scene().snapshot().await;
    let anchor = graph.children(graph.root()).next().unwrap().id;
    assert!(graph.child_named(anchor, "video-surface").is_some());
    assert!(graph.child_named(anchor, "ship").is_none());
    assert_eq!(h.stage.stats().skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn restart_clears_anchors_and_is_rate_limited() {
    let h = start(AppConfig::default()).await;
    h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 1).await;

    assert!(h.stage.experience().restart().await.unwrap());
    assert!(!h.stage.experience().restart().await.unwrap());
    settle(&h.stage, 2).await;

    assert_eq!(h.stage.scene().read(|g| g.len()).await, 1);
    // One run at startup, one for the accepted restart
    assert_eq!(h.tracker.run_count(), 2);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(h.stage.experience().restart().await.unwrap());
    assert_eq!(h.tracker.run_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn detection_message_replaces_look_around_hint() {
    let h = start(AppConfig::default()).await;
    h.tracker.detect("elephant", in_front()).unwrap();
    settle(&h.stage, 1).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        h.log.history(),
        vec!["Detected image \u{201c}elephant\u{201d}".to_string()]
    );
}

#[tokio::test]
async fn non_finite_timings_fail_startup_without_panicking() {
    for bad in [f32::NAN, f32::INFINITY, 1.0e30] {
        let mut config = AppConfig::default();
        config.status.look_around_delay_seconds = bad;

        let (sender, events) = anchor_channel(config.runtime.anchor_channel_capacity);
        let tracker = Arc::new(SimulatedTracker::new(sender));
        let result = Stage::builder(config).start(tracker.clone(), events).await;
        assert!(result.is_err(), "{} accepted", bad);
        assert!(!tracker.is_running());
    }
}

#[tokio::test]
async fn shutdown_pauses_tracking() {
    let h = start(AppConfig::default()).await;
    assert!(h.tracker.is_running());
    h.stage.shutdown().await.unwrap();
    assert!(!h.tracker.is_running());
}
