//! "Is this node on screen" checks used to resume playback

use async_trait::async_trait;
use tokio::sync::watch;

use anchorstage_config::CameraConfig;
use anchorstage_spatial::{Frustum, Transform};

use crate::queue::SceneHandle;
use crate::scene::{NodeId, SceneGraph};

#[async_trait]
pub trait VisibilityProbe: Send + Sync {
    async fn is_visible(&self, node: NodeId) -> bool;
}

/// Tests a node's subtree against the camera's view frustum
pub struct FrustumProbe {
    scene: SceneHandle,
    frustum: Frustum,
    camera: watch::Receiver<Transform>,
}

impl FrustumProbe {
    pub fn new(scene: SceneHandle, frustum: Frustum, camera: watch::Receiver<Transform>) -> Self {
        Self {
            scene,
            frustum,
            camera,
        }
    }

    pub fn from_config(
        scene: SceneHandle,
        config: &CameraConfig,
        camera: watch::Receiver<Transform>,
    ) -> Self {
        Self::new(
            scene,
            Frustum::perspective(config.fov_degrees, config.aspect),
            camera,
        )
    }
}

/// Whether any geometry under `node` intersects the frustum
pub fn subtree_in_frustum(
    graph: &SceneGraph,
    node: NodeId,
    frustum: &Frustum,
    camera: &Transform,
) -> bool {
    graph.subtree(node).into_iter().any(|id| {
        let bounds = graph.get(id).and_then(|n| n.geometry.bounds());
        match (bounds, graph.world_transform(id)) {
            (Some(bounds), Some(world)) => frustum.intersects_box(&bounds, &world, camera),
            _ => false,
        }
    })
}

#[async_trait]
impl VisibilityProbe for FrustumProbe {
    async fn is_visible(&self, node: NodeId) -> bool {
        let camera = *self.camera.borrow();
        let frustum = self.frustum;
        self.scene
            .read(|graph| subtree_in_frustum(graph, node, &frustum, &camera))
            .await
    }
}
