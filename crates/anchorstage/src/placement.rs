//! Placement of model and HUD panels on a detected reference image

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use anchorstage_config::{AppConfig, PlacementConfig};
use anchorstage_spatial::{Aabb, Easing, Matrix4, Point3D, SpatialError};

use crate::assets::ModelAsset;
use crate::catalog::ReferenceImage;
use crate::scene::{Action, Geometry, Material, Node, NodeId, SceneError, SceneGraph};

/// Rotation that lays Y-up content flat on the image plane
const LAY_FLAT: f32 = -FRAC_PI_2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacementError {
    #[error("Model bounding box has no usable width or depth: {0:?}")]
    DegenerateGeometry(Aabb),

    #[error("Reference image size must be positive and finite, got {width} x {height}")]
    InvalidSize { width: f32, height: f32 },

    #[error("Anchor transform rejected: {0}")]
    InvalidTransform(#[from] SpatialError),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Uniform scale that fits `bounds` onto a `width` x `height` image.
///
/// The model's X extent is matched against the image width and its Z extent
/// (depth in Y-up authoring space) against the image height; the smaller
/// ratio wins so the scaled footprint fits on both axes.
pub fn scale_ratio(width: f32, height: f32, bounds: &Aabb) -> Result<f32, PlacementError> {
    validate_size(width, height)?;

    let size = bounds.size();
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !usable(size.x) || !usable(size.z) {
        return Err(PlacementError::DegenerateGeometry(*bounds));
    }

    let width_ratio = width / size.x;
    let depth_ratio = height / size.z;
    Ok(width_ratio.min(depth_ratio))
}

fn validate_size(width: f32, height: f32) -> Result<(), PlacementError> {
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if usable(width) && usable(height) {
        Ok(())
    } else {
        Err(PlacementError::InvalidSize { width, height })
    }
}

/// Nodes created for one anchor by [`ContentPlacer::place`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedNodes {
    pub asset: NodeId,
    pub info: Option<NodeId>,
    pub web: Option<NodeId>,
    /// Uniform scale applied to the model
    pub scale: f32,
}

/// Builds the per-image content under an anchor node
#[derive(Debug, Clone)]
pub struct ContentPlacer {
    config: PlacementConfig,
    web_url: String,
}

impl ContentPlacer {
    pub fn new(config: PlacementConfig, web_url: impl Into<String>) -> Self {
        Self {
            config,
            web_url: web_url.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.placement.clone(), config.web.url.clone())
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    /// Flash a translucent plane over the detected image, then remove it
    pub fn highlight(
        &self,
        graph: &mut SceneGraph,
        anchor: NodeId,
        image: &ReferenceImage,
    ) -> Result<Option<NodeId>, PlacementError> {
        if !self.config.highlight_detection {
            return Ok(None);
        }
        validate_size(image.physical_width, image.physical_height)?;

        let node = Node::new("highlight")
            .with_geometry(Geometry::Plane {
                width: image.physical_width,
                height: image.physical_height,
            })
            .with_material(Material::Color {
                r: 1.0,
                g: 1.0,
                b: 1.0,
            })
            .with_pitch(LAY_FLAT)
            .with_opacity(0.25)
            .with_action(Action::sequence([
                Action::wait(0.25),
                Action::fade_opacity(0.85, 0.25),
                Action::fade_opacity(0.15, 0.25),
                Action::fade_opacity(0.85, 0.25),
                Action::fade_out(0.5),
                Action::RemoveFromParent,
            ]));

        Ok(Some(graph.add_child(anchor, node)?))
    }

    /// Add the scaled model and the two sliding panels under `anchor`
    pub fn place(
        &self,
        graph: &mut SceneGraph,
        anchor: NodeId,
        image: &ReferenceImage,
        anchor_transform: &Matrix4,
        model: &ModelAsset,
    ) -> Result<PlacedNodes, PlacementError> {
        anchor_transform.validate_rigid()?;
        let scale = scale_ratio(image.physical_width, image.physical_height, &model.bounds)?;
        let width = image.physical_width;

        let mut asset = Node::new(model.node.clone())
            .with_geometry(Geometry::Model {
                asset: model.name.clone(),
                bounds: model.bounds,
            })
            .with_position(Point3D::new(0.0, self.config.model_vertical_offset, 0.0))
            .with_pitch(LAY_FLAT);
        asset = match self.config.appear_seconds {
            Some(secs) if secs > 0.0 && Duration::try_from_secs_f32(secs).is_ok() => asset
                .with_scale(0.0)
                .with_action(Action::scale_to(scale, secs, Easing::EaseOut)),
            _ => asset.with_scale(scale),
        };
        let asset = graph.add_child(anchor, asset)?;

        let info = if self.config.info_panel {
            let node = Node::new("info-panel")
                .with_geometry(Geometry::Plane {
                    width: width * 1.2,
                    height: width * 1.5,
                })
                .with_material(Material::InfoScene(image.name.clone()))
                .with_pitch(LAY_FLAT)
                .with_opacity(0.0)
                .with_action(Action::sequence([
                    Action::wait(0.5),
                    Action::fade_opacity(1.0, 1.5),
                    Action::move_by(-1.1 * width, 0.0, 0.0, 1.0),
                ]));
            Some(graph.add_child(anchor, node)?)
        } else {
            None
        };

        let web = if self.config.web_panel {
            let node = Node::new("web-panel")
                .with_geometry(Geometry::Plane {
                    width,
                    height: width * 1.4,
                })
                .with_material(Material::Web {
                    url: self.web_url.clone(),
                    page: None,
                })
                .with_pitch(LAY_FLAT)
                .with_opacity(0.0)
                .with_action(Action::sequence([
                    Action::wait(3.0),
                    Action::fade_opacity(1.0, 1.5),
                    Action::move_by(1.1 * width, 0.0, 0.0, 1.0),
                ]));
            Some(graph.add_child(anchor, node)?)
        } else {
            None
        };

        tracing::debug!(
            "Placed '{}' on '{}' at scale {:.4}",
            model.name,
            image.name,
            scale
        );

        Ok(PlacedNodes {
            asset,
            info,
            web,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorstage_spatial::Vector3D;
    use std::path::PathBuf;
    use std::time::Duration;

    fn unit_box(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::centered(Point3D::ORIGIN, Vector3D::new(x / 2.0, y / 2.0, z / 2.0))
    }

    fn model(bounds: Aabb) -> ModelAsset {
        ModelAsset {
            name: "ship".to_string(),
            path: PathBuf::from("ship.scn"),
            node: "ship".to_string(),
            bounds,
        }
    }

    fn anchor(graph: &mut SceneGraph) -> NodeId {
        let root = graph.root();
        graph.add_child(root, Node::new("anchor")).unwrap()
    }

    #[test]
    fn test_scale_ratio_example() {
        let ratio = scale_ratio(0.2, 0.15, &unit_box(1.0, 0.3, 0.5)).unwrap();
        assert!((ratio - 0.2).abs() < 1.0e-6);
    }

    #[test]
    fn test_scale_ratio_depth_limited() {
        let ratio = scale_ratio(0.2, 0.05, &unit_box(1.0, 0.3, 0.5)).unwrap();
        assert!((ratio - 0.1).abs() < 1.0e-6);
    }

    #[test]
    fn test_scale_ratio_rejects_flat_box() {
        let flat = unit_box(1.0, 0.3, 0.0);
        assert_eq!(
            scale_ratio(0.2, 0.15, &flat),
            Err(PlacementError::DegenerateGeometry(flat))
        );
    }

    #[test]
    fn test_scale_ratio_rejects_bad_size() {
        assert!(matches!(
            scale_ratio(0.0, 0.15, &unit_box(1.0, 1.0, 1.0)),
            Err(PlacementError::InvalidSize { .. })
        ));
        assert!(matches!(
            scale_ratio(f32::NAN, 0.15, &unit_box(1.0, 1.0, 1.0)),
            Err(PlacementError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_place_builds_model_and_panels() {
        let placer = ContentPlacer::from_config(&AppConfig::default());
        let mut graph = SceneGraph::new();
        let anchor = anchor(&mut graph);
        let image = ReferenceImage::new("elephant", 0.2, 0.15);

        let placed = placer
            .place(
                &mut graph,
                anchor,
                &image,
                &Matrix4::IDENTITY,
                &model(unit_box(1.0, 0.4, 0.5)),
            )
            .unwrap();

        let asset = graph.get(placed.asset).unwrap();
        assert!((asset.transform.scale.x - 0.2).abs() < 1.0e-6);
        assert_eq!(asset.transform.position, Point3D::ORIGIN);

        let info = graph.get(placed.info.unwrap()).unwrap();
        match info.geometry {
            Geometry::Plane { width, height } => {
                assert!((width - 0.24).abs() < 1.0e-6);
                assert!((height - 0.3).abs() < 1.0e-6);
            }
            ref other => panic!("unexpected info geometry {:?}", other),
        }
        assert_eq!(info.opacity, 0.0);

        let web = graph.get(placed.web.unwrap()).unwrap();
        assert!(matches!(&web.material, Material::Web { page: None, .. }));
    }

    #[test]
    fn test_panels_slide_out_after_their_actions() {
        let placer = ContentPlacer::from_config(&AppConfig::default());
        let mut graph = SceneGraph::new();
        let anchor = anchor(&mut graph);
        let image = ReferenceImage::new("elephant", 0.2, 0.15);
        let placed = placer
            .place(
                &mut graph,
                anchor,
                &image,
                &Matrix4::IDENTITY,
                &model(unit_box(1.0, 0.4, 0.5)),
            )
            .unwrap();

        for _ in 0..60 {
            graph.advance(Duration::from_millis(100));
        }

        let info = graph.get(placed.info.unwrap()).unwrap();
        let web = graph.get(placed.web.unwrap()).unwrap();
        assert!((info.transform.position.x + 0.22).abs() < 1.0e-4);
        assert!((web.transform.position.x - 0.22).abs() < 1.0e-4);
        assert_eq!(info.opacity, 1.0);
        assert_eq!(web.opacity, 1.0);
    }

    #[test]
    fn test_place_rejects_non_rigid_transform() {
        let placer = ContentPlacer::from_config(&AppConfig::default());
        let mut graph = SceneGraph::new();
        let anchor = anchor(&mut graph);
        let mut skewed = Matrix4::IDENTITY;
        skewed.columns[0][0] = 2.0;

        let err = placer
            .place(
                &mut graph,
                anchor,
                &ReferenceImage::new("elephant", 0.2, 0.15),
                &skewed,
                &model(unit_box(1.0, 0.4, 0.5)),
            )
            .unwrap_err();
        assert!(matches!(err, PlacementError::InvalidTransform(_)));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_appear_animation_grows_model() {
        let mut config = AppConfig::default();
        config.placement.appear_seconds = Some(0.5);
        let placer = ContentPlacer::from_config(&config);
        let mut graph = SceneGraph::new();
        let anchor = anchor(&mut graph);

        let placed = placer
            .place(
                &mut graph,
                anchor,
                &ReferenceImage::new("elephant", 0.2, 0.15),
                &Matrix4::IDENTITY,
                &model(unit_box(1.0, 0.4, 0.5)),
            )
            .unwrap();
        assert_eq!(graph.get(placed.asset).unwrap().transform.scale.x, 0.0);

        graph.advance(Duration::from_millis(600));
        let scale = graph.get(placed.asset).unwrap().transform.scale.x;
        assert!((scale - 0.2).abs() < 1.0e-5);
    }

    #[test]
    fn test_unrepresentable_appear_time_skips_animation() {
        let mut config = AppConfig::default();
        config.placement.appear_seconds = Some(f32::INFINITY);
        let placer = ContentPlacer::from_config(&config);
        let mut graph = SceneGraph::new();
        let anchor = anchor(&mut graph);

        let placed = placer
            .place(
                &mut graph,
                anchor,
                &ReferenceImage::new("elephant", 0.2, 0.15),
                &Matrix4::IDENTITY,
                &model(unit_box(1.0, 0.4, 0.5)),
            )
            .unwrap();
        let asset = graph.get(placed.asset).unwrap();
        assert!((asset.transform.scale.x - 0.2).abs() < 1.0e-6);
        assert!(!asset.has_running_action());
    }

    #[test]
    fn test_highlight_removes_itself() {
        let placer = ContentPlacer::from_config(&AppConfig::default());
        let mut graph = SceneGraph::new();
        let anchor = anchor(&mut graph);

        let flash = placer
            .highlight(&mut graph, anchor, &ReferenceImage::new("elephant", 0.2, 0.15))
            .unwrap()
            .unwrap();
        graph.advance(Duration::from_millis(1000));
        assert!(graph.contains(flash));
        graph.advance(Duration::from_millis(600));
        assert!(!graph.contains(flash));
    }
}
