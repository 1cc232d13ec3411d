use anchorstage::{scale_ratio, PlacementError};
use anchorstage_spatial::{Aabb, Point3D};

fn bbox(width: f32, height: f32, depth: f32) -> Aabb {
    Aabb::new(Point3D::ORIGIN, Point3D::new(width, height, depth))
}

#[test]
fn example_elephant_on_wide_model() {
    let ratio = scale_ratio(0.2, 0.15, &bbox(1.0, 0.4, 0.5)).unwrap();
    assert!((ratio - 0.2).abs() < 1.0e-6);
}

#[test]
fn scaled_footprint_fits_and_touches_one_edge() {
    let cases = [
        (0.2, 0.15, bbox(1.0, 0.4, 0.5)),
        (0.068, 0.121, bbox(1.0, 0.4, 1.2)),
        (0.5, 0.5, bbox(0.25, 3.0, 2.0)),
        (1.2, 0.3, bbox(4.0, 0.1, 0.05)),
    ];

    for (width, height, bounds) in cases {
        let ratio = scale_ratio(width, height, &bounds).unwrap();
        assert!(ratio > 0.0);

        let size = bounds.size();
        let fitted_width = size.x * ratio;
        let fitted_depth = size.z * ratio;
        let eps = 1.0e-5;
        assert!(fitted_width <= width + eps, "{} > {}", fitted_width, width);
        assert!(fitted_depth <= height + eps, "{} > {}", fitted_depth, height);
        assert!(
            (fitted_width - width).abs() < eps || (fitted_depth - height).abs() < eps,
            "neither axis touches for {}x{}",
            width,
            height
        );
    }
}

#[test]
fn model_height_does_not_affect_scale() {
    let short = scale_ratio(0.2, 0.15, &bbox(1.0, 0.1, 0.5)).unwrap();
    let tall = scale_ratio(0.2, 0.15, &bbox(1.0, 9.0, 0.5)).unwrap();
    assert_eq!(short, tall);
}

#[test]
fn degenerate_bounds_are_rejected() {
    for bounds in [bbox(0.0, 1.0, 1.0), bbox(1.0, 1.0, 0.0)] {
        assert_eq!(
            scale_ratio(0.2, 0.15, &bounds),
            Err(PlacementError::DegenerateGeometry(bounds))
        );
    }
    let inverted = Aabb::new(Point3D::new(1.0, 0.0, 1.0), Point3D::ORIGIN);
    assert!(matches!(
        scale_ratio(0.2, 0.15, &inverted),
        Err(PlacementError::DegenerateGeometry(_))
    ));
}
