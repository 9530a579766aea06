//! Tests for the triangulated surface queries.

use super::primitives::box_surface;
use super::*;
use approx::assert_relative_eq;

fn unit_box() -> TriSurface {
    box_surface(Vec3::ZERO, Vec3::ONE).unwrap()
}

#[test]
fn rejects_bad_indices() {
    let err = TriSurface::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![[0, 1, 7]],
        vec![0],
        vec!["wall".into()],
    )
    .unwrap_err();
    assert!(err.to_string().contains("missing point 7"));
}

#[test]
fn rejects_unnamed_region() {
    let err = TriSurface::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![[0, 1, 2]],
        vec![3],
        vec!["wall".into()],
    )
    .unwrap_err();
    assert!(matches!(err, GeometryError::InvalidSurface(_)));
}

#[test]
fn rejects_degenerate_triangle() {
    let err = TriSurface::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
        vec![[0, 1, 2]],
        vec![0],
        vec!["wall".into()],
    )
    .unwrap_err();
    assert!(matches!(err, GeometryError::DegenerateGeometry(_)));
}

#[test]
fn inside_outside_classification() {
    let s = unit_box();
    assert!(s.is_inside(Vec3::splat(0.5)));
    assert!(s.is_inside(Vec3::new(0.1, 0.9, 0.3)));
    assert!(!s.is_inside(Vec3::splat(1.5)));
    assert!(!s.is_inside(Vec3::new(-0.2, 0.5, 0.5)));
}

#[test]
fn nearest_point_on_side() {
    let s = unit_box();
    let hit = s.nearest(Vec3::new(0.5, 0.5, 1.75)).unwrap();
    assert_relative_eq!(hit.distance, 0.75, epsilon = 1e-12);
    assert_eq!(s.region(hit.triangle), 5);
    assert_relative_eq!(hit.point.z, 1.0);
}

#[test]
fn nearest_region_tie_prefers_smaller_id() {
    let s = unit_box();
    // equidistant from xMin (0) and zMin (4)
    let (region, hit) = s.nearest_region(Vec3::new(0.25, 0.5, 0.25), 1e-12).unwrap();
    assert_eq!(region, 0);
    assert_relative_eq!(hit.distance, 0.25, epsilon = 1e-12);
}

#[test]
fn triangles_in_box_touching_side() {
    let s = unit_box();
    let tris = s.triangles_in_box(Vec3::new(0.25, 0.25, 0.9), Vec3::new(0.5, 0.5, 1.0));
    assert!(!tris.is_empty());
    assert!(tris.iter().all(|&t| s.region(t) == 5));
}
