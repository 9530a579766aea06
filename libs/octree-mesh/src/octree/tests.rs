//! Tests for octree refinement, balancing and queries.

use super::*;
use crate::surface::primitives::box_surface;
use approx::assert_relative_eq;

fn unit_box() -> TriSurface {
    box_surface(Vec3::ZERO, Vec3::ONE).unwrap()
}

fn aligned_root() -> BoundingBox {
    BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(1.5))
}

fn cc(x: u32, y: u32, z: u32, l: u8) -> CubeCoordinate {
    CubeCoordinate::new(x, y, z, l).unwrap()
}

fn outside(c: CubeCoordinate) -> OctreeCube {
    let mut cube = OctreeCube::new(c);
    cube.set_cube_type(CubeType::Outside).unwrap();
    cube
}

/// Root split once, then child `(0,0,0,1)` split again.
fn two_level_leaves() -> Vec<OctreeCube> {
    let mut leaves: Vec<OctreeCube> = CubeCoordinate::root()
        .refine()
        .unwrap()
        .into_iter()
        .skip(1)
        .map(outside)
        .collect();
    leaves.extend(cc(0, 0, 0, 1).refine().unwrap().into_iter().map(outside));
    leaves
}

fn covered_volume(octree: &Octree<'_>) -> f64 {
    octree
        .leaves()
        .map(|c| 0.125f64.powi(i32::from(c.coordinate().level())))
        .sum()
}

#[test]
fn root_of_a_surface_is_data() {
    let surface = unit_box();
    let octree = Octree::from_surface(&surface).unwrap();
    assert_eq!(octree.leaf_count(), 1);
    let root = octree.leaves().next().unwrap();
    assert_eq!(root.cube_type(), CubeType::Data);
    assert_eq!(octree.contained_triangles(root.coordinate()).len(), 12);
    assert_relative_eq!(octree.root_box().extent().x, 1.5);
}

#[test]
fn rejects_bad_root_boxes() {
    let surface = unit_box();
    let flat = BoundingBox::new(Vec3::splat(-1.0), Vec3::new(2.0, 2.0, 1.0));
    assert!(Octree::with_root_box(&surface, flat).is_err());
    let small = BoundingBox::new(Vec3::splat(0.25), Vec3::splat(0.75));
    assert!(Octree::with_root_box(&surface, small).is_err());
    assert!(Octree::new(&surface, -1.0).is_err());
}

#[test]
fn rejects_out_of_range_max_level() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    let err = octree.refine_to_surface(MAX_OCTREE_LEVEL + 1, 0.5).unwrap_err();
    assert!(matches!(err, MeshError::Configuration { .. }));
    assert_eq!(octree.leaf_count(), 1);
}

#[test]
fn cube_scenario_refines_edges_and_stays_balanced() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.refine_to_surface(3, 0.5).unwrap();

    assert!(octree.is_balanced());
    assert_eq!(octree.max_leaf_level(), 3);
    let per_level = octree.leaf_count_per_level();
    assert_eq!(per_level.len(), 4);
    assert_eq!(per_level.iter().sum::<usize>(), octree.leaf_count());
    assert_relative_eq!(covered_volume(&octree), 1.0, epsilon = 1e-12);
    assert!(octree.diagnostics().iter().any(|d| matches!(
        d.kind,
        DiagnosticKind::RefinementLimitReached { .. }
    )));
}

#[test]
fn flat_faces_stay_coarser_than_edges() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.refine_to_surface(4, 0.5).unwrap();

    let face = octree.leaf_at(Vec3::new(-0.1, 0.4, 0.4)).unwrap();
    assert_eq!(face.coordinate().level(), 3);
    assert_eq!(face.cube_type(), CubeType::Data);

    let edge = octree.leaf_at(Vec3::new(-0.1, 0.05, 0.4)).unwrap();
    assert_eq!(edge.coordinate().level(), 4);
}

#[test]
fn every_triangle_is_covered_by_data_leaves() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.refine_to_surface(3, 0.5).unwrap();

    for t in 0..surface.triangle_count() {
        let [a, b, c] = surface.triangle_vertices(t);
        for p in [a, b, c, (a + b + c) / 3.0, 0.5 * (a + b), 0.5 * (b + c)] {
            let leaf = octree.leaf_at(p).unwrap();
            assert_eq!(leaf.cube_type(), CubeType::Data, "point {p:?}");
        }
    }
}

#[test]
fn classify_points() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.refine_to_surface(3, 0.5).unwrap();

    assert_eq!(octree.classify(Vec3::splat(0.5)), CubeType::Inside);
    assert_eq!(octree.classify(Vec3::new(0.3, 0.6, 0.45)), CubeType::Inside);
    assert_eq!(octree.classify(Vec3::new(1.2, 0.5, 0.5)), CubeType::Outside);
    assert_eq!(octree.classify(Vec3::splat(3.0)), CubeType::Outside);
    assert_eq!(octree.classify(Vec3::new(1.0, 0.5, 0.5)), CubeType::Data);
    assert_eq!(octree.classify(Vec3::new(0.98, 0.5, 0.5)), CubeType::Inside);
}

#[test]
fn find_leaf_returns_containing_leaf() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.load_leaves(two_level_leaves()).unwrap();

    assert_eq!(
        octree.find_leaf(&cc(3, 1, 0, 3)).map(|c| *c.coordinate()),
        Some(cc(1, 0, 0, 2))
    );
    assert_eq!(
        octree.find_leaf(&cc(1, 1, 1, 1)).map(|c| *c.coordinate()),
        Some(cc(1, 1, 1, 1))
    );
    assert!(octree.find_leaf(&CubeCoordinate::root()).is_none());
}

#[test]
fn neighbour_counts() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.load_leaves(two_level_leaves()).unwrap();

    let across_refined = octree.neighbours(&cc(1, 0, 0, 1), Direction::NegX).unwrap();
    assert_eq!(across_refined.len(), 4);
    assert!(across_refined.iter().all(|c| c.coordinate().pos_x() == 1));

    let conforming = octree.neighbours(&cc(1, 0, 0, 2), Direction::PosX).unwrap();
    assert_eq!(conforming.len(), 1);
    assert_eq!(*conforming[0].coordinate(), cc(1, 0, 0, 1));

    assert!(octree.neighbours(&cc(0, 0, 0, 2), Direction::NegX).unwrap().is_empty());
    assert!(octree.neighbours(&cc(0, 0, 0, 1), Direction::PosX).is_err());
}

#[test]
fn balance_splits_coarse_neighbours_and_is_idempotent() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    let mut leaves: Vec<OctreeCube> = two_level_leaves()
        .into_iter()
        .filter(|c| *c.coordinate() != cc(1, 1, 1, 2))
        .collect();
    leaves.extend(cc(1, 1, 1, 2).refine().unwrap().into_iter().map(outside));
    octree.load_leaves(leaves).unwrap();
    assert!(!octree.is_balanced());

    octree.balance().unwrap();
    assert!(octree.is_balanced());
    assert!(octree.find_leaf(&cc(1, 0, 0, 1)).unwrap().coordinate().level() == 2);
    assert_relative_eq!(covered_volume(&octree), 1.0, epsilon = 1e-12);

    let before: Vec<OctreeCube> = octree.leaves().copied().collect();
    octree.balance().unwrap();
    let after: Vec<OctreeCube> = octree.leaves().copied().collect();
    assert_eq!(before, after);
}

#[test]
fn load_leaves_rejects_gaps() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    let mut leaves = two_level_leaves();
    leaves.pop();
    assert!(matches!(
        octree.load_leaves(leaves),
        Err(MeshError::Consistency(_))
    ));
    assert_eq!(octree.leaf_count(), 1);
}

#[test]
fn leaves_survive_a_record_stream() {
    let surface = unit_box();
    let mut octree = Octree::with_root_box(&surface, aligned_root()).unwrap();
    octree.refine_to_surface(2, 0.5).unwrap();

    let mut bytes = Vec::new();
    write_cubes(&mut bytes, octree.leaves()).unwrap();

    let mut restored = Octree::with_root_box(&surface, aligned_root()).unwrap();
    restored.load_leaves(read_cubes(&mut bytes.as_slice()).unwrap()).unwrap();
    assert!(octree.leaves().eq(restored.leaves()));
    for leaf in octree.leaves() {
        assert_eq!(
            octree.contained_triangles(leaf.coordinate()).len(),
            restored.contained_triangles(leaf.coordinate()).len()
        );
    }
}
