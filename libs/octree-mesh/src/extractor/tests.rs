//! Tests for surface extraction on the unit box.

use super::*;
use crate::core::{BoundingBox, Vec3};
use crate::mesh::{mesh_from_octree, polygon_centre_and_area};
use crate::surface::primitives::box_surface;
use approx::assert_relative_eq;
use std::collections::HashMap;

fn unit_box() -> TriSurface {
    box_surface(Vec3::ZERO, Vec3::ONE).unwrap()
}

fn refined(surface: &TriSurface, max_level: u8) -> Octree<'_> {
    let root = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(1.5));
    let mut octree = Octree::with_root_box(surface, root).unwrap();
    octree.refine_to_surface(max_level, 0.1).unwrap();
    octree
}

fn extractor() -> SurfaceEdgeExtractor {
    SurfaceEdgeExtractor::new(ExecutionContext::serial(), ExtractorSettings::default()).unwrap()
}

#[test]
fn box_gets_one_patch_per_side() {
    let surface = unit_box();
    let octree = refined(&surface, 3);
    let result = extractor().extract(&octree, &surface).unwrap();

    let names: Vec<&str> = result.patches().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["xMin", "xMax", "yMin", "yMax", "zMin", "zMax"]);
    assert!(result.patches().iter().all(|p| p.size > 0));

    let mesh = &result.mesh;
    let covered: usize = result.patches().iter().map(|p| p.size).sum();
    assert_eq!(covered, mesh.boundary_faces().len());
    mesh.check_closed().unwrap();
    assert_relative_eq!(mesh.cell_volumes().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
}

#[test]
fn boundary_faces_sit_on_their_side() {
    let surface = unit_box();
    let octree = refined(&surface, 3);
    let result = extractor().extract(&octree, &surface).unwrap();
    let mesh = &result.mesh;
    let centres: Vec<Vec3> = mesh
        .boundary_faces()
        .map(|f| polygon_centre_and_area(mesh.points(), &mesh.faces()[f]).0)
        .collect();

    let start = mesh.n_internal_faces();
    for (i, c) in centres.iter().enumerate() {
        let patch = mesh.face_patch(start + i).unwrap();
        let (axis, value) = (patch / 2, (patch % 2) as f64);
        assert_relative_eq!(c[axis], value, epsilon = 1e-9);
    }
}

#[test]
fn box_edges_and_corners_are_features() {
    let surface = unit_box();
    let octree = refined(&surface, 3);
    let result = extractor().extract(&octree, &surface).unwrap();

    // Twelve box edges, each cut into four level-3 segments.
    assert_eq!(result.features.edges.len(), 48);
    for e in &result.features.edges {
        assert_relative_eq!(e.angle, 90.0, epsilon = 1e-6);
    }

    assert_eq!(result.features.corners.len(), 8);
    for &c in &result.features.corners {
        let p = result.mesh.points()[c];
        for axis in 0..3 {
            assert!(p[axis].abs() < 1e-9 || (p[axis] - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn cells_at_box_edges_get_a_sheet() {
    let surface = unit_box();
    let octree = refined(&surface, 3);
    let plain = mesh_from_octree(&octree).unwrap();
    let result = extractor().extract(&octree, &surface).unwrap();

    assert!(result.sheet_inserted);
    assert!(cells_touching_several_patches(&result.mesh).is_empty());
    assert_eq!(
        result.mesh.n_cells(),
        plain.n_cells() + plain.boundary_faces().len()
    );
}

#[test]
fn sheet_can_be_switched_off() {
    let surface = unit_box();
    let octree = refined(&surface, 3);
    let settings = ExtractorSettings {
        insert_sheets: false,
        ..ExtractorSettings::default()
    };
    let result = SurfaceEdgeExtractor::new(ExecutionContext::serial(), settings)
        .unwrap()
        .extract(&octree, &surface)
        .unwrap();
    assert!(!result.sheet_inserted);
    assert!(!cells_touching_several_patches(&result.mesh).is_empty());
}

#[test]
fn empty_patch_is_dropped_with_a_warning() {
    let base = unit_box();
    let mut names = base.patch_names().to_vec();
    names.push("unused".to_string());
    let regions = (0..base.triangle_count()).map(|t| base.region(t)).collect();
    let surface = TriSurface::new(
        base.points().to_vec(),
        base.triangles().to_vec(),
        regions,
        names,
    )
    .unwrap();

    let octree = refined(&surface, 2);
    let result = extractor().extract(&octree, &surface).unwrap();
    assert_eq!(result.patches().len(), 6);
    assert!(result.diagnostics.iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::EmptyPatchDropped { patch } if patch == "unused"
    )));
}

#[test]
fn refuses_to_run_in_parallel() {
    let surface = unit_box();
    let octree = refined(&surface, 2);

    let parallel = SurfaceEdgeExtractor::new(ExecutionContext::parallel(1), ExtractorSettings::default())
        .unwrap();
    assert!(matches!(
        parallel.extract(&octree, &surface),
        Err(MeshError::ParallelContext { .. })
    ));

    let open = SurfaceEdgeExtractor::new(
        ExecutionContext::serial().with_open_comm_region(),
        ExtractorSettings::default(),
    )
    .unwrap();
    assert!(matches!(
        open.extract(&octree, &surface),
        Err(MeshError::ParallelContext { .. })
    ));
}

#[test]
fn rejects_bad_feature_angle() {
    for angle in [0.0, 180.0, f64::NAN] {
        let settings = ExtractorSettings {
            feature_angle: angle,
            ..ExtractorSettings::default()
        };
        assert!(matches!(
            SurfaceEdgeExtractor::new(ExecutionContext::serial(), settings),
            Err(MeshError::Configuration { .. })
        ));
    }
}

/// Patches cover the boundary faces once, in contiguous ranges.
fn assert_patches_partition_boundary(mesh: &PolyMesh) {
    let mut next = mesh.n_internal_faces();
    for patch in mesh.patches() {
        assert_eq!(patch.start, next, "patch {} is not contiguous", patch.name);
        assert!(patch.size > 0, "patch {} is empty", patch.name);
        next += patch.size;
    }
    assert_eq!(next, mesh.n_faces());
    assert!(mesh.boundary_faces().all(|f| mesh.face_patch(f).is_some()));
}

/// Unit box turned by `angle` about the vertical axis through its centre.
fn tilted_box(angle: f64) -> TriSurface {
    let base = unit_box();
    let (sin, cos) = angle.sin_cos();
    let centre = Vec3::new(0.5, 0.5, 0.0);
    let points = base
        .points()
        .iter()
        .map(|&p| {
            let d = p - centre;
            centre + Vec3::new(cos * d.x - sin * d.y, sin * d.x + cos * d.y, d.z)
        })
        .collect();
    let regions = (0..base.triangle_count()).map(|t| base.region(t)).collect();
    TriSurface::new(points, base.triangles().to_vec(), regions, base.patch_names().to_vec()).unwrap()
}

fn assert_sound(result: &SurfaceExtraction) {
    let mesh = &result.mesh;
    mesh.check_closed().unwrap();
    assert!(mesh.cell_volumes().iter().all(|&v| v > 0.0));
    assert_patches_partition_boundary(mesh);
    let skipped = result
        .diagnostics
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::LayerSkipped { .. }));
    assert!(result.sheet_inserted || skipped);
    if result.sheet_inserted {
        assert!(cells_touching_several_patches(mesh).is_empty());
    }
}

#[test]
fn unit_box_under_default_root_box() {
    let surface = unit_box();
    for max_level in [2, 3, 4] {
        let mut octree = Octree::from_surface(&surface).unwrap();
        octree.refine_to_surface(max_level, 0.1).unwrap();
        assert!(octree.is_balanced());

        let result = extractor().extract(&octree, &surface).unwrap();
        assert_sound(&result);
        let names: Vec<&str> = result.patches().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["xMin", "xMax", "yMin", "yMax", "zMin", "zMax"]);
    }
}

#[test]
fn tilted_box_extracts() {
    let surface = tilted_box(0.3);
    let mut octree = Octree::from_surface(&surface).unwrap();
    octree.refine_to_surface(3, 0.1).unwrap();
    assert!(octree.is_balanced());

    let result = extractor().extract(&octree, &surface).unwrap();
    assert_sound(&result);
    assert!(result.patches().len() >= 4);
}

/// Unit cubes at the given lower corners, sharing points by position,
/// every face on the boundary.
fn loose_cubes(corners: &[[i32; 3]]) -> PolyMesh {
    const SIDES: [[usize; 4]; 6] = [
        [0, 4, 6, 2],
        [1, 3, 7, 5],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 2, 3, 1],
        [4, 5, 7, 6],
    ];
    let mut index: HashMap<[i32; 3], usize> = HashMap::new();
    let mut points = Vec::new();
    let mut faces = Vec::new();
    let mut owner = Vec::new();
    for (c, lo) in corners.iter().enumerate() {
        let labels: Vec<usize> = (0..8)
            .map(|i| {
                let p = [lo[0] + (i & 1), lo[1] + ((i >> 1) & 1), lo[2] + ((i >> 2) & 1)];
                *index.entry(p).or_insert_with(|| {
                    points.push(Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64));
                    points.len() - 1
                })
            })
            .collect();
        for side in SIDES {
            faces.push(side.iter().map(|&k| labels[k]).collect());
            owner.push(c);
        }
    }
    let n = faces.len();
    PolyMesh::new(points, faces, owner, vec![], vec![Patch::new("walls", 0, n)], corners.len()).unwrap()
}

#[test]
fn refused_layer_keeps_the_mesh_and_warns() {
    // The layer cannot follow a boundary pinched along an edge.
    let mut mesh = loose_cubes(&[[0, 0, 0], [1, 1, 0]]);
    let before = mesh.clone();

    let mut diagnostics = Vec::new();
    let map = grow_layer_or_skip(&mut mesh, 0.25, Stage::SurfaceExtraction, &mut diagnostics).unwrap();
    assert!(map.is_none());
    assert_eq!(mesh, before);
    assert!(matches!(
        diagnostics.as_slice(),
        [d] if d.is_warning() && matches!(d.kind, DiagnosticKind::LayerSkipped { .. })
    ));
}

#[test]
fn layer_over_a_regular_boundary_is_grown() {
    let mut mesh = loose_cubes(&[[0, 0, 0]]);
    let mut diagnostics = Vec::new();
    let map = grow_layer_or_skip(&mut mesh, 0.25, Stage::BoundaryLayer, &mut diagnostics).unwrap();
    assert!(map.is_some());
    assert!(diagnostics.is_empty());
    assert_eq!(mesh.n_cells(), 7);
    mesh.check_closed().unwrap();
}
