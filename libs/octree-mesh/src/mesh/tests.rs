//! Tests for the polyhedral mesh, octree meshing and boundary addressing.

use super::*;
use crate::core::BoundingBox;
use crate::octree::Octree;
use crate::surface::primitives::box_surface;
use crate::surface::TriSurface;
use approx::assert_relative_eq;
use std::collections::{BTreeSet, HashMap};

fn tetrahedron() -> PolyMesh {
    PolyMesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
        vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]],
        vec![0; 4],
        vec![],
        vec![Patch::new("walls", 0, 4)],
        1,
    )
    .unwrap()
}

fn unit_box() -> TriSurface {
    box_surface(Vec3::ZERO, Vec3::ONE).unwrap()
}

fn box_mesh(surface: &TriSurface, max_level: u8) -> PolyMesh {
    let root = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(1.5));
    let mut octree = Octree::with_root_box(surface, root).unwrap();
    octree.refine_to_surface(max_level, 0.5).unwrap();
    mesh_from_octree(&octree).unwrap()
}

fn boundary_area(mesh: &PolyMesh) -> f64 {
    mesh.boundary_faces()
        .map(|f| mesh.face_centre_and_area(f).1.length())
        .sum()
}

#[test]
fn tetrahedron_geometry() {
    let mesh = tetrahedron();
    assert_relative_eq!(mesh.cell_volumes()[0], 1.0 / 6.0, epsilon = 1e-12);
    let centre = mesh.cell_centres()[0];
    assert_relative_eq!(centre.x, 0.25, epsilon = 1e-12);
    assert_relative_eq!(centre.z, 0.25, epsilon = 1e-12);
    assert_eq!(mesh.edges().len(), 6);
    assert!(mesh.check_closed().is_ok());
    assert_eq!(mesh.face_patch(2), Some(0));
}

#[test]
fn rejects_inconsistent_addressing() {
    let points = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
    let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];

    let short_patch = PolyMesh::new(
        points.clone(),
        faces.clone(),
        vec![0; 4],
        vec![],
        vec![Patch::new("walls", 0, 3)],
        1,
    );
    assert!(matches!(short_patch, Err(MeshError::Consistency(_))));

    let bad_point = PolyMesh::new(
        points.clone(),
        vec![vec![0, 2, 9], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]],
        vec![0; 4],
        vec![],
        vec![Patch::new("walls", 0, 4)],
        1,
    );
    assert!(bad_point.is_err());

    let too_few_faces = PolyMesh::new(points, faces, vec![0; 4], vec![], vec![Patch::new("walls", 0, 4)], 2);
    assert!(too_few_faces.unwrap_err().to_string().contains("cell 1"));
}

#[test]
fn open_cell_is_detected() {
    let mesh = PolyMesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
        vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 3, 2]],
        vec![0; 4],
        vec![],
        vec![Patch::new("walls", 0, 4)],
        1,
    )
    .unwrap();
    assert!(mesh.check_closed().is_err());
}

#[test]
fn uniform_octree_mesh() {
    let surface = unit_box();
    let mesh = box_mesh(&surface, 2);

    assert_eq!(mesh.n_cells(), 8);
    assert_eq!(mesh.n_points(), 27);
    assert_eq!(mesh.n_internal_faces(), 12);
    assert_eq!(mesh.boundary_faces().len(), 24);
    assert_eq!(mesh.patches().len(), 1);
    assert_eq!(mesh.patches()[0].name, from_octree::DEFAULT_PATCH);
    assert!(mesh.check_closed().is_ok());
    for v in mesh.cell_volumes() {
        assert_relative_eq!(v, 0.125, epsilon = 1e-12);
    }
    for f in 0..mesh.n_internal_faces() {
        assert!(mesh.owner()[f] < mesh.neighbour()[f]);
    }
}

#[test]
fn graded_octree_mesh_is_closed() {
    let surface = unit_box();
    let mesh = box_mesh(&surface, 4);

    assert!(mesh.check_closed().is_ok());
    let volumes = mesh.cell_volumes();
    assert!(volumes.iter().all(|&v| v > 0.0));
    assert_relative_eq!(volumes.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(boundary_area(&mesh), 6.0, epsilon = 1e-9);

    // Hanging points turn some hexahedra into polyhedra.
    assert!(mesh.faces().iter().any(|f| f.len() > 4));
    assert!(mesh.boundary_faces().all(|f| {
        let (c, _) = mesh.face_centre_and_area(f);
        (0..3).any(|a| c[a].abs() < 1e-12 || (c[a] - 1.0).abs() < 1e-12)
    }));
}

#[test]
fn surface_engine_addressing() {
    let surface = unit_box();
    let mesh = box_mesh(&surface, 2);
    let engine = SurfaceEngine::new(&mesh);

    assert_eq!(engine.boundary_faces().len(), 24);
    assert_eq!(engine.boundary_points().len(), 26);
    assert_eq!(engine.edges().len(), 48);
    assert!(engine.edge_faces().iter().all(|f| f.len() == 2));

    let corner = mesh.points().iter().position(|p| *p == Vec3::ZERO).unwrap();
    let local = engine.boundary_point_index(corner).unwrap();
    assert_eq!(engine.point_faces()[local].len(), 3);
    assert_eq!(engine.point_points()[local].len(), 3);
    let n = engine.point_normals()[local];
    assert_relative_eq!(n.x, -(1.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert_relative_eq!(n.y, n.z, epsilon = 1e-12);

    let areas: f64 = engine.face_areas().iter().map(|a| a.length()).sum();
    assert_relative_eq!(areas, 6.0, epsilon = 1e-12);
}

/// Disjoint unit cubes at the given lower corners, points merged by
/// position, every face on the boundary.
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
fn cubes_sharing_an_edge_are_irregular() {
    let mesh = loose_cubes(&[[0, 0, 0], [1, 1, 0]]);
    assert_eq!(from_octree::irregular_boundary_cells(&mesh, |_| false), BTreeSet::from([0]));
    assert_eq!(from_octree::irregular_boundary_cells(&mesh, |c| c == 1), BTreeSet::from([1]));
}

#[test]
fn cubes_sharing_a_corner_are_irregular() {
    let mesh = loose_cubes(&[[0, 0, 0], [1, 1, 1]]);
    assert_eq!(from_octree::irregular_boundary_cells(&mesh, |_| false), BTreeSet::from([0]));
}

#[test]
fn single_cube_and_octree_box_are_regular() {
    let mesh = loose_cubes(&[[0, 0, 0]]);
    assert!(from_octree::irregular_boundary_cells(&mesh, |_| false).is_empty());

    let surface = unit_box();
    let boxed = box_mesh(&surface, 3);
    assert!(from_octree::irregular_boundary_cells(&boxed, |_| true).is_empty());
}

#[test]
fn tilted_box_mesh_is_closed_and_manifold() {
    let surface = tilted_box(0.3);
    let mut octree = Octree::from_surface(&surface).unwrap();
    octree.refine_to_surface(3, 0.1).unwrap();

    let (mesh, _removed) = build_octree_mesh(&octree).unwrap();
    mesh.check_closed().unwrap();
    assert!(mesh.cell_volumes().iter().all(|&v| v > 0.0));
    assert!(from_octree::irregular_boundary_cells(&mesh, |_| true).is_empty());
    let volume: f64 = mesh.cell_volumes().iter().sum();
    assert!(volume > 0.3 && volume < 2.0, "volume {volume}");
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
