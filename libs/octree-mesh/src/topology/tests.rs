//! Tests for batched topology edits.

use super::*;
use crate::core::{BoundingBox, Vec3};
use crate::mesh::{mesh_from_octree, Patch};
use crate::octree::Octree;
use crate::surface::primitives::box_surface;
use approx::assert_relative_eq;

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

/// Unit cube meshed by 2x2x2 hexahedra.
fn cube_mesh() -> PolyMesh {
    let surface = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
    let root = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(1.5));
    let mut octree = Octree::with_root_box(&surface, root).unwrap();
    octree.refine_to_surface(2, 0.5).unwrap();
    mesh_from_octree(&octree).unwrap()
}

fn total_volume(mesh: &PolyMesh) -> f64 {
    mesh.cell_volumes().iter().sum()
}

#[test]
fn second_batch_cannot_open() {
    let mut mesh = tetrahedron();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::MovePoint {
            point: PointRef::Existing(3),
            position: Vec3::new(0.0, 0.0, 2.0),
        })
        .unwrap();

    assert!(matches!(editor.begin_batch(), Err(MeshError::BatchAlreadyOpen)));
    assert_eq!(editor.state(), EditorState::Accumulating);
    assert_eq!(editor.pending().len(), 1);

    editor.change_mesh().unwrap();
    assert_eq!(editor.state(), EditorState::Applied);
    assert_relative_eq!(mesh.cell_volumes()[0], 1.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn edits_need_an_open_batch() {
    let mut mesh = tetrahedron();
    let mut editor = TopologyEditor::new(&mut mesh);
    assert_eq!(editor.state(), EditorState::Idle);
    assert!(matches!(
        editor.push(TopologyEdit::DefinePatches { names: vec![] }),
        Err(MeshError::NoOpenBatch)
    ));
    assert!(matches!(editor.change_mesh(), Err(MeshError::NoOpenBatch)));
    assert!(matches!(editor.abort(), Err(MeshError::NoOpenBatch)));
}

#[test]
fn rejected_batch_leaves_mesh_untouched() {
    let mut mesh = cube_mesh();
    let before = mesh.clone();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::MovePoint {
            point: PointRef::Existing(0),
            position: Vec3::splat(0.01),
        })
        .unwrap();
    editor.push(TopologyEdit::SetPatch { face: 0, patch: 7 }).unwrap();

    let err = editor.change_mesh().unwrap_err();
    assert!(matches!(err, MeshError::TopologyChangeRejected { edit: Some(1), .. }));
    assert_eq!(editor.state(), EditorState::RolledBack);
    assert_eq!(editor.rejected_batch().len(), 2);
    assert_eq!(mesh, before);
}

#[test]
fn inverted_cell_names_the_moving_edit() {
    let mut mesh = tetrahedron();
    let before = mesh.clone();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor.add_point(Vec3::splat(5.0)).unwrap();
    editor
        .push(TopologyEdit::MovePoint {
            point: PointRef::Existing(3),
            position: Vec3::new(0.0, 0.0, -1.0),
        })
        .unwrap();
    let err = editor.change_mesh().unwrap_err();
    match err {
        MeshError::TopologyChangeRejected { edit, reason } => {
            assert_eq!(edit, Some(1));
            assert!(reason.contains("volume"));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(mesh, before);
}

#[test]
fn unknown_point_is_rejected() {
    let mut mesh = tetrahedron();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::MovePoint {
            point: PointRef::Added(0),
            position: Vec3::ONE,
        })
        .unwrap();
    assert!(matches!(
        editor.change_mesh(),
        Err(MeshError::TopologyChangeRejected { edit: Some(0), .. })
    ));
}

#[test]
fn abort_discards_the_batch() {
    let mut mesh = tetrahedron();
    let before = mesh.clone();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor.add_point(Vec3::ONE).unwrap();
    editor.abort().unwrap();
    assert_eq!(editor.state(), EditorState::RolledBack);
    editor.begin_batch().unwrap();
    assert!(editor.pending().is_empty());
    editor.change_mesh().unwrap();
    assert_eq!(mesh, before);
}

#[test]
fn unused_added_points_are_dropped() {
    let mut mesh = tetrahedron();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor.add_point(Vec3::ONE).unwrap();
    let map = editor.change_mesh().unwrap();
    assert_eq!(mesh.n_points(), 4);
    assert_eq!(map.point_map, vec![Some(0), Some(1), Some(2), Some(3)]);
}

#[test]
fn split_boundary_face_into_a_fan() {
    let mut mesh = cube_mesh();
    let face = mesh.boundary_faces().start;
    let (centre, _) = mesh.face_centre_and_area(face);
    let (n_points, n_faces) = (mesh.n_points(), mesh.n_faces());

    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    let apex = editor.add_point(centre).unwrap();
    editor.push(TopologyEdit::SplitFace { face, centre: apex }).unwrap();
    let map = editor.change_mesh().unwrap();

    assert_eq!(mesh.n_points(), n_points + 1);
    assert_eq!(mesh.n_faces(), n_faces + 3);
    assert!(mesh.check_closed().is_ok());
    assert_relative_eq!(total_volume(&mesh), 1.0, epsilon = 1e-12);
    assert_eq!(map.face_map.iter().filter(|f| **f == Some(face)).count(), 4);
    assert_eq!(map.point_map[n_points], None);
    assert_eq!(mesh.patches()[0].size, 27);
}

#[test]
fn split_internal_face_updates_both_cells() {
    let mut mesh = cube_mesh();
    let (centre, _) = mesh.face_centre_and_area(0);
    let n_internal = mesh.n_internal_faces();

    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    let apex = editor.add_point(centre).unwrap();
    editor.push(TopologyEdit::SplitFace { face: 0, centre: apex }).unwrap();
    editor.change_mesh().unwrap();

    assert_eq!(mesh.n_internal_faces(), n_internal + 3);
    assert!(mesh.check_closed().is_ok());
}

#[test]
fn patches_must_cover_the_boundary() {
    let mut mesh = cube_mesh();
    let boundary: Vec<usize> = mesh.boundary_faces().collect();

    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::DefinePatches {
            names: vec!["low".into(), "high".into()],
        })
        .unwrap();
    editor.push(TopologyEdit::SetPatch { face: boundary[0], patch: 1 }).unwrap();
    let err = editor.change_mesh().unwrap_err();
    assert!(err.to_string().contains("left open"));

    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::DefinePatches {
            names: vec!["low".into(), "high".into()],
        })
        .unwrap();
    for (i, &f) in boundary.iter().enumerate() {
        editor
            .push(TopologyEdit::SetPatch { face: f, patch: usize::from(i % 3 == 0) })
            .unwrap();
    }
    let map = editor.change_mesh().unwrap();

    assert_eq!(mesh.patches().len(), 2);
    assert_eq!(mesh.patches()[0].size, 16);
    assert_eq!(mesh.patches()[1].size, 8);
    assert_eq!(mesh.n_faces(), 36);
    assert!(map.face_map.iter().all(Option::is_some));
}

#[test]
fn set_patch_rejects_internal_faces() {
    let mut mesh = cube_mesh();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor.push(TopologyEdit::SetPatch { face: 0, patch: 0 }).unwrap();
    assert!(editor.change_mesh().unwrap_err().to_string().contains("not a boundary face"));
}

#[test]
fn layer_under_the_whole_boundary() {
    let mut mesh = cube_mesh();
    let boundary: Vec<usize> = mesh.boundary_faces().collect();

    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::InsertLayer {
            faces: boundary,
            fraction: 0.25,
        })
        .unwrap();
    let map = editor.change_mesh().unwrap();

    assert_eq!(mesh.n_cells(), 8 + 24);
    assert_eq!(mesh.n_points(), 27 + 26);
    assert_eq!(mesh.boundary_faces().len(), 24);
    assert_eq!(mesh.n_internal_faces(), 12 + 24 + 48);
    assert!(mesh.check_closed().is_ok());
    assert!(mesh.cell_volumes().iter().all(|&v| v > 0.0));
    assert_relative_eq!(total_volume(&mesh), 1.0, epsilon = 1e-12);

    // Boundary faces keep their positions and their origin.
    for f in mesh.boundary_faces() {
        assert!(map.face_map[f].is_some());
        let (c, _) = mesh.face_centre_and_area(f);
        assert!((0..3).any(|a| c[a].abs() < 1e-12 || (c[a] - 1.0).abs() < 1e-12));
    }
    assert!(map.cell_map.iter().all(Option::is_some));
    assert_eq!(map.reverse_cell_map, (0..8).map(Some).collect::<Vec<_>>());
}

#[test]
fn layer_fraction_is_checked() {
    let mut mesh = cube_mesh();
    let face = mesh.boundary_faces().start;
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::InsertLayer {
            faces: vec![face],
            fraction: 1.5,
        })
        .unwrap();
    assert!(matches!(
        editor.change_mesh(),
        Err(MeshError::TopologyChangeRejected { edit: Some(0), .. })
    ));
}

#[test]
fn partial_layer_gets_rim_patches() {
    let mut mesh = cube_mesh();
    let face = mesh.boundary_faces().start;
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::InsertLayer {
            faces: vec![face],
            fraction: 0.25,
        })
        .unwrap();
    editor.change_mesh().unwrap();

    assert_eq!(mesh.n_cells(), 9);
    // The prism's four side faces join the boundary.
    assert_eq!(mesh.boundary_faces().len(), 28);
    assert!(mesh.check_closed().is_ok());
    assert!(mesh.cell_volumes().iter().all(|&v| v > 0.0));
}

#[test]
fn split_hex_refines_one_cell() {
    let mut mesh = cube_mesh();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor.split_hex(0).unwrap();
    let map = editor.change_mesh().unwrap();

    assert_eq!(mesh.n_cells(), 15);
    assert_eq!(mesh.n_points(), 27 + 19);
    assert!(mesh.check_closed().is_ok());
    assert_relative_eq!(total_volume(&mesh), 1.0, epsilon = 1e-12);
    for v in mesh.cell_volumes().iter().filter(|v| **v < 0.1) {
        assert_relative_eq!(*v, 0.125 / 8.0, epsilon = 1e-12);
    }
    // Neighbours now carry hanging points.
    assert!(mesh.faces().iter().any(|f| f.len() > 4));
    assert_eq!(map.cell_map.iter().filter(|c| **c == Some(0)).count(), 8);
}

#[test]
fn split_hex_rejects_polyhedra() {
    let mut mesh = tetrahedron();
    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    assert!(editor.split_hex(0).is_err());
}

#[test]
fn map_values_follow_cells() {
    let map = TopologyMap::new(vec![], vec![], vec![Some(1), None, Some(0)], 0, 0, 2);
    assert_eq!(map.map_cell_values(&[10, 20], 0), vec![20, 0, 10]);
    assert_eq!(map.reverse_cell_map, vec![Some(2), Some(0)]);
}

#[test]
fn tiny_cells_survive_next_to_large_ones() {
    let scale = 1.0e-4;
    let offset = Vec3::splat(5.0);
    let mut points = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
    points.extend([Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z].map(|p| offset + scale * p));
    let tet = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
    let faces: Vec<Vec<usize>> = tet
        .iter()
        .map(|f| f.to_vec())
        .chain(tet.iter().map(|f| f.iter().map(|p| p + 4).collect()))
        .collect();
    let mut mesh = PolyMesh::new(
        points,
        faces,
        vec![0, 0, 0, 0, 1, 1, 1, 1],
        vec![],
        vec![Patch::new("walls", 0, 8)],
        2,
    )
    .unwrap();

    let mut editor = TopologyEditor::new(&mut mesh);
    editor.begin_batch().unwrap();
    editor
        .push(TopologyEdit::MovePoint {
            point: PointRef::Existing(3),
            position: Vec3::new(0.0, 0.0, 2.0),
        })
        .unwrap();
    editor.change_mesh().unwrap();

    let volumes = mesh.cell_volumes();
    assert_relative_eq!(volumes[0], 1.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(volumes[1], scale.powi(3) / 6.0, max_relative = 1e-9);
}
