//! Boundary surface addressing of a [`PolyMesh`].
//!
//! A snapshot of the boundary faces, their points and edges, indexed
//! locally. Boundary point `i` is mesh point `boundary_points()[i]`.

use super::{face_edges, polygon_centre_and_area, PolyMesh};
use crate::core::Vec3;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Boundary faces, points and edges of a mesh.
#[derive(Debug, Clone)]
pub struct SurfaceEngine {
    boundary_faces: Vec<usize>,
    boundary_points: Vec<usize>,
    point_index: HashMap<usize, usize>,
    /// Face loops in mesh point labels.
    faces: Vec<Vec<usize>>,
    face_owner: Vec<usize>,
    face_patch: Vec<usize>,
    point_faces: Vec<Vec<usize>>,
    point_points: Vec<Vec<usize>>,
    edges: Vec<[usize; 2]>,
    edge_faces: Vec<Vec<usize>>,
    positions: Vec<Vec3>,
}

impl SurfaceEngine {
    /// Builds the boundary addressing of `mesh`.
    pub fn new(mesh: &PolyMesh) -> Self {
        let boundary_faces: Vec<usize> = mesh.boundary_faces().collect();
        let faces: Vec<Vec<usize>> = boundary_faces.iter().map(|&f| mesh.faces()[f].clone()).collect();
        let face_owner = boundary_faces.iter().map(|&f| mesh.owner()[f]).collect();
        let face_patch = boundary_faces
            .iter()
            .map(|&f| mesh.face_patch(f).unwrap_or(0))
            .collect();

        let boundary_points: Vec<usize> = faces
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let point_index: HashMap<usize, usize> = boundary_points
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect();

        let mut point_faces = vec![Vec::new(); boundary_points.len()];
        let mut neighbours = vec![BTreeSet::new(); boundary_points.len()];
        let mut edge_map: BTreeMap<[usize; 2], Vec<usize>> = BTreeMap::new();
        for (bf, face) in faces.iter().enumerate() {
            for (a, b) in face_edges(face) {
                point_faces[point_index[&a]].push(bf);
                neighbours[point_index[&a]].insert(point_index[&b]);
                neighbours[point_index[&b]].insert(point_index[&a]);
                edge_map.entry([a.min(b), a.max(b)]).or_default().push(bf);
            }
        }

        let (edges, edge_faces) = edge_map.into_iter().unzip();
        let positions = boundary_points.iter().map(|&p| mesh.points()[p]).collect();
        Self {
            boundary_faces,
            boundary_points,
            point_index,
            faces,
            face_owner,
            face_patch,
            point_faces,
            point_points: neighbours.into_iter().map(|s| s.into_iter().collect()).collect(),
            edges,
            edge_faces,
            positions,
        }
    }

    /// Refreshes point positions after points moved without topology change.
    pub fn update_points(&mut self, mesh: &PolyMesh) {
        for (i, &p) in self.boundary_points.iter().enumerate() {
            self.positions[i] = mesh.points()[p];
        }
    }

    /// Replaces the boundary point positions, e.g. with trial positions.
    pub fn set_positions(&mut self, positions: Vec<Vec3>) {
        debug_assert_eq!(positions.len(), self.boundary_points.len());
        self.positions = positions;
    }

    /// Mesh face label of each boundary face.
    pub fn boundary_faces(&self) -> &[usize] {
        &self.boundary_faces
    }

    /// Mesh point label of each boundary point.
    pub fn boundary_points(&self) -> &[usize] {
        &self.boundary_points
    }

    /// Local index of mesh point `p`, if it is on the boundary.
    pub fn boundary_point_index(&self, p: usize) -> Option<usize> {
        self.point_index.get(&p).copied()
    }

    /// Boundary face loops in mesh point labels.
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Owner cell of each boundary face.
    pub fn face_owner(&self) -> &[usize] {
        &self.face_owner
    }

    /// Patch of each boundary face.
    pub fn face_patch(&self) -> &[usize] {
        &self.face_patch
    }

    /// Boundary faces around each boundary point.
    pub fn point_faces(&self) -> &[Vec<usize>] {
        &self.point_faces
    }

    /// Boundary points connected to each boundary point by a boundary edge.
    pub fn point_points(&self) -> &[Vec<usize>] {
        &self.point_points
    }

    /// Boundary edges as sorted mesh point pairs.
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Boundary faces sharing each edge.
    pub fn edge_faces(&self) -> &[Vec<usize>] {
        &self.edge_faces
    }

    /// Boundary point positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn face_geometry(&self, bf: usize) -> (Vec3, Vec3) {
        let local: Vec<usize> = self.faces[bf].iter().map(|p| self.point_index[p]).collect();
        polygon_centre_and_area(&self.positions, &local)
    }

    /// Face centres.
    pub fn face_centres(&self) -> Vec<Vec3> {
        (0..self.faces.len()).map(|f| self.face_geometry(f).0).collect()
    }

    /// Face area vectors (outward).
    pub fn face_areas(&self) -> Vec<Vec3> {
        (0..self.faces.len()).map(|f| self.face_geometry(f).1).collect()
    }

    /// Unit face normals.
    pub fn face_normals(&self) -> Vec<Vec3> {
        self.face_areas().into_iter().map(|a| a.normalize_or_zero()).collect()
    }

    /// Area-weighted unit point normals.
    pub fn point_normals(&self) -> Vec<Vec3> {
        let areas = self.face_areas();
        self.point_faces
            .iter()
            .map(|faces| faces.iter().map(|&f| areas[f]).sum::<Vec3>().normalize_or_zero())
            .collect()
    }
}
