//! # Polyhedral Mesh
//!
//! Face-based polyhedral mesh: points, polygonal faces, and an owner (and,
//! for internal faces, a neighbour) cell per face.
//!
//! ## Numbering
//!
//! - Internal faces come first, with `owner < neighbour`
//! - Face loops are ordered so the right-hand normal points out of the owner
//! - Boundary faces follow, grouped into patches of contiguous face ranges
//!
//! ## Example
//!
//! ```rust
//! use octree_mesh::mesh::{Patch, PolyMesh};
//! use octree_mesh::Vec3;
//!
//! // Unit tetrahedron, one cell, four boundary faces in one patch.
//! let points = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
//! let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
//! let mesh = PolyMesh::new(points, faces, vec![0; 4], vec![], vec![Patch::new("walls", 0, 4)], 1)
//!     .unwrap();
//! assert!((mesh.cell_volumes()[0] - 1.0 / 6.0).abs() < 1e-12);
//! ```

pub mod from_octree;
pub mod surface_engine;

pub(crate) use from_octree::build_octree_mesh;
pub use from_octree::mesh_from_octree;
pub use surface_engine::SurfaceEngine;

use crate::core::Vec3;
use crate::error::{MeshError, MeshResult};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

// =============================================================================
// PATCHES
// =============================================================================

/// Named range of boundary faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Patch name.
    pub name: String,
    /// First face.
    pub start: usize,
    /// Number of faces.
    pub size: usize,
}

impl Patch {
    /// Creates a patch.
    pub fn new(name: impl Into<String>, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            start,
            size,
        }
    }

    /// Face range of the patch.
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

// =============================================================================
// MESH STRUCT
// =============================================================================

/// Polyhedral mesh with owner/neighbour addressing.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyMesh {
    points: Vec<Vec3>,
    faces: Vec<Vec<usize>>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    patches: Vec<Patch>,
    n_cells: usize,
}

impl PolyMesh {
    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    /// Creates a mesh, validating the addressing.
    ///
    /// `neighbour` holds one entry per internal face; the internal faces
    /// are the first `neighbour.len()` faces.
    pub fn new(
        points: Vec<Vec3>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<Patch>,
        n_cells: usize,
    ) -> MeshResult<Self> {
        let mesh = Self {
            points,
            faces,
            owner,
            neighbour,
            patches,
            n_cells,
        };
        mesh.check_addressing()?;
        Ok(mesh)
    }

    fn check_addressing(&self) -> MeshResult<()> {
        let n_faces = self.faces.len();
        if self.owner.len() != n_faces {
            return Err(MeshError::consistency(format!(
                "{} owners for {n_faces} faces",
                self.owner.len()
            )));
        }
        if self.neighbour.len() > n_faces {
            return Err(MeshError::consistency("more neighbours than faces"));
        }

        for (f, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(MeshError::consistency(format!("face {f} has fewer than 3 points")));
            }
            if let Some(&p) = face.iter().find(|&&p| p >= self.points.len()) {
                return Err(MeshError::consistency(format!("face {f} references missing point {p}")));
            }
            if face.iter().collect::<BTreeSet<_>>().len() != face.len() {
                return Err(MeshError::consistency(format!("face {f} repeats a point")));
            }
            if self.owner[f] >= self.n_cells {
                return Err(MeshError::consistency(format!("face {f} owner out of range")));
            }
        }
        for (f, &n) in self.neighbour.iter().enumerate() {
            if n >= self.n_cells || n <= self.owner[f] {
                return Err(MeshError::consistency(format!(
                    "internal face {f} has owner {} and neighbour {n}",
                    self.owner[f]
                )));
            }
        }

        let mut next = self.neighbour.len();
        for patch in &self.patches {
            if patch.start != next {
                return Err(MeshError::consistency(format!(
                    "patch '{}' starts at {} instead of {next}",
                    patch.name, patch.start
                )));
            }
            next += patch.size;
        }
        if next != n_faces {
            return Err(MeshError::consistency(format!(
                "patches end at face {next} but the mesh has {n_faces} faces"
            )));
        }

        let mut faces_per_cell = vec![0usize; self.n_cells];
        for (f, &o) in self.owner.iter().enumerate() {
            faces_per_cell[o] += 1;
            if let Some(&n) = self.neighbour.get(f) {
                faces_per_cell[n] += 1;
            }
        }
        if let Some(c) = faces_per_cell.iter().position(|&n| n < 4) {
            return Err(MeshError::consistency(format!("cell {c} has fewer than 4 faces")));
        }
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Point positions.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Face point loops.
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Owner cell per face.
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// Neighbour cell per internal face.
    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    /// Boundary patches.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Number of points.
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Number of faces.
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of internal faces.
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// True for internal faces.
    pub fn is_internal_face(&self, face: usize) -> bool {
        face < self.neighbour.len()
    }

    /// Boundary face range.
    pub fn boundary_faces(&self) -> Range<usize> {
        self.neighbour.len()..self.faces.len()
    }

    /// Patch index of a boundary face.
    pub fn face_patch(&self, face: usize) -> Option<usize> {
        self.patches.iter().position(|p| p.range().contains(&face))
    }

    /// Index of the patch called `name`.
    pub fn patch_index(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    // =========================================================================
    // DERIVED ADDRESSING
    // =========================================================================

    /// Faces of every cell.
    pub fn cells(&self) -> Vec<Vec<usize>> {
        let mut cells = vec![Vec::new(); self.n_cells];
        for (f, &o) in self.owner.iter().enumerate() {
            cells[o].push(f);
            if let Some(&n) = self.neighbour.get(f) {
                cells[n].push(f);
            }
        }
        cells
    }

    /// Sorted points of a cell.
    pub fn cell_points(&self, cell_faces: &[usize]) -> Vec<usize> {
        cell_faces
            .iter()
            .flat_map(|&f| self.faces[f].iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Cells using every point.
    pub fn point_cells(&self) -> Vec<Vec<usize>> {
        let mut point_cells = vec![BTreeSet::new(); self.points.len()];
        for (f, face) in self.faces.iter().enumerate() {
            for &p in face {
                point_cells[p].insert(self.owner[f]);
                if let Some(&n) = self.neighbour.get(f) {
                    point_cells[p].insert(n);
                }
            }
        }
        point_cells.into_iter().map(|s| s.into_iter().collect()).collect()
    }

    /// Unique edges as sorted point pairs.
    pub fn edges(&self) -> Vec<[usize; 2]> {
        self.faces
            .iter()
            .flat_map(|face| face_edges(face))
            .map(|(a, b)| [a.min(b), a.max(b)])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// Centre and area vector of `face`.
    pub fn face_centre_and_area(&self, face: usize) -> (Vec3, Vec3) {
        polygon_centre_and_area(&self.points, &self.faces[face])
    }

    /// Area vectors of every face.
    pub fn face_areas(&self) -> Vec<Vec3> {
        (0..self.faces.len())
            .map(|f| self.face_centre_and_area(f).1)
            .collect()
    }

    /// Cell centres and volumes from a pyramid decomposition.
    pub fn cell_centres_and_volumes(&self) -> (Vec<Vec3>, Vec<f64>) {
        let cells = self.cells();
        let face_geometry: Vec<(Vec3, Vec3)> = (0..self.faces.len())
            .map(|f| self.face_centre_and_area(f))
            .collect();

        let mut centres = Vec::with_capacity(self.n_cells);
        let mut volumes = Vec::with_capacity(self.n_cells);
        for (c, cell) in cells.iter().enumerate() {
            let estimate = cell.iter().map(|&f| face_geometry[f].0).sum::<Vec3>() / cell.len() as f64;
            let mut volume = 0.0;
            let mut moment = Vec3::ZERO;
            for &f in cell {
                let (centre, area) = face_geometry[f];
                let outward = if self.owner[f] == c { area } else { -area };
                let pyramid = outward.dot(centre - estimate) / 3.0;
                volume += pyramid;
                moment += pyramid * (0.75 * centre + 0.25 * estimate);
            }
            centres.push(if volume.abs() > f64::MIN_POSITIVE {
                moment / volume
            } else {
                estimate
            });
            volumes.push(volume);
        }
        (centres, volumes)
    }

    /// Cell volumes.
    pub fn cell_volumes(&self) -> Vec<f64> {
        self.cell_centres_and_volumes().1
    }

    /// Cell centres.
    pub fn cell_centres(&self) -> Vec<Vec3> {
        self.cell_centres_and_volumes().0
    }

    /// Checks that every cell is closed: each directed edge of its outward
    /// face loops is matched by the reverse edge.
    pub fn check_closed(&self) -> MeshResult<()> {
        let mut edges: Vec<HashMap<(usize, usize), i32>> = vec![HashMap::new(); self.n_cells];
        for (f, face) in self.faces.iter().enumerate() {
            for (a, b) in face_edges(face) {
                *edges[self.owner[f]].entry((a, b)).or_default() += 1;
                if let Some(&n) = self.neighbour.get(f) {
                    *edges[n].entry((b, a)).or_default() += 1;
                }
            }
        }
        for (c, cell_edges) in edges.iter().enumerate() {
            for (&(a, b), &count) in cell_edges {
                if cell_edges.get(&(b, a)).copied().unwrap_or(0) != count {
                    return Err(MeshError::consistency(format!(
                        "cell {c} is open along edge {a}-{b}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Consecutive point pairs of a face loop, wrapping around.
pub fn face_edges(face: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    face.iter()
        .zip(face.iter().cycle().skip(1))
        .map(|(&a, &b)| (a, b))
}

/// Centre and area vector of a polygon, by triangles fanned from the
/// point average.
pub fn polygon_centre_and_area(points: &[Vec3], face: &[usize]) -> (Vec3, Vec3) {
    if face.len() == 3 {
        let [a, b, c] = [points[face[0]], points[face[1]], points[face[2]]];
        return ((a + b + c) / 3.0, 0.5 * (b - a).cross(c - a));
    }
    let average = face.iter().map(|&p| points[p]).sum::<Vec3>() / face.len() as f64;
    let normal: Vec3 = face_edges(face)
        .map(|(a, b)| (points[a] - average).cross(points[b] - average))
        .sum::<Vec3>()
        .normalize_or_zero();

    let mut area = Vec3::ZERO;
    let mut weighted = Vec3::ZERO;
    let mut total = 0.0;
    for (a, b) in face_edges(face) {
        let (pa, pb) = (points[a], points[b]);
        let tri = 0.5 * (pa - average).cross(pb - average);
        let magnitude = tri.dot(normal).max(0.0);
        area += tri;
        weighted += magnitude * (pa + pb + average) / 3.0;
        total += magnitude;
    }
    let centre = if total > f64::MIN_POSITIVE {
        weighted / total
    } else {
        average
    };
    (centre, area)
}

#[cfg(test)]
mod tests;
