//! # Topology Editor
//!
//! Batches declarative edits and applies them to a [`PolyMesh`] in one
//! atomic step.
//!
//! ## Lifecycle
//!
//! `Idle -> Accumulating -> Validating -> Applied | RolledBack`. Only one
//! batch may be open at a time. A rejected batch leaves the mesh exactly as
//! it was.
//!
//! ## Example
//!
//! ```rust
//! use octree_mesh::topology::{PointRef, TopologyEdit, TopologyEditor};
//! use octree_mesh::mesh::{Patch, PolyMesh};
//! use octree_mesh::Vec3;
//!
//! let points = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
//! let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
//! let mut mesh = PolyMesh::new(points, faces, vec![0; 4], vec![], vec![Patch::new("walls", 0, 4)], 1)
//!     .unwrap();
//!
//! let mut editor = TopologyEditor::new(&mut mesh);
//! editor.begin_batch().unwrap();
//! editor
//!     .push(TopologyEdit::MovePoint { point: PointRef::Existing(3), position: Vec3::new(0.0, 0.0, 2.0) })
//!     .unwrap();
//! let map = editor.change_mesh().unwrap();
//! assert_eq!(map.point_map[3], Some(3));
//! assert!((mesh.cell_volumes()[0] - 1.0 / 3.0).abs() < 1e-12);
//! ```

pub mod edit;
pub mod hex_split;
mod layer;
mod soup;

pub use edit::{CellShape, FaceShape, PointRef, TopologyEdit};

use crate::error::{MeshError, MeshResult};
use crate::mesh::PolyMesh;
use soup::CellSoup;
use tracing::{debug, warn};

/// State of a [`TopologyEditor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// No batch has been opened yet.
    Idle,
    /// A batch is open and collecting edits.
    Accumulating,
    /// The batch is being checked and applied.
    Validating,
    /// The last batch was applied.
    Applied,
    /// The last batch was rejected or aborted.
    RolledBack,
}

/// Label maps produced by an applied batch.
///
/// Forward maps give, for each new entity, the old entity it descends from
/// (`None` for entities created by the batch). Reverse maps give, for each
/// old entity, its surviving successor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologyMap {
    /// New point to old point.
    pub point_map: Vec<Option<usize>>,
    /// New face to old face.
    pub face_map: Vec<Option<usize>>,
    /// New cell to old cell.
    pub cell_map: Vec<Option<usize>>,
    /// Old point to new point.
    pub reverse_point_map: Vec<Option<usize>>,
    /// Old face to new face.
    pub reverse_face_map: Vec<Option<usize>>,
    /// Old cell to new cell.
    pub reverse_cell_map: Vec<Option<usize>>,
}

fn reverse(forward: &[Option<usize>], n_old: usize) -> Vec<Option<usize>> {
    let mut reverse = vec![None; n_old];
    for (new, old) in forward.iter().enumerate() {
        if let Some(slot) = old.and_then(|o| reverse.get_mut(o)) {
            if slot.is_none() {
                *slot = Some(new);
            }
        }
    }
    reverse
}

impl TopologyMap {
    pub(crate) fn new(
        point_map: Vec<Option<usize>>,
        face_map: Vec<Option<usize>>,
        cell_map: Vec<Option<usize>>,
        n_old_points: usize,
        n_old_faces: usize,
        n_old_cells: usize,
    ) -> Self {
        Self {
            reverse_point_map: reverse(&point_map, n_old_points),
            reverse_face_map: reverse(&face_map, n_old_faces),
            reverse_cell_map: reverse(&cell_map, n_old_cells),
            point_map,
            face_map,
            cell_map,
        }
    }

    /// Carries per-cell values to the new numbering; new cells get `fill`.
    pub fn map_cell_values<T: Clone>(&self, old: &[T], fill: T) -> Vec<T> {
        map_values(&self.cell_map, old, fill)
    }

    /// Carries per-point values to the new numbering; new points get `fill`.
    pub fn map_point_values<T: Clone>(&self, old: &[T], fill: T) -> Vec<T> {
        map_values(&self.point_map, old, fill)
    }
}

fn map_values<T: Clone>(map: &[Option<usize>], old: &[T], fill: T) -> Vec<T> {
    map.iter()
        .map(|o| o.and_then(|o| old.get(o)).cloned().unwrap_or_else(|| fill.clone()))
        .collect()
}

/// Single-writer editor over a mesh.
#[derive(Debug)]
pub struct TopologyEditor<'m> {
    mesh: &'m mut PolyMesh,
    state: EditorState,
    pending: Vec<TopologyEdit>,
    added_points: usize,
    rejected: Vec<TopologyEdit>,
}

impl<'m> TopologyEditor<'m> {
    /// Takes exclusive access to `mesh`.
    pub fn new(mesh: &'m mut PolyMesh) -> Self {
        Self {
            mesh,
            state: EditorState::Idle,
            pending: Vec::new(),
            added_points: 0,
            rejected: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// The mesh as it currently stands.
    pub fn mesh(&self) -> &PolyMesh {
        &*self.mesh
    }

    /// Edits queued in the open batch.
    pub fn pending(&self) -> &[TopologyEdit] {
        &self.pending
    }

    /// Edits of the last rejected batch.
    pub fn rejected_batch(&self) -> &[TopologyEdit] {
        &self.rejected
    }

    /// Opens a batch.
    pub fn begin_batch(&mut self) -> MeshResult<()> {
        if self.state == EditorState::Accumulating {
            return Err(MeshError::BatchAlreadyOpen);
        }
        self.state = EditorState::Accumulating;
        self.pending.clear();
        self.added_points = 0;
        Ok(())
    }

    /// Queues an edit and returns its index in the batch.
    pub fn push(&mut self, edit: TopologyEdit) -> MeshResult<usize> {
        if self.state != EditorState::Accumulating {
            return Err(MeshError::NoOpenBatch);
        }
        if matches!(edit, TopologyEdit::AddPoint { .. }) {
            self.added_points += 1;
        }
        self.pending.push(edit);
        Ok(self.pending.len() - 1)
    }

    /// Queues a point insertion and returns a reference to the new point.
    pub fn add_point(&mut self, position: crate::core::Vec3) -> MeshResult<PointRef> {
        self.push(TopologyEdit::AddPoint { position })?;
        Ok(PointRef::Added(self.added_points - 1))
    }

    /// Drops the open batch.
    pub fn abort(&mut self) -> MeshResult<()> {
        if self.state != EditorState::Accumulating {
            return Err(MeshError::NoOpenBatch);
        }
        self.rejected = std::mem::take(&mut self.pending);
        self.state = EditorState::RolledBack;
        Ok(())
    }

    /// Validates and applies the open batch.
    ///
    /// On success the mesh is replaced and the label maps are returned. On
    /// failure the mesh is untouched and the error names the first
    /// offending edit when it can be attributed.
    pub fn change_mesh(&mut self) -> MeshResult<TopologyMap> {
        if self.state != EditorState::Accumulating {
            return Err(MeshError::NoOpenBatch);
        }
        self.state = EditorState::Validating;
        let edits = std::mem::take(&mut self.pending);

        match Self::build(self.mesh, &edits) {
            Ok((mesh, map)) => {
                debug!(
                    edits = edits.len(),
                    points = mesh.n_points(),
                    faces = mesh.n_faces(),
                    cells = mesh.n_cells(),
                    "topology change applied"
                );
                *self.mesh = mesh;
                self.state = EditorState::Applied;
                Ok(map)
            }
            Err(err) => {
                warn!(%err, "topology change rolled back");
                self.rejected = edits;
                self.state = EditorState::RolledBack;
                Err(err)
            }
        }
    }

    fn build(mesh: &PolyMesh, edits: &[TopologyEdit]) -> MeshResult<(PolyMesh, TopologyMap)> {
        let mut soup = CellSoup::from_mesh(mesh);
        for (i, edit) in edits.iter().enumerate() {
            soup.apply(i, edit)?;
        }
        soup.rebuild()
    }
}

#[cfg(test)]
mod tests;
