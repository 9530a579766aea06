//! Declarative topology edits.
//!
//! Edits address points, faces and cells by their labels in the mesh as it
//! was when the batch was opened. Points added earlier in the same batch are
//! addressed through [`PointRef::Added`].

use crate::core::Vec3;

/// Reference to a point inside an edit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointRef {
    /// Point of the mesh the batch was opened on.
    Existing(usize),
    /// The n-th point added by this batch.
    Added(usize),
}

/// One face of a [`CellShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct FaceShape {
    /// Point loop, ordered so the right-hand normal points out of the cell.
    pub points: Vec<PointRef>,
    /// Patch for the face if it ends up on the boundary.
    pub patch: Option<usize>,
}

impl FaceShape {
    /// Face without a boundary patch.
    pub fn new(points: Vec<PointRef>) -> Self {
        Self {
            points,
            patch: None,
        }
    }

    /// Face with a boundary patch.
    pub fn with_patch(points: Vec<PointRef>, patch: Option<usize>) -> Self {
        Self { points, patch }
    }
}

/// Closed polyhedron given by its outward face loops.
#[derive(Debug, Clone, PartialEq)]
pub struct CellShape {
    /// Faces of the cell.
    pub faces: Vec<FaceShape>,
}

/// A single edit of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyEdit {
    /// Appends a point.
    AddPoint {
        /// Position of the new point.
        position: Vec3,
    },
    /// Moves a point.
    MovePoint {
        /// Point to move.
        point: PointRef,
        /// New position.
        position: Vec3,
    },
    /// Inserts `point` into every face loop running along edge `edge`.
    SplitEdge {
        /// Edge end points.
        edge: [PointRef; 2],
        /// Point inserted between them.
        point: PointRef,
    },
    /// Fans a face into triangles around `centre`, on both sides of the face.
    SplitFace {
        /// Face to split.
        face: usize,
        /// Apex of the triangle fan.
        centre: PointRef,
    },
    /// Replaces a face by pieces, on both sides of the face.
    ReplaceFace {
        /// Face to replace.
        face: usize,
        /// Piece loops oriented like the face seen from its owner.
        pieces: Vec<Vec<PointRef>>,
    },
    /// Replaces a cell by one or more cells.
    ReplaceCell {
        /// Cell to replace.
        cell: usize,
        /// Replacement cells.
        shapes: Vec<CellShape>,
    },
    /// Replaces the patch table. Boundary faces keep their patch when its
    /// name is still present.
    DefinePatches {
        /// New patch names, in face order.
        names: Vec<String>,
    },
    /// Moves a boundary face to a patch of the current table.
    SetPatch {
        /// Boundary face.
        face: usize,
        /// Target patch.
        patch: usize,
    },
    /// Inserts a layer of prism cells under boundary faces. Every point of
    /// those faces is pulled into the volume by `fraction` of the distance
    /// to the centroid of its surrounding cells.
    InsertLayer {
        /// Boundary faces to extrude.
        faces: Vec<usize>,
        /// Relative layer thickness in `(0, 1)`.
        fraction: f64,
    },
}
