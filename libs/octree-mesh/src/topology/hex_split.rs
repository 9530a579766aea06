//! Local refinement of axis-aligned hexahedra.
//!
//! A hex cell is replaced by its 8 children. Edge midpoints are inserted
//! into every face running along a split edge, and faces shared with
//! neighbours are cut into four quads, so neighbouring cells become
//! polyhedra with hanging points instead of being refined themselves.

use super::edit::{CellShape, FaceShape, PointRef, TopologyEdit};
use super::TopologyEditor;
use crate::core::{BoundingBox, Vec3};
use crate::error::{MeshError, MeshResult};
use crate::octree::Direction;
use std::collections::{BTreeMap, HashMap};

type Node = [u8; 3];

/// Outward loop of the `direction` face of the unit block at `lo` on the
/// 3x3x3 node grid of the parent.
fn block_face(lo: Node, direction: Direction) -> [Node; 4] {
    let axis = direction.axis();
    let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
    let mut base = lo;
    if direction.is_positive() {
        base[axis] += 1;
    }
    let corner = |du: u8, dv: u8| {
        let mut p = base;
        p[u] += du;
        p[v] += dv;
        p
    };
    let ring = [corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1)];
    if direction.is_positive() {
        ring
    } else {
        [ring[0], ring[3], ring[2], ring[1]]
    }
}

fn direction_of(offset: Vec3) -> Direction {
    let a = offset.abs();
    let axis = if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    };
    let positive = offset[axis] > 0.0;
    match (axis, positive) {
        (0, false) => Direction::NegX,
        (0, true) => Direction::PosX,
        (1, false) => Direction::NegY,
        (1, true) => Direction::PosY,
        (2, false) => Direction::NegZ,
        _ => Direction::PosZ,
    }
}

impl TopologyEditor<'_> {
    /// Queues the edits that split hex `cell` into 8 children.
    ///
    /// The cell must have 6 quad faces whose 8 points sit on the corners of
    /// their bounding box. Cells sharing points must be split in separate
    /// batches.
    pub fn split_hex(&mut self, cell: usize) -> MeshResult<()> {
        let mesh = self.mesh();
        if cell >= mesh.n_cells() {
            return Err(MeshError::consistency(format!("cell {cell} does not exist")));
        }
        let cell_faces = mesh.cells().swap_remove(cell);
        let cell_points = mesh.cell_points(&cell_faces);
        if cell_faces.len() != 6
            || cell_points.len() != 8
            || cell_faces.iter().any(|&f| mesh.faces()[f].len() != 4)
        {
            return Err(MeshError::consistency(format!("cell {cell} is not a hexahedron")));
        }

        let bounds = BoundingBox::from_points(cell_points.iter().map(|&p| &mesh.points()[p]));
        let centre = bounds.centre();
        let tol = 1.0e-9 * bounds.diagonal();
        let mut corners: BTreeMap<Node, usize> = BTreeMap::new();
        for &p in &cell_points {
            let x = mesh.points()[p];
            let mut node = [0u8; 3];
            for axis in 0..3 {
                let near_min = (x[axis] - bounds.min[axis]).abs() <= tol;
                let near_max = (x[axis] - bounds.max[axis]).abs() <= tol;
                node[axis] = match (near_min, near_max) {
                    (true, false) => 0,
                    (false, true) => 2,
                    _ => {
                        return Err(MeshError::consistency(format!(
                            "cell {cell} is not an axis-aligned hexahedron"
                        )))
                    }
                };
            }
            corners.insert(node, p);
        }
        if corners.len() != 8 {
            return Err(MeshError::consistency(format!("cell {cell} has coincident corners")));
        }

        let parent_faces: Vec<(usize, Direction, bool)> = cell_faces
            .iter()
            .map(|&f| {
                let (c, _) = mesh.face_centre_and_area(f);
                (f, direction_of(c - centre), mesh.owner()[f] == cell)
            })
            .collect();

        let position = |n: Node| {
            bounds.min + bounds.extent() * Vec3::new(f64::from(n[0]), f64::from(n[1]), f64::from(n[2])) / 2.0
        };

        // Nodes of the 3x3x3 grid; existing corners, the rest added.
        let mut nodes: HashMap<Node, PointRef> = corners
            .iter()
            .map(|(&n, &p)| (n, PointRef::Existing(p)))
            .collect();
        let mut grid: Vec<Node> = Vec::with_capacity(27);
        for i in 0..3u8 {
            for j in 0..3u8 {
                for k in 0..3u8 {
                    grid.push([i, j, k]);
                }
            }
        }
        // Edge midpoints first, then face centres, then the cell centre.
        grid.sort_by_key(|n| n.iter().filter(|&&c| c == 1).count());
        for n in grid.into_iter().filter(|n| n.contains(&1)) {
            let added = self.add_point(position(n))?;
            nodes.insert(n, added);
        }
        let at = |n: Node| nodes[&n];

        for &a in corners.keys() {
            for axis in 0..3 {
                if a[axis] != 0 {
                    continue;
                }
                let mut b = a;
                b[axis] = 2;
                let mut mid = a;
                mid[axis] = 1;
                self.push(TopologyEdit::SplitEdge {
                    edge: [at(a), at(b)],
                    point: at(mid),
                })?;
            }
        }

        let octants: Vec<Node> = (0..8u8).map(|o| [o & 1, (o >> 1) & 1, (o >> 2) & 1]).collect();
        for &(face, direction, owned) in &parent_faces {
            let side = u8::from(direction.is_positive());
            let pieces = octants
                .iter()
                .filter(|lo| lo[direction.axis()] == side)
                .map(|&lo| {
                    let ring = block_face(lo, direction).map(at);
                    if owned {
                        ring.to_vec()
                    } else {
                        ring.iter().rev().copied().collect()
                    }
                })
                .collect();
            self.push(TopologyEdit::ReplaceFace { face, pieces })?;
        }

        let shapes = octants
            .iter()
            .map(|&lo| CellShape {
                faces: Direction::ALL
                    .iter()
                    .map(|&d| FaceShape::new(block_face(lo, d).map(at).to_vec()))
                    .collect(),
            })
            .collect();
        self.push(TopologyEdit::ReplaceCell { cell, shapes })?;
        Ok(())
    }
}
