//! Hexahedral mesh from octree leaves.
//!
//! Cells are `Inside` leaves plus `Data` leaves whose centre lies inside the
//! surface. Points live on the integer lattice of the deepest leaf level, so
//! shared corners and hanging points are matched exactly. Faces across a
//! refinement jump are emitted once per finer leaf, and every face loop
//! carries the hanging points lying on its edges.

use super::{face_edges, Patch, PolyMesh};
use crate::core::Vec3;
use crate::error::{GeometryError, MeshResult};
use crate::octree::{CubeCoordinate, CubeType, Direction, Octree};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Patch that receives every boundary face before patch assignment.
pub const DEFAULT_PATCH: &str = "defaultFaces";

type Lattice = [u64; 3];

/// Integer points of the cell lattice, indexed both by position and by
/// axis-aligned line for hanging point lookups.
#[derive(Default)]
struct PointRegistry {
    index: HashMap<Lattice, usize>,
    positions: Vec<Lattice>,
    /// `(axis, other two coordinates)` to coordinates along the axis.
    lines: HashMap<(usize, u64, u64), BTreeSet<u64>>,
}

impl PointRegistry {
    fn insert(&mut self, p: Lattice) {
        if self.index.contains_key(&p) {
            return;
        }
        self.index.insert(p, self.positions.len());
        self.positions.push(p);
        for axis in 0..3 {
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            self.lines.entry((axis, p[u], p[v])).or_default().insert(p[axis]);
        }
    }

    fn get(&self, p: &Lattice) -> usize {
        self.index[p]
    }

    /// Registered points strictly between `a` and `b`, which differ along
    /// exactly one axis, ordered from `a` to `b`.
    fn between(&self, a: Lattice, b: Lattice) -> Vec<usize> {
        let Some(axis) = (0..3).find(|&i| a[i] != b[i]) else {
            return Vec::new();
        };
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        let Some(line) = self.lines.get(&(axis, a[u], a[v])) else {
            return Vec::new();
        };
        let (lo, hi) = (a[axis].min(b[axis]), a[axis].max(b[axis]));
        let mut found: Vec<usize> = line
            .range(lo + 1..hi)
            .map(|&t| {
                let mut p = a;
                p[axis] = t;
                self.get(&p)
            })
            .collect();
        if a[axis] > b[axis] {
            found.reverse();
        }
        found
    }
}

/// Integer span of a cube at the finest level: lower corner and edge.
fn span(c: &CubeCoordinate, finest: u8) -> (Lattice, u64) {
    let shift = finest - c.level();
    (c.position().map(|p| u64::from(p) << shift), 1u64 << shift)
}

/// Outward corner loop of the `direction` face of a cube span.
fn face_corners(lo: Lattice, size: u64, direction: Direction) -> [Lattice; 4] {
    let axis = direction.axis();
    let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
    let mut base = lo;
    if direction.is_positive() {
        base[axis] += size;
    }
    let corner = |du: u64, dv: u64| {
        let mut p = base;
        p[u] += du;
        p[v] += dv;
        p
    };
    let loop_ = [corner(0, 0), corner(size, 0), corner(size, size), corner(0, size)];
    if direction.is_positive() {
        loop_
    } else {
        reversed(loop_)
    }
}

fn reversed(corners: [Lattice; 4]) -> [Lattice; 4] {
    [corners[0], corners[3], corners[2], corners[1]]
}

struct FaceEntry {
    corners: [Lattice; 4],
    owner: usize,
    neighbour: Option<usize>,
}

/// Builds the hexahedral mesh of the octree interior.
///
/// Every boundary face is placed in the single [`DEFAULT_PATCH`]. Cells that
/// would make the boundary non-manifold are left out, see
/// [`build_octree_mesh`].
pub fn mesh_from_octree(octree: &Octree<'_>) -> MeshResult<PolyMesh> {
    build_octree_mesh(octree).map(|(mesh, _)| mesh)
}

/// Builds the octree mesh and reports how many cells were dropped.
///
/// Two cells touching only along an edge or at a corner give a boundary
/// that is not a manifold surface, which no boundary layer can follow. Such
/// connections are cut by removing one of the cells involved, preferring
/// `Data` cells, until the boundary is manifold.
pub(crate) fn build_octree_mesh(octree: &Octree<'_>) -> MeshResult<(PolyMesh, usize)> {
    let surface = octree.surface();
    let root_box = *octree.root_box();

    let mut cells: Vec<CubeCoordinate> = octree
        .leaves()
        .filter(|leaf| match leaf.cube_type() {
            CubeType::Inside => true,
            CubeType::Data => surface.is_inside(leaf.coordinate().centre(&root_box)),
            _ => false,
        })
        .map(|leaf| *leaf.coordinate())
        .collect();
    let selected = cells.len();

    loop {
        if cells.is_empty() {
            return Err(GeometryError::DegenerateGeometry("octree has no interior cubes".into()).into());
        }
        let mesh = assemble(octree, &cells)?;
        let is_data = |c: usize| {
            octree
                .find_leaf(&cells[c])
                .is_some_and(|leaf| leaf.cube_type() == CubeType::Data)
        };
        let irregular = irregular_boundary_cells(&mesh, is_data);
        if irregular.is_empty() {
            let removed = selected - cells.len();
            if removed > 0 {
                debug!(removed, "cells at irregular boundary connections removed");
            }
            return Ok((mesh, removed));
        }
        debug!(cells = irregular.len(), "cutting irregular boundary connections");
        cells = cells
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !irregular.contains(i))
            .map(|(_, c)| c)
            .collect();
    }
}

/// Cells to drop so that every boundary edge has two boundary faces and the
/// boundary faces around every point form a single fan. One cell is chosen
/// per offending edge or point.
pub(crate) fn irregular_boundary_cells(mesh: &PolyMesh, is_data: impl Fn(usize) -> bool) -> BTreeSet<usize> {
    let pick = |faces: &[usize]| -> Option<usize> {
        let owners: BTreeSet<usize> = faces.iter().map(|&f| mesh.owner()[f]).collect();
        owners
            .iter()
            .copied()
            .find(|&c| is_data(c))
            .or_else(|| owners.first().copied())
    };

    let mut edge_faces: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    let mut point_faces: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for f in mesh.boundary_faces() {
        let face = &mesh.faces()[f];
        for (a, b) in face_edges(face) {
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(f);
        }
        for &p in face {
            point_faces.entry(p).or_default().push(f);
        }
    }

    let mut irregular = BTreeSet::new();
    for faces in edge_faces.values().filter(|faces| faces.len() > 2) {
        irregular.extend(pick(faces));
    }
    for (&p, faces) in &point_faces {
        if faces.len() > 1 && fan_count(mesh, p, faces) > 1 {
            irregular.extend(pick(faces));
        }
    }
    irregular
}

/// Number of edge-connected groups among the faces around point `p`.
fn fan_count(mesh: &PolyMesh, p: usize, faces: &[usize]) -> usize {
    let mut group: Vec<usize> = (0..faces.len()).collect();

    // Faces sharing an edge at `p` share the far end point of that edge.
    let mut by_spoke: HashMap<usize, usize> = HashMap::new();
    for (i, &f) in faces.iter().enumerate() {
        let face = &mesh.faces()[f];
        let Some(at) = face.iter().position(|&q| q == p) else { continue };
        let n = face.len();
        for spoke in [face[(at + 1) % n], face[(at + n - 1) % n]] {
            match by_spoke.get(&spoke) {
                Some(&j) => {
                    let (ri, rj) = (group_root(&mut group, i), group_root(&mut group, j));
                    group[ri] = rj;
                }
                None => {
                    by_spoke.insert(spoke, i);
                }
            }
        }
    }
    (0..faces.len()).filter(|&i| group_root(&mut group, i) == i).count()
}

fn group_root(group: &mut [usize], mut i: usize) -> usize {
    while group[i] != i {
        group[i] = group[group[i]];
        i = group[i];
    }
    i
}

/// Assembles the mesh of the given cubes.
fn assemble(octree: &Octree<'_>, cells: &[CubeCoordinate]) -> MeshResult<PolyMesh> {
    let root_box = *octree.root_box();
    let cell_index: HashMap<CubeCoordinate, usize> =
        cells.iter().enumerate().map(|(i, c)| (*c, i)).collect();
    // Non-cell neighbours may be deeper than every cell.
    let finest = octree.max_leaf_level();

    let mut faces: Vec<FaceEntry> = Vec::new();
    for (ci, c) in cells.iter().enumerate() {
        let (lo, size) = span(c, finest);
        for direction in Direction::ALL {
            let neighbours = octree.neighbours(c, direction)?;
            let coarser_or_equal = neighbours.len() == 1
                && neighbours[0].coordinate().level() <= c.level();

            if neighbours.is_empty() || coarser_or_equal {
                let other = neighbours
                    .first()
                    .and_then(|n| cell_index.get(n.coordinate()).copied());
                let corners = face_corners(lo, size, direction);
                match other {
                    Some(ni) if neighbours[0].coordinate().level() == c.level() && ni < ci => {}
                    Some(ni) if ci < ni => faces.push(FaceEntry {
                        corners,
                        owner: ci,
                        neighbour: Some(ni),
                    }),
                    Some(ni) => faces.push(FaceEntry {
                        corners: reversed(corners),
                        owner: ni,
                        neighbour: Some(ci),
                    }),
                    None => faces.push(FaceEntry {
                        corners,
                        owner: ci,
                        neighbour: None,
                    }),
                }
                continue;
            }

            // Finer neighbours: those that are cells emit the shared face.
            for n in neighbours {
                if cell_index.contains_key(n.coordinate()) {
                    continue;
                }
                let (n_lo, n_size) = span(n.coordinate(), finest);
                faces.push(FaceEntry {
                    corners: reversed(face_corners(n_lo, n_size, direction.opposite())),
                    owner: ci,
                    neighbour: None,
                });
            }
        }
    }

    let mut registry = PointRegistry::default();
    for c in cells {
        let (lo, size) = span(c, finest);
        for octant in 0..8u64 {
            registry.insert([
                lo[0] + size * (octant & 1),
                lo[1] + size * ((octant >> 1) & 1),
                lo[2] + size * ((octant >> 2) & 1),
            ]);
        }
    }
    for face in &faces {
        for corner in face.corners {
            registry.insert(corner);
        }
    }

    let loop_points = |corners: &[Lattice; 4]| -> Vec<usize> {
        let mut points = Vec::with_capacity(4);
        for i in 0..4 {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            points.push(registry.get(&a));
            points.extend(registry.between(a, b));
        }
        points
    };

    let mut internal: Vec<&FaceEntry> = faces.iter().filter(|f| f.neighbour.is_some()).collect();
    internal.sort_by_key(|f| (f.owner, f.neighbour));
    let boundary: Vec<&FaceEntry> = faces.iter().filter(|f| f.neighbour.is_none()).collect();

    let side = root_box.extent().x / (1u64 << finest) as f64;
    let points: Vec<Vec3> = registry
        .positions
        .iter()
        .map(|p| root_box.min + side * Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
        .collect();

    let n_internal = internal.len();
    let n_boundary = boundary.len();
    let ordered: Vec<&FaceEntry> = internal.into_iter().chain(boundary).collect();
    let neighbour: Vec<usize> = ordered.iter().filter_map(|f| f.neighbour).collect();
    let owner: Vec<usize> = ordered.iter().map(|f| f.owner).collect();
    let faces: Vec<Vec<usize>> = ordered.iter().map(|f| loop_points(&f.corners)).collect();

    debug!(
        cells = cells.len(),
        points = points.len(),
        internal_faces = n_internal,
        boundary_faces = n_boundary,
        "octree mesh assembled"
    );

    let mut levels: BTreeMap<u8, usize> = BTreeMap::new();
    for c in cells {
        *levels.entry(c.level()).or_default() += 1;
    }
    debug!(?levels, "cells per level");

    PolyMesh::new(
        points,
        faces,
        owner,
        neighbour,
        vec![Patch::new(DEFAULT_PATCH, n_internal, n_boundary)],
        cells.len(),
    )
}
