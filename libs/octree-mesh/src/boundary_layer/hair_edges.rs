//! Detection of extruded layer columns.
//!
//! A boundary face is a layer base when its owner cell is a prism over it:
//! one opposite face sharing no point with the base, every other face
//! joining a base edge to the opposite face, and exactly one side edge
//! leaving each base point. Those side edges are the hair edges. Hairs whose
//! tip is itself on the boundary run along a wall and are not kept, nor are
//! hairs sharing their tip with another hair.

use crate::mesh::{face_edges, PolyMesh, SurfaceEngine};
use std::collections::{BTreeMap, BTreeSet};

/// Hair edges and face flags of a boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HairEdges {
    /// `[base, tip]` in mesh point labels.
    pub edges: Vec<[usize; 2]>,
    /// Hair edges leaving each boundary point (indexed like
    /// [`SurfaceEngine::boundary_points`]).
    pub at_bnd_point: Vec<Vec<usize>>,
    /// Boundary faces that are a layer base.
    pub is_base_face: Vec<bool>,
    /// Boundary faces of a layer cell other than its base.
    pub is_exit_face: Vec<bool>,
}

impl HairEdges {
    /// Number of hair edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True if no hair edges were found.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Finds the hair edges over every boundary face of `mesh`.
///
/// A cell with several qualifying boundary faces takes the one with the
/// shortest mean column as its base; its other boundary faces are exits.
pub fn detect_hair_edges(mesh: &PolyMesh, engine: &SurfaceEngine) -> HairEdges {
    let cells = mesh.cells();
    let points = mesh.points();
    let n_bnd = engine.boundary_faces().len();

    // cell -> (mean column length, boundary face, columns)
    let mut bases: BTreeMap<usize, (f64, usize, Vec<[usize; 2]>)> = BTreeMap::new();
    for (bf, &face) in engine.boundary_faces().iter().enumerate() {
        let cell = engine.face_owner()[bf];
        let Some(columns) = prism_columns(mesh, &cells[cell], face) else {
            continue;
        };
        let mean = columns
            .iter()
            .map(|&[b, t]| points[b].distance(points[t]))
            .sum::<f64>()
            / columns.len() as f64;
        match bases.get(&cell) {
            Some((best, _, _)) if *best <= mean => {}
            _ => {
                bases.insert(cell, (mean, bf, columns));
            }
        }
    }

    let mut is_base_face = vec![false; n_bnd];
    let mut hairs = BTreeSet::new();
    for (_, bf, columns) in bases.values() {
        is_base_face[*bf] = true;
        for &[base, tip] in columns {
            if engine.boundary_point_index(tip).is_none() {
                hairs.insert([base, tip]);
            }
        }
    }
    let is_exit_face = (0..n_bnd)
        .map(|bf| !is_base_face[bf] && bases.contains_key(&engine.face_owner()[bf]))
        .collect();

    let mut tip_count: BTreeMap<usize, usize> = BTreeMap::new();
    for &[_, tip] in &hairs {
        *tip_count.entry(tip).or_default() += 1;
    }
    let edges: Vec<[usize; 2]> = hairs
        .into_iter()
        .filter(|[_, tip]| tip_count[tip] == 1)
        .collect();
    let mut at_bnd_point = vec![Vec::new(); engine.boundary_points().len()];
    for (h, &[base, _]) in edges.iter().enumerate() {
        if let Some(i) = engine.boundary_point_index(base) {
            at_bnd_point[i].push(h);
        }
    }

    HairEdges {
        edges,
        at_bnd_point,
        is_base_face,
        is_exit_face,
    }
}

/// Side edges `[base, tip]` of `cell_faces` seen as a prism over `base_face`,
/// or `None` if the cell is not such a prism.
fn prism_columns(mesh: &PolyMesh, cell_faces: &[usize], base_face: usize) -> Option<Vec<[usize; 2]>> {
    let base = &mesh.faces()[base_face];
    let base_set: BTreeSet<usize> = base.iter().copied().collect();

    let mut top = None;
    for &f in cell_faces {
        if f != base_face && mesh.faces()[f].iter().all(|p| !base_set.contains(p)) {
            if top.is_some() {
                return None;
            }
            top = Some(f);
        }
    }
    let top_set: BTreeSet<usize> = mesh.faces()[top?].iter().copied().collect();
    if top_set.len() != base_set.len() {
        return None;
    }

    let mut columns: BTreeMap<usize, usize> = BTreeMap::new();
    for &f in cell_faces {
        if f == base_face || Some(f) == top {
            continue;
        }
        let side = &mesh.faces()[f];
        if side.iter().any(|p| !base_set.contains(p) && !top_set.contains(p)) {
            return None;
        }
        for (a, b) in face_edges(side) {
            let (from, to) = match (base_set.contains(&a), base_set.contains(&b)) {
                (true, false) => (a, b),
                (false, true) => (b, a),
                _ => continue,
            };
            if *columns.entry(from).or_insert(to) != to {
                return None;
            }
        }
    }
    if columns.len() != base_set.len() {
        return None;
    }
    Some(columns.into_iter().map(|(b, t)| [b, t]).collect())
}
