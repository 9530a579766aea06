//! Cell soup: the mesh as independent cells with outward face loops.
//!
//! Edits are applied to the soup; the mesh is then rebuilt by matching faces
//! on their point sets. A face seen from two cells becomes internal, a face
//! seen from one cell must carry a boundary patch.

use super::edit::{CellShape, PointRef, TopologyEdit};
use super::layer::insert_layer;
use super::TopologyMap;
use crate::core::{BoundingBox, Vec3};
use crate::error::{MeshError, MeshResult};
use crate::mesh::{face_edges, Patch, PolyMesh};
use config::constants::RELATIVE_VOLUME_TOLERANCE;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub(crate) struct SoupFace {
    /// Outward point loop (soup point labels).
    pub points: Vec<usize>,
    pub patch: Option<usize>,
    /// Face of the original mesh this face descends from.
    pub origin: Option<usize>,
    /// True when the loop is reversed relative to the original face.
    pub flipped: bool,
    /// Edit that created the face.
    pub edit: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct SoupCell {
    pub faces: Vec<SoupFace>,
    pub origin: Option<usize>,
    pub edit: Option<usize>,
}

impl SoupCell {
    pub fn points(&self) -> BTreeSet<usize> {
        self.faces.iter().flat_map(|f| f.points.iter().copied()).collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CellSoup {
    pub points: Vec<Vec3>,
    pub point_origin: Vec<Option<usize>>,
    pub cells: Vec<Option<SoupCell>>,
    pub patch_names: Vec<String>,
    added: Vec<usize>,
    /// First edit that placed or moved each point.
    point_edit: HashMap<usize, usize>,
    n_old_points: usize,
    n_old_faces: usize,
    n_old_cells: usize,
    old_boundary: Vec<bool>,
}

pub(crate) fn face_key(points: &[usize]) -> Vec<usize> {
    let mut key = points.to_vec();
    key.sort_unstable();
    key
}

/// True if `b` is `a` traversed backwards.
fn is_reverse(a: &[usize], b: &[usize]) -> bool {
    let n = a.len();
    if n != b.len() {
        return false;
    }
    let Some(start) = b.iter().position(|&p| p == a[0]) else {
        return false;
    };
    (0..n).all(|i| a[i] == b[(start + n - i) % n])
}

impl CellSoup {
    pub fn from_mesh(mesh: &PolyMesh) -> Self {
        let mut cells: Vec<SoupCell> = (0..mesh.n_cells())
            .map(|c| SoupCell {
                faces: Vec::new(),
                origin: Some(c),
                edit: None,
            })
            .collect();
        for (f, face) in mesh.faces().iter().enumerate() {
            let patch = mesh.face_patch(f);
            cells[mesh.owner()[f]].faces.push(SoupFace {
                points: face.clone(),
                patch,
                origin: Some(f),
                flipped: false,
                edit: None,
            });
            if let Some(&n) = mesh.neighbour().get(f) {
                cells[n].faces.push(SoupFace {
                    points: face.iter().rev().copied().collect(),
                    patch: None,
                    origin: Some(f),
                    flipped: true,
                    edit: None,
                });
            }
        }
        Self {
            points: mesh.points().to_vec(),
            point_origin: (0..mesh.n_points()).map(Some).collect(),
            cells: cells.into_iter().map(Some).collect(),
            patch_names: mesh.patches().iter().map(|p| p.name.clone()).collect(),
            added: Vec::new(),
            point_edit: HashMap::new(),
            n_old_points: mesh.n_points(),
            n_old_faces: mesh.n_faces(),
            n_old_cells: mesh.n_cells(),
            old_boundary: (0..mesh.n_faces()).map(|f| !mesh.is_internal_face(f)).collect(),
        }
    }

    pub fn resolve(&self, edit: usize, point: PointRef) -> MeshResult<usize> {
        match point {
            PointRef::Existing(p) if p < self.n_old_points => Ok(p),
            PointRef::Added(k) if k < self.added.len() => Ok(self.added[k]),
            other => Err(MeshError::rejected(Some(edit), format!("unknown point {other:?}"))),
        }
    }

    pub fn push_point(&mut self, position: Vec3, origin: Option<usize>) -> usize {
        self.points.push(position);
        self.point_origin.push(origin);
        self.points.len() - 1
    }

    /// Applies one edit. On error the soup may be partially modified and
    /// must be discarded.
    pub fn apply(&mut self, edit: usize, change: &TopologyEdit) -> MeshResult<()> {
        match change {
            TopologyEdit::AddPoint { position } => {
                check_finite(edit, *position)?;
                let p = self.push_point(*position, None);
                self.added.push(p);
                self.point_edit.insert(p, edit);
            }
            TopologyEdit::MovePoint { point, position } => {
                check_finite(edit, *position)?;
                let p = self.resolve(edit, *point)?;
                self.points[p] = *position;
                self.point_edit.entry(p).or_insert(edit);
            }
            TopologyEdit::SplitEdge { edge, point } => {
                let a = self.resolve(edit, edge[0])?;
                let b = self.resolve(edit, edge[1])?;
                let m = self.resolve(edit, *point)?;
                self.split_edge(edit, a, b, m)?;
            }
            TopologyEdit::SplitFace { face, centre } => {
                let c = self.resolve(edit, *centre)?;
                self.replace_face_occurrences(edit, *face, |loop_| {
                    if loop_.contains(&c) {
                        return None;
                    }
                    Some(face_edges(loop_).map(|(a, b)| vec![a, b, c]).collect())
                })?;
            }
            TopologyEdit::ReplaceFace { face, pieces } => {
                if pieces.is_empty() || pieces.iter().any(|p| p.len() < 3) {
                    return Err(MeshError::rejected(Some(edit), "face pieces need at least 3 points"));
                }
                let resolved: Vec<Vec<usize>> = pieces
                    .iter()
                    .map(|piece| piece.iter().map(|&p| self.resolve(edit, p)).collect())
                    .collect::<MeshResult<_>>()?;
                self.replace_face_with(edit, *face, &resolved)?;
            }
            TopologyEdit::ReplaceCell { cell, shapes } => self.replace_cell(edit, *cell, shapes)?,
            TopologyEdit::DefinePatches { names } => {
                if names.iter().collect::<BTreeSet<_>>().len() != names.len() {
                    return Err(MeshError::rejected(Some(edit), "duplicate patch names"));
                }
                let remap: Vec<Option<usize>> = self
                    .patch_names
                    .iter()
                    .map(|old| names.iter().position(|n| n == old))
                    .collect();
                for face in self.faces_mut() {
                    face.patch = face.patch.and_then(|p| remap[p]);
                }
                self.patch_names = names.clone();
            }
            TopologyEdit::SetPatch { face, patch } => {
                if *patch >= self.patch_names.len() {
                    return Err(MeshError::rejected(Some(edit), format!("unknown patch {patch}")));
                }
                if !self.old_boundary.get(*face).copied().unwrap_or(false) {
                    return Err(MeshError::rejected(
                        Some(edit),
                        format!("face {face} is not a boundary face"),
                    ));
                }
                let mut found = false;
                for f in self.faces_mut().filter(|f| f.origin == Some(*face)) {
                    f.patch = Some(*patch);
                    found = true;
                }
                if !found {
                    return Err(MeshError::rejected(Some(edit), format!("face {face} no longer exists")));
                }
            }
            TopologyEdit::InsertLayer { faces, fraction } => insert_layer(self, edit, faces, *fraction)?,
        }
        Ok(())
    }

    pub fn faces_mut(&mut self) -> impl Iterator<Item = &mut SoupFace> {
        self.cells.iter_mut().flatten().flat_map(|c| c.faces.iter_mut())
    }

    pub fn is_old_boundary(&self, face: usize) -> bool {
        self.old_boundary.get(face).copied().unwrap_or(false)
    }

    fn split_edge(&mut self, edit: usize, a: usize, b: usize, m: usize) -> MeshResult<()> {
        if a == b || m == a || m == b {
            return Err(MeshError::rejected(Some(edit), "degenerate edge split"));
        }
        let mut found = false;
        for face in self.faces_mut() {
            let n = face.points.len();
            let Some(i) = (0..n).find(|&i| {
                let (p, q) = (face.points[i], face.points[(i + 1) % n]);
                (p == a && q == b) || (p == b && q == a)
            }) else {
                continue;
            };
            if face.points.contains(&m) {
                return Err(MeshError::rejected(Some(edit), format!("point {m} already on the face")));
            }
            face.points.insert(i + 1, m);
            face.edit = Some(edit);
            found = true;
        }
        if !found {
            return Err(MeshError::rejected(Some(edit), format!("no face has edge {a}-{b}")));
        }
        Ok(())
    }

    /// Replaces every face descending from `face` by pieces computed from
    /// its loop (as seen from the cell holding it).
    fn replace_face_occurrences(
        &mut self,
        edit: usize,
        face: usize,
        split: impl Fn(&[usize]) -> Option<Vec<Vec<usize>>>,
    ) -> MeshResult<()> {
        if face >= self.n_old_faces {
            return Err(MeshError::rejected(Some(edit), format!("unknown face {face}")));
        }
        let mut found = false;
        for cell in self.cells.iter_mut().flatten() {
            let mut replaced = Vec::new();
            for f in std::mem::take(&mut cell.faces) {
                if f.origin != Some(face) {
                    replaced.push(f);
                    continue;
                }
                found = true;
                let pieces = split(&f.points).ok_or_else(|| {
                    MeshError::rejected(Some(edit), format!("cannot split face {face}"))
                })?;
                replaced.extend(pieces.into_iter().map(|points| SoupFace {
                    points,
                    edit: Some(edit),
                    ..f.clone()
                }));
            }
            cell.faces = replaced;
        }
        if !found {
            return Err(MeshError::rejected(Some(edit), format!("face {face} no longer exists")));
        }
        Ok(())
    }

    fn replace_face_with(&mut self, edit: usize, face: usize, pieces: &[Vec<usize>]) -> MeshResult<()> {
        if face >= self.n_old_faces {
            return Err(MeshError::rejected(Some(edit), format!("unknown face {face}")));
        }
        let mut found = false;
        for cell in self.cells.iter_mut().flatten() {
            let Some(first) = cell.faces.iter().position(|f| f.origin == Some(face)) else {
                continue;
            };
            found = true;
            let template = cell.faces[first].clone();
            cell.faces.retain(|f| f.origin != Some(face));
            for piece in pieces {
                let points = if template.flipped {
                    piece.iter().rev().copied().collect()
                } else {
                    piece.clone()
                };
                cell.faces.push(SoupFace {
                    points,
                    edit: Some(edit),
                    ..template.clone()
                });
            }
        }
        if !found {
            return Err(MeshError::rejected(Some(edit), format!("face {face} no longer exists")));
        }
        Ok(())
    }

    fn replace_cell(&mut self, edit: usize, cell: usize, shapes: &[CellShape]) -> MeshResult<()> {
        if shapes.is_empty() {
            return Err(MeshError::rejected(Some(edit), "cell replaced by nothing"));
        }
        let old = match self.cells.get_mut(cell) {
            Some(slot) if cell < self.n_old_cells => slot.take(),
            _ => None,
        }
        .ok_or_else(|| MeshError::rejected(Some(edit), format!("cell {cell} does not exist")))?;

        let old_faces: HashMap<Vec<usize>, SoupFace> = old
            .faces
            .into_iter()
            .map(|f| (face_key(&f.points), f))
            .collect();

        let mut built = Vec::with_capacity(shapes.len());
        for shape in shapes {
            let mut faces = Vec::with_capacity(shape.faces.len());
            for face in &shape.faces {
                if face.patch.is_some_and(|p| p >= self.patch_names.len()) {
                    return Err(MeshError::rejected(Some(edit), "face shape has an unknown patch"));
                }
                let points: Vec<usize> = face
                    .points
                    .iter()
                    .map(|&p| self.resolve(edit, p))
                    .collect::<MeshResult<_>>()?;
                let inherited = old_faces.get(&face_key(&points));
                faces.push(SoupFace {
                    patch: face.patch.or_else(|| inherited.and_then(|f| f.patch)),
                    origin: inherited.and_then(|f| f.origin),
                    flipped: inherited.is_some_and(|f| f.flipped),
                    edit: Some(edit),
                    points,
                });
            }
            built.push(SoupCell {
                faces,
                origin: Some(cell),
                edit: Some(edit),
            });
        }

        let mut built = built.into_iter();
        self.cells[cell] = built.next();
        self.cells.extend(built.map(Some));
        Ok(())
    }

    /// Rebuilds a mesh from the soup.
    pub fn rebuild(self) -> MeshResult<(PolyMesh, TopologyMap)> {
        let cells: Vec<SoupCell> = self.cells.into_iter().flatten().collect();

        for cell in &cells {
            check_cell_closed(cell)?;
        }

        let mut by_key: HashMap<Vec<usize>, Vec<(usize, usize)>> = HashMap::new();
        let mut key_order: Vec<Vec<usize>> = Vec::new();
        for (c, cell) in cells.iter().enumerate() {
            for (i, face) in cell.faces.iter().enumerate() {
                let key = face_key(&face.points);
                let entry = by_key.entry(key.clone()).or_default();
                if entry.is_empty() {
                    key_order.push(key);
                }
                entry.push((c, i));
            }
        }

        struct Assembled {
            points: Vec<usize>,
            owner: usize,
            neighbour: Option<usize>,
            patch: usize,
            origin: Option<usize>,
        }
        let mut assembled = Vec::with_capacity(key_order.len());
        for key in &key_order {
            let users = &by_key[key];
            let face = |&(c, i): &(usize, usize)| &cells[c].faces[i];
            let culprit = |&(c, i): &(usize, usize)| cells[c].faces[i].edit.or(cells[c].edit);
            match users.as_slice() {
                [only] => {
                    let f = face(only);
                    let Some(patch) = f.patch else {
                        return Err(MeshError::rejected(
                            culprit(only),
                            format!("face {:?} of cell {} is left open", f.points, only.0),
                        ));
                    };
                    assembled.push(Assembled {
                        points: f.points.clone(),
                        owner: only.0,
                        neighbour: None,
                        patch,
                        origin: f.origin,
                    });
                }
                [a, b] => {
                    let (fa, fb) = (face(a), face(b));
                    if a.0 == b.0 {
                        return Err(MeshError::rejected(culprit(b), format!("cell {} uses a face twice", a.0)));
                    }
                    if !is_reverse(&fa.points, &fb.points) {
                        return Err(MeshError::rejected(
                            culprit(b).or(culprit(a)),
                            format!("cells {} and {} disagree on face orientation", a.0, b.0),
                        ));
                    }
                    let (own, nei) = if a.0 < b.0 { (a, b) } else { (b, a) };
                    let f = face(own);
                    assembled.push(Assembled {
                        points: f.points.clone(),
                        owner: own.0,
                        neighbour: Some(nei.0),
                        patch: 0,
                        origin: f.origin.or(face(nei).origin),
                    });
                }
                many => {
                    return Err(MeshError::rejected(
                        many.iter().find_map(culprit),
                        format!("face shared by {} cells", many.len()),
                    ));
                }
            }
        }

        let mut internal: Vec<&Assembled> = assembled.iter().filter(|f| f.neighbour.is_some()).collect();
        internal.sort_by_key(|f| (f.owner, f.neighbour));
        let mut boundary: Vec<&Assembled> = assembled.iter().filter(|f| f.neighbour.is_none()).collect();
        boundary.sort_by_key(|f| (f.patch, f.owner));

        // Compact points, keeping surviving points in their old order.
        let mut new_point = vec![None; self.points.len()];
        let used: BTreeSet<usize> = assembled.iter().flat_map(|f| f.points.iter().copied()).collect();
        let mut points = Vec::with_capacity(used.len());
        let mut point_map = Vec::with_capacity(used.len());
        for &p in &used {
            new_point[p] = Some(points.len());
            points.push(self.points[p]);
            point_map.push(self.point_origin[p]);
        }
        let relabel = |f: &Assembled| -> Vec<usize> {
            f.points.iter().filter_map(|&p| new_point[p]).collect()
        };

        let mut patches = Vec::with_capacity(self.patch_names.len());
        let mut start = internal.len();
        for (i, name) in self.patch_names.iter().enumerate() {
            let size = boundary.iter().filter(|f| f.patch == i).count();
            patches.push(Patch::new(name.clone(), start, size));
            start += size;
        }

        let ordered: Vec<&Assembled> = internal.iter().chain(boundary.iter()).copied().collect();
        let mesh = PolyMesh::new(
            points,
            ordered.iter().map(|f| relabel(*f)).collect(),
            ordered.iter().map(|f| f.owner).collect(),
            internal.iter().filter_map(|f| f.neighbour).collect(),
            patches,
            cells.len(),
        )
        .map_err(|e| MeshError::rejected(None, e.to_string()))?;

        // Each cell is judged against its own size.
        for (c, volume) in mesh.cell_volumes().into_iter().enumerate() {
            let bounds = BoundingBox::from_points(cells[c].points().iter().map(|&p| &self.points[p]));
            let tolerance = RELATIVE_VOLUME_TOLERANCE * bounds.diagonal().powi(3);
            if !(volume > tolerance) {
                let moved = cells[c]
                    .points()
                    .iter()
                    .filter_map(|p| self.point_edit.get(p))
                    .min()
                    .copied();
                return Err(MeshError::rejected(
                    cells[c].edit.or(moved),
                    format!("cell {c} has non-positive volume {volume:e}"),
                ));
            }
        }

        let map = TopologyMap::new(
            point_map,
            ordered.iter().map(|f| f.origin).collect(),
            cells.iter().map(|c| c.origin).collect(),
            self.n_old_points,
            self.n_old_faces,
            self.n_old_cells,
        );
        Ok((mesh, map))
    }
}

fn check_finite(edit: usize, p: Vec3) -> MeshResult<()> {
    if p.is_finite() {
        Ok(())
    } else {
        Err(MeshError::rejected(Some(edit), "point position is not finite"))
    }
}

fn check_cell_closed(cell: &SoupCell) -> MeshResult<()> {
    if cell.faces.len() < 4 {
        return Err(MeshError::rejected(cell.edit, "cell has fewer than 4 faces"));
    }
    let mut directed: HashMap<(usize, usize), i32> = HashMap::new();
    for face in &cell.faces {
        if face.points.len() < 3 || face_key(&face.points).windows(2).any(|w| w[0] == w[1]) {
            return Err(MeshError::rejected(
                face.edit.or(cell.edit),
                format!("degenerate face {:?}", face.points),
            ));
        }
        for (a, b) in face_edges(&face.points) {
            *directed.entry((a, b)).or_default() += 1;
        }
    }
    for (&(a, b), &count) in &directed {
        if directed.get(&(b, a)).copied().unwrap_or(0) != count {
            let edit = cell
                .faces
                .iter()
                .filter(|f| f.points.contains(&a) && f.points.contains(&b))
                .find_map(|f| f.edit)
                .or(cell.edit);
            return Err(MeshError::rejected(edit, format!("cell is open along edge {a}-{b}")));
        }
    }
    Ok(())
}
