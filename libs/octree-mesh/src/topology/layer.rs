//! Layer insertion under boundary faces.
//!
//! Every point `p` of the selected faces gets a partner `q` pulled into the
//! volume. Cells switch from `p` to `q`, and each selected face grows a prism
//! whose outer face is the original loop, inner face the `q` loop and side
//! faces the quads `[p_b, p_a, q_a, q_b]` of each loop edge `a -> b`.

use super::soup::{CellSoup, SoupCell, SoupFace};
use crate::core::Vec3;
use crate::error::{MeshError, MeshResult};
use crate::mesh::face_edges;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

pub(crate) fn insert_layer(
    soup: &mut CellSoup,
    edit: usize,
    faces: &[usize],
    fraction: f64,
) -> MeshResult<()> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(MeshError::rejected(
            Some(edit),
            format!("layer fraction {fraction} outside (0, 1)"),
        ));
    }
    let selected: BTreeSet<usize> = faces.iter().copied().collect();
    if selected.is_empty() {
        return Err(MeshError::rejected(Some(edit), "no faces selected for the layer"));
    }
    if let Some(&f) = selected.iter().find(|&&f| !soup.is_old_boundary(f)) {
        return Err(MeshError::rejected(Some(edit), format!("face {f} is not a boundary face")));
    }

    // Selected boundary faces as (cell slot, face index).
    let mut targets = Vec::new();
    let mut seen = BTreeSet::new();
    for (c, cell) in soup.cells.iter().enumerate() {
        let Some(cell) = cell else { continue };
        for (i, face) in cell.faces.iter().enumerate() {
            if let (Some(origin), Some(_)) = (face.origin, face.patch) {
                if selected.contains(&origin) {
                    targets.push((c, i));
                    seen.insert(origin);
                }
            }
        }
    }
    if let Some(f) = selected.difference(&seen).next() {
        return Err(MeshError::rejected(Some(edit), format!("face {f} no longer exists")));
    }

    let loops: Vec<(usize, SoupFace)> = targets
        .iter()
        .map(|&(c, i)| (c, soup.cells[c].as_ref().map(|cell| cell.faces[i].clone())))
        .filter_map(|(c, f)| f.map(|f| (c, f)))
        .collect();
    let layer_points: BTreeSet<usize> = loops.iter().flat_map(|(_, f)| f.points.iter().copied()).collect();

    // Partner point of every layer point.
    let mut centroid_sum: BTreeMap<usize, (Vec3, usize)> = BTreeMap::new();
    for cell in soup.cells.iter().flatten() {
        let points = cell.points();
        if points.is_disjoint(&layer_points) {
            continue;
        }
        let centroid = points.iter().map(|&p| soup.points[p]).sum::<Vec3>() / points.len() as f64;
        for p in points.intersection(&layer_points) {
            let entry = centroid_sum.entry(*p).or_insert((Vec3::ZERO, 0));
            entry.0 += centroid;
            entry.1 += 1;
        }
    }
    let mut partner: HashMap<usize, usize> = HashMap::new();
    for (&p, &(sum, count)) in &centroid_sum {
        let target = sum / count as f64;
        let position = soup.points[p] + fraction * (target - soup.points[p]);
        let origin = soup.point_origin[p];
        partner.insert(p, soup.push_point(position, origin));
    }

    // Patches of side faces on the rim of the selection.
    let directed: HashSet<(usize, usize)> = loops
        .iter()
        .flat_map(|(_, f)| face_edges(&f.points).collect::<Vec<_>>())
        .collect();
    let mut rim_patch: HashMap<(usize, usize), usize> = HashMap::new();
    for &(a, b) in &directed {
        if directed.contains(&(b, a)) {
            continue;
        }
        let patch = soup
            .cells
            .iter()
            .flatten()
            .flat_map(|cell| cell.faces.iter())
            .filter(|f| f.patch.is_some() && !f.origin.is_some_and(|o| selected.contains(&o)))
            .find(|f| face_edges(&f.points).any(|e| e == (b, a) || e == (a, b)))
            .and_then(|f| f.patch)
            .ok_or_else(|| {
                MeshError::rejected(Some(edit), format!("rim edge {a}-{b} has no boundary face"))
            })?;
        rim_patch.insert((a, b), patch);
    }

    for face in soup.faces_mut() {
        for p in face.points.iter_mut() {
            if let Some(&q) = partner.get(p) {
                *p = q;
            }
        }
    }
    for &(c, i) in &targets {
        if let Some(cell) = soup.cells[c].as_mut() {
            let face = &mut cell.faces[i];
            face.patch = None;
            face.origin = None;
            face.edit = Some(edit);
        }
    }

    let q = |p: usize| partner.get(&p).copied().unwrap_or(p);
    let mut prisms = Vec::with_capacity(loops.len());
    for (c, outer) in loops {
        let inner: Vec<usize> = outer.points.iter().rev().map(|&p| q(p)).collect();
        let mut faces = vec![
            SoupFace {
                edit: Some(edit),
                ..outer.clone()
            },
            SoupFace {
                points: inner,
                patch: None,
                origin: None,
                flipped: false,
                edit: Some(edit),
            },
        ];
        for (a, b) in face_edges(&outer.points) {
            faces.push(SoupFace {
                points: vec![b, a, q(a), q(b)],
                patch: rim_patch.get(&(a, b)).copied(),
                origin: None,
                flipped: false,
                edit: Some(edit),
            });
        }
        let origin = soup.cells[c].as_ref().and_then(|cell| cell.origin);
        prisms.push(SoupCell {
            faces,
            origin,
            edit: Some(edit),
        });
    }
    debug!(prisms = prisms.len(), points = partner.len(), "layer inserted");
    soup.cells.extend(prisms.into_iter().map(Some));
    Ok(())
}
