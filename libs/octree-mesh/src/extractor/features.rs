//! Feature edge and corner detection on the mesh boundary.

use crate::mesh::SurfaceEngine;
use crate::topology::TopologyMap;
use std::collections::BTreeSet;

/// Boundary edge whose adjacent faces meet at a sharp angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureEdge {
    /// Mesh point labels, sorted.
    pub points: [usize; 2],
    /// Angle between the adjacent face normals, in degrees.
    pub angle: f64,
}

/// Feature edges and corners of a boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    /// Sharp boundary edges.
    pub edges: Vec<FeatureEdge>,
    /// Mesh point labels of corners, sorted.
    pub corners: Vec<usize>,
}

/// Detects feature edges (normal angle above `feature_angle` degrees) and
/// corners (points with at least 3 feature edges or faces from at least 3
/// patches).
pub fn detect_features(engine: &SurfaceEngine, feature_angle: f64) -> Features {
    let normals = engine.face_normals();
    let cos_limit = feature_angle.to_radians().cos();

    let mut edges = Vec::new();
    for (edge, faces) in engine.edges().iter().zip(engine.edge_faces()) {
        let [a, b] = faces.as_slice() else { continue };
        let cos = normals[*a].dot(normals[*b]).clamp(-1.0, 1.0);
        if cos < cos_limit {
            edges.push(FeatureEdge {
                points: *edge,
                angle: cos.acos().to_degrees(),
            });
        }
    }

    let mut feature_count = vec![0usize; engine.boundary_points().len()];
    for e in &edges {
        for p in e.points {
            if let Some(i) = engine.boundary_point_index(p) {
                feature_count[i] += 1;
            }
        }
    }
    let corners = engine
        .boundary_points()
        .iter()
        .enumerate()
        .filter(|&(i, _)| {
            let patches: BTreeSet<usize> = engine.point_faces()[i]
                .iter()
                .map(|&f| engine.face_patch()[f])
                .collect();
            feature_count[i] >= 3 || patches.len() >= 3
        })
        .map(|(_, &p)| p)
        .collect();

    Features { edges, corners }
}

/// Relabels feature points after a topology change. Features whose points
/// did not survive are dropped.
pub fn remap_boundary_points(features: &Features, map: &TopologyMap) -> Features {
    let relabel = |p: usize| map.reverse_point_map.get(p).copied().flatten();
    let edges = features
        .edges
        .iter()
        .filter_map(|e| {
            let a = relabel(e.points[0])?;
            let b = relabel(e.points[1])?;
            Some(FeatureEdge {
                points: [a.min(b), a.max(b)],
                angle: e.angle,
            })
        })
        .collect();
    let mut corners: Vec<usize> = features.corners.iter().filter_map(|&p| relabel(p)).collect();
    corners.sort_unstable();
    Features { edges, corners }
}
