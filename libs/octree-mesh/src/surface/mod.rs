//! # Triangulated Surface
//!
//! Read-only input geometry: a vertex array, a triangle index array and a
//! region (patch) per triangle. The octree and the surface extractor query it
//! for box overlaps, nearest points and inside/outside classification.

pub mod geometry;
pub mod primitives;
pub mod spatial_index;

use crate::core::{BoundingBox, Vec3};
use crate::error::GeometryError;
use geometry::{area_normal, closest_point_on_triangle, ray_triangle, triangle_box_overlap};
use spatial_index::SpatialIndex;

/// Fixed ray directions for the inside test. Skewed so rays rarely graze
/// edges or vertices of axis-aligned input.
const INSIDE_RAYS: [[f64; 3]; 3] = [
    [0.831_469_612, 0.372_856_194, 0.411_922_041],
    [-0.293_103_448, 0.908_620_690, 0.297_413_793],
    [0.176_470_588, -0.352_941_176, 0.918_823_529],
];

/// Nearest point query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    /// Triangle index.
    pub triangle: usize,
    /// Closest point on that triangle.
    pub point: Vec3,
    /// Distance from the query point.
    pub distance: f64,
}

/// Triangulated surface with per-triangle regions.
///
/// # Example
///
/// ```rust
/// use octree_mesh::surface::primitives::box_surface;
/// use octree_mesh::Vec3;
///
/// let surface = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
/// assert_eq!(surface.triangle_count(), 12);
/// assert!(surface.is_inside(Vec3::splat(0.5)));
/// ```
#[derive(Debug, Clone)]
pub struct TriSurface {
    points: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,
    regions: Vec<usize>,
    patch_names: Vec<String>,
    index: SpatialIndex,
}

impl TriSurface {
    /// Builds a surface, validating indices, regions and triangle areas.
    pub fn new(
        points: Vec<Vec3>,
        triangles: Vec<[usize; 3]>,
        regions: Vec<usize>,
        patch_names: Vec<String>,
    ) -> Result<Self, GeometryError> {
        if triangles.is_empty() {
            return Err(GeometryError::InvalidSurface("surface has no triangles".into()));
        }
        if regions.len() != triangles.len() {
            return Err(GeometryError::InvalidSurface(format!(
                "{} regions given for {} triangles",
                regions.len(),
                triangles.len()
            )));
        }
        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&v| v >= points.len()) {
                return Err(GeometryError::InvalidSurface(format!(
                    "triangle {t} references missing point {bad}"
                )));
            }
            if regions[t] >= patch_names.len() {
                return Err(GeometryError::InvalidSurface(format!(
                    "triangle {t} has region {} but only {} patches are named",
                    regions[t],
                    patch_names.len()
                )));
            }
            let n = area_normal(points[tri[0]], points[tri[1]], points[tri[2]]);
            if n.length_squared() == 0.0 {
                return Err(GeometryError::DegenerateGeometry(format!(
                    "triangle {t} has zero area"
                )));
            }
        }

        let index = SpatialIndex::build(&points, &triangles);
        Ok(Self {
            points,
            triangles,
            regions,
            patch_names,
            index,
        })
    }

    /// Surface vertices.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Triangle vertex indices.
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Region (patch id) of triangle `t`.
    pub fn region(&self, t: usize) -> usize {
        self.regions[t]
    }

    /// Patch names, indexed by region.
    pub fn patch_names(&self) -> &[String] {
        &self.patch_names
    }

    /// Bounding box of the surface.
    pub fn bounding_box(&self) -> BoundingBox {
        self.index.bounds()
    }

    /// Corner positions of triangle `t`.
    pub fn triangle_vertices(&self, t: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[t];
        [self.points[a], self.points[b], self.points[c]]
    }

    /// Unit normal of triangle `t`.
    pub fn triangle_normal(&self, t: usize) -> Vec3 {
        let [a, b, c] = self.triangle_vertices(t);
        area_normal(a, b, c).normalize_or_zero()
    }

    /// Area of triangle `t`.
    pub fn triangle_area(&self, t: usize) -> f64 {
        let [a, b, c] = self.triangle_vertices(t);
        area_normal(a, b, c).length()
    }

    /// Triangles overlapping the closed box `[min, max]`.
    pub fn triangles_in_box(&self, min: Vec3, max: Vec3) -> Vec<usize> {
        self.filter_in_box(self.index.query_box(min, max), min, max)
    }

    /// Subset of `candidates` overlapping the closed box `[min, max]`.
    pub fn filter_in_box(&self, candidates: Vec<usize>, min: Vec3, max: Vec3) -> Vec<usize> {
        candidates
            .into_iter()
            .filter(|&t| {
                let [a, b, c] = self.triangle_vertices(t);
                triangle_box_overlap(min, max, a, b, c)
            })
            .collect()
    }

    /// Nearest triangle to `p`.
    pub fn nearest(&self, p: Vec3) -> Option<NearestHit> {
        let bounds = self.bounding_box();
        let reach = bounds.diagonal() + (p - p.clamp(bounds.min, bounds.max)).length();
        let mut radius = self.index.cell_size();

        while radius <= 2.0 * reach + self.index.cell_size() {
            let r = Vec3::splat(radius);
            let best = self.best_of(self.index.query_box(p - r, p + r), p);
            if let Some(hit) = best {
                if hit.distance <= radius {
                    return Some(hit);
                }
            }
            radius *= 2.0;
        }
        self.best_of(0..self.triangles.len(), p)
    }

    /// Nearest region to `p`; regions whose distance is within `tol` of the
    /// minimum tie, and the smallest region id wins.
    pub fn nearest_region(&self, p: Vec3, tol: f64) -> Option<(usize, NearestHit)> {
        let best = self.nearest(p)?;
        let r = Vec3::splat(best.distance + tol);
        let mut winner = (self.regions[best.triangle], best);
        for t in self.index.query_box(p - r, p + r) {
            let hit = self.hit(t, p);
            if hit.distance <= best.distance + tol && self.regions[t] < winner.0 {
                winner = (self.regions[t], hit);
            }
        }
        Some(winner)
    }

    /// Point-in-solid test by majority vote over three ray parities.
    ///
    /// Assumes a closed, consistently oriented surface.
    pub fn is_inside(&self, p: Vec3) -> bool {
        if !self.bounding_box().contains(p) {
            return false;
        }
        let votes = INSIDE_RAYS
            .iter()
            .filter(|d| {
                let dir = Vec3::from_array(**d).normalize();
                let hits = self
                    .index
                    .query_ray(p, dir)
                    .into_iter()
                    .filter(|&t| {
                        let [a, b, c] = self.triangle_vertices(t);
                        ray_triangle(p, dir, a, b, c).is_some()
                    })
                    .count();
                hits % 2 == 1
            })
            .count();
        votes >= 2
    }

    /// Distance from `p` to the surface.
    pub fn distance(&self, p: Vec3) -> f64 {
        self.nearest(p).map_or(f64::INFINITY, |h| h.distance)
    }

    fn hit(&self, t: usize, p: Vec3) -> NearestHit {
        let [a, b, c] = self.triangle_vertices(t);
        let q = closest_point_on_triangle(p, a, b, c);
        NearestHit {
            triangle: t,
            point: q,
            distance: (q - p).length(),
        }
    }

    fn best_of(&self, candidates: impl IntoIterator<Item = usize>, p: Vec3) -> Option<NearestHit> {
        candidates
            .into_iter()
            .map(|t| self.hit(t, p))
            .min_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then(a.triangle.cmp(&b.triangle))
            })
    }
}

#[cfg(test)]
mod tests;
