//! # Spatial Index for Fast Triangle Queries
//!
//! Uses spatial hashing for O(1) average-case triangle lookups on the input
//! surface. Nearest-triangle searches, box queries during octree refinement
//! and inside/outside ray casting all go through it.
//!
//! ## Example
//!
//! ```rust,ignore
//! let index = SpatialIndex::build(&points, &triangles);
//! let candidates = index.query_box(min, max);
//! ```

use crate::core::{BoundingBox, Vec3};
use std::collections::HashMap;

/// Cell size multiplier for spatial hashing.
/// Larger values = fewer cells but more triangles per cell.
const CELL_SIZE_FACTOR: f64 = 2.0;

/// Minimum cell size relative to the surface diagonal.
const MIN_RELATIVE_CELL_SIZE: f64 = 1.0e-4;

/// 3D cell coordinate for spatial hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellCoord {
    x: i64,
    y: i64,
    z: i64,
}

impl CellCoord {
    /// Creates a cell coordinate from 3D position.
    fn from_position(pos: Vec3, cell_size: f64) -> Self {
        Self {
            x: (pos.x / cell_size).floor() as i64,
            y: (pos.y / cell_size).floor() as i64,
            z: (pos.z / cell_size).floor() as i64,
        }
    }
}

/// Spatial index over the triangles of a surface.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// Hash grid: cell -> triangle indices
    grid: HashMap<CellCoord, Vec<usize>>,
    /// Cell size for hashing
    cell_size: f64,
    /// Surface bounding box
    bounds: BoundingBox,
    /// Total triangle count
    triangle_count: usize,
}

impl SpatialIndex {
    /// Creates a spatial index from surface points and triangles.
    ///
    /// The cell size is derived from the surface extent and triangle count.
    pub fn build(points: &[Vec3], triangles: &[[usize; 3]]) -> Self {
        let bounds = BoundingBox::from_points(points.iter());
        let triangle_count = triangles.len();

        let extent = bounds.extent();
        let avg_extent = (extent.x + extent.y + extent.z) / 3.0;
        let min_cell = (bounds.diagonal() * MIN_RELATIVE_CELL_SIZE).max(f64::MIN_POSITIVE);
        let cell_size = (avg_extent / (triangle_count.max(1) as f64).cbrt() * CELL_SIZE_FACTOR)
            .max(min_cell);

        let mut grid: HashMap<CellCoord, Vec<usize>> = HashMap::new();

        for (i, tri) in triangles.iter().enumerate() {
            let v0 = points[tri[0]];
            let v1 = points[tri[1]];
            let v2 = points[tri[2]];

            let cell_min = CellCoord::from_position(v0.min(v1).min(v2), cell_size);
            let cell_max = CellCoord::from_position(v0.max(v1).max(v2), cell_size);

            for cx in cell_min.x..=cell_max.x {
                for cy in cell_min.y..=cell_max.y {
                    for cz in cell_min.z..=cell_max.z {
                        grid.entry(CellCoord { x: cx, y: cy, z: cz }).or_default().push(i);
                    }
                }
            }
        }

        Self {
            grid,
            cell_size,
            bounds,
            triangle_count,
        }
    }

    /// Triangles whose bounding boxes may intersect the box `[min, max]`.
    pub fn query_box(&self, min: Vec3, max: Vec3) -> Vec<usize> {
        // clamp to the indexed region so huge query boxes stay cheap
        let min = min.max(self.bounds.min - Vec3::splat(self.cell_size));
        let max = max.min(self.bounds.max + Vec3::splat(self.cell_size));
        if min.cmpgt(max).any() {
            return Vec::new();
        }
        let cell_min = CellCoord::from_position(min, self.cell_size);
        let cell_max = CellCoord::from_position(max, self.cell_size);

        let mut result = Vec::new();
        let mut seen = vec![false; self.triangle_count];

        for cx in cell_min.x..=cell_max.x {
            for cy in cell_min.y..=cell_max.y {
                for cz in cell_min.z..=cell_max.z {
                    if let Some(tris) = self.grid.get(&CellCoord { x: cx, y: cy, z: cz }) {
                        for &tri_idx in tris {
                            if !seen[tri_idx] {
                                seen[tri_idx] = true;
                                result.push(tri_idx);
                            }
                        }
                    }
                }
            }
        }

        result
    }

    /// Triangles the ray may intersect.
    ///
    /// Uses a 3D DDA walk over the hash cells. The origin must lie inside the
    /// indexed bounds (callers reject outside points first).
    pub fn query_ray(&self, origin: Vec3, direction: Vec3) -> Vec<usize> {
        let mut result = Vec::new();
        let mut seen = vec![false; self.triangle_count];

        let step = [
            if direction.x >= 0.0 { 1 } else { -1 },
            if direction.y >= 0.0 { 1 } else { -1 },
            if direction.z >= 0.0 { 1 } else { -1 },
        ];

        let mut current = CellCoord::from_position(origin, self.cell_size);

        let inv = |d: f64| if d.abs() > 1e-12 { 1.0 / d } else { 1e12 };
        let inv_dir = Vec3::new(inv(direction.x), inv(direction.y), inv(direction.z));

        let t_delta = (self.cell_size * inv_dir).abs();

        let boundary = |c: i64, s: i64| (c + if s > 0 { 1 } else { 0 }) as f64 * self.cell_size;
        let mut t_max = Vec3::new(
            (boundary(current.x, step[0]) - origin.x) * inv_dir.x,
            (boundary(current.y, step[1]) - origin.y) * inv_dir.y,
            (boundary(current.z, step[2]) - origin.z) * inv_dir.z,
        );

        let margin = 2;
        let lo = CellCoord::from_position(self.bounds.min, self.cell_size);
        let hi = CellCoord::from_position(self.bounds.max, self.cell_size);
        let max_steps = 3 * ((self.bounds.diagonal() / self.cell_size) as usize + 10);

        for _ in 0..max_steps {
            if let Some(tris) = self.grid.get(&current) {
                for &tri_idx in tris {
                    if !seen[tri_idx] {
                        seen[tri_idx] = true;
                        result.push(tri_idx);
                    }
                }
            }

            if t_max.x < t_max.y && t_max.x < t_max.z {
                current.x += step[0];
                t_max.x += t_delta.x;
            } else if t_max.y < t_max.z {
                current.y += step[1];
                t_max.y += t_delta.y;
            } else {
                current.z += step[2];
                t_max.z += t_delta.z;
            }

            if current.x < lo.x - margin
                || current.x > hi.x + margin
                || current.y < lo.y - margin
                || current.y > hi.y + margin
                || current.z < lo.z - margin
                || current.z > hi.z + margin
            {
                break;
            }
        }

        result
    }

    /// Returns the number of cells in the index.
    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    /// Returns the cell size used for hashing.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Bounding box of the indexed triangles.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }
}
