//! # Surface Primitives
//!
//! Closed triangulated shapes used as meshing input, mainly in tests and
//! examples.

use super::TriSurface;
use crate::core::Vec3;
use crate::error::GeometryError;

/// Patch names of [`box_surface`], in region order.
pub const BOX_PATCHES: [&str; 6] = ["xMin", "xMax", "yMin", "yMax", "zMin", "zMax"];

/// Outward-oriented corner loops of the six box sides. Corner `i` has
/// x = bit 0, y = bit 1, z = bit 2.
const BOX_SIDES: [[usize; 4]; 6] = [
    [0, 4, 6, 2],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 2, 3, 1],
    [4, 5, 7, 6],
];

/// Axis-aligned box with one region per side, normals pointing outwards.
///
/// # Example
///
/// ```rust
/// use octree_mesh::surface::primitives::box_surface;
/// use octree_mesh::Vec3;
///
/// let s = box_surface(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0)).unwrap();
/// assert_eq!(s.patch_names().len(), 6);
/// ```
pub fn box_surface(min: Vec3, max: Vec3) -> Result<TriSurface, GeometryError> {
    if min.cmpge(max).any() {
        return Err(GeometryError::DegenerateGeometry(format!(
            "box corners {min} and {max} do not span a volume"
        )));
    }

    let points = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        })
        .collect();

    let mut triangles = Vec::with_capacity(12);
    let mut regions = Vec::with_capacity(12);
    for (region, [a, b, c, d]) in BOX_SIDES.iter().copied().enumerate() {
        triangles.push([a, b, c]);
        triangles.push([a, c, d]);
        regions.extend([region, region]);
    }

    TriSurface::new(
        points,
        triangles,
        regions,
        BOX_PATCHES.iter().map(|s| s.to_string()).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_normals_point_outwards() {
        let s = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
        let expected = [
            -Vec3::X,
            Vec3::X,
            -Vec3::Y,
            Vec3::Y,
            -Vec3::Z,
            Vec3::Z,
        ];
        for t in 0..s.triangle_count() {
            let n = s.triangle_normal(t);
            let e = expected[s.region(t)];
            assert_relative_eq!(n.dot(e), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn box_total_area() {
        let s = box_surface(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let area: f64 = (0..s.triangle_count()).map(|t| s.triangle_area(t)).sum();
        assert_relative_eq!(area, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_box_is_rejected() {
        assert!(box_surface(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)).is_err());
    }
}
