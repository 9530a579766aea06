//! # Triangle Predicates
//!
//! Closest point, ray intersection and triangle/box overlap used by the
//! octree classification and the boundary mapping.

use crate::core::Vec3;
use config::constants::EPSILON_TOLERANCE;

/// Area-weighted normal of a triangle (half the cross product).
#[inline]
pub fn area_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    0.5 * (b - a).cross(c - a)
}

/// Closest point to `p` on triangle `abc`.
///
/// Region-based walk over the Voronoi regions of the vertices and edges.
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + v * ab;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + w * ac;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + w * (c - b);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Möller-Trumbore ray/triangle intersection.
///
/// Returns the ray parameter `t > 0` of the hit, if any.
pub fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let pvec = dir.cross(e2);
    let det = e1.dot(pvec);
    if det.abs() < EPSILON_TOLERANCE * e1.length() * e2.length() {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    (t > EPSILON_TOLERANCE).then_some(t)
}

/// Separating-axis overlap test between a closed box and a triangle.
///
/// Touching counts as overlapping.
pub fn triangle_box_overlap(min: Vec3, max: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let centre = 0.5 * (min + max);
    let half = 0.5 * (max - min);
    let v = [a - centre, b - centre, c - centre];

    // box face normals
    let tri_min = v[0].min(v[1]).min(v[2]);
    let tri_max = v[0].max(v[1]).max(v[2]);
    if tri_min.cmpgt(half).any() || tri_max.cmplt(-half).any() {
        return false;
    }

    let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];

    // triangle plane
    let n = edges[0].cross(edges[1]);
    if !axis_overlaps(n, &v, half) {
        return false;
    }

    // edge cross products
    for e in edges {
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            if !axis_overlaps(e.cross(axis), &v, half) {
                return false;
            }
        }
    }
    true
}

fn axis_overlaps(axis: Vec3, v: &[Vec3; 3], half: Vec3) -> bool {
    if axis.length_squared() == 0.0 {
        return true;
    }
    let p = [axis.dot(v[0]), axis.dot(v[1]), axis.dot(v[2])];
    let lo = p[0].min(p[1]).min(p[2]);
    let hi = p[0].max(p[1]).max(p[2]);
    let r = half.dot(axis.abs());
    !(lo > r || hi < -r)
}
