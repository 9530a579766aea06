//! Thin wrapper around `glam::DVec3` shared across kernel modules.
//!
//! The helper functions keep vector creation readable while avoiding direct
//! dependencies on `glam` from higher layers.

pub use glam::DVec3 as Vec3;

/// Creates a zero vector using `glam::DVec3`.
///
/// # Examples
/// ```
/// use octree_mesh::Vec3;
/// let v = octree_mesh::core::vec3::zero();
/// assert_eq!(v, Vec3::new(0.0, 0.0, 0.0));
/// ```
pub fn zero() -> Vec3 {
    Vec3::ZERO
}

/// Returns the component of `v` along `axis` (0 = x, 1 = y, 2 = z).
#[inline]
pub fn component(v: Vec3, axis: usize) -> f64 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

/// Axis-aligned bounding box.
///
/// # Examples
/// ```
/// use octree_mesh::{BoundingBox, Vec3};
/// let mut bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
/// bb.expand(Vec3::splat(2.0));
/// assert_eq!(bb.max, Vec3::splat(2.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a box from its corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates an inverted box that any `expand` call will overwrite.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f64::INFINITY),
            max: Vec3::splat(f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing all `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand(*p);
        }
        bb
    }

    /// Grows the box to include `p`.
    pub fn expand(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// True when min <= max on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Edge lengths.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Box centre.
    pub fn centre(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Length of the diagonal.
    pub fn diagonal(&self) -> f64 {
        self.extent().length()
    }

    /// Closed containment test.
    pub fn contains(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// Cube with the same centre whose side is the largest extent scaled by
    /// `1 + 2 * margin`.
    pub fn to_cube(&self, margin: f64) -> Self {
        let side = self.extent().max_element().max(f64::MIN_POSITIVE) * (1.0 + 2.0 * margin);
        let half = Vec3::splat(0.5 * side);
        let c = self.centre();
        Self::new(c - half, c + half)
    }
}
