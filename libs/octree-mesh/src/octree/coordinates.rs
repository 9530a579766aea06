//! # Cube Coordinates
//!
//! Integer `(x, y, z, level)` address of an octree cube inside a fixed root
//! box. Adjacency is decided on integers only, so neighbour searches are
//! exact and identical on every process regardless of floating-point
//! rounding.

use crate::core::{BoundingBox, Vec3};
use crate::error::GeometryError;
use config::constants::MAX_OCTREE_LEVEL;
use std::fmt;

/// Bits per axis in an encoded key.
const AXIS_BITS: u32 = MAX_OCTREE_LEVEL as u32;
/// Shift of the level field in an encoded key.
const LEVEL_SHIFT: u32 = 3 * AXIS_BITS;

/// Face direction of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// -x
    NegX,
    /// +x
    PosX,
    /// -y
    NegY,
    /// +y
    PosY,
    /// -z
    NegZ,
    /// +z
    PosZ,
}

impl Direction {
    /// All six directions in face order.
    pub const ALL: [Direction; 6] = [
        Direction::NegX,
        Direction::PosX,
        Direction::NegY,
        Direction::PosY,
        Direction::NegZ,
        Direction::PosZ,
    ];

    /// Axis index (0 = x, 1 = y, 2 = z).
    pub fn axis(self) -> usize {
        match self {
            Direction::NegX | Direction::PosX => 0,
            Direction::NegY | Direction::PosY => 1,
            Direction::NegZ | Direction::PosZ => 2,
        }
    }

    /// True for the positive side of the axis.
    pub fn is_positive(self) -> bool {
        matches!(self, Direction::PosX | Direction::PosY | Direction::PosZ)
    }

    /// Opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::NegX => Direction::PosX,
            Direction::PosX => Direction::NegX,
            Direction::NegY => Direction::PosY,
            Direction::PosY => Direction::NegY,
            Direction::NegZ => Direction::PosZ,
            Direction::PosZ => Direction::NegZ,
        }
    }

    /// Unit vector of the direction.
    pub fn vector(self) -> Vec3 {
        let mut v = Vec3::ZERO;
        v[self.axis()] = if self.is_positive() { 1.0 } else { -1.0 };
        v
    }
}

/// Address of an octree cube.
///
/// Ordering compares level first, then x, y, z.
///
/// # Examples
/// ```
/// use octree_mesh::octree::CubeCoordinate;
///
/// let root = CubeCoordinate::root();
/// let child = root.child_coordinate(5).unwrap();
/// assert_eq!((child.pos_x(), child.pos_y(), child.pos_z()), (1, 0, 1));
/// assert_eq!(child.parent_coordinate().unwrap(), root);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CubeCoordinate {
    level: u8,
    pos_x: u32,
    pos_y: u32,
    pos_z: u32,
}

impl CubeCoordinate {
    /// Creates a validated coordinate.
    pub fn new(pos_x: u32, pos_y: u32, pos_z: u32, level: u8) -> Result<Self, GeometryError> {
        if level > MAX_OCTREE_LEVEL {
            return Err(GeometryError::invalid_coordinate(
                pos_x.into(),
                pos_y.into(),
                pos_z.into(),
                level.into(),
                format!("level exceeds {MAX_OCTREE_LEVEL}"),
            ));
        }
        let n = 1u64 << level;
        if u64::from(pos_x) >= n || u64::from(pos_y) >= n || u64::from(pos_z) >= n {
            return Err(GeometryError::invalid_coordinate(
                pos_x.into(),
                pos_y.into(),
                pos_z.into(),
                level.into(),
                format!("position must be below {n}"),
            ));
        }
        Ok(Self {
            level,
            pos_x,
            pos_y,
            pos_z,
        })
    }

    /// The root cube.
    pub const fn root() -> Self {
        Self {
            level: 0,
            pos_x: 0,
            pos_y: 0,
            pos_z: 0,
        }
    }

    /// Refinement level (0 = root).
    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Position along x.
    #[inline]
    pub fn pos_x(&self) -> u32 {
        self.pos_x
    }

    /// Position along y.
    #[inline]
    pub fn pos_y(&self) -> u32 {
        self.pos_y
    }

    /// Position along z.
    #[inline]
    pub fn pos_z(&self) -> u32 {
        self.pos_z
    }

    /// Positions as an array.
    #[inline]
    pub fn position(&self) -> [u32; 3] {
        [self.pos_x, self.pos_y, self.pos_z]
    }

    fn from_position(p: [u32; 3], level: u8) -> Self {
        Self {
            level,
            pos_x: p[0],
            pos_y: p[1],
            pos_z: p[2],
        }
    }

    fn error(&self, reason: &str) -> GeometryError {
        GeometryError::invalid_coordinate(
            self.pos_x.into(),
            self.pos_y.into(),
            self.pos_z.into(),
            self.level.into(),
            reason,
        )
    }

    /// Coordinate of the parent cube.
    pub fn parent_coordinate(&self) -> Result<Self, GeometryError> {
        if self.level == 0 {
            return Err(self.error("root has no parent"));
        }
        Ok(Self::from_position(
            self.position().map(|p| p >> 1),
            self.level - 1,
        ))
    }

    /// Octant of this cube inside its parent (x = bit 0, y = bit 1, z = bit 2).
    pub fn octant(&self) -> u8 {
        ((self.pos_x & 1) | ((self.pos_y & 1) << 1) | ((self.pos_z & 1) << 2)) as u8
    }

    /// Coordinate of child `octant` (0..8).
    pub fn child_coordinate(&self, octant: u8) -> Result<Self, GeometryError> {
        if octant > 7 {
            return Err(self.error(&format!("octant {octant} out of range 0..8")));
        }
        if self.level >= MAX_OCTREE_LEVEL {
            return Err(self.error("cannot refine beyond the deepest level"));
        }
        let bit = |b: u8| u32::from((octant >> b) & 1);
        Ok(Self::from_position(
            [
                (self.pos_x << 1) | bit(0),
                (self.pos_y << 1) | bit(1),
                (self.pos_z << 1) | bit(2),
            ],
            self.level + 1,
        ))
    }

    /// All eight children in octant order.
    pub fn refine(&self) -> Result<[Self; 8], GeometryError> {
        let mut children = [*self; 8];
        for (octant, child) in children.iter_mut().enumerate() {
            *child = self.child_coordinate(octant as u8)?;
        }
        Ok(children)
    }

    /// Same-level neighbour across the face in `direction`, `None` on the
    /// root box boundary.
    pub fn neighbour(&self, direction: Direction) -> Option<Self> {
        let mut p = self.position();
        let axis = direction.axis();
        if direction.is_positive() {
            if u64::from(p[axis]) + 1 >= 1u64 << self.level {
                return None;
            }
            p[axis] += 1;
        } else {
            p[axis] = p[axis].checked_sub(1)?;
        }
        Some(Self::from_position(p, self.level))
    }

    /// Ancestor (or self) at `level`, `None` when `level` is finer.
    pub fn ancestor_at_level(&self, level: u8) -> Option<Self> {
        if level > self.level {
            return None;
        }
        let shift = self.level - level;
        Some(Self::from_position(self.position().map(|p| p >> shift), level))
    }

    /// True if `other` is this cube or lies inside it.
    pub fn contains(&self, other: &CubeCoordinate) -> bool {
        other.ancestor_at_level(self.level) == Some(*self)
    }

    /// Integer span `[lo, lo + size)` per axis expressed at `level`
    /// (which must not be coarser than this cube).
    fn span_at(&self, level: u8) -> ([u64; 3], u64) {
        let shift = level.saturating_sub(self.level);
        (self.position().map(|p| u64::from(p) << shift), 1u64 << shift)
    }

    /// True if `other` shares a face with this cube on its `direction`
    /// side. Works across levels.
    pub fn is_neighbour_at_level(&self, other: &CubeCoordinate, direction: Direction) -> bool {
        let level = self.level.max(other.level);
        let (a, sa) = self.span_at(level);
        let (b, sb) = other.span_at(level);
        let axis = direction.axis();

        let touching = if direction.is_positive() {
            a[axis] + sa == b[axis]
        } else {
            b[axis] + sb == a[axis]
        };
        touching
            && (0..3)
                .filter(|&i| i != axis)
                .all(|i| a[i] < b[i] + sb && b[i] < a[i] + sa)
    }

    /// Encodes into a 64-bit key: Morton-interleaved positions with the level
    /// in the top bits.
    pub fn encode(&self) -> u64 {
        let mut key = 0u64;
        for bit in 0..AXIS_BITS {
            for (axis, p) in self.position().iter().enumerate() {
                key |= u64::from((p >> bit) & 1) << (3 * bit + axis as u32);
            }
        }
        key | (u64::from(self.level) << LEVEL_SHIFT)
    }

    /// Decodes a key produced by [`CubeCoordinate::encode`].
    pub fn decode(key: u64) -> Result<Self, GeometryError> {
        let level = key >> LEVEL_SHIFT;
        if level > u64::from(MAX_OCTREE_LEVEL) {
            return Err(GeometryError::invalid_coordinate(
                0,
                0,
                0,
                level as i64,
                format!("key {key:#x} has an invalid level"),
            ));
        }
        let mut p = [0u32; 3];
        for bit in 0..AXIS_BITS {
            for (axis, value) in p.iter_mut().enumerate() {
                *value |= (((key >> (3 * bit + axis as u32)) & 1) as u32) << bit;
            }
        }
        Self::new(p[0], p[1], p[2], level as u8)
    }

    /// Edge length of the cube inside `root`.
    pub fn size(&self, root: &BoundingBox) -> f64 {
        root.extent().x / (1u64 << self.level) as f64
    }

    /// Geometric box of the cube inside `root`.
    pub fn bounding_box(&self, root: &BoundingBox) -> BoundingBox {
        let size = self.size(root);
        let min = root.min + size * Vec3::new(self.pos_x as f64, self.pos_y as f64, self.pos_z as f64);
        BoundingBox::new(min, min + Vec3::splat(size))
    }

    /// Geometric centre of the cube inside `root`.
    pub fn centre(&self, root: &BoundingBox) -> Vec3 {
        self.bounding_box(root).centre()
    }
}

impl fmt::Display for CubeCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {} {}) level {}",
            self.pos_x, self.pos_y, self.pos_z, self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cc(x: u32, y: u32, z: u32, l: u8) -> CubeCoordinate {
        CubeCoordinate::new(x, y, z, l).unwrap()
    }

    #[test]
    fn rejects_out_of_range_positions() {
        assert!(CubeCoordinate::new(2, 0, 0, 1).is_err());
        assert!(CubeCoordinate::new(0, 0, 0, MAX_OCTREE_LEVEL + 1).is_err());
        assert!(CubeCoordinate::new(1, 1, 1, 1).is_ok());
    }

    #[test]
    fn parent_of_root_is_an_error() {
        let err = CubeCoordinate::root().parent_coordinate().unwrap_err();
        assert!(matches!(err, GeometryError::InvalidCoordinate { .. }));
    }

    #[test]
    fn children_round_trip_to_parent() {
        let c = cc(3, 1, 2, 2);
        let children = c.refine().unwrap();
        for (octant, child) in children.iter().enumerate() {
            assert_eq!(child.parent_coordinate().unwrap(), c);
            assert_eq!(child.octant() as usize, octant);
            assert!(c.contains(child));
        }
        assert!(c.child_coordinate(8).is_err());
    }

    #[test]
    fn deepest_level_cannot_refine() {
        let deep = cc(0, 0, 0, MAX_OCTREE_LEVEL);
        assert!(deep.refine().is_err());
    }

    #[test]
    fn neighbours_stop_at_root_boundary() {
        let c = cc(0, 1, 1, 1);
        assert_eq!(c.neighbour(Direction::NegX), None);
        assert_eq!(c.neighbour(Direction::PosX), Some(cc(1, 1, 1, 1)));
        assert_eq!(c.neighbour(Direction::PosY), None);
        assert_eq!(c.neighbour(Direction::NegZ), Some(cc(0, 1, 0, 1)));
    }

    #[test]
    fn neighbour_test_across_levels() {
        let coarse = cc(0, 0, 0, 1);
        let fine = cc(2, 1, 0, 2);
        assert!(coarse.is_neighbour_at_level(&fine, Direction::PosX));
        assert!(fine.is_neighbour_at_level(&coarse, Direction::NegX));
        assert!(!coarse.is_neighbour_at_level(&fine, Direction::PosY));
        // diagonal, not face adjacent
        assert!(!coarse.is_neighbour_at_level(&cc(2, 2, 0, 2), Direction::PosX));
    }

    #[test]
    fn key_round_trip() {
        for c in [CubeCoordinate::root(), cc(5, 0, 7, 3), cc(123, 456, 789, 10)] {
            assert_eq!(CubeCoordinate::decode(c.encode()).unwrap(), c);
        }
        assert_ne!(cc(1, 0, 0, 1).encode(), cc(1, 0, 0, 2).encode());
        assert!(CubeCoordinate::decode(u64::MAX).is_err());
    }

    #[test]
    fn geometry_inside_root_box() {
        let root = BoundingBox::new(Vec3::ZERO, Vec3::splat(8.0));
        let c = cc(1, 0, 3, 2);
        assert_eq!(c.size(&root), 2.0);
        assert_eq!(c.bounding_box(&root).min, Vec3::new(2.0, 0.0, 6.0));
        assert_eq!(c.centre(&root), Vec3::new(3.0, 1.0, 7.0));
    }

    #[test]
    fn ordering_is_level_first() {
        assert!(cc(1, 1, 1, 1) < cc(0, 0, 0, 2));
    }
}
