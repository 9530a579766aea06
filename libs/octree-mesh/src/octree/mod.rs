//! # Adaptive Octree
//!
//! Leaf-only octree over a cubic root box. Leaves are keyed by
//! [`CubeCoordinate`] in a `BTreeMap`, so iteration order (and therefore
//! every derived mesh numbering) is deterministic.
//!
//! ## Invariants
//!
//! - Leaves tile the root box with no gaps and no overlaps
//! - After [`Octree::balance`], face-adjacent leaves differ by at most one level
//! - Every surface triangle is covered by `Data` leaves
//!
//! ## Example
//!
//! ```rust
//! use octree_mesh::octree::{CubeType, Octree};
//! use octree_mesh::surface::primitives::box_surface;
//! use octree_mesh::{BoundingBox, Vec3};
//!
//! let surface = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
//! let root = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(1.5));
//! let mut octree = Octree::with_root_box(&surface, root).unwrap();
//! octree.refine_to_surface(3, 0.5).unwrap();
//! assert!(octree.is_balanced());
//! assert_eq!(octree.classify(Vec3::splat(0.5)), CubeType::Inside);
//! ```

pub mod coordinates;
pub mod cube;
pub mod record;

pub use coordinates::{CubeCoordinate, Direction};
pub use cube::{CubeType, OctreeCube, ProcNo};
pub use record::{read_cubes, write_cubes, CubeRecord};

use crate::core::{BoundingBox, Vec3};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::error::{GeometryError, MeshError, MeshResult};
use crate::surface::TriSurface;
use config::constants::{
    DEFAULT_MAX_TRIANGLES_PER_LEAF, DEFAULT_ROOT_BOX_MARGIN, EPSILON_TOLERANCE, MAX_OCTREE_LEVEL,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Adaptive octree over a triangulated surface.
#[derive(Debug, Clone)]
pub struct Octree<'s> {
    surface: &'s TriSurface,
    root_box: BoundingBox,
    leaves: BTreeMap<CubeCoordinate, OctreeCube>,
    /// Triangles overlapping each `Data` leaf.
    contained: HashMap<CubeCoordinate, Vec<usize>>,
    max_triangles_per_leaf: usize,
    max_cell_size: Option<f64>,
    diagnostics: Vec<Diagnostic>,
}

impl<'s> Octree<'s> {
    /// Builds a single-leaf octree whose root box is the surface bounding
    /// box made cubic and grown by `margin` on every side.
    pub fn new(surface: &'s TriSurface, margin: f64) -> MeshResult<Self> {
        if margin.is_nan() || margin < 0.0 {
            return Err(MeshError::configuration(
                "rootBoxMargin",
                format!("must be non-negative, got {margin}"),
            ));
        }
        Self::with_root_box(surface, surface.bounding_box().to_cube(margin))
    }

    /// Builds with the default margin.
    pub fn from_surface(surface: &'s TriSurface) -> MeshResult<Self> {
        Self::new(surface, DEFAULT_ROOT_BOX_MARGIN)
    }

    /// Builds a single-leaf octree over an explicit cubic root box, which
    /// must enclose the surface.
    pub fn with_root_box(surface: &'s TriSurface, root_box: BoundingBox) -> MeshResult<Self> {
        let extent = root_box.extent();
        let side = extent.max_element();
        if !root_box.is_valid() || side <= 0.0 || extent.min_element() < side * (1.0 - 1.0e-9) {
            return Err(GeometryError::DegenerateGeometry(format!(
                "root box {:?}..{:?} is not a cube",
                root_box.min, root_box.max
            ))
            .into());
        }
        let bounds = surface.bounding_box();
        if !(root_box.contains(bounds.min) && root_box.contains(bounds.max)) {
            return Err(GeometryError::InvalidSurface(
                "surface extends beyond the root box".into(),
            )
            .into());
        }

        let root = CubeCoordinate::root();
        let triangles = surface.triangles_in_box(root_box.min, root_box.max);
        let mut cube = OctreeCube::new(root);
        let cube_type = if triangles.is_empty() {
            outside_or_inside(surface, root_box.centre())
        } else {
            CubeType::Data
        };
        cube.set_cube_type(cube_type)?;

        let mut contained = HashMap::new();
        if cube_type == CubeType::Data {
            contained.insert(root, triangles);
        }
        debug!(side, "octree root created");

        Ok(Self {
            surface,
            root_box,
            leaves: BTreeMap::from([(root, cube)]),
            contained,
            max_triangles_per_leaf: DEFAULT_MAX_TRIANGLES_PER_LEAF,
            max_cell_size: None,
            diagnostics: Vec::new(),
        })
    }

    /// Sets the triangle count above which `Data` leaves are split.
    pub fn with_max_triangles_per_leaf(mut self, count: usize) -> Self {
        self.max_triangles_per_leaf = count.max(1);
        self
    }

    /// Sets an upper bound on leaf edge length, applied to every leaf.
    pub fn with_max_cell_size(mut self, size: Option<f64>) -> Self {
        self.max_cell_size = size.filter(|s| *s > 0.0);
        self
    }

    /// Input surface.
    pub fn surface(&self) -> &'s TriSurface {
        self.surface
    }

    /// Root bounding box.
    pub fn root_box(&self) -> &BoundingBox {
        &self.root_box
    }

    /// All leaves in coordinate order.
    pub fn leaves(&self) -> impl ExactSizeIterator<Item = &OctreeCube> {
        self.leaves.values()
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Leaf counts indexed by level, up to the deepest leaf.
    pub fn leaf_count_per_level(&self) -> Vec<usize> {
        let mut counts = vec![0; usize::from(self.max_leaf_level()) + 1];
        for coord in self.leaves.keys() {
            counts[usize::from(coord.level())] += 1;
        }
        counts
    }

    /// Deepest leaf level.
    pub fn max_leaf_level(&self) -> u8 {
        self.leaves.keys().map(|c| c.level()).max().unwrap_or(0)
    }

    /// Triangles overlapping a `Data` leaf (empty for other leaves).
    pub fn contained_triangles(&self, leaf: &CubeCoordinate) -> &[usize] {
        self.contained.get(leaf).map_or(&[], Vec::as_slice)
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Moves the recorded diagnostics out.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Geometric box of a cube.
    pub fn cube_box(&self, coordinate: &CubeCoordinate) -> BoundingBox {
        coordinate.bounding_box(&self.root_box)
    }

    /// Leaf equal to or containing `coordinate`.
    pub fn find_leaf(&self, coordinate: &CubeCoordinate) -> Option<&OctreeCube> {
        (0..=coordinate.level())
            .rev()
            .filter_map(|level| coordinate.ancestor_at_level(level))
            .find_map(|c| self.leaves.get(&c))
    }

    /// Leaves sharing the `direction` face of `leaf`: none on the root box
    /// boundary, one on a conforming face, up to four (more if unbalanced)
    /// across a refined neighbour.
    pub fn neighbours(
        &self,
        leaf: &CubeCoordinate,
        direction: Direction,
    ) -> MeshResult<Vec<&OctreeCube>> {
        if !self.leaves.contains_key(leaf) {
            return Err(MeshError::consistency(format!("{leaf} is not a leaf")));
        }
        let Some(same_level) = leaf.neighbour(direction) else {
            return Ok(Vec::new());
        };
        if let Some(found) = self.find_leaf(&same_level) {
            return Ok(vec![found]);
        }

        let facing = direction.opposite();
        let mut found = Vec::new();
        let mut stack = vec![same_level];
        while let Some(c) = stack.pop() {
            if let Some(cube) = self.leaves.get(&c) {
                found.push(cube);
                continue;
            }
            for child in c.refine()? {
                if touches_side(&child, facing) {
                    stack.push(child);
                }
            }
        }
        found.sort_by_key(|c| *c.coordinate());
        Ok(found)
    }

    /// Splits `Data` leaves until the surface is resolved or `max_level` is
    /// reached, balancing after every sweep.
    ///
    /// A leaf is split when it holds more than the configured triangle count,
    /// when its curvature estimate exceeds `curvature_tol`, or when it is
    /// larger than the configured maximum cell size. Leaves still failing the
    /// criteria at `max_level` are kept and reported as a diagnostic.
    pub fn refine_to_surface(&mut self, max_level: u8, curvature_tol: f64) -> MeshResult<()> {
        if max_level > MAX_OCTREE_LEVEL {
            return Err(MeshError::configuration(
                "maxLevel",
                format!("{max_level} exceeds {MAX_OCTREE_LEVEL}"),
            ));
        }
        if curvature_tol.is_nan() || curvature_tol < 0.0 {
            return Err(MeshError::configuration(
                "curvatureTolerance",
                format!("must be non-negative, got {curvature_tol}"),
            ));
        }

        let mut sweep = 0;
        loop {
            let marked: Vec<CubeCoordinate> = self
                .leaves
                .values()
                .filter(|c| c.coordinate().level() < max_level && self.needs_refinement(c, curvature_tol))
                .map(|c| *c.coordinate())
                .collect();
            if marked.is_empty() {
                break;
            }
            sweep += 1;
            debug!(sweep, cubes = marked.len(), "refining surface cubes");
            for c in &marked {
                self.split(c)?;
            }
            self.balance()?;
        }

        let unresolved = self
            .leaves
            .values()
            .filter(|c| c.coordinate().level() >= max_level && self.needs_refinement(c, curvature_tol))
            .count();
        if unresolved > 0 {
            warn!(cubes = unresolved, max_level, "refinement limit reached");
            self.diagnostics.push(Diagnostic::warning(
                Stage::Octree,
                DiagnosticKind::RefinementLimitReached { cubes: unresolved },
                format!("{unresolved} cubes still exceed the refinement criteria at level {max_level}"),
            ));
        }
        info!(leaves = self.leaves.len(), sweeps = sweep, "octree refined");
        Ok(())
    }

    /// Enforces the 2:1 face balance. Repeated calls without intervening
    /// refinement change nothing.
    pub fn balance(&mut self) -> MeshResult<()> {
        let mut splits = 0usize;
        loop {
            let marked: BTreeSet<CubeCoordinate> = self
                .leaves
                .keys()
                .flat_map(|leaf| {
                    Direction::ALL
                        .iter()
                        .filter_map(|&d| leaf.neighbour(d))
                        .filter_map(|n| self.find_leaf(&n))
                        .map(|n| *n.coordinate())
                        .filter(|n| n.level() + 1 < leaf.level())
                        .collect::<Vec<_>>()
                })
                .collect();
            if marked.is_empty() {
                break;
            }
            splits += marked.len();
            for c in &marked {
                self.split(c)?;
            }
        }
        if splits > 0 {
            debug!(splits, "octree balanced");
        }
        Ok(())
    }

    /// True if all face-adjacent leaves differ by at most one level.
    pub fn is_balanced(&self) -> bool {
        self.leaves.keys().all(|leaf| {
            Direction::ALL.iter().all(|&d| {
                leaf.neighbour(d)
                    .and_then(|n| self.find_leaf(&n))
                    .map_or(true, |n| n.coordinate().level() + 1 >= leaf.level())
            })
        })
    }

    /// Classifies a point: `Outside` beyond the root box, the leaf type for
    /// `Inside`/`Outside` leaves and, inside a `Data` leaf, `Data` when the
    /// point lies on the surface or the ray-cast result otherwise.
    pub fn classify(&self, point: Vec3) -> CubeType {
        if !self.root_box.contains(point) {
            return CubeType::Outside;
        }
        let Some(leaf) = self.leaf_at(point) else {
            return CubeType::Unknown;
        };
        match leaf.cube_type() {
            CubeType::Data => {
                let tol = EPSILON_TOLERANCE * self.root_box.diagonal();
                if self.surface.distance(point) <= tol {
                    CubeType::Data
                } else {
                    outside_or_inside(self.surface, point)
                }
            }
            other => other,
        }
    }

    /// Leaf containing `point`, if it lies in the root box.
    pub fn leaf_at(&self, point: Vec3) -> Option<&OctreeCube> {
        if !self.root_box.contains(point) {
            return None;
        }
        let mut c = CubeCoordinate::root();
        loop {
            if let Some(leaf) = self.leaves.get(&c) {
                return Some(leaf);
            }
            let centre = c.centre(&self.root_box);
            let octant = (0..3).fold(0u8, |acc, axis| {
                acc | (u8::from(point[axis] >= centre[axis]) << axis)
            });
            c = c.child_coordinate(octant).ok()?;
        }
    }

    /// Replaces the leaf set with cubes read from a record stream. Triangle
    /// lists of `Data` leaves are recomputed from the surface.
    pub fn load_leaves(&mut self, cubes: Vec<OctreeCube>) -> MeshResult<()> {
        let mut leaves = BTreeMap::new();
        let mut contained = HashMap::new();
        for cube in cubes {
            let c = *cube.coordinate();
            if cube.cube_type() == CubeType::Data {
                let bb = self.cube_box(&c);
                contained.insert(c, self.surface.triangles_in_box(bb.min, bb.max));
            }
            if leaves.insert(c, cube).is_some() {
                return Err(MeshError::consistency(format!("duplicate leaf {c}")));
            }
        }
        let volume: f64 = leaves.keys().map(|c| 0.125f64.powi(i32::from(c.level()))).sum();
        if (volume - 1.0).abs() > 1.0e-12 {
            return Err(MeshError::consistency(format!(
                "leaves cover {volume} of the root box"
            )));
        }
        self.leaves = leaves;
        self.contained = contained;
        Ok(())
    }

    fn needs_refinement(&self, cube: &OctreeCube, curvature_tol: f64) -> bool {
        let c = cube.coordinate();
        if self
            .max_cell_size
            .is_some_and(|max| c.size(&self.root_box) > max)
        {
            return true;
        }
        if cube.cube_type() != CubeType::Data {
            return false;
        }
        let triangles = self.contained_triangles(c);
        triangles.len() > self.max_triangles_per_leaf || self.curvature(triangles) > curvature_tol
    }

    /// `1 - min(n_i . n_j)` over the unit normals of the triangles in a leaf.
    fn curvature(&self, triangles: &[usize]) -> f64 {
        let normals: Vec<Vec3> = triangles
            .iter()
            .map(|&t| self.surface.triangle_normal(t))
            .collect();
        let mut min_dot: f64 = 1.0;
        for (i, a) in normals.iter().enumerate() {
            for b in &normals[i + 1..] {
                min_dot = min_dot.min(a.dot(*b));
            }
        }
        1.0 - min_dot
    }

    fn split(&mut self, coordinate: &CubeCoordinate) -> MeshResult<()> {
        let Some(parent) = self.leaves.remove(coordinate) else {
            return Ok(());
        };
        let parent_triangles = self.contained.remove(coordinate).unwrap_or_default();

        for child_coordinate in coordinate.refine()? {
            let mut child = parent.child(child_coordinate);
            let cube_type = match parent.cube_type() {
                CubeType::Data => {
                    let bb = self.cube_box(&child_coordinate);
                    let triangles = self
                        .surface
                        .filter_in_box(parent_triangles.clone(), bb.min, bb.max);
                    if triangles.is_empty() {
                        outside_or_inside(self.surface, bb.centre())
                    } else {
                        self.contained.insert(child_coordinate, triangles);
                        CubeType::Data
                    }
                }
                other => other,
            };
            child.set_cube_type(cube_type)?;
            self.leaves.insert(child_coordinate, child);
        }
        Ok(())
    }
}

fn outside_or_inside(surface: &TriSurface, point: Vec3) -> CubeType {
    if surface.is_inside(point) {
        CubeType::Inside
    } else {
        CubeType::Outside
    }
}

/// True if `c` lies on the `side` face of its parent.
fn touches_side(c: &CubeCoordinate, side: Direction) -> bool {
    let bit = c.position()[side.axis()] & 1;
    (bit == 1) == side.is_positive()
}

#[cfg(test)]
mod tests;
