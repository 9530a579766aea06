//! # Boundary Layer Optimiser
//!
//! Works on the prism columns ("hair edges") grown from the wall into the
//! volume. Each iteration smooths the wall normals, limits every hair to
//! `featureSizeFactor` times the local feature size, keeps neighbouring
//! thicknesses within `relThicknessTol` of the edge length between them,
//! shrinks crossing hairs and moves the hair tips in one topology batch.
//!
//! Non-convergence within `maxNumIterations` is reported, not fatal.
//!
//! ## Example
//!
//! ```rust
//! use octree_mesh::boundary_layer::BoundaryLayerOptimiser;
//! use octree_mesh::ExecutionContext;
//! # use octree_mesh::{mesh_from_octree, Octree, BoundingBox, Vec3};
//! # use octree_mesh::surface::primitives::box_surface;
//! # let surface = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
//! # let root = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(1.5));
//! # let mut octree = Octree::with_root_box(&surface, root).unwrap();
//! # octree.refine_to_surface(2, 0.1).unwrap();
//! let mut mesh = mesh_from_octree(&octree).unwrap();
//! let mut optimiser = BoundaryLayerOptimiser::new(&mut mesh, ExecutionContext::serial()).unwrap();
//! let report = optimiser.optimise_layer().unwrap();
//! assert!(report.iterations <= 5);
//! ```

pub mod hair_edges;

pub use hair_edges::{detect_hair_edges, HairEdges};

use crate::config::BoundaryLayers;
use crate::context::ExecutionContext;
use crate::core::{BoundingBox, Vec3};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::error::{MeshError, MeshResult};
use crate::mesh::{polygon_centre_and_area, PolyMesh, SurfaceEngine};
use crate::topology::{PointRef, TopologyEdit, TopologyEditor};
use config::constants::{
    DEFAULT_FEATURE_SIZE_FACTOR, DEFAULT_MAX_NUM_ITERATIONS, DEFAULT_N_SMOOTH_NORMALS,
    EPSILON_TOLERANCE, REL_THICKNESS_TOL_BORROWED, REL_THICKNESS_TOL_OWNED,
};
use std::ops::Deref;
use tracing::{debug, info, warn};

// =============================================================================
// SURFACE ENGINE OWNERSHIP
// =============================================================================

/// Boundary engine either built by the optimiser or lent by the caller.
#[derive(Debug)]
pub enum SurfaceEngineHandle<'a> {
    /// Built and dropped by the optimiser.
    Owned(Box<SurfaceEngine>),
    /// Lent by the caller; never dropped here.
    Borrowed(&'a SurfaceEngine),
}

impl SurfaceEngineHandle<'_> {
    /// True if the optimiser built the engine itself.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl Deref for SurfaceEngineHandle<'_> {
    type Target = SurfaceEngine;

    fn deref(&self) -> &SurfaceEngine {
        match self {
            Self::Owned(engine) => engine,
            Self::Borrowed(engine) => engine,
        }
    }
}

// =============================================================================
// SETTINGS AND REPORT
// =============================================================================

/// Optimiser tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSettings {
    /// Run the optimiser at all.
    pub optimise_layer: bool,
    /// Recompute point normals on every call.
    pub recalculate_normals: bool,
    /// Normal smoothing passes.
    pub n_smooth_normals: u32,
    /// Thickness limit relative to the local feature size, in `[0, 1)`.
    pub feature_size_factor: f64,
    /// Thickness jump limit relative to edge length, in `[0, 1)`.
    pub rel_thickness_tol: f64,
    /// Iteration cap.
    pub max_num_iterations: u32,
}

impl LayerSettings {
    fn with_rel_thickness_tol(rel_thickness_tol: f64) -> Self {
        Self {
            optimise_layer: true,
            recalculate_normals: true,
            n_smooth_normals: DEFAULT_N_SMOOTH_NORMALS,
            feature_size_factor: DEFAULT_FEATURE_SIZE_FACTOR,
            rel_thickness_tol,
            max_num_iterations: DEFAULT_MAX_NUM_ITERATIONS,
        }
    }
}

/// Outcome of [`BoundaryLayerOptimiser::optimise_layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerReport {
    /// False when the optimiser was switched off.
    pub ran: bool,
    /// Iterations performed.
    pub iterations: u32,
    /// True if no violation remained.
    pub converged: bool,
    /// Violations left when the iteration cap was hit.
    pub violations: usize,
    /// Hair edges flagged as thinned.
    pub thinned: usize,
}

// =============================================================================
// OPTIMISER
// =============================================================================

/// Smooths and limits the thickness of the boundary layer of a mesh.
#[derive(Debug)]
pub struct BoundaryLayerOptimiser<'a> {
    mesh: &'a mut PolyMesh,
    engine: SurfaceEngineHandle<'a>,
    settings: LayerSettings,
    hairs: Option<HairEdges>,
    normals: Vec<Vec3>,
    thinned_hair_edge: Vec<bool>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> BoundaryLayerOptimiser<'a> {
    /// Creates an optimiser that builds and owns its boundary engine.
    pub fn new(mesh: &'a mut PolyMesh, context: ExecutionContext) -> MeshResult<Self> {
        context.require_no_comm_region("BoundaryLayerOptimiser")?;
        let engine = SurfaceEngine::new(&*mesh);
        Ok(Self::with_handle(
            mesh,
            SurfaceEngineHandle::Owned(Box::new(engine)),
            LayerSettings::with_rel_thickness_tol(REL_THICKNESS_TOL_OWNED),
        ))
    }

    /// Creates an optimiser over a boundary engine owned by the caller.
    pub fn with_surface_engine(
        mesh: &'a mut PolyMesh,
        engine: &'a SurfaceEngine,
        context: ExecutionContext,
    ) -> MeshResult<Self> {
        context.require_no_comm_region("BoundaryLayerOptimiser")?;
        let boundary_matches = engine.boundary_faces().len() == mesh.boundary_faces().len()
            && engine.boundary_points().iter().all(|&p| p < mesh.n_points());
        if !boundary_matches {
            return Err(MeshError::consistency(
                "surface engine was built for a different mesh",
            ));
        }
        Ok(Self::with_handle(
            mesh,
            SurfaceEngineHandle::Borrowed(engine),
            LayerSettings::with_rel_thickness_tol(REL_THICKNESS_TOL_BORROWED),
        ))
    }

    fn with_handle(mesh: &'a mut PolyMesh, engine: SurfaceEngineHandle<'a>, settings: LayerSettings) -> Self {
        Self {
            mesh,
            engine,
            settings,
            hairs: None,
            normals: Vec::new(),
            thinned_hair_edge: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Applies the `boundaryLayers` dictionary section. Everything is
    /// validated before any setting changes.
    pub fn read_settings(&mut self, dict: &BoundaryLayers) -> MeshResult<()> {
        let params = &dict.optimisation_parameters;
        params.validate()?;

        self.settings.optimise_layer = dict.optimise_layer;
        self.settings.recalculate_normals = params.recalculate_normals;
        self.settings.n_smooth_normals = params.n_smooth_normals;
        self.settings.feature_size_factor = params.feature_size_factor;
        if let Some(tol) = params.rel_thickness_tol {
            self.settings.rel_thickness_tol = tol;
        }
        self.settings.max_num_iterations = params.max_num_iterations;
        debug!(settings = ?self.settings, "layer settings read");
        Ok(())
    }

    /// Current settings.
    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    /// The mesh being optimised.
    pub fn mesh(&self) -> &PolyMesh {
        &*self.mesh
    }

    /// Boundary engine in use.
    pub fn surface_engine(&self) -> &SurfaceEngine {
        &self.engine
    }

    /// True if the boundary engine was built by the optimiser.
    pub fn owns_surface_engine(&self) -> bool {
        self.engine.is_owned()
    }

    /// Hair edges `[base, tip]`; empty until calculated.
    pub fn hair_edges(&self) -> &[[usize; 2]] {
        self.hairs.as_ref().map_or(&[], |h| h.edges.as_slice())
    }

    /// Hair edges per boundary point.
    pub fn hair_edges_at_bnd_point(&self) -> &[Vec<usize>] {
        self.hairs.as_ref().map_or(&[], |h| h.at_bnd_point.as_slice())
    }

    /// Base flag per boundary face.
    pub fn is_base_face(&self) -> &[bool] {
        self.hairs.as_ref().map_or(&[], |h| h.is_base_face.as_slice())
    }

    /// Exit flag per boundary face.
    pub fn is_exit_face(&self) -> &[bool] {
        self.hairs.as_ref().map_or(&[], |h| h.is_exit_face.as_slice())
    }

    /// Hair edges whose thickness was reduced.
    pub fn thinned_hair_edge(&self) -> &[bool] {
        &self.thinned_hair_edge
    }

    /// Smoothed outward normal per boundary point.
    pub fn point_normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Soft conditions recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drains the recorded diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Detects the hair edges and computes the smoothed wall normals.
    pub fn calculate_hair_edges(&mut self) {
        let hairs = detect_hair_edges(&*self.mesh, &self.engine);
        debug!(
            hair_edges = hairs.len(),
            base_faces = hairs.is_base_face.iter().filter(|&&b| b).count(),
            "hair edges detected"
        );
        self.thinned_hair_edge = vec![false; hairs.len()];
        self.hairs = Some(hairs);
        if self.settings.recalculate_normals || self.normals.is_empty() {
            self.normals = self.smoothed_normals();
        }
    }

    fn face_area_vectors(&self) -> Vec<Vec3> {
        self.engine
            .faces()
            .iter()
            .map(|face| polygon_centre_and_area(self.mesh.points(), face).1)
            .collect()
    }

    /// Area-weighted point normals, smoothed `n_smooth_normals` times over
    /// the neighbouring faces.
    fn smoothed_normals(&self) -> Vec<Vec3> {
        let areas = self.face_area_vectors();
        let point_faces = self.engine.point_faces();
        let mut normals: Vec<Vec3> = point_faces
            .iter()
            .map(|faces| faces.iter().map(|&f| areas[f]).sum::<Vec3>().normalize_or_zero())
            .collect();

        for _ in 0..self.settings.n_smooth_normals {
            let face_normals: Vec<Vec3> = self
                .engine
                .faces()
                .iter()
                .map(|face| {
                    face.iter()
                        .filter_map(|p| self.engine.boundary_point_index(*p))
                        .map(|i| normals[i])
                        .sum::<Vec3>()
                        .normalize_or_zero()
                })
                .collect();
            normals = point_faces
                .iter()
                .map(|faces| {
                    faces
                        .iter()
                        .map(|&f| face_normals[f] * areas[f].length())
                        .sum::<Vec3>()
                        .normalize_or_zero()
                })
                .collect();
        }
        normals
    }

    /// Distance from `base` along `dir` to the nearest boundary face that
    /// does not contain `base`. A face is hit when the ray meets its plane
    /// inside the slightly padded bounding box of the face.
    fn feature_size(&self, base: usize, dir: Vec3) -> Option<f64> {
        let points = self.mesh.points();
        let origin = points[base];
        self.engine
            .faces()
            .iter()
            .filter(|face| !face.contains(&base))
            .filter_map(|face| {
                let (centre, area) = polygon_centre_and_area(points, face);
                let normal = area.normalize_or_zero();
                let denom = dir.dot(normal);
                if denom.abs() < EPSILON_TOLERANCE {
                    return None;
                }
                let t = (centre - origin).dot(normal) / denom;
                let bounds = BoundingBox::from_points(face.iter().map(|&p| &points[p]));
                let pad = Vec3::splat(EPSILON_TOLERANCE.sqrt() * bounds.diagonal());
                let hit = origin + dir * t;
                (t > EPSILON_TOLERANCE && BoundingBox::new(bounds.min - pad, bounds.max + pad).contains(hit))
                    .then_some(t)
            })
            .min_by(f64::total_cmp)
    }

    /// Hair direction: the inward smoothed normal for single columns, the
    /// current edge direction otherwise.
    fn hair_directions(&self, hairs: &HairEdges) -> Vec<Vec3> {
        let points = self.mesh.points();
        hairs
            .edges
            .iter()
            .map(|&[base, tip]| {
                let current = (points[tip] - points[base]).normalize_or_zero();
                let Some(i) = self.engine.boundary_point_index(base) else {
                    return current;
                };
                let inward = -self.normals.get(i).copied().unwrap_or(Vec3::ZERO);
                if hairs.at_bnd_point[i].len() == 1 && inward.dot(current) > 0.0 {
                    inward
                } else {
                    current
                }
            })
            .collect()
    }

    /// Clips `thickness` to the feature size and relative thickness limits
    /// and shrinks crossing hairs. Returns the number of violations found.
    fn constrain(
        &self,
        hairs: &HairEdges,
        dirs: &[Vec3],
        thickness: &mut [f64],
        thinned: &mut [bool],
    ) -> usize {
        let points = self.mesh.points();
        let mut violations = 0;

        for (h, &[base, _]) in hairs.edges.iter().enumerate() {
            let Some(size) = self.feature_size(base, dirs[h]) else {
                continue;
            };
            let bound = self.settings.feature_size_factor * size;
            if thickness[h] > bound * (1.0 + EPSILON_TOLERANCE) {
                thickness[h] = bound;
                thinned[h] = true;
                violations += 1;
            }
        }

        let single = |p: usize| {
            self.engine
                .boundary_point_index(p)
                .and_then(|i| match hairs.at_bnd_point[i].as_slice() {
                    [h] => Some(*h),
                    _ => None,
                })
        };
        for &[a, b] in self.engine.edges() {
            let (Some(ha), Some(hb)) = (single(a), single(b)) else {
                continue;
            };
            let length = points[a].distance(points[b]);
            let allowed = self.settings.rel_thickness_tol * length;
            let slack = EPSILON_TOLERANCE * length;
            if thickness[ha] > thickness[hb] + allowed + slack {
                thickness[ha] = thickness[hb] + allowed;
                thinned[ha] = true;
                violations += 1;
            } else if thickness[hb] > thickness[ha] + allowed + slack {
                thickness[hb] = thickness[ha] + allowed;
                thinned[hb] = true;
                violations += 1;
            }

            let tip_a = points[a] + dirs[ha] * thickness[ha];
            let tip_b = points[b] + dirs[hb] * thickness[hb];
            if (tip_b - tip_a).dot(points[b] - points[a]) <= 0.0 {
                thickness[ha] *= 0.5;
                thickness[hb] *= 0.5;
                thinned[ha] = true;
                thinned[hb] = true;
                violations += 1;
            }
        }
        violations
    }

    /// Iteratively limits and smooths the layer. Does nothing when
    /// `optimiseLayer` is off.
    pub fn optimise_layer(&mut self) -> MeshResult<LayerReport> {
        if !self.settings.optimise_layer {
            debug!("layer optimisation switched off");
            return Ok(LayerReport::default());
        }
        if self.hairs.is_none() || self.settings.recalculate_normals {
            self.calculate_hair_edges();
        }
        let Some(mut hairs) = self.hairs.take() else {
            return Ok(LayerReport::default());
        };

        let mut report = LayerReport {
            ran: true,
            ..LayerReport::default()
        };
        let mut thinned = std::mem::take(&mut self.thinned_hair_edge);
        thinned.resize(hairs.len(), false);

        while report.iterations < self.settings.max_num_iterations {
            report.iterations += 1;
            let dirs = self.hair_directions(&hairs);
            let points = self.mesh.points();
            let mut thickness: Vec<f64> = hairs
                .edges
                .iter()
                .map(|&[base, tip]| points[base].distance(points[tip]))
                .collect();
            let violations = self.constrain(&hairs, &dirs, &mut thickness, &mut thinned);

            let moves: Vec<TopologyEdit> = hairs
                .edges
                .iter()
                .enumerate()
                .filter_map(|(h, &[base, tip])| {
                    let target = points[base] + dirs[h] * thickness[h];
                    let tol = EPSILON_TOLERANCE * points[base].distance(points[tip]).max(EPSILON_TOLERANCE);
                    (target.distance(points[tip]) > tol).then_some(TopologyEdit::MovePoint {
                        point: PointRef::Existing(tip),
                        position: target,
                    })
                })
                .collect();
            debug!(
                iteration = report.iterations,
                violations,
                moves = moves.len(),
                "layer iteration"
            );
            if violations == 0 && moves.is_empty() {
                report.converged = true;
                break;
            }
            if moves.is_empty() {
                continue;
            }

            let mut editor = TopologyEditor::new(&mut *self.mesh);
            editor.begin_batch()?;
            for edit in moves {
                editor.push(edit)?;
            }
            match editor.change_mesh() {
                Ok(map) => {
                    for hair in hairs.edges.iter_mut() {
                        for p in hair.iter_mut() {
                            let old = *p;
                            *p = map.reverse_point_map.get(old).copied().flatten().ok_or_else(|| {
                                MeshError::consistency(format!("hair point {old} vanished"))
                            })?;
                        }
                    }
                    if let SurfaceEngineHandle::Owned(engine) = &mut self.engine {
                        engine.update_points(&*self.mesh);
                    }
                }
                Err(MeshError::TopologyChangeRejected { reason, .. }) => {
                    warn!(%reason, "hair tip move rejected, keeping previous layer");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        if !report.converged {
            let dirs = self.hair_directions(&hairs);
            let points = self.mesh.points();
            let mut thickness: Vec<f64> = hairs
                .edges
                .iter()
                .map(|&[base, tip]| points[base].distance(points[tip]))
                .collect();
            let mut scratch = thinned.clone();
            report.violations = self.constrain(&hairs, &dirs, &mut thickness, &mut scratch);
            report.converged = report.violations == 0;
        }
        if !report.converged {
            warn!(
                iterations = report.iterations,
                violations = report.violations,
                "boundary layer did not converge"
            );
            self.diagnostics.push(Diagnostic::warning(
                Stage::BoundaryLayer,
                DiagnosticKind::LayerNotConverged {
                    iterations: report.iterations,
                    violations: report.violations,
                },
                format!(
                    "{} layer violations left after {} iterations",
                    report.violations, report.iterations
                ),
            ));
        }

        report.thinned = thinned.iter().filter(|&&t| t).count();
        if report.thinned > 0 {
            warn!(count = report.thinned, "hair edges thinned");
            self.diagnostics.push(Diagnostic::warning(
                Stage::BoundaryLayer,
                DiagnosticKind::HairEdgesThinned {
                    count: report.thinned,
                },
                format!("{} hair edges thinned to respect thickness limits", report.thinned),
            ));
        }

        info!(
            hair_edges = hairs.len(),
            iterations = report.iterations,
            converged = report.converged,
            thinned = report.thinned,
            "boundary layer optimised"
        );
        self.thinned_hair_edge = thinned;
        self.hairs = Some(hairs);
        Ok(report)
    }
}
