//! # Surface Edge Extractor
//!
//! Turns a classified octree into a boundary-conforming mesh: builds the
//! hexahedral mesh of the interior, snaps its boundary onto the input
//! surface, assigns every boundary face to the nearest surface region,
//! detects feature edges and corners, and inserts a fundamental sheet where
//! a cell touches more than one patch.
//!
//! Runs on a single partition only; see [`ExecutionContext::require_serial`].

pub mod features;

pub use features::{detect_features, remap_boundary_points, FeatureEdge, Features};

use crate::context::ExecutionContext;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use crate::error::{MeshError, MeshResult};
use crate::mesh::{build_octree_mesh, Patch, PolyMesh, SurfaceEngine};
use crate::octree::Octree;
use crate::surface::TriSurface;
use crate::core::Vec3;
use crate::topology::{PointRef, TopologyEdit, TopologyEditor, TopologyMap};
use config::constants::{DEFAULT_FEATURE_ANGLE_DEG, EPSILON_TOLERANCE, FUNDAMENTAL_SHEET_FRACTION};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Shares of the projection distance tried in turn when snapping the
/// boundary; the last one leaves the points where they are.
const PROJECTION_STEPS: [f64; 4] = [1.0, 0.5, 0.25, 0.0];

/// Extractor tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorSettings {
    /// Dihedral angle (degrees) above which a boundary edge is a feature.
    pub feature_angle: f64,
    /// Insert a fundamental sheet where cells touch several patches.
    pub insert_sheets: bool,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            feature_angle: DEFAULT_FEATURE_ANGLE_DEG,
            insert_sheets: true,
        }
    }
}

/// Result of [`SurfaceEdgeExtractor::extract`].
#[derive(Debug, Clone)]
pub struct SurfaceExtraction {
    /// Boundary-conforming mesh.
    pub mesh: PolyMesh,
    /// Feature edges and corners, in the labels of `mesh`.
    pub features: Features,
    /// True if a fundamental sheet was inserted.
    pub sheet_inserted: bool,
    /// Soft conditions met during extraction.
    pub diagnostics: Vec<Diagnostic>,
}

impl SurfaceExtraction {
    /// Boundary patches of the mesh.
    pub fn patches(&self) -> &[Patch] {
        self.mesh.patches()
    }
}

/// Extracts the boundary representation from a classified octree.
#[derive(Debug, Clone)]
pub struct SurfaceEdgeExtractor {
    context: ExecutionContext,
    settings: ExtractorSettings,
}

impl SurfaceEdgeExtractor {
    /// Creates an extractor after validating `settings`.
    pub fn new(context: ExecutionContext, settings: ExtractorSettings) -> MeshResult<Self> {
        if !(settings.feature_angle > 0.0 && settings.feature_angle < 180.0) {
            return Err(MeshError::configuration(
                "featureAngle",
                format!("{} is outside (0, 180)", settings.feature_angle),
            ));
        }
        Ok(Self { context, settings })
    }

    /// Runs the extraction.
    pub fn extract(&self, octree: &Octree<'_>, surface: &TriSurface) -> MeshResult<SurfaceExtraction> {
        self.context.require_serial("SurfaceEdgeExtractor")?;

        let (mut mesh, removed) = build_octree_mesh(octree)?;
        let mut diagnostics = Vec::new();
        if removed > 0 {
            warn!(cells = removed, "irregular boundary connections cut");
            diagnostics.push(Diagnostic::warning(
                Stage::SurfaceExtraction,
                DiagnosticKind::IrregularCellsRemoved { cells: removed },
                format!("{removed} cells touching the domain only along an edge or a corner were removed"),
            ));
        }
        info!(
            cells = mesh.n_cells(),
            boundary_faces = mesh.boundary_faces().len(),
            "extracting surface"
        );

        self.map_to_surface(&mut mesh, surface, &mut diagnostics)?;

        let engine = SurfaceEngine::new(&mesh);
        let mut features = detect_features(&engine, self.settings.feature_angle);
        debug!(
            feature_edges = features.edges.len(),
            corners = features.corners.len(),
            "features detected"
        );

        let mixed = cells_touching_several_patches(&mesh);
        let mut sheet_inserted = false;
        if self.settings.insert_sheets && !mixed.is_empty() {
            debug!(cells = mixed.len(), "inserting fundamental sheet");
            if let Some(map) = grow_layer_or_skip(
                &mut mesh,
                FUNDAMENTAL_SHEET_FRACTION,
                Stage::SurfaceExtraction,
                &mut diagnostics,
            )? {
                features = remap_boundary_points(&features, &map);
                sheet_inserted = true;
            }
        }

        info!(
            patches = mesh.patches().len(),
            feature_edges = features.edges.len(),
            corners = features.corners.len(),
            sheet_inserted,
            "surface extracted"
        );
        Ok(SurfaceExtraction {
            mesh,
            features,
            sheet_inserted,
            diagnostics,
        })
    }

    /// Projects boundary points onto the surface and assigns each boundary
    /// face to the region nearest its centre, in one batch. When the full
    /// projection would invert cells the points are moved only part of the
    /// way, down to not at all.
    fn map_to_surface(
        &self,
        mesh: &mut PolyMesh,
        surface: &TriSurface,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> MeshResult<()> {
        let engine = SurfaceEngine::new(mesh);
        let tol = EPSILON_TOLERANCE * surface.bounding_box().diagonal();

        let mut projected = engine.positions().to_vec();
        for x in projected.iter_mut() {
            if let Some(hit) = surface.nearest(*x) {
                *x = hit.point;
            }
        }
        let mut snapped = engine.clone();
        snapped.set_positions(projected.clone());

        let regions: Vec<usize> = snapped
            .face_centres()
            .into_iter()
            .map(|c| surface.nearest_region(c, tol).map_or(0, |(r, _)| r))
            .collect();

        let used: BTreeSet<usize> = regions.iter().copied().collect();
        let mut names = Vec::new();
        let mut patch_of_region = vec![None; surface.patch_names().len()];
        for (region, name) in surface.patch_names().iter().enumerate() {
            if used.contains(&region) {
                patch_of_region[region] = Some(names.len());
                names.push(name.clone());
            } else {
                warn!(patch = %name, "dropping empty patch");
                diagnostics.push(Diagnostic::warning(
                    Stage::SurfaceExtraction,
                    DiagnosticKind::EmptyPatchDropped { patch: name.clone() },
                    format!("patch '{name}' received no faces"),
                ));
            }
        }

        let mut patch_of_face = Vec::with_capacity(regions.len());
        for &region in &regions {
            let patch = patch_of_region
                .get(region)
                .copied()
                .flatten()
                .ok_or_else(|| MeshError::consistency(format!("region {region} has no patch")))?;
            patch_of_face.push(patch);
        }

        for fraction in PROJECTION_STEPS {
            let targets: Vec<Vec3> = engine
                .positions()
                .iter()
                .zip(&projected)
                .map(|(&old, &new)| old + fraction * (new - old))
                .collect();
            let mut editor = TopologyEditor::new(&mut *mesh);
            editor.begin_batch()?;
            for (i, (&p, &x)) in engine.boundary_points().iter().zip(&targets).enumerate() {
                if x != engine.positions()[i] {
                    editor.push(TopologyEdit::MovePoint {
                        point: PointRef::Existing(p),
                        position: x,
                    })?;
                }
            }
            editor.push(TopologyEdit::DefinePatches { names: names.clone() })?;
            for (&face, &patch) in engine.boundary_faces().iter().zip(&patch_of_face) {
                editor.push(TopologyEdit::SetPatch { face, patch })?;
            }
            match editor.change_mesh() {
                Ok(_) => {
                    if fraction < 1.0 {
                        warn!(fraction, "boundary projection damped");
                        diagnostics.push(Diagnostic::warning(
                            Stage::SurfaceExtraction,
                            DiagnosticKind::ProjectionDamped { fraction },
                            format!("boundary points moved {fraction} of the way to the surface"),
                        ));
                    }
                    break;
                }
                Err(MeshError::TopologyChangeRejected { reason, .. }) if fraction > 0.0 => {
                    debug!(fraction, %reason, "projection rejected, damping");
                }
                Err(e) => return Err(e),
            }
        }
        debug!(patches = mesh.patches().len(), "boundary mapped to surface");
        Ok(())
    }
}

/// Grows one layer of prisms under every boundary face.
///
/// A refused layer leaves `mesh` untouched, records a
/// [`DiagnosticKind::LayerSkipped`] warning and returns `None`; other
/// errors are propagated.
pub(crate) fn grow_layer_or_skip(
    mesh: &mut PolyMesh,
    fraction: f64,
    stage: Stage,
    diagnostics: &mut Vec<Diagnostic>,
) -> MeshResult<Option<TopologyMap>> {
    let faces: Vec<usize> = mesh.boundary_faces().collect();
    let mut editor = TopologyEditor::new(mesh);
    editor.begin_batch()?;
    editor.push(TopologyEdit::InsertLayer { faces, fraction })?;
    match editor.change_mesh() {
        Ok(map) => Ok(Some(map)),
        Err(MeshError::TopologyChangeRejected { reason, .. }) => {
            warn!(%reason, "layer skipped");
            diagnostics.push(Diagnostic::warning(
                stage,
                DiagnosticKind::LayerSkipped { reason: reason.clone() },
                format!("layer not inserted: {reason}"),
            ));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Cells whose boundary faces lie in more than one patch.
pub fn cells_touching_several_patches(mesh: &PolyMesh) -> Vec<usize> {
    let mut patches: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); mesh.n_cells()];
    for (p, patch) in mesh.patches().iter().enumerate() {
        for f in patch.range() {
            patches[mesh.owner()[f]].insert(p);
        }
    }
    patches
        .iter()
        .enumerate()
        .filter(|(_, s)| s.len() > 1)
        .map(|(c, _)| c)
        .collect()
}

#[cfg(test)]
mod tests;
