//! # Mesh Generator
//!
//! Drives the whole pipeline for one surface:
//!
//! ```text
//! TriSurface + MeshDict
//!       ↓
//! Octree::refine_to_surface (balanced after every sweep)
//!       ↓
//! SurfaceEdgeExtractor (patches, features, fundamental sheet)
//!       ↓
//! TopologyEditor::InsertLayer × nLayers
//!       ↓
//! BoundaryLayerOptimiser (if optimiseLayer)
//! ```
//!
//! The dictionary is validated when the generator is built, so a bad value
//! never reaches a mesh.

use crate::boundary_layer::{BoundaryLayerOptimiser, LayerReport};
use crate::config::MeshDict;
use crate::context::ExecutionContext;
use crate::diagnostics::{Diagnostic, Stage};
use crate::error::MeshResult;
use crate::extractor::{
    grow_layer_or_skip, remap_boundary_points, ExtractorSettings, Features, SurfaceEdgeExtractor,
};
use crate::mesh::PolyMesh;
use crate::octree::Octree;
use crate::surface::TriSurface;
use tracing::{debug, info};

/// Finished mesh and its boundary description.
#[derive(Debug, Clone)]
pub struct GeneratedMesh {
    /// Polyhedral mesh with named boundary patches.
    pub mesh: PolyMesh,
    /// Feature edges and corners in the labels of `mesh`.
    pub features: Features,
    /// True if a fundamental sheet was inserted.
    pub sheet_inserted: bool,
    /// Number of octree leaves the mesh was built from.
    pub octree_leaves: usize,
    /// Layer optimisation outcome, if it ran.
    pub layer: Option<LayerReport>,
    /// Soft conditions from every stage, in order.
    pub diagnostics: Vec<Diagnostic>,
}

impl GeneratedMesh {
    /// True if any stage reported a warning.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_warning)
    }
}

/// Runs octree refinement, surface extraction and layer optimisation.
///
/// # Examples
/// ```
/// use octree_mesh::{ExecutionContext, MeshDict, MeshGenerator, Vec3};
/// use octree_mesh::surface::primitives::box_surface;
///
/// let surface = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
/// let mut dict = MeshDict::default();
/// dict.octree_refinement.max_level = 2;
/// dict.octree_refinement.root_box_margin = 0.5;
/// let result = MeshGenerator::new(&surface, dict, ExecutionContext::serial())
///     .unwrap()
///     .generate()
///     .unwrap();
/// assert_eq!(result.mesh.patches().len(), 6);
/// ```
#[derive(Debug, Clone)]
pub struct MeshGenerator<'s> {
    surface: &'s TriSurface,
    dict: MeshDict,
    context: ExecutionContext,
}

impl<'s> MeshGenerator<'s> {
    /// Creates a generator after validating `dict`.
    pub fn new(surface: &'s TriSurface, dict: MeshDict, context: ExecutionContext) -> MeshResult<Self> {
        dict.validate()?;
        Ok(Self {
            surface,
            dict,
            context,
        })
    }

    /// Creates a generator from a JSON meshing dictionary.
    pub fn from_json(surface: &'s TriSurface, text: &str, context: ExecutionContext) -> MeshResult<Self> {
        Self::new(surface, MeshDict::from_json(text)?, context)
    }

    /// The validated dictionary.
    pub fn dict(&self) -> &MeshDict {
        &self.dict
    }

    /// Runs the pipeline.
    pub fn generate(&self) -> MeshResult<GeneratedMesh> {
        let refinement = &self.dict.octree_refinement;
        let mut diagnostics = Vec::new();

        let mut octree = Octree::new(self.surface, refinement.root_box_margin)?
            .with_max_triangles_per_leaf(refinement.max_triangles_per_leaf)
            .with_max_cell_size(refinement.max_cell_size);
        octree.refine_to_surface(refinement.max_level, refinement.curvature_tolerance)?;
        diagnostics.extend(octree.take_diagnostics());
        let octree_leaves = octree.leaf_count();
        debug!(leaves = octree_leaves, max_level = octree.max_leaf_level(), "octree ready");

        let extraction = &self.dict.surface_extraction;
        let extractor = SurfaceEdgeExtractor::new(
            self.context,
            ExtractorSettings {
                feature_angle: extraction.feature_angle,
                insert_sheets: extraction.insert_fundamental_sheets,
            },
        )?;
        let extracted = extractor.extract(&octree, self.surface)?;
        diagnostics.extend(extracted.diagnostics);
        let mut mesh = extracted.mesh;
        let mut features = extracted.features;

        let layers = &self.dict.boundary_layers;
        for layer in 0..layers.n_layers {
            let grown = grow_layer_or_skip(
                &mut mesh,
                layers.layer_fraction,
                Stage::BoundaryLayer,
                &mut diagnostics,
            )?;
            let Some(map) = grown else { break };
            features = remap_boundary_points(&features, &map);
            debug!(layer, cells = mesh.n_cells(), "boundary layer grown");
        }

        let layer = if layers.optimise_layer {
            let mut optimiser = BoundaryLayerOptimiser::new(&mut mesh, self.context)?;
            optimiser.read_settings(layers)?;
            let report = optimiser.optimise_layer()?;
            diagnostics.extend(optimiser.take_diagnostics());
            Some(report)
        } else {
            None
        };

        info!(
            cells = mesh.n_cells(),
            points = mesh.n_points(),
            faces = mesh.n_faces(),
            patches = mesh.patches().len(),
            warnings = diagnostics.iter().filter(|d| d.is_warning()).count(),
            "mesh generated"
        );
        Ok(GeneratedMesh {
            mesh,
            features,
            sheet_inserted: extracted.sheet_inserted,
            octree_leaves,
            layer,
            diagnostics,
        })
    }
}
