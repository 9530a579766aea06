//! Meshing dictionary.
//!
//! The dictionary is read from JSON with the keys used verbatim by the
//! meshing tools (`boundaryLayers.optimisationParameters.featureSizeFactor`
//! and so on). Missing keys take the defaults from the shared `config` crate.
//! [`MeshDict::validate`] runs before anything touches a mesh.

use crate::error::{MeshError, MeshResult};
use config::constants::{
    GlobalConfig, DEFAULT_CURVATURE_TOLERANCE, DEFAULT_FEATURE_ANGLE_DEG,
    DEFAULT_FEATURE_SIZE_FACTOR, DEFAULT_MAX_LEVEL, DEFAULT_MAX_NUM_ITERATIONS,
    DEFAULT_MAX_TRIANGLES_PER_LEAF, DEFAULT_N_SMOOTH_NORMALS, DEFAULT_ROOT_BOX_MARGIN,
    EPSILON_TOLERANCE, FUNDAMENTAL_SHEET_FRACTION,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level meshing dictionary.
///
/// # Examples
/// ```
/// use octree_mesh::config::MeshDict;
///
/// let dict = MeshDict::from_json(r#"{
///     "octreeRefinement": { "maxLevel": 4 },
///     "boundaryLayers": {
///         "optimiseLayer": true,
///         "optimisationParameters": { "featureSizeFactor": 0.5 }
///     }
/// }"#).unwrap();
/// assert_eq!(dict.octree_refinement.max_level, 4);
/// assert_eq!(dict.boundary_layers.optimisation_parameters.feature_size_factor, 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshDict {
    /// Octree refinement controls.
    pub octree_refinement: OctreeRefinement,
    /// Surface extraction controls.
    pub surface_extraction: SurfaceExtractionDict,
    /// Boundary layer growth and optimisation.
    pub boundary_layers: BoundaryLayers,
}

/// `octreeRefinement` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OctreeRefinement {
    /// Deepest refinement level.
    pub max_level: u8,
    /// Split DATA cubes whose normal spread `1 - min(n_i . n_j)` exceeds this.
    pub curvature_tolerance: f64,
    /// Split DATA cubes holding more triangles than this.
    pub max_triangles_per_leaf: usize,
    /// Background cell size; cubes larger than this are split.
    pub max_cell_size: Option<f64>,
    /// Relative enlargement of the surface bounding cube.
    pub root_box_margin: f64,
}

impl Default for OctreeRefinement {
    fn default() -> Self {
        Self {
            max_level: DEFAULT_MAX_LEVEL,
            curvature_tolerance: DEFAULT_CURVATURE_TOLERANCE,
            max_triangles_per_leaf: DEFAULT_MAX_TRIANGLES_PER_LEAF,
            max_cell_size: None,
            root_box_margin: DEFAULT_ROOT_BOX_MARGIN,
        }
    }
}

/// `surfaceExtraction` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceExtractionDict {
    /// Feature angle in degrees.
    pub feature_angle: f64,
    /// Insert fundamental sheets at cells touching several patches.
    pub insert_fundamental_sheets: bool,
}

impl Default for SurfaceExtractionDict {
    fn default() -> Self {
        Self {
            feature_angle: DEFAULT_FEATURE_ANGLE_DEG,
            insert_fundamental_sheets: true,
        }
    }
}

/// `boundaryLayers` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoundaryLayers {
    /// Extra layers grown over the whole boundary after extraction.
    pub n_layers: u32,
    /// Fraction of the adjacent cell each grown layer takes.
    pub layer_fraction: f64,
    /// Run the layer optimiser at all.
    pub optimise_layer: bool,
    /// Optimiser parameters.
    pub optimisation_parameters: OptimisationParameters,
}

impl Default for BoundaryLayers {
    fn default() -> Self {
        Self {
            n_layers: 0,
            layer_fraction: FUNDAMENTAL_SHEET_FRACTION,
            optimise_layer: true,
            optimisation_parameters: OptimisationParameters::default(),
        }
    }
}

/// `boundaryLayers.optimisationParameters` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimisationParameters {
    /// Recompute point normals on every iteration.
    pub recalculate_normals: bool,
    /// Normal smoothing passes.
    pub n_smooth_normals: u32,
    /// Layer thickness limit as a fraction of the local feature size.
    pub feature_size_factor: f64,
    /// Allowed thickness jump between neighbouring hairs, relative to the
    /// edge length. Unset means the optimiser's own default.
    pub rel_thickness_tol: Option<f64>,
    /// Iteration cap.
    pub max_num_iterations: u32,
}

impl Default for OptimisationParameters {
    fn default() -> Self {
        Self {
            recalculate_normals: true,
            n_smooth_normals: DEFAULT_N_SMOOTH_NORMALS,
            feature_size_factor: DEFAULT_FEATURE_SIZE_FACTOR,
            rel_thickness_tol: None,
            max_num_iterations: DEFAULT_MAX_NUM_ITERATIONS,
        }
    }
}

impl OptimisationParameters {
    /// Checks the fractions lie in `[0, 1)`.
    pub fn validate(&self) -> MeshResult<()> {
        unit_fraction(
            "boundaryLayers.optimisationParameters.featureSizeFactor",
            self.feature_size_factor,
        )?;
        if let Some(tol) = self.rel_thickness_tol {
            unit_fraction("boundaryLayers.optimisationParameters.relThicknessTol", tol)?;
        }
        Ok(())
    }
}

fn unit_fraction(key: &str, value: f64) -> MeshResult<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(MeshError::configuration(key, format!("{value} is outside [0, 1)")))
    }
}

impl MeshDict {
    /// Parses and validates a JSON dictionary.
    pub fn from_json(text: &str) -> MeshResult<Self> {
        let dict: Self = serde_json::from_str(text)?;
        dict.validate()?;
        debug!(?dict, "meshing dictionary loaded");
        Ok(dict)
    }

    /// Serialises the dictionary to pretty JSON.
    pub fn to_json(&self) -> MeshResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> MeshResult<()> {
        let octree = &self.octree_refinement;
        GlobalConfig::new(EPSILON_TOLERANCE, octree.max_level)
            .map_err(|e| MeshError::configuration("octreeRefinement.maxLevel", e.to_string()))?;
        if !(octree.curvature_tolerance >= 0.0) {
            return Err(MeshError::configuration(
                "octreeRefinement.curvatureTolerance",
                format!("{} must be non-negative", octree.curvature_tolerance),
            ));
        }
        if octree.max_triangles_per_leaf == 0 {
            return Err(MeshError::configuration(
                "octreeRefinement.maxTrianglesPerLeaf",
                "must be at least 1",
            ));
        }
        if let Some(size) = octree.max_cell_size {
            if !(size > 0.0 && size.is_finite()) {
                return Err(MeshError::configuration(
                    "octreeRefinement.maxCellSize",
                    format!("{size} must be positive"),
                ));
            }
        }
        if !(octree.root_box_margin >= 0.0 && octree.root_box_margin.is_finite()) {
            return Err(MeshError::configuration(
                "octreeRefinement.rootBoxMargin",
                format!("{} must be non-negative", octree.root_box_margin),
            ));
        }

        let angle = self.surface_extraction.feature_angle;
        if !(angle > 0.0 && angle < 180.0) {
            return Err(MeshError::configuration(
                "surfaceExtraction.featureAngle",
                format!("{angle} is outside (0, 180)"),
            ));
        }

        let layers = &self.boundary_layers;
        if !(layers.layer_fraction > 0.0 && layers.layer_fraction < 1.0) {
            return Err(MeshError::configuration(
                "boundaryLayers.layerFraction",
                format!("{} is outside (0, 1)", layers.layer_fraction),
            ));
        }
        layers.optimisation_parameters.validate()
    }
}
