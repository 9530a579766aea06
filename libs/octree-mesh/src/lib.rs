//! # Octree Mesh
//!
//! Octree-based polyhedral mesh generation from triangulated surfaces.
//!
//! An adaptive octree is refined towards the surface and kept 2:1 balanced.
//! The cells inside the surface become a hex-dominant polyhedral mesh whose
//! boundary is snapped onto the surface, split into patches and searched for
//! feature edges and corners. Boundary layers are grown and optimised
//! through atomic batches of topology edits.
//!
//! ## Architecture
//!
//! ```text
//! surface (TriSurface)
//!     ↓
//! octree (CubeCoordinate, OctreeCube, Octree)
//!     ↓
//! mesh (PolyMesh, SurfaceEngine)
//!     ↓
//! extractor (SurfaceEdgeExtractor) ──→ topology (TopologyEditor)
//!     ↓
//! boundary_layer (BoundaryLayerOptimiser) ──→ topology
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use octree_mesh::{ExecutionContext, MeshGenerator, Vec3};
//! use octree_mesh::surface::primitives::box_surface;
//!
//! let surface = box_surface(Vec3::ZERO, Vec3::ONE).unwrap();
//! let json = r#"{ "octreeRefinement": { "maxLevel": 2, "rootBoxMargin": 0.5 } }"#;
//! let result = MeshGenerator::from_json(&surface, json, ExecutionContext::serial())
//!     .unwrap()
//!     .generate()
//!     .unwrap();
//! assert!(result.mesh.n_cells() > 0);
//! ```

pub mod boundary_layer;
pub mod config;
pub mod context;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod mesh;
pub mod octree;
pub mod surface;
pub mod topology;

pub use boundary_layer::{BoundaryLayerOptimiser, LayerReport, LayerSettings, SurfaceEngineHandle};
pub use config::MeshDict;
pub use context::ExecutionContext;
pub use core::{BoundingBox, Vec3};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity, Stage};
pub use error::{GeometryError, MeshError, MeshResult};
pub use extractor::{Features, SurfaceEdgeExtractor, SurfaceExtraction};
pub use generator::{GeneratedMesh, MeshGenerator};
pub use mesh::{mesh_from_octree, Patch, PolyMesh, SurfaceEngine};
pub use octree::{CubeCoordinate, CubeType, Direction, Octree, OctreeCube, ProcNo};
pub use surface::TriSurface;
pub use topology::{EditorState, TopologyEdit, TopologyEditor, TopologyMap};
