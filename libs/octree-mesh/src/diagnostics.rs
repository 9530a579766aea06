//! Soft conditions reported by the meshing pipeline.
//!
//! Anything that degrades quality without making the mesh unusable is
//! recorded here and also logged through `tracing`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Informational.
    Info,
    /// Best-effort result; the mesh is usable but locally sub-optimal.
    Warning,
}

/// Pipeline stage that emitted a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Octree refinement and balancing.
    Octree,
    /// Boundary extraction and patch assignment.
    SurfaceExtraction,
    /// Boundary layer optimisation.
    BoundaryLayer,
    /// Topology editing.
    Topology,
}

/// Kind of soft condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// DATA cubes still exceeded the curvature/size criteria at `max_level`.
    RefinementLimitReached {
        /// Number of cubes that could not be refined further.
        cubes: usize,
    },
    /// A patch ended up with no faces and was dropped.
    EmptyPatchDropped {
        /// Patch name.
        patch: String,
    },
    /// Cells left out of the octree mesh because they touched the rest of
    /// the domain only along an edge or at a corner.
    IrregularCellsRemoved {
        /// Number of removed cells.
        cells: usize,
    },
    /// Boundary points were moved only part of the way to the surface
    /// because the full projection would invert cells.
    ProjectionDamped {
        /// Share of the projection distance that was applied.
        fraction: f64,
    },
    /// A layer of prisms could not be inserted and the mesh was kept
    /// without it.
    LayerSkipped {
        /// Why the topology change was refused.
        reason: String,
    },
    /// Layer optimisation stopped at its iteration cap with violations left.
    LayerNotConverged {
        /// Iterations performed.
        iterations: u32,
        /// Remaining violating hair edge pairs.
        violations: usize,
    },
    /// Hair edges whose thickness had to be reduced.
    HairEdgesThinned {
        /// Number of thinned hair edges.
        count: usize,
    },
    /// Free-form note.
    Note,
}

/// A recorded soft condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Emitting stage.
    pub stage: Stage,
    /// Structured kind.
    pub kind: DiagnosticKind,
    /// Human readable message.
    pub message: String,
}

impl Diagnostic {
    /// Creates a warning.
    pub fn warning(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            stage,
            kind,
            message: message.into(),
        }
    }

    /// Creates an informational note.
    pub fn info(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            stage,
            kind: DiagnosticKind::Note,
            message: message.into(),
        }
    }

    /// True for warnings.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.severity, self.stage, self.message)
    }
}
