//! # Error Types
//!
//! Error types for mesh generation. Fatal conditions are errors; soft
//! conditions (refinement limits, layer non-convergence) are reported as
//! [`crate::diagnostics::Diagnostic`] values instead.
//!
//! ## Error Policy
//!
//! - Geometry and configuration errors abort the meshing pass
//! - Rejected topology batches leave the mesh untouched
//! - Errors include the offending data for debugging

use thiserror::Error;

// =============================================================================
// GEOMETRY ERRORS
// =============================================================================

/// Malformed input geometry or an invalid octree address.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Cube coordinate outside `0 <= pos < 2^level` or level out of range.
    #[error("Invalid cube coordinate ({x}, {y}, {z}) at level {level}: {reason}")]
    InvalidCoordinate {
        /// Position along x.
        x: i64,
        /// Position along y.
        y: i64,
        /// Position along z.
        z: i64,
        /// Refinement level.
        level: i64,
        /// What was violated.
        reason: String,
    },

    /// Input surface is unusable (bad indices, no triangles, ...).
    #[error("Invalid surface: {0}")]
    InvalidSurface(String),

    /// Degenerate geometry (zero-area face, zero-volume cell, ...).
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

impl GeometryError {
    /// Creates an invalid coordinate error.
    pub fn invalid_coordinate(x: i64, y: i64, z: i64, level: i64, reason: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            x,
            y,
            z,
            level,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// MESH ERRORS
// =============================================================================

/// Errors that can occur during mesh generation.
///
/// ## Example
///
/// ```rust
/// use octree_mesh::MeshError;
///
/// let err = MeshError::configuration("featureSizeFactor", "out of range [0, 1)");
/// assert!(err.to_string().contains("featureSizeFactor"));
/// ```
#[derive(Error, Debug)]
pub enum MeshError {
    /// Geometry error, always fatal.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// An internal state machine was driven through an illegal transition.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Out-of-range tunable detected before any mesh mutation.
    #[error("Configuration error in '{key}': {message}")]
    Configuration {
        /// Dictionary key that failed validation.
        key: String,
        /// Why it failed.
        message: String,
    },

    /// A batch of topology edits failed validation and was rolled back.
    #[error("Topology change rejected at edit {edit:?}: {reason}")]
    TopologyChangeRejected {
        /// Index of the first offending edit inside the batch, if attributable.
        edit: Option<usize>,
        /// Why the batch was rejected.
        reason: String,
    },

    /// A second edit batch was opened while one is still accumulating.
    #[error("Edit batch already open")]
    BatchAlreadyOpen,

    /// An edit was pushed or committed without an open batch.
    #[error("No edit batch is open")]
    NoOpenBatch,

    /// A serial-only component was invoked from a parallel context.
    #[error("{component} must not run inside a parallel region: {message}")]
    ParallelContext {
        /// Component that refused to run.
        component: &'static str,
        /// Context details.
        message: String,
    },

    /// Reading or writing a binary octree stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Meshing dictionary could not be parsed.
    #[error("Dictionary parse error: {0}")]
    Dictionary(#[from] serde_json::Error),
}

impl MeshError {
    /// Creates a configuration error.
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a topology rejection.
    pub fn rejected(edit: Option<usize>, reason: impl Into<String>) -> Self {
        Self::TopologyChangeRejected {
            edit,
            reason: reason.into(),
        }
    }

    /// Creates a consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }
}

impl From<config::constants::ConfigError> for MeshError {
    fn from(err: config::constants::ConfigError) -> Self {
        Self::configuration("global", err.to_string())
    }
}

// =============================================================================
// RESULT TYPE ALIAS
// =============================================================================

/// Result type alias for mesh generation.
pub type MeshResult<T> = Result<T, MeshError>;

// =============================================================================
// TESTS
// =============================================================================
