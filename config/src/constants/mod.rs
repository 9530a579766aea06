//! Centralized configuration values shared across the mesh generator.
//!
//! Each public item in this module documents its purpose and provides a minimal
//! usage example so that downstream crates can remain declarative and avoid
//! scattering literals.

use std::fmt;

// =============================================================================
// PRECISION CONSTANTS
// =============================================================================

/// Numerical tolerance used by geometry kernels.
///
/// # Examples
/// ```
/// use config::constants::EPSILON_TOLERANCE;
/// assert!(EPSILON_TOLERANCE < 1.0e-6);
/// ```
pub const EPSILON_TOLERANCE: f64 = 1.0e-9;

/// Smallest cell volume accepted by topology validation, relative to the
/// cube of the mesh bounding box diagonal.
///
/// # Examples
/// ```
/// use config::constants::RELATIVE_VOLUME_TOLERANCE;
/// assert!(RELATIVE_VOLUME_TOLERANCE > 0.0);
/// ```
pub const RELATIVE_VOLUME_TOLERANCE: f64 = 1.0e-12;

// =============================================================================
// OCTREE CONSTANTS
// =============================================================================

/// Deepest refinement level an octree cube may reach.
///
/// Positions are packed into 19 bits per axis when cube coordinates are
/// encoded as 64-bit keys, so this is a hard limit.
///
/// # Examples
/// ```
/// use config::constants::MAX_OCTREE_LEVEL;
/// assert_eq!(1u64 << MAX_OCTREE_LEVEL, 524_288);
/// ```
pub const MAX_OCTREE_LEVEL: u8 = 19;

/// Default refinement level limit used by `refine_to_surface`.
pub const DEFAULT_MAX_LEVEL: u8 = 6;

/// Default curvature tolerance for octree refinement.
///
/// Curvature of a DATA cube is estimated as `1 - min(n_i . n_j)` over the
/// normals of the contained triangles, so `0` means flat.
///
/// # Examples
/// ```
/// use config::constants::DEFAULT_CURVATURE_TOLERANCE;
/// assert!(DEFAULT_CURVATURE_TOLERANCE > 0.0 && DEFAULT_CURVATURE_TOLERANCE < 1.0);
/// ```
pub const DEFAULT_CURVATURE_TOLERANCE: f64 = 0.1;

/// Default number of triangles a DATA leaf may hold before it is split.
pub const DEFAULT_MAX_TRIANGLES_PER_LEAF: usize = 64;

/// Relative margin added around the surface bounding box when the octree
/// root box is derived automatically.
pub const DEFAULT_ROOT_BOX_MARGIN: f64 = 0.25;

// =============================================================================
// SURFACE EXTRACTION CONSTANTS
// =============================================================================

/// Default dihedral angle (degrees) above which a boundary edge is a feature edge.
///
/// # Examples
/// ```
/// use config::constants::DEFAULT_FEATURE_ANGLE_DEG;
/// assert!(DEFAULT_FEATURE_ANGLE_DEG > 0.0 && DEFAULT_FEATURE_ANGLE_DEG < 90.0);
/// ```
pub const DEFAULT_FEATURE_ANGLE_DEG: f64 = 45.0;

/// Fraction of the distance towards the neighbouring cell centres at which
/// fundamental sheet points are placed.
pub const FUNDAMENTAL_SHEET_FRACTION: f64 = 0.25;

// =============================================================================
// BOUNDARY LAYER CONSTANTS
// =============================================================================

/// Default iteration cap for boundary layer optimisation.
pub const DEFAULT_MAX_NUM_ITERATIONS: u32 = 5;

/// Default number of normal smoothing iterations.
pub const DEFAULT_N_SMOOTH_NORMALS: u32 = 5;

/// Default feature size factor.
pub const DEFAULT_FEATURE_SIZE_FACTOR: f64 = 0.3;

/// Relative thickness tolerance when the optimiser builds its own surface engine.
///
/// # Examples
/// ```
/// use config::constants::{REL_THICKNESS_TOL_OWNED, REL_THICKNESS_TOL_BORROWED};
/// assert!(REL_THICKNESS_TOL_OWNED < REL_THICKNESS_TOL_BORROWED);
/// ```
pub const REL_THICKNESS_TOL_OWNED: f64 = 0.1;

/// Relative thickness tolerance when the optimiser borrows a surface engine.
pub const REL_THICKNESS_TOL_BORROWED: f64 = 0.15;

// =============================================================================
// GLOBAL CONFIG
// =============================================================================

/// Immutable snapshot of global configuration settings that can be shared
/// between crates.
///
/// # Examples
/// ```
/// use config::constants::GlobalConfig;
/// let config = GlobalConfig::default();
/// assert!(config.tolerance > 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalConfig {
    /// Numeric tolerance propagated into geometry kernels.
    pub tolerance: f64,
    /// Deepest octree level any refinement may request.
    pub max_level: u8,
}

impl GlobalConfig {
    /// Builds a configuration enforcing strict validation of the supplied
    /// tolerance and level limit.
    ///
    /// # Examples
    /// ```
    /// use config::constants::GlobalConfig;
    /// let cfg = GlobalConfig::new(1.0e-6, 8).expect("valid config");
    /// assert_eq!(cfg.max_level, 8);
    /// ```
    pub fn new(tolerance: f64, max_level: u8) -> Result<Self, ConfigError> {
        if tolerance <= 0.0 || !tolerance.is_finite() {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
        if max_level > MAX_OCTREE_LEVEL {
            return Err(ConfigError::InvalidMaxLevel(max_level));
        }
        Ok(Self {
            tolerance,
            max_level,
        })
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            tolerance: EPSILON_TOLERANCE,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

/// Error returned when invalid configuration values are provided.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Raised when tolerance is zero, negative or not finite.
    InvalidTolerance(f64),
    /// Raised when the level limit exceeds [`MAX_OCTREE_LEVEL`].
    InvalidMaxLevel(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTolerance(value) => {
                write!(f, "tolerance must be positive: {value}")
            }
            ConfigError::InvalidMaxLevel(value) => {
                write!(f, "max_level must be <= {MAX_OCTREE_LEVEL}: {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
