//! # Config Crate
//!
//! Centralized configuration constants for the octree mesh generator.
//! All magic numbers and tunable defaults are defined here so the kernel
//! crates never scatter literals.
//!
//! ## Usage
//!
//! ```rust
//! use config::constants::{EPSILON_TOLERANCE, MAX_OCTREE_LEVEL};
//!
//! let value: f64 = 1e-12;
//! assert!(value.abs() < EPSILON_TOLERANCE);
//! assert!(MAX_OCTREE_LEVEL >= 10);
//! ```
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All constants defined once, used everywhere
//! - **Documented Defaults**: Layer optimisation defaults match the meshing
//!   dictionary documentation

pub mod constants;
