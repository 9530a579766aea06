//! Core math types shared by the mesh generator.
//!
//! Includes the vector alias (`Vec3`) and the axis-aligned `BoundingBox`.

pub mod vec3;

pub use vec3::{BoundingBox, Vec3};
