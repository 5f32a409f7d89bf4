//! Turning descriptors into GPU resources.
//!
//! - `geometry` generates procedural meshes for the shape primitives
//! - `scene` builds a whole scene graph against a render backend

pub mod geometry;
pub mod scene;
