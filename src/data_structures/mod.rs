//! Scene data: shapes, transforms, particle clouds and the scene graph.
//!
//! - `shape` holds declarative shape and material descriptors
//! - `instance` holds per-node transforms and their GPU layout
//! - `particles` generates randomised point clouds
//! - `scene_graph` enables hierarchical scene organization
//! - `texture` wraps the depth buffer used by the wgpu backend

pub mod instance;
pub mod particles;
pub mod scene_graph;
pub mod shape;
pub mod texture;
