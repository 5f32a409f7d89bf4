//! folio-ngin
//!
//! The 3D layer of a portfolio site: decorative widgets (rotating monograms,
//! a starfield, floating geometry, a hero scene) rendered with wgpu on
//! WebGL2 or natively. Every widget follows the same cycle: detect what the
//! host can do, build a scene graph once, animate it every frame from time
//! and pointer input, follow container resizes, and release everything on
//! teardown. Hosts that cannot render get a static panel instead.
//!
//! High-level modules
//! - `capability`: host probing and the immutable capability record
//! - `config`: widget presets (shapes, lights, motion, fallback content)
//! - `resources`: procedural geometry and all-or-nothing scene construction
//! - `data_structures`: shapes, instances, particle fields and the scene graph
//! - `animation`: pointer easing and absolute-time motion
//! - `lifecycle`: session ownership, resizing and idempotent disposal
//! - `fallback`: the static stand-in panel
//! - `flow`: mounting widgets and the winit host loop
//! - `render`: render batching and the backend seam
//! - `context`, `pipelines`: the wgpu backend
//! - `stats`: cached GitHub profile statistics
//!

pub mod animation;
pub mod camera;
pub mod capability;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod fallback;
pub mod flow;
pub mod lifecycle;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod stats;

pub use capability::{Capabilities, detect};
pub use config::{WidgetConfig, WidgetKind};
pub use flow::{DisposalHandle, Mount, SessionHandle, Widget, mount, run};
