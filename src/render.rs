//! Render composition and the backend seam.
//!
//! Scene nodes describe what they want drawn as a [`Render`]. Before a frame
//! is submitted the tree of renders is flattened into [`Batches`], one list
//! per pipeline (opaque meshes, transparent meshes, point clouds), so a
//! backend can bind each pipeline once.
//!
//! [`RenderBackend`] is the only thing that touches the GPU. The wgpu
//! implementation lives in [`crate::context`]; tests drive the same seam with
//! a recording double.

use std::fmt;

use crate::{
    camera::CameraUniform,
    data_structures::{instance::InstanceRaw, shape::MaterialDescriptor},
    resources::geometry::GeometryData,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u32);

/// Errors raised by a render backend.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderError {
    /// The GPU context went away (lost device, invalid surface).
    ContextLost(String),
    OutOfMemory,
    /// A handle that was never created or already disposed.
    InvalidResource(String),
    InitializationFailed(String),
    BackendError(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ContextLost(msg) => write!(f, "Rendering context lost: {}", msg),
            RenderError::OutOfMemory => write!(f, "Out of GPU memory"),
            RenderError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            RenderError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            RenderError::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

/// One draw call: a geometry drawn with a material at a world transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Draw {
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
    pub transform: InstanceRaw,
}

/// How a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Opaque(Draw)` renders a lit, depth-writing mesh
/// - `Transparent(Draw)` renders a blended mesh after all opaque ones
/// - `Points(Draw)` renders a point cloud last, without depth writes
/// - `Composed(Vec<Render>)` recursively renders a composition
#[derive(Clone, Debug)]
pub enum Render {
    None,
    Opaque(Draw),
    Transparent(Draw),
    Points(Draw),
    Composed(Vec<Render>),
}

impl Render {
    pub fn set_pipelines(self, batches: &mut Batches) {
        match self {
            Render::Opaque(draw) => batches.opaque.push(draw),
            Render::Transparent(draw) => batches.transparent.push(draw),
            Render::Points(draw) => batches.points.push(draw),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::None => (),
        }
    }

    pub fn into_batches(self) -> Batches {
        let mut batches = Batches::default();
        self.set_pipelines(&mut batches);
        batches
    }
}

#[derive(Clone, Debug, Default)]
pub struct Batches {
    pub opaque: Vec<Draw>,
    pub transparent: Vec<Draw>,
    pub points: Vec<Draw>,
}

impl Batches {
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len() + self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draws in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Draw> {
        self.opaque
            .iter()
            .chain(self.transparent.iter())
            .chain(self.points.iter())
    }
}

pub const MAX_LIGHTS: usize = 8;

/// Light as seen by the shaders. `position.w` carries the light kind:
/// 0 ambient, 1 directional, 2 point, 3 spot.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightRaw {
    pub position: [f32; 4],
    /// rgb + intensity
    pub color: [f32; 4],
    /// spot target xyz + unused
    pub target: [f32; 4],
    /// distance, cos(angle), penumbra, unused
    pub params: [f32; 4],
}

/// Everything a backend needs to draw one frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub camera: CameraUniform,
    pub lights: Vec<LightRaw>,
    pub clear_colour: wgpu::Color,
    pub batches: Batches,
}

/// GPU resource owner and frame submitter for one session.
pub trait RenderBackend {
    fn create_geometry(&mut self, data: &GeometryData) -> Result<GeometryHandle, RenderError>;

    fn create_material(&mut self, material: &MaterialDescriptor) -> Result<MaterialHandle, RenderError>;

    fn dispose_geometry(&mut self, handle: GeometryHandle);

    fn dispose_material(&mut self, handle: MaterialHandle);

    /// Resize the drawing surface, in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// Submit one frame.
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError>;

    /// Release the rendering context. Further calls must be harmless.
    fn release(&mut self);
}
