//! Scene construction from declarative descriptors.
//!
//! [`build_scene`] turns a [`SceneDescriptor`] into a [`SceneGraph`] in one
//! synchronous pass. GPU resources are requested from the backend through an
//! [`Allocation`] that remembers every handle it hands out; unless the build
//! commits, dropping the allocation releases them again, so a failed build
//! never leaves anything behind.

use std::fmt;

use cgmath::Vector3;
use log::{debug, warn};
use rand::RngCore;

use crate::{
    camera::CameraConfig,
    data_structures::{
        instance::Instance,
        particles::{self, ParticleFieldConfig},
        scene_graph::{Drawable, Light, LightKind, NodeKind, SceneGraph, SceneNode},
        shape::{Color, MaterialDescriptor, ShapeDescriptor, euler},
    },
    render::{GeometryHandle, MaterialHandle, RenderBackend, RenderError},
    resources::geometry::{GeometryData, GeometryError, build_primitive},
};

/// Tag of the group holding every authored shape.
pub const SHAPES_TAG: &str = "shapes";
/// Tag of the particle cloud node.
pub const PARTICLES_TAG: &str = "particles";

#[derive(Clone, Debug, PartialEq)]
pub struct LightDescriptor {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub position: [f32; 3],
    pub tag: Option<String>,
}

impl LightDescriptor {
    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color,
            intensity,
            position: [0.0; 3],
            tag: None,
        }
    }

    pub fn directional(color: Color, intensity: f32, position: [f32; 3]) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
            position,
            tag: None,
        }
    }

    /// `distance` 0 means no falloff.
    pub fn point(color: Color, intensity: f32, position: [f32; 3], distance: f32) -> Self {
        Self {
            kind: LightKind::Point { distance },
            color,
            intensity,
            position,
            tag: None,
        }
    }

    pub fn spot(
        color: Color,
        intensity: f32,
        position: [f32; 3],
        target: [f32; 3],
        angle: f32,
        penumbra: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot {
                target,
                angle,
                penumbra,
            },
            color,
            intensity,
            position,
            tag: None,
        }
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Everything needed to build one widget scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneDescriptor {
    pub shapes: Vec<ShapeDescriptor>,
    pub camera: CameraConfig,
    pub lights: Vec<LightDescriptor>,
    pub particles: Option<ParticleFieldConfig>,
    /// Euler tilt (radians) of the particle cloud.
    pub particle_tilt: [f32; 3],
}

impl SceneDescriptor {
    pub fn new(shapes: Vec<ShapeDescriptor>, camera: CameraConfig, lights: Vec<LightDescriptor>) -> Self {
        Self {
            shapes,
            camera,
            lights,
            particles: None,
            particle_tilt: [0.0; 3],
        }
    }

    pub fn with_particles(mut self, particles: ParticleFieldConfig) -> Self {
        self.particles = Some(particles);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneError {
    InvalidShape { index: usize, reason: String },
    InvalidLight { index: usize, reason: String },
    Backend(RenderError),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::InvalidShape { index, reason } => {
                write!(f, "shape #{} is invalid: {}", index, reason)
            }
            SceneError::InvalidLight { index, reason } => {
                write!(f, "light #{} is invalid: {}", index, reason)
            }
            SceneError::Backend(e) => write!(f, "backend refused a resource: {}", e),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderError> for SceneError {
    fn from(e: RenderError) -> Self {
        SceneError::Backend(e)
    }
}

/// Handles requested during one build, released on drop unless committed.
pub struct Allocation<'a> {
    backend: &'a mut dyn RenderBackend,
    geometries: Vec<GeometryHandle>,
    materials: Vec<MaterialHandle>,
    committed: bool,
}

impl<'a> Allocation<'a> {
    pub fn new(backend: &'a mut dyn RenderBackend) -> Self {
        Self {
            backend,
            geometries: Vec::new(),
            materials: Vec::new(),
            committed: false,
        }
    }

    pub fn drawable(
        &mut self,
        geometry: &GeometryData,
        material: &MaterialDescriptor,
    ) -> Result<Drawable, RenderError> {
        let g = self.backend.create_geometry(geometry)?;
        self.geometries.push(g);
        let m = self.backend.create_material(material)?;
        self.materials.push(m);
        Ok(Drawable::new(g, m, material.is_transparent()))
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Allocation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if !self.geometries.is_empty() || !self.materials.is_empty() {
            warn!(
                "scene build aborted, releasing {} geometries and {} materials",
                self.geometries.len(),
                self.materials.len()
            );
        }
        for handle in self.geometries.drain(..) {
            self.backend.dispose_geometry(handle);
        }
        for handle in self.materials.drain(..) {
            self.backend.dispose_material(handle);
        }
    }
}

fn shape_error(index: usize, e: GeometryError) -> SceneError {
    SceneError::InvalidShape {
        index,
        reason: e.to_string(),
    }
}

fn validate_shape(index: usize, shape: &ShapeDescriptor) -> Result<(), SceneError> {
    let invalid = |reason: &str| SceneError::InvalidShape {
        index,
        reason: reason.to_string(),
    };
    if shape.position.iter().any(|c| !c.is_finite()) {
        return Err(invalid("position is not finite"));
    }
    if shape.rotation.is_some_and(|r| r.iter().any(|c| !c.is_finite())) {
        return Err(invalid("rotation is not finite"));
    }
    if !shape.scale.is_finite() || shape.scale <= 0.0 {
        return Err(invalid("scale must be positive"));
    }
    if !(0.0..=1.0).contains(&shape.material.opacity) {
        return Err(invalid("opacity must be within [0, 1]"));
    }
    Ok(())
}

fn light_node(index: usize, light: &LightDescriptor) -> Result<SceneNode, SceneError> {
    if light.position.iter().any(|c| !c.is_finite()) || !light.intensity.is_finite() {
        return Err(SceneError::InvalidLight {
            index,
            reason: "position and intensity must be finite".to_string(),
        });
    }
    let node = SceneNode::new(
        format!("light_{}", index),
        NodeKind::Light(Light {
            kind: light.kind,
            color: light.color,
            intensity: light.intensity,
        }),
    )
    .with_local(Instance::from(Vector3::from(light.position)));
    Ok(match &light.tag {
        Some(tag) => node.with_tag(tag.clone()),
        None => node,
    })
}

/// Build a scene graph. Either every descriptor makes it into the graph or
/// the backend holds no resources from this call.
pub fn build_scene(
    descriptor: &SceneDescriptor,
    backend: &mut dyn RenderBackend,
    rng: &mut dyn RngCore,
) -> Result<SceneGraph, SceneError> {
    let mut allocation = Allocation::new(backend);

    let mut shapes = SceneNode::group(SHAPES_TAG).with_tag(SHAPES_TAG);
    for (index, shape) in descriptor.shapes.iter().enumerate() {
        validate_shape(index, shape)?;
        let geometry = build_primitive(&shape.primitive).map_err(|e| shape_error(index, e))?;
        let drawable = allocation.drawable(&geometry, &shape.material)?;
        let local = Instance {
            position: shape.position(),
            rotation: shape.orientation(),
            ..Instance::default()
        }
        .with_uniform_scale(shape.scale);
        let node = SceneNode::new(
            format!("{}_{}", shape.primitive.name(), index),
            NodeKind::Mesh(drawable),
        )
        .with_local(local);
        shapes.add_child(match &shape.tag {
            Some(tag) => node.with_tag(tag.clone()),
            None => node,
        });
    }

    let mut lights = Vec::with_capacity(descriptor.lights.len());
    for (index, light) in descriptor.lights.iter().enumerate() {
        lights.push(light_node(index, light)?);
    }

    let particles = match &descriptor.particles {
        Some(config) => particle_node(config, descriptor.particle_tilt, &mut allocation, rng)?,
        None => None,
    };

    allocation.commit();

    let mut graph = SceneGraph::new();
    graph.add(shapes);
    if let Some(particles) = particles {
        graph.add(particles);
    }
    for light in lights {
        graph.add(light);
    }
    graph.update_world_transforms();
    debug!(
        "built scene with {} drawables and {} lights",
        graph.drawable_count(),
        graph.light_count()
    );
    Ok(graph)
}

fn particle_node(
    config: &ParticleFieldConfig,
    tilt: [f32; 3],
    allocation: &mut Allocation<'_>,
    rng: &mut dyn RngCore,
) -> Result<Option<SceneNode>, SceneError> {
    let buffer = particles::generate(config, rng);
    if buffer.is_empty() {
        return Ok(None);
    }
    let geometry = GeometryData::from_particles(&buffer);
    // Vertex colours carry the tint, the material only scales them.
    let material = MaterialDescriptor::points(Color::WHITE, config.size, config.opacity, config.additive);
    let drawable = allocation.drawable(&geometry, &material)?;
    let local = Instance {
        rotation: euler(tilt),
        ..Instance::default()
    };
    Ok(Some(
        SceneNode::new(PARTICLES_TAG, NodeKind::Points(drawable))
            .with_tag(PARTICLES_TAG)
            .with_local(local),
    ))
}
