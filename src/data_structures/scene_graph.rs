//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneGraph`] is a tree of [`SceneNode`]s rooted at a single group.
//! Each node keeps a local and a world transform; world transforms are
//! recomputed top-down once per frame before rendering. Mesh and point nodes
//! hold the GPU handles they were built with, and give them up exactly once
//! when the graph is disposed.

use cgmath::Point3;
use log::debug;

use crate::{
    data_structures::{instance::Instance, shape::Color},
    render::{Draw, GeometryHandle, LightRaw, MaterialHandle, Render, RenderBackend},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional,
    Point { distance: f32 },
    Spot { target: [f32; 3], angle: f32, penumbra: f32 },
}

impl LightKind {
    fn code(&self) -> f32 {
        match self {
            LightKind::Ambient => 0.0,
            LightKind::Directional => 1.0,
            LightKind::Point { .. } => 2.0,
            LightKind::Spot { .. } => 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

/// GPU resources backing a mesh or point cloud.
#[derive(Debug, PartialEq)]
pub struct Drawable {
    geometry: Option<GeometryHandle>,
    material: Option<MaterialHandle>,
    pub transparent: bool,
}

impl Drawable {
    pub fn new(geometry: GeometryHandle, material: MaterialHandle, transparent: bool) -> Self {
        Self {
            geometry: Some(geometry),
            material: Some(material),
            transparent,
        }
    }

    pub fn geometry(&self) -> Option<GeometryHandle> {
        self.geometry
    }

    pub fn material(&self) -> Option<MaterialHandle> {
        self.material
    }

    pub fn is_disposed(&self) -> bool {
        self.geometry.is_none() && self.material.is_none()
    }
}

#[derive(Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Drawable),
    Points(Drawable),
    Light(Light),
}

#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    /// Handle used by the animation driver to address this node.
    pub tag: Option<String>,
    pub local: Instance,
    world: Instance,
    pub kind: NodeKind,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            tag: None,
            local: Instance::default(),
            world: Instance::default(),
            kind,
            children: vec![],
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_local(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn get_children(&self) -> &Vec<SceneNode> {
        &self.children
    }

    pub fn get_world_transform(&self) -> &Instance {
        &self.world
    }

    pub fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    /// Depth-first visit of this node and all descendants.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a SceneNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut SceneNode)) {
        f(self);
        for child in self.children.iter_mut() {
            child.visit_mut(f);
        }
    }

    pub fn find(&self, tag: &str) -> Option<&SceneNode> {
        if self.tag.as_deref() == Some(tag) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut SceneNode> {
        if self.tag.as_deref() == Some(tag) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(tag))
    }

    pub fn get_render(&self) -> Render {
        let own = match &self.kind {
            NodeKind::Mesh(drawable) | NodeKind::Points(drawable) => {
                match (drawable.geometry, drawable.material) {
                    (Some(geometry), Some(material)) => {
                        let draw = Draw {
                            geometry,
                            material,
                            transform: self.world.to_raw(),
                        };
                        match (&self.kind, drawable.transparent) {
                            (NodeKind::Points(_), _) => Render::Points(draw),
                            (_, true) => Render::Transparent(draw),
                            (_, false) => Render::Opaque(draw),
                        }
                    }
                    _ => Render::None,
                }
            }
            NodeKind::Group | NodeKind::Light(_) => Render::None,
        };
        if self.children.is_empty() {
            return own;
        }
        let mut renders = Vec::with_capacity(self.children.len() + 1);
        renders.push(own);
        renders.extend(self.children.iter().map(SceneNode::get_render));
        Render::Composed(renders)
    }
}

/// Counts of GPU resources released by a disposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub geometries: usize,
    pub materials: usize,
}

impl std::ops::AddAssign for DisposeReport {
    fn add_assign(&mut self, rhs: Self) {
        self.geometries += rhs.geometries;
        self.materials += rhs.materials;
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    root: SceneNode,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            root: SceneNode::group("scene"),
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    pub fn add(&mut self, node: SceneNode) {
        self.root.add_child(node);
    }

    pub fn find(&self, tag: &str) -> Option<&SceneNode> {
        self.root.find(tag)
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut SceneNode> {
        self.root.find_mut(tag)
    }

    /// Meshes and point clouds in the graph.
    pub fn drawable_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |node| {
            if matches!(node.kind, NodeKind::Mesh(_) | NodeKind::Points(_)) {
                count += 1;
            }
        });
        count
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |node| {
            if matches!(node.kind, NodeKind::Mesh(_)) {
                count += 1;
            }
        });
        count
    }

    pub fn light_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |node| {
            if matches!(node.kind, NodeKind::Light(_)) {
                count += 1;
            }
        });
        count
    }

    pub fn update_world_transforms(&mut self) {
        self.root.update_world_transforms(&Instance::default());
    }

    pub fn get_render(&self) -> Render {
        self.root.get_render()
    }

    /// Lights in shader layout, positioned by their world transforms.
    pub fn light_uniforms(&self) -> Vec<LightRaw> {
        let mut lights = Vec::new();
        self.root.visit(&mut |node| {
            if let NodeKind::Light(light) = &node.kind {
                let p = node.world.position;
                let (target, params) = match light.kind {
                    LightKind::Point { distance } => ([0.0; 4], [distance, 0.0, 0.0, 0.0]),
                    LightKind::Spot {
                        target,
                        angle,
                        penumbra,
                    } => (
                        [target[0], target[1], target[2], 0.0],
                        [0.0, angle.cos(), penumbra, 0.0],
                    ),
                    LightKind::Ambient | LightKind::Directional => ([0.0; 4], [0.0; 4]),
                };
                lights.push(LightRaw {
                    position: [p.x, p.y, p.z, light.kind.code()],
                    color: [light.color.r, light.color.g, light.color.b, light.intensity],
                    target,
                    params,
                });
            }
        });
        lights
    }

    /// World-space origin, where widget cameras aim.
    pub fn origin(&self) -> Point3<f32> {
        let p = self.root.world.position;
        Point3::new(p.x, p.y, p.z)
    }

    /// Release every geometry and material reachable from the root. Handles
    /// are taken out of their nodes, so calling this twice releases nothing
    /// the second time.
    pub fn dispose(&mut self, backend: &mut dyn RenderBackend) -> DisposeReport {
        let mut report = DisposeReport::default();
        self.root.visit_mut(&mut |node| {
            if let NodeKind::Mesh(drawable) | NodeKind::Points(drawable) = &mut node.kind {
                if let Some(geometry) = drawable.geometry.take() {
                    backend.dispose_geometry(geometry);
                    report.geometries += 1;
                }
                if let Some(material) = drawable.material.take() {
                    backend.dispose_material(material);
                    report.materials += 1;
                }
            }
        });
        debug!(
            "disposed {} geometries and {} materials",
            report.geometries, report.materials
        );
        self.root.children.clear();
        report
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
