//! Per-frame animation.
//!
//! Everything that moves is a pure function of the absolute elapsed time, so
//! a host that throttles frames (hidden tab) only ever sees the pose the
//! scene would have had anyway. The one exception is pointer easing, which
//! advances by a fixed factor per invocation and therefore always catches up
//! without overshooting.

use std::{
    cell::Cell,
    collections::HashMap,
    f32::consts::{FRAC_PI_2, TAU},
    rc::Rc,
};

use cgmath::{Point3, Vector3};

use crate::{
    camera::{Camera, CameraUniform, Projection},
    data_structures::{
        instance::Instance,
        scene_graph::{NodeKind, SceneGraph},
        shape::euler,
    },
    render::{Frame, RenderBackend, RenderError},
};

/// Latest pointer report, normalized to `[-1, 1]` with `y` pointing up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
    pub inside: bool,
}

impl Pointer {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, inside: true }
    }

    /// Normalize a position in container pixels. Sizes of zero map to the centre.
    pub fn from_client(px: f64, py: f64, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::new(0.0, 0.0);
        }
        let x = (px / width as f64) * 2.0 - 1.0;
        let y = -((py / height as f64) * 2.0 - 1.0);
        Self::new(x.clamp(-1.0, 1.0) as f32, y.clamp(-1.0, 1.0) as f32)
    }
}

/// Pointer state shared between input callbacks and the driver. Both axes are
/// written together as one `Copy` value.
pub type SharedPointer = Rc<Cell<Pointer>>;

pub fn shared_pointer() -> SharedPointer {
    Rc::new(Cell::new(Pointer::default()))
}

pub fn pointer_moved(pointer: &SharedPointer, x: f32, y: f32) {
    pointer.set(Pointer::new(x, y));
}

pub fn pointer_entered(pointer: &SharedPointer) {
    let mut p = pointer.get();
    p.inside = true;
    pointer.set(p);
}

/// Leaving the surface sends the target back to the centre.
pub fn pointer_left(pointer: &SharedPointer) {
    pointer.set(Pointer {
        x: 0.0,
        y: 0.0,
        inside: false,
    });
}

pub const DEFAULT_EASE: f32 = 0.05;

/// Eased pointer: moves `factor` of the remaining distance per step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEase {
    pub x: f32,
    pub y: f32,
    factor: f32,
}

impl PointerEase {
    pub fn new(factor: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            factor: factor.clamp(0.0, 1.0),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn step(&mut self, target: Pointer) -> [f32; 2] {
        self.x += (target.x - self.x) * self.factor;
        self.y += (target.y - self.y) * self.factor;
        [self.x, self.y]
    }
}

impl Default for PointerEase {
    fn default() -> Self {
        Self::new(DEFAULT_EASE)
    }
}

/// `amplitude * sin(frequency * t + phase)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wave {
    pub amplitude: f32,
    pub frequency: f32,
    pub phase: f32,
}

impl Wave {
    pub const ZERO: Wave = Wave {
        amplitude: 0.0,
        frequency: 0.0,
        phase: 0.0,
    };

    pub const fn sin(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    pub const fn cos(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
            phase: FRAC_PI_2,
        }
    }

    pub fn at(&self, t: f32) -> f32 {
        if self.amplitude == 0.0 {
            return 0.0;
        }
        // Keep the argument small so very long sessions stay precise.
        let arg = (self.frequency * t + self.phase).rem_euclid(TAU);
        self.amplitude * arg.sin()
    }
}

/// How one tagged node moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeMotion {
    /// Continuous rotation rate per axis, radians per time unit.
    pub spin: [f32; 3],
    /// Oscillating rotation per axis.
    pub wobble: [Wave; 3],
    /// Rotation offset per unit of eased pointer: y-rotation follows pointer x,
    /// x-rotation follows pointer y.
    pub pointer_gain: [f32; 2],
    /// Vertical offset.
    pub float: Wave,
    /// Horizontal offset.
    pub drift: Wave,
    /// Relative scale change.
    pub pulse: Wave,
    /// Scale multiplier reached while the pointer hovers the surface.
    pub hover_scale: f32,
}

impl NodeMotion {
    pub const STILL: NodeMotion = NodeMotion {
        spin: [0.0; 3],
        wobble: [Wave::ZERO; 3],
        pointer_gain: [0.0; 2],
        float: Wave::ZERO,
        drift: Wave::ZERO,
        pulse: Wave::ZERO,
        hover_scale: 1.0,
    };

    /// Pose of a node whose authored transform is `base`, at time `t`.
    /// `hover` runs from 0 (outside) to 1 (fully hovered).
    pub fn pose_at(&self, base: &Instance, t: f32, pointer: [f32; 2], hover: f32) -> Instance {
        let mut angles = [0.0f32; 3];
        for (axis, angle) in angles.iter_mut().enumerate() {
            *angle = (self.spin[axis] * t).rem_euclid(TAU) + self.wobble[axis].at(t);
        }
        angles[1] += pointer[0] * self.pointer_gain[0];
        angles[0] += pointer[1] * self.pointer_gain[1];

        let offset = Vector3::new(self.drift.at(t), self.float.at(t), 0.0);
        let scale = (1.0 + self.pulse.at(t)) * (1.0 + (self.hover_scale - 1.0) * hover);

        Instance {
            position: base.position + offset,
            rotation: base.rotation * euler(angles),
            scale: base.scale * scale,
        }
    }
}

impl Default for NodeMotion {
    fn default() -> Self {
        Self::STILL
    }
}

/// Small orbit around the home position plus pointer parallax.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraMotion {
    pub orbit_x: Wave,
    pub orbit_y: Wave,
    pub parallax: f32,
}

impl CameraMotion {
    pub fn position_at(&self, home: Point3<f32>, t: f32, pointer: [f32; 2]) -> Point3<f32> {
        Point3::new(
            home.x + self.orbit_x.at(t) + pointer[0] * self.parallax,
            home.y + self.orbit_y.at(t) + pointer[1] * self.parallax,
            home.z,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MotionProfile {
    /// Animation time units per elapsed second.
    pub time_scale: f32,
    pub ease: f32,
    pub nodes: Vec<(String, NodeMotion)>,
    pub camera: CameraMotion,
    /// Intensity oscillation around the authored intensity, per light tag.
    pub lights: Vec<(String, Wave)>,
}

impl MotionProfile {
    pub fn new(time_scale: f32) -> Self {
        Self {
            time_scale,
            ease: DEFAULT_EASE,
            nodes: Vec::new(),
            camera: CameraMotion::default(),
            lights: Vec::new(),
        }
    }

    /// Nothing moves and the pointer is ignored.
    pub fn still() -> Self {
        Self {
            ease: 0.0,
            ..Self::new(0.0)
        }
    }

    pub fn with_node(mut self, tag: impl Into<String>, motion: NodeMotion) -> Self {
        self.nodes.push((tag.into(), motion));
        self
    }

    pub fn with_camera(mut self, camera: CameraMotion) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_light(mut self, tag: impl Into<String>, wave: Wave) -> Self {
        self.lights.push((tag.into(), wave));
        self
    }

    pub fn is_still(&self) -> bool {
        self.time_scale == 0.0 && self.ease == 0.0
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::new(1.0)
    }
}

const HOVER_EASE: f32 = 0.1;

/// Drives one scene: eased pointer, absolute-time poses, one render per tick.
#[derive(Debug)]
pub struct AnimationDriver {
    profile: MotionProfile,
    pointer: SharedPointer,
    ease: PointerEase,
    hover: f32,
    bases: HashMap<String, Instance>,
    intensities: HashMap<String, f32>,
    last_time: f32,
}

impl AnimationDriver {
    /// Capture the authored transforms and intensities the motion is applied to.
    pub fn new(profile: MotionProfile, pointer: SharedPointer, graph: &SceneGraph) -> Self {
        let mut bases = HashMap::new();
        for (tag, _) in &profile.nodes {
            match graph.find(tag) {
                Some(node) => {
                    bases.insert(tag.clone(), node.local);
                }
                None => log::warn!("no node tagged '{}' to animate", tag),
            }
        }
        let mut intensities = HashMap::new();
        for (tag, _) in &profile.lights {
            if let Some(NodeKind::Light(light)) = graph.find(tag).map(|n| &n.kind) {
                intensities.insert(tag.clone(), light.intensity);
            }
        }
        Self {
            ease: PointerEase::new(profile.ease),
            profile,
            pointer,
            hover: 0.0,
            bases,
            intensities,
            last_time: 0.0,
        }
    }

    pub fn pointer(&self) -> &SharedPointer {
        &self.pointer
    }

    pub fn eased_pointer(&self) -> [f32; 2] {
        [self.ease.x, self.ease.y]
    }

    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Animation time of the last advance.
    pub fn time(&self) -> f32 {
        self.last_time
    }

    /// Animation time for an elapsed wall-clock duration in seconds.
    pub fn time_at(&self, elapsed: f32) -> f32 {
        elapsed.max(0.0) * self.profile.time_scale
    }

    /// Apply the pose for `elapsed` seconds to the scene and the camera.
    pub fn advance(&mut self, elapsed: f32, graph: &mut SceneGraph, camera: &mut Camera) {
        let t = self.time_at(elapsed);
        self.last_time = t;
        let target = self.pointer.get();
        let pointer = self.ease.step(target);
        let hover_target = if target.inside { 1.0 } else { 0.0 };
        self.hover += (hover_target - self.hover) * HOVER_EASE;

        for (tag, motion) in &self.profile.nodes {
            let Some(base) = self.bases.get(tag) else {
                continue;
            };
            if let Some(node) = graph.find_mut(tag) {
                node.local = motion.pose_at(base, t, pointer, self.hover);
            }
        }
        for (tag, wave) in &self.profile.lights {
            let Some(base) = self.intensities.get(tag) else {
                continue;
            };
            if let Some(NodeKind::Light(light)) = graph.find_mut(tag).map(|n| &mut n.kind) {
                light.intensity = (base + wave.at(t)).max(0.0);
            }
        }
        graph.update_world_transforms();

        camera.position = self.profile.camera.position_at(camera.home, t, pointer);
        camera.look_at(graph.origin());
    }

    /// One frame: advance, then submit exactly one render.
    pub fn tick(
        &mut self,
        elapsed: f32,
        graph: &mut SceneGraph,
        camera: &mut Camera,
        projection: &Projection,
        backend: &mut dyn RenderBackend,
        clear_colour: wgpu::Color,
    ) -> Result<(), RenderError> {
        self.advance(elapsed, graph, camera);
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(camera, projection);
        let frame = Frame {
            camera: uniform,
            lights: graph.light_uniforms(),
            clear_colour,
            batches: graph.get_render().into_batches(),
        };
        backend.render(&frame)
    }
}
