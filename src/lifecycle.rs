//! Session ownership, resizing and teardown.
//!
//! A [`Session`] owns everything one widget allocated: the backend (and with
//! it the GPU context), the scene graph, the camera, the animation driver and
//! the listeners attached to the host. [`Session::dispose`] releases all of
//! it once; every later call is a no-op. Each resource is optional so a
//! session that was only half built can still be torn down.

use std::{cell::Cell, rc::Rc};

use cgmath::Point3;
use log::{debug, info, warn};

use crate::{
    animation::{AnimationDriver, SharedPointer},
    camera::{AspectPolicy, Camera, CameraConfig, Projection},
    data_structures::scene_graph::{DisposeReport, SceneGraph},
    render::{RenderBackend, RenderError},
};

/// Something attached to the host that must be detached on teardown: an
/// event listener or a size observer.
pub trait Listener {
    fn detach(&mut self);
}

/// Listener that runs a closure once when detached.
pub struct DetachFn(Option<Box<dyn FnOnce()>>);

impl DetachFn {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }
}

impl Listener for DetachFn {
    fn detach(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Shared flag the host checks before scheduling another frame.
#[derive(Clone, Debug)]
pub struct LoopToken(Rc<Cell<bool>>);

impl LoopToken {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.get()
    }

    pub fn cancel(&self) {
        self.0.set(false);
    }
}

impl Default for LoopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything released by one disposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub resources: DisposeReport,
    pub listeners: usize,
    pub observers: usize,
    pub context_released: bool,
}

pub struct Session {
    backend: Option<Box<dyn RenderBackend>>,
    scene: Option<SceneGraph>,
    camera: Camera,
    projection: Projection,
    policy: AspectPolicy,
    surface: (u32, u32),
    driver: Option<AnimationDriver>,
    listeners: Vec<Box<dyn Listener>>,
    observers: Vec<Box<dyn Listener>>,
    token: LoopToken,
    clear_colour: wgpu::Color,
    disposed: bool,
}

impl Session {
    pub fn new(
        backend: Box<dyn RenderBackend>,
        scene: SceneGraph,
        camera: &CameraConfig,
        policy: AspectPolicy,
        driver: AnimationDriver,
        clear_colour: wgpu::Color,
    ) -> Self {
        let mut camera_state = Camera::new(camera.position);
        camera_state.look_at(Point3::new(0.0, 0.0, 0.0));
        Self {
            backend: Some(backend),
            scene: Some(scene),
            camera: camera_state,
            projection: Projection::new(1, 1, camera.fov_y, camera.near, camera.far),
            policy,
            surface: (0, 0),
            driver: Some(driver),
            listeners: Vec::new(),
            observers: Vec::new(),
            token: LoopToken::new(),
            clear_colour,
            disposed: false,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn Listener>) {
        if self.disposed {
            return;
        }
        self.listeners.push(listener);
    }

    pub fn add_observer(&mut self, observer: Box<dyn Listener>) {
        if self.disposed {
            return;
        }
        self.observers.push(observer);
    }

    pub fn loop_token(&self) -> LoopToken {
        self.token.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    pub fn driver(&self) -> Option<&AnimationDriver> {
        self.driver.as_ref()
    }

    pub fn pointer(&self) -> Option<SharedPointer> {
        self.driver.as_ref().map(|d| d.pointer().clone())
    }

    /// Follow a new container size. Zero sizes are ignored; otherwise the
    /// surface and projection match the size the aspect policy derives.
    pub fn resize(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if self.disposed {
            return None;
        }
        let (w, h) = self.policy.surface_size(width, height)?;
        if (w, h) == self.surface {
            return Some(self.surface);
        }
        self.surface = (w, h);
        self.projection.resize(w, h);
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(w, h);
        }
        debug!("surface resized to {}x{}", w, h);
        Some(self.surface)
    }

    /// Render the frame for `elapsed` seconds since the session started.
    /// A stopped or disposed session renders nothing.
    pub fn frame(&mut self, elapsed: f32) -> Result<(), RenderError> {
        if self.disposed || !self.token.is_active() {
            return Ok(());
        }
        match (
            self.driver.as_mut(),
            self.scene.as_mut(),
            self.backend.as_mut(),
        ) {
            (Some(driver), Some(scene), Some(backend)) => driver.tick(
                elapsed,
                scene,
                &mut self.camera,
                &self.projection,
                backend.as_mut(),
                self.clear_colour,
            ),
            _ => Ok(()),
        }
    }

    /// Release everything this session owns. Safe to call any number of
    /// times; only the first call does work.
    pub fn dispose(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.disposed {
            return report;
        }
        self.disposed = true;
        self.token.cancel();

        for listener in self.listeners.iter_mut() {
            listener.detach();
            report.listeners += 1;
        }
        self.listeners.clear();
        for observer in self.observers.iter_mut() {
            observer.detach();
            report.observers += 1;
        }
        self.observers.clear();

        match (self.scene.as_mut(), self.backend.as_mut()) {
            (Some(scene), Some(backend)) => {
                report.resources = scene.dispose(backend.as_mut());
            }
            (Some(_), None) => warn!("scene present without a backend, nothing to release"),
            _ => (),
        }
        if let Some(mut backend) = self.backend.take() {
            backend.release();
            report.context_released = true;
        }
        self.scene = None;
        self.driver = None;

        info!(
            "session disposed: {} geometries, {} materials, {} listeners, {} observers",
            report.resources.geometries,
            report.resources.materials,
            report.listeners,
            report.observers
        );
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}
