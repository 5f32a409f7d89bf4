//! Mounting widgets and driving them from the host event loop.
//!
//! [`mount`] is the single entry point a page uses: it consults the
//! capability record, builds the scene and hands back a [`Widget`] whose
//! [`Mount`] says what happened. A mounted scene comes with a
//! [`SessionHandle`] for the host loop and a [`DisposalHandle`] for teardown.
//! When anything fails, at mount time or later while rendering, the
//! container gets the static fallback panel instead and the widget never
//! tries 3D again.
//!
//! [`run`] wires one widget to a winit event loop, natively or on the web
//! (canvas `#canvas`).
//!
//! # Frame cycle
//!
//! 1. The host asks for a redraw while the loop token is active
//! 2. [`Widget::frame`] advances the animation and submits one render
//! 3. A render error disposes the session and engages the fallback; the
//!    token is cancelled so no further frame is requested

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::Arc,
};

use instant::Instant;
use log::{error, info, warn};
use rand::{SeedableRng, rngs::SmallRng};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    animation::{
        AnimationDriver, Pointer, SharedPointer, pointer_entered, pointer_left, pointer_moved,
        shared_pointer,
    },
    capability::{Capabilities, PowerPreference, UnsupportedReason},
    config::WidgetConfig,
    context::Context,
    data_structures::scene_graph::SceneGraph,
    fallback::{Container, FallbackMarkup, FallbackRenderer},
    lifecycle::{DetachFn, Listener, LoopToken, Session, TeardownReport},
    render::{RenderBackend, RenderError},
    resources::scene::{SceneError, build_scene},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Why a widget shows the fallback panel.
#[derive(Clone, Debug, PartialEq)]
pub enum FallbackCause {
    /// The capability record ruled 3D out.
    Unsupported(UnsupportedReason),
    /// No rendering context could be created for the session.
    Context(RenderError),
    /// The scene could not be built.
    Scene(SceneError),
    /// Rendering failed while the session was running.
    Runtime(RenderError),
}

/// Shared view of a running session for the host loop and input callbacks.
#[derive(Clone)]
pub struct SessionHandle {
    session: Rc<RefCell<Session>>,
    token: LoopToken,
    deferred: Rc<Cell<bool>>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        let token = session.loop_token();
        Self {
            session: Rc::new(RefCell::new(session)),
            token,
            deferred: Rc::new(Cell::new(false)),
        }
    }

    /// Render the frame for `elapsed` seconds since mount.
    pub fn frame(&self, elapsed: f32) -> Result<(), RenderError> {
        let result = match self.session.try_borrow_mut() {
            Ok(mut session) => session.frame(elapsed),
            Err(_) => {
                warn!("frame requested while the session is busy, skipping");
                Ok(())
            }
        };
        if self.deferred.take() {
            self.disposal().call();
        }
        result
    }

    /// Follow a new container size; see [`Session::resize`].
    pub fn resize(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        self.session.try_borrow_mut().ok()?.resize(width, height)
    }

    pub fn pointer(&self) -> Option<SharedPointer> {
        self.session.borrow().pointer()
    }

    pub fn loop_token(&self) -> LoopToken {
        self.token.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.session.borrow().is_disposed()
    }

    pub fn add_listener(&self, listener: Box<dyn Listener>) {
        self.session.borrow_mut().add_listener(listener);
    }

    pub fn add_observer(&self, observer: Box<dyn Listener>) {
        self.session.borrow_mut().add_observer(observer);
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.session.borrow().surface_size()
    }

    pub fn aspect(&self) -> f32 {
        self.session.borrow().projection().aspect()
    }

    /// Run `f` against the live scene graph, `None` once disposed.
    pub fn with_scene<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> Option<R> {
        self.session.borrow().scene().map(f)
    }

    pub fn disposal(&self) -> DisposalHandle {
        DisposalHandle {
            session: self.session.clone(),
            token: self.token.clone(),
            deferred: self.deferred.clone(),
        }
    }
}

/// The one cleanup callback of a session. Invoking it more than once is a
/// no-op; clones share the same session.
#[derive(Clone)]
pub struct DisposalHandle {
    session: Rc<RefCell<Session>>,
    token: LoopToken,
    deferred: Rc<Cell<bool>>,
}

impl DisposalHandle {
    pub fn call(&self) -> TeardownReport {
        self.token.cancel();
        match self.session.try_borrow_mut() {
            Ok(mut session) => session.dispose(),
            Err(_) => {
                // Called from inside a frame; the frame finishes the job.
                self.deferred.set(true);
                TeardownReport::default()
            }
        }
    }

    pub fn into_fn(self) -> impl Fn() {
        move || {
            self.call();
        }
    }
}

/// Outcome of mounting a widget.
pub enum Mount {
    Scene {
        session: SessionHandle,
        dispose: DisposalHandle,
    },
    Fallback(FallbackCause),
}

impl Mount {
    pub fn is_scene(&self) -> bool {
        matches!(self, Mount::Scene { .. })
    }

    pub fn cause(&self) -> Option<&FallbackCause> {
        match self {
            Mount::Fallback(cause) => Some(cause),
            Mount::Scene { .. } => None,
        }
    }
}

/// A mounted widget: either a live scene or the fallback panel.
pub struct Widget {
    container: Rc<dyn Container>,
    markup: FallbackMarkup,
    fallback: FallbackRenderer,
    mount: Mount,
}

impl Widget {
    pub fn outcome(&self) -> &Mount {
        &self.mount
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        match &self.mount {
            Mount::Scene { session, .. } => Some(session),
            Mount::Fallback(_) => None,
        }
    }

    pub fn disposal(&self) -> Option<DisposalHandle> {
        match &self.mount {
            Mount::Scene { dispose, .. } => Some(dispose.clone()),
            Mount::Fallback(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_engaged()
    }

    /// Render one frame. Returns whether the host should schedule another.
    pub fn frame(&mut self, elapsed: f32) -> bool {
        let Mount::Scene { session, dispose } = &self.mount else {
            return false;
        };
        match session.frame(elapsed) {
            Ok(()) => session.loop_token().is_active(),
            Err(e) => {
                error!("rendering failed, switching to the fallback panel: {}", e);
                dispose.call();
                self.fallback.render(self.container.as_ref(), &self.markup);
                self.mount = Mount::Fallback(FallbackCause::Runtime(e));
                false
            }
        }
    }

    /// Measure the container and resize the session to it.
    pub fn resize(&self) -> Option<(u32, u32)> {
        let (width, height) = self.container.client_size();
        self.session()?.resize(width, height)
    }

    pub fn dispose(&self) -> TeardownReport {
        match &self.mount {
            Mount::Scene { dispose, .. } => dispose.call(),
            Mount::Fallback(_) => TeardownReport::default(),
        }
    }
}

fn fallback_widget(
    container: Rc<dyn Container>,
    markup: FallbackMarkup,
    cause: FallbackCause,
) -> Widget {
    warn!("mounting fallback panel: {:?}", cause);
    let fallback = FallbackRenderer::new();
    fallback.render(container.as_ref(), &markup);
    Widget {
        container,
        markup,
        fallback,
        mount: Mount::Fallback(cause),
    }
}

/// Mount a widget into `container`.
///
/// `make_backend` is only called when the capability record allows 3D; a
/// backend whose scene fails to build is released before the fallback
/// panel goes in.
pub fn mount(
    container: Rc<dyn Container>,
    capabilities: &Capabilities,
    config: &WidgetConfig,
    make_backend: impl FnOnce(&Capabilities) -> Result<Box<dyn RenderBackend>, RenderError>,
) -> Widget {
    if !capabilities.supported() {
        let reason = capabilities
            .reason()
            .unwrap_or(UnsupportedReason::GeneralError);
        return fallback_widget(
            container,
            config.fallback.clone(),
            FallbackCause::Unsupported(reason),
        );
    }
    let config = config.clone().adapt_to(capabilities);

    let mut backend = match make_backend(capabilities) {
        Ok(backend) => backend,
        Err(e) => return fallback_widget(container, config.fallback, FallbackCause::Context(e)),
    };

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let graph = match build_scene(&config.scene, backend.as_mut(), &mut rng) {
        Ok(graph) => graph,
        Err(e) => {
            backend.release();
            return fallback_widget(container, config.fallback, FallbackCause::Scene(e));
        }
    };

    let driver = AnimationDriver::new(config.motion.clone(), shared_pointer(), &graph);
    let mut session = Session::new(
        backend,
        graph,
        &config.scene.camera,
        config.aspect,
        driver,
        config.clear_colour,
    );
    let (width, height) = container.client_size();
    session.resize(width, height);
    info!(
        "mounted {:?} widget at {}x{}",
        config.kind,
        session.surface_size().0,
        session.surface_size().1
    );

    let session = SessionHandle::new(session);
    let dispose = session.disposal();
    Widget {
        container,
        markup: config.fallback,
        fallback: FallbackRenderer::new(),
        mount: Mount::Scene { session, dispose },
    }
}

/// Native windows have no markup to swap in; the panel is logged instead.
#[cfg(not(target_arch = "wasm32"))]
struct WindowContainer(Arc<Window>);

#[cfg(not(target_arch = "wasm32"))]
impl Container for WindowContainer {
    fn client_size(&self) -> (u32, u32) {
        let size = self.0.inner_size();
        (size.width, size.height)
    }

    fn clear_children(&self) {}

    fn insert_html(&self, html: &str) {
        info!("fallback panel: {}", html);
    }
}

#[cfg(target_arch = "wasm32")]
const CANVAS_ID: &str = "canvas";

pub(crate) enum WidgetEvent {
    #[allow(dead_code)]
    Initialized(Result<Context, RenderError>),
}

impl std::fmt::Debug for WidgetEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetEvent::Initialized(Ok(_)) => f.write_str("Initialized(Ok)"),
            WidgetEvent::Initialized(Err(e)) => write!(f, "Initialized(Err({}))", e),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<WidgetEvent>,
    config: WidgetConfig,
    capabilities: Option<Capabilities>,
    window: Option<Arc<Window>>,
    container: Option<Rc<dyn Container>>,
    widget: Option<Widget>,
    /// Cleared when the session detaches its input listener.
    input_attached: Rc<Cell<bool>>,
    started: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<WidgetEvent>, config: WidgetConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            config,
            capabilities: None,
            window: None,
            container: None,
            widget: None,
            input_attached: Rc::new(Cell::new(false)),
            started: Instant::now(),
        })
    }

    fn detect(&self) -> Capabilities {
        #[cfg(target_arch = "wasm32")]
        let probe = crate::capability::WebProbe;
        #[cfg(not(target_arch = "wasm32"))]
        let probe = crate::capability::AdapterProbe;
        crate::capability::detect(&probe)
    }

    /// Mount with the context that was created for the window.
    fn mount_with(&mut self, context: Result<Context, RenderError>) {
        let (Some(container), Some(capabilities)) = (self.container.clone(), self.capabilities.as_ref())
        else {
            return;
        };
        let widget = mount(container, capabilities, &self.config, move |_| {
            context.map(|c| Box::new(c) as Box<dyn RenderBackend>)
        });
        if let Some(session) = widget.session() {
            self.input_attached.set(true);
            let attached = self.input_attached.clone();
            session.add_listener(Box::new(DetachFn::new(move || attached.set(false))));
        }
        self.widget = Some(widget);
        self.started = Instant::now();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn pointer(&self) -> Option<SharedPointer> {
        if !self.input_attached.get() {
            return None;
        }
        self.widget.as_ref()?.session()?.pointer()
    }
}

impl ApplicationHandler<WidgetEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_transparent(true);

        #[cfg(target_arch = "wasm32")]
        let canvas = {
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas: Option<web_sys::HtmlCanvasElement> = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.get_element_by_id(CANVAS_ID))
                .and_then(|e| e.dyn_into().ok());
            window_attributes = window_attributes.with_canvas(canvas.clone());
            canvas
        };

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("could not create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(target_arch = "wasm32")]
        let container: Rc<dyn Container> = match canvas.and_then(|c| c.parent_element()) {
            Some(parent) => Rc::new(crate::fallback::ElementContainer(parent)),
            None => {
                error!("#{} has no parent element to mount into", CANVAS_ID);
                event_loop.exit();
                return;
            }
        };
        #[cfg(not(target_arch = "wasm32"))]
        let container: Rc<dyn Container> = Rc::new(WindowContainer(window.clone()));

        let capabilities = self.detect();
        let supported = capabilities.supported();
        let power = if capabilities.is_mobile() {
            PowerPreference::LowPower
        } else {
            PowerPreference::HighPerformance
        };
        self.capabilities = Some(capabilities);
        self.container = Some(container);
        self.window = Some(window.clone());

        if !supported {
            self.mount_with(Err(RenderError::InitializationFailed(
                "rendering is not supported".into(),
            )));
            return;
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let context = self.async_runtime.block_on(Context::new(window, power));
            self.mount_with(context);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let context = Context::new(window, power).await;
                if proxy.send_event(WidgetEvent::Initialized(context)).is_err() {
                    log::error!("event loop closed before the render context was ready");
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: WidgetEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            WidgetEvent::Initialized(context) => self.mount_with(context),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(widget) = &self.widget {
                    widget.dispose();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                if let Some(widget) = &self.widget {
                    widget.resize();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (Some(pointer), Some(window)) = (self.pointer(), &self.window) else {
                    return;
                };
                let size = window.inner_size();
                let p = Pointer::from_client(position.x, position.y, size.width, size.height);
                pointer_moved(&pointer, p.x, p.y);
            }
            WindowEvent::CursorEntered { .. } => {
                if let Some(pointer) = self.pointer() {
                    pointer_entered(&pointer);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(pointer) = self.pointer() {
                    pointer_left(&pointer);
                }
            }
            WindowEvent::RedrawRequested => {
                let elapsed = self.started.elapsed().as_secs_f32();
                let Some(widget) = self.widget.as_mut() else {
                    return;
                };
                if widget.frame(elapsed) {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(widget) = self.widget.take() {
            widget.dispose();
        }
    }
}

/// Run one widget until its window closes.
pub fn run(config: WidgetConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<WidgetEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
