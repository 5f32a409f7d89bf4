#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use cgmath::Vector3;
use folio_ngin::{
    capability::{ContextOptions, EnvironmentProbe, ProbeContext, ProbeError},
    data_structures::{
        particles::{ParticleError, PositionSampler},
        shape::MaterialDescriptor,
    },
    fallback::Container,
    render::{Frame, GeometryHandle, MaterialHandle, RenderBackend, RenderError},
    resources::geometry::GeometryData,
    stats::{ApiRepo, ApiUser, KeyValueStore, StatsError, StatsSource},
};
use rand::RngCore;

pub(crate) const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub(crate) const MAC_SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";
pub(crate) const MODERN_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
pub(crate) const OLD_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 5_1 like Mac OS X) AppleWebKit/534.46 (KHTML, like Gecko) Version/5.1 Mobile/9B176 Safari/7534.48.3";
pub(crate) const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";
pub(crate) const MODERN_ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
pub(crate) const OLD_ANDROID: &str = "Mozilla/5.0 (Linux; U; Android 2.3.6; en-us; GT-S5830 Build/GINGERBREAD) AppleWebKit/533.1 (KHTML, like Gecko) Version/4.0 Mobile Safari/533.1";
pub(crate) const IE11: &str = "Mozilla/5.0 (Windows NT 10.0; Trident/7.0; rv:11.0) like Gecko";

/// What a [`RecordingBackend`] saw. Shared with the test so it can be
/// inspected after the backend moved into a session.
#[derive(Debug, Default)]
pub(crate) struct BackendLog {
    geometries_created: usize,
    materials_created: usize,
    live_geometries: BTreeSet<GeometryHandle>,
    live_materials: BTreeSet<MaterialHandle>,
    unknown_disposals: usize,
    frames: Vec<Frame>,
    resizes: Vec<(u32, u32)>,
    releases: usize,
}

impl BackendLog {
    pub fn geometries_created(&self) -> usize {
        self.geometries_created
    }

    pub fn materials_created(&self) -> usize {
        self.materials_created
    }

    pub fn live_resources(&self) -> usize {
        self.live_geometries.len() + self.live_materials.len()
    }

    /// Disposals of handles that were never created or already disposed.
    pub fn unknown_disposals(&self) -> usize {
        self.unknown_disposals
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn resizes(&self) -> &[(u32, u32)] {
        &self.resizes
    }

    pub fn releases(&self) -> usize {
        self.releases
    }
}

/// In-memory backend that hands out sequential handles and records calls.
pub(crate) struct RecordingBackend {
    log: Rc<RefCell<BackendLog>>,
    next_handle: u32,
    allocation_budget: Option<usize>,
    fail_render_after: Option<usize>,
    on_render: RenderHook,
}

/// Callback run after each successful render, set once the session exists.
pub(crate) type RenderHook = Rc<RefCell<Option<Box<dyn Fn()>>>>;

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(BackendLog::default())),
            next_handle: 0,
            allocation_budget: None,
            fail_render_after: None,
            on_render: Rc::new(RefCell::new(None)),
        }
    }

    /// Refuse every resource request after `budget` successful ones.
    pub fn with_allocation_budget(mut self, budget: usize) -> Self {
        self.allocation_budget = Some(budget);
        self
    }

    /// Report a lost context on every render after `frames` good ones.
    pub fn failing_render_after(mut self, frames: usize) -> Self {
        self.fail_render_after = Some(frames);
        self
    }

    pub fn log(&self) -> Rc<RefCell<BackendLog>> {
        self.log.clone()
    }

    pub fn render_hook(&self) -> RenderHook {
        self.on_render.clone()
    }

    pub fn boxed(self) -> Box<dyn RenderBackend> {
        Box::new(self)
    }

    fn allocate(&mut self) -> Result<u32, RenderError> {
        if let Some(budget) = self.allocation_budget.as_mut() {
            if *budget == 0 {
                return Err(RenderError::OutOfMemory);
            }
            *budget -= 1;
        }
        self.next_handle += 1;
        Ok(self.next_handle)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_geometry(&mut self, data: &GeometryData) -> Result<GeometryHandle, RenderError> {
        if data.vertex_count() == 0 {
            return Err(RenderError::InvalidResource("empty geometry".into()));
        }
        let handle = GeometryHandle(self.allocate()?);
        let mut log = self.log.borrow_mut();
        log.geometries_created += 1;
        log.live_geometries.insert(handle);
        Ok(handle)
    }

    fn create_material(&mut self, _: &MaterialDescriptor) -> Result<MaterialHandle, RenderError> {
        let handle = MaterialHandle(self.allocate()?);
        let mut log = self.log.borrow_mut();
        log.materials_created += 1;
        log.live_materials.insert(handle);
        Ok(handle)
    }

    fn dispose_geometry(&mut self, handle: GeometryHandle) {
        let mut log = self.log.borrow_mut();
        if !log.live_geometries.remove(&handle) {
            log.unknown_disposals += 1;
        }
    }

    fn dispose_material(&mut self, handle: MaterialHandle) {
        let mut log = self.log.borrow_mut();
        if !log.live_materials.remove(&handle) {
            log.unknown_disposals += 1;
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().resizes.push((width, height));
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        {
            let mut log = self.log.borrow_mut();
            if self
                .fail_render_after
                .is_some_and(|limit| log.frames.len() >= limit)
            {
                return Err(RenderError::ContextLost("context lost for testing".into()));
            }
            log.frames.push(frame.clone());
        }
        if let Some(hook) = self.on_render.borrow().as_ref() {
            hook();
        }
        Ok(())
    }

    fn release(&mut self) {
        self.log.borrow_mut().releases += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProbeMode {
    Healthy,
    NoContext,
    DrawFails,
    PanicsOnDraw,
    PanicsOnUserAgent,
}

/// Scripted host environment counting probe contexts.
pub(crate) struct FakeProbe {
    user_agent: String,
    reduced_motion: bool,
    mode: ProbeMode,
    created: Rc<Cell<usize>>,
    released: Rc<Cell<usize>>,
}

impl FakeProbe {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            reduced_motion: false,
            mode: ProbeMode::Healthy,
            created: Rc::new(Cell::new(0)),
            released: Rc::new(Cell::new(0)),
        }
    }

    pub fn desktop() -> Self {
        Self::new(DESKTOP_CHROME)
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reduced_motion(mut self) -> Self {
        self.reduced_motion = true;
        self
    }

    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }
}

struct FakeProbeContext {
    mode: ProbeMode,
    released: Rc<Cell<usize>>,
}

impl ProbeContext for FakeProbeContext {
    fn renderer_info(&self) -> Option<String> {
        Some("FakeGPU".to_string())
    }

    fn draw_test(&mut self) -> Result<(), ProbeError> {
        match self.mode {
            ProbeMode::DrawFails => Err(ProbeError::DrawFailed("gl error 0x500".into())),
            ProbeMode::PanicsOnDraw => panic!("driver crashed"),
            _ => Ok(()),
        }
    }

    fn release(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

impl EnvironmentProbe for FakeProbe {
    fn user_agent(&self) -> String {
        if self.mode == ProbeMode::PanicsOnUserAgent {
            panic!("navigator unavailable");
        }
        self.user_agent.clone()
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    fn create_context(&self, _: &ContextOptions) -> Result<Box<dyn ProbeContext>, ProbeError> {
        if self.mode == ProbeMode::NoContext {
            return Err(ProbeError::ContextUnavailable("webgl disabled".into()));
        }
        self.created.set(self.created.get() + 1);
        Ok(Box::new(FakeProbeContext {
            mode: self.mode,
            released: self.released.clone(),
        }))
    }
}

/// Container element recording what was put into it.
pub(crate) struct FakeContainer {
    size: Cell<(u32, u32)>,
    clears: Cell<usize>,
    html: RefCell<Vec<String>>,
}

impl FakeContainer {
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            size: Cell::new((width, height)),
            clears: Cell::new(0),
            html: RefCell::new(Vec::new()),
        })
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }

    pub fn clears(&self) -> usize {
        self.clears.get()
    }

    pub fn inserted(&self) -> Vec<String> {
        self.html.borrow().clone()
    }
}

impl Container for FakeContainer {
    fn client_size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn clear_children(&self) {
        self.clears.set(self.clears.get() + 1);
        self.html.borrow_mut().clear();
    }

    fn insert_html(&self, html: &str) {
        self.html.borrow_mut().push(html.to_string());
    }
}

/// Sampler that never produces a point.
pub(crate) struct FailingSampler;

impl PositionSampler for FailingSampler {
    fn sample(&mut self, _: &mut dyn RngCore, _: f32) -> Result<Vector3<f32>, ParticleError> {
        Err(ParticleError::SamplingExhausted { attempts: 64 })
    }
}

/// Sampler producing non-finite coordinates.
pub(crate) struct NanSampler;

impl PositionSampler for NanSampler {
    fn sample(&mut self, _: &mut dyn RngCore, _: f32) -> Result<Vector3<f32>, ParticleError> {
        Ok(Vector3::new(f32::NAN, f32::INFINITY, 0.5))
    }
}

/// Random source replaying a fixed list of words, cycling when exhausted.
pub(crate) struct ScriptedRng {
    words: Vec<u32>,
    next: usize,
}

impl ScriptedRng {
    pub fn new(words: &[u32]) -> Self {
        Self {
            words: words.to_vec(),
            next: 0,
        }
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        let word = self.words[self.next % self.words.len()];
        self.next += 1;
        word
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.next_u32() as u64;
        let high = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.raw(key)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if self.read_only {
            return false;
        }
        self.insert_raw(key, value);
        true
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Canned GitHub responses with call counting.
pub(crate) struct FakeStatsSource {
    user: ApiUser,
    repos: Vec<ApiRepo>,
    failing: bool,
    calls: Cell<usize>,
}

impl FakeStatsSource {
    pub fn new(user: ApiUser, repos: Vec<ApiRepo>) -> Self {
        Self {
            user,
            repos,
            failing: false,
            calls: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(ApiUser::default(), Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl StatsSource for FakeStatsSource {
    async fn fetch_user(&self, _: &str) -> Result<ApiUser, StatsError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing {
            return Err(StatsError::Fetch("HTTP 403".into()));
        }
        Ok(self.user.clone())
    }

    async fn fetch_repos(&self, _: &str) -> Result<Vec<ApiRepo>, StatsError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing {
            return Err(StatsError::Fetch("HTTP 403".into()));
        }
        Ok(self.repos.clone())
    }
}

pub(crate) fn repo(name: &str, language: Option<&str>, stars: u32, forks: u32) -> ApiRepo {
    ApiRepo {
        name: name.to_string(),
        description: None,
        stargazers_count: stars,
        forks_count: forks,
        language: language.map(str::to_string),
        html_url: format!("https://github.com/DenxVil/{}", name),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

/// Component-wise comparison for cgmath values converted to arrays.
pub(crate) fn assert_close<const N: usize>(a: [f32; N], b: [f32; N], epsilon: f32) {
    for (x, y) in a.iter().zip(b.iter()) {
        approx::assert_abs_diff_eq!(*x, *y, epsilon = epsilon);
    }
}
