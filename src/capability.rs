//! Rendering capability detection.
//!
//! [`detect`] builds one immutable [`Capabilities`] record per session from an
//! [`EnvironmentProbe`]. It never fails: a probe that cannot create a context,
//! fails its draw test or panics produces `supported == false` with a reason.
//! Any probe context that was created is released before `detect` returns,
//! including when the probe panics halfway.
//!
//! Panics are only caught where unwinding is available. wasm32 builds abort
//! on panic, so `WebProbe` reports every failure as a value instead.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::{info, warn};

/// Why 3D rendering is not used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedReason {
    ContextCreationFailed,
    DrawTestFailed,
    GeneralError,
    LowEndDevice,
    LegacyEngine,
}

impl UnsupportedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnsupportedReason::ContextCreationFailed => "context_creation_failed",
            UnsupportedReason::DrawTestFailed => "draw_test_failed",
            UnsupportedReason::GeneralError => "general_error",
            UnsupportedReason::LowEndDevice => "low_end_device",
            UnsupportedReason::LegacyEngine => "legacy_engine",
        }
    }
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Device traits derived from the user agent string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceClass {
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_low_end_device: bool,
    pub is_safari_like: bool,
    pub is_legacy_engine: bool,
}

impl DeviceClass {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        let has = |needle: &str| ua.contains(needle);
        let is_mobile = ["android", "iphone", "ipad", "ipod", "blackberry", "iemobile", "opera mini"]
            .iter()
            .any(|m| has(m));
        let is_tablet = has("ipad") || has("tablet");
        let old_android = followed_by(&ua, "android", &["2.", "3.", "4.0", "4.1"]);
        let old_ios = followed_by(&ua, "iphone", &["os 3_", "os 4_", "os 5_", "os 6_"]);
        let is_safari_like = has("safari")
            && !["chrome", "chromium", "crios", "android"]
                .iter()
                .any(|m| has(m));
        Self {
            is_mobile,
            is_tablet,
            is_low_end_device: is_mobile && (old_android || old_ios),
            is_safari_like,
            is_legacy_engine: has("msie") || has("trident"),
        }
    }
}

/// True if one of `patterns` occurs after `marker` with at least one
/// character in between.
fn followed_by(haystack: &str, marker: &str, patterns: &[&str]) -> bool {
    let Some(start) = haystack.find(marker) else {
        return false;
    };
    let rest = &haystack[start + marker.len()..];
    patterns
        .iter()
        .any(|p| rest.match_indices(p).any(|(idx, _)| idx >= 1))
}

/// Snapshot of what the host can render, taken once per session.
#[derive(Clone, Debug, PartialEq)]
pub struct Capabilities {
    supported: bool,
    renderer_info: Option<String>,
    device: DeviceClass,
    prefers_reduced_motion: bool,
    reason: Option<UnsupportedReason>,
}

impl Capabilities {
    pub fn supported(&self) -> bool {
        self.supported
    }

    pub fn renderer_info(&self) -> Option<&str> {
        self.renderer_info.as_deref()
    }

    pub fn is_mobile(&self) -> bool {
        self.device.is_mobile
    }

    pub fn is_tablet(&self) -> bool {
        self.device.is_tablet
    }

    pub fn is_low_end_device(&self) -> bool {
        self.device.is_low_end_device
    }

    pub fn is_safari_like(&self) -> bool {
        self.device.is_safari_like
    }

    pub fn is_legacy_engine(&self) -> bool {
        self.device.is_legacy_engine
    }

    pub fn prefers_reduced_motion(&self) -> bool {
        self.prefers_reduced_motion
    }

    pub fn reason(&self) -> Option<UnsupportedReason> {
        self.reason
    }

    pub fn device(&self) -> DeviceClass {
        self.device
    }

    /// Record for a host known to render, for native runs and tests.
    pub fn assume_supported(renderer_info: impl Into<String>) -> Self {
        Self {
            supported: true,
            renderer_info: Some(renderer_info.into()),
            device: DeviceClass::default(),
            prefers_reduced_motion: false,
            reason: None,
        }
    }

    pub fn unsupported(reason: UnsupportedReason) -> Self {
        Self {
            supported: false,
            renderer_info: None,
            device: DeviceClass::default(),
            prefers_reduced_motion: false,
            reason: Some(reason),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerPreference {
    Default,
    LowPower,
    HighPerformance,
}

impl PowerPreference {
    pub fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPreference::Default => wgpu::PowerPreference::default(),
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Conservative context options used when probing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextOptions {
    pub fail_if_major_performance_caveat: bool,
    pub allow_software: bool,
    pub power_preference: PowerPreference,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            fail_if_major_performance_caveat: false,
            allow_software: true,
            power_preference: PowerPreference::Default,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProbeError {
    ContextUnavailable(String),
    DrawFailed(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::ContextUnavailable(msg) => write!(f, "no rendering context: {}", msg),
            ProbeError::DrawFailed(msg) => write!(f, "draw test failed: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}

/// A throwaway rendering context created only to test the host.
pub trait ProbeContext {
    fn renderer_info(&self) -> Option<String>;

    /// Issue a trivial draw and report whether the context accepted it.
    fn draw_test(&mut self) -> Result<(), ProbeError>;

    fn release(&mut self);
}

/// The host environment, as far as capability detection needs it.
pub trait EnvironmentProbe {
    fn user_agent(&self) -> String;

    fn prefers_reduced_motion(&self) -> bool;

    fn create_context(&self, options: &ContextOptions) -> Result<Box<dyn ProbeContext>, ProbeError>;
}

/// Releases the probe context on every exit path.
struct ReleaseOnDrop(Box<dyn ProbeContext>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

struct ProbeOutcome {
    renderer_info: Option<String>,
    reason: Option<UnsupportedReason>,
}

fn probe_context(probe: &dyn EnvironmentProbe) -> ProbeOutcome {
    let context = match probe.create_context(&ContextOptions::default()) {
        Ok(context) => context,
        Err(e) => {
            warn!("capability probe: {}", e);
            return ProbeOutcome {
                renderer_info: None,
                reason: Some(UnsupportedReason::ContextCreationFailed),
            };
        }
    };
    let mut guard = ReleaseOnDrop(context);
    let renderer_info = guard.0.renderer_info();
    let reason = match guard.0.draw_test() {
        Ok(()) => None,
        Err(e) => {
            warn!("capability probe: {}", e);
            Some(UnsupportedReason::DrawTestFailed)
        }
    };
    ProbeOutcome {
        renderer_info,
        reason,
    }
}

/// Classify the host. Never leaks the probe context; a panicking probe is
/// contained on targets that unwind.
pub fn detect(probe: &dyn EnvironmentProbe) -> Capabilities {
    let environment = catch_unwind(AssertUnwindSafe(|| {
        (
            DeviceClass::from_user_agent(&probe.user_agent()),
            probe.prefers_reduced_motion(),
        )
    }));
    let (device, prefers_reduced_motion) = match environment {
        Ok(env) => env,
        Err(_) => {
            warn!("capability probe panicked while reading the environment");
            return Capabilities::unsupported(UnsupportedReason::GeneralError);
        }
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| probe_context(probe))).unwrap_or_else(|_| {
        warn!("capability probe panicked while testing the context");
        ProbeOutcome {
            renderer_info: None,
            reason: Some(UnsupportedReason::GeneralError),
        }
    });

    // Low-end and legacy hosts get the static panel even if they can draw.
    let reason = outcome.reason.or(if device.is_low_end_device {
        Some(UnsupportedReason::LowEndDevice)
    } else if device.is_legacy_engine {
        Some(UnsupportedReason::LegacyEngine)
    } else {
        None
    });

    let capabilities = Capabilities {
        supported: reason.is_none(),
        renderer_info: outcome.renderer_info,
        device,
        prefers_reduced_motion,
        reason,
    };
    info!(
        "capabilities: supported={} reason={:?} renderer={:?}",
        capabilities.supported,
        capabilities.reason.map(|r| r.code()),
        capabilities.renderer_info
    );
    capabilities
}

#[cfg(target_arch = "wasm32")]
pub use web::WebProbe;

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::JsCast;
    use web_sys::{
        HtmlCanvasElement, WebGlContextAttributes, WebGlPowerPreference, WebGlRenderingContext as GL,
        WebglLoseContext,
    };

    use super::{ContextOptions, EnvironmentProbe, PowerPreference, ProbeContext, ProbeError};

    /// Probes the browser the module runs in.
    #[derive(Debug, Default)]
    pub struct WebProbe;

    struct WebGlProbe {
        gl: Option<GL>,
    }

    impl ProbeContext for WebGlProbe {
        fn renderer_info(&self) -> Option<String> {
            let gl = self.gl.as_ref()?;
            gl.get_parameter(GL::RENDERER).ok()?.as_string()
        }

        fn draw_test(&mut self) -> Result<(), ProbeError> {
            let gl = self
                .gl
                .as_ref()
                .ok_or_else(|| ProbeError::DrawFailed("context already released".into()))?;
            gl.viewport(0, 0, 1, 1);
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(GL::COLOR_BUFFER_BIT);
            match gl.get_error() {
                GL::NO_ERROR => Ok(()),
                code => Err(ProbeError::DrawFailed(format!("gl error {:#x}", code))),
            }
        }

        fn release(&mut self) {
            if let Some(gl) = self.gl.take() {
                let lose = gl
                    .get_extension("WEBGL_lose_context")
                    .ok()
                    .flatten()
                    .and_then(|ext| ext.dyn_into::<WebglLoseContext>().ok());
                if let Some(lose) = lose {
                    lose.lose_context();
                }
            }
        }
    }

    impl EnvironmentProbe for WebProbe {
        fn user_agent(&self) -> String {
            web_sys::window()
                .and_then(|w| w.navigator().user_agent().ok())
                .unwrap_or_default()
        }

        fn prefers_reduced_motion(&self) -> bool {
            web_sys::window()
                .and_then(|w| w.match_media("(prefers-reduced-motion: reduce)").ok().flatten())
                .map(|m| m.matches())
                .unwrap_or(false)
        }

        fn create_context(&self, options: &ContextOptions) -> Result<Box<dyn ProbeContext>, ProbeError> {
            let unavailable = |msg: &str| ProbeError::ContextUnavailable(msg.to_string());
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| unavailable("no document"))?;
            let canvas: HtmlCanvasElement = document
                .create_element("canvas")
                .map_err(|_| unavailable("cannot create canvas"))?
                .dyn_into()
                .map_err(|_| unavailable("canvas element has the wrong type"))?;
            canvas.set_width(1);
            canvas.set_height(1);

            let attributes = WebGlContextAttributes::new();
            attributes.set_fail_if_major_performance_caveat(options.fail_if_major_performance_caveat);
            attributes.set_power_preference(match options.power_preference {
                PowerPreference::Default => WebGlPowerPreference::Default,
                PowerPreference::LowPower => WebGlPowerPreference::LowPower,
                PowerPreference::HighPerformance => WebGlPowerPreference::HighPerformance,
            });

            let context = ["webgl", "experimental-webgl"]
                .iter()
                .find_map(|kind| {
                    canvas
                        .get_context_with_context_options(kind, &attributes)
                        .ok()
                        .flatten()
                })
                .ok_or_else(|| unavailable("webgl is not available"))?;
            let gl: GL = context
                .dyn_into()
                .map_err(|_| unavailable("unexpected context type"))?;
            Ok(Box::new(WebGlProbe { gl: Some(gl) }))
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::AdapterProbe;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::{ContextOptions, EnvironmentProbe, ProbeContext, ProbeError};

    /// Probes the local GPU through wgpu. Native hosts report no user agent,
    /// so only the adapter decides support.
    #[derive(Debug, Default)]
    pub struct AdapterProbe;

    struct AdapterContext {
        device: Option<(wgpu::Device, wgpu::Queue)>,
        info: String,
    }

    impl ProbeContext for AdapterContext {
        fn renderer_info(&self) -> Option<String> {
            Some(self.info.clone())
        }

        fn draw_test(&mut self) -> Result<(), ProbeError> {
            let (device, queue) = self
                .device
                .as_ref()
                .ok_or_else(|| ProbeError::DrawFailed("context already released".into()))?;
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("probe target"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("probe encoder"),
            });
            {
                let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("probe pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    ..Default::default()
                });
            }
            queue.submit(std::iter::once(encoder.finish()));
            Ok(())
        }

        fn release(&mut self) {
            if let Some((device, _queue)) = self.device.take() {
                device.destroy();
            }
        }
    }

    impl EnvironmentProbe for AdapterProbe {
        fn user_agent(&self) -> String {
            String::new()
        }

        fn prefers_reduced_motion(&self) -> bool {
            false
        }

        fn create_context(&self, options: &ContextOptions) -> Result<Box<dyn ProbeContext>, ProbeError> {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::PRIMARY,
                ..Default::default()
            });
            let power_preference = options.power_preference.to_wgpu();
            let adapter = futures::executor::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                },
            ))
            .or_else(|e| {
                if !options.allow_software {
                    return Err(e);
                }
                futures::executor::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference,
                    compatible_surface: None,
                    force_fallback_adapter: true,
                }))
            })
            .map_err(|e| ProbeError::ContextUnavailable(e.to_string()))?;

            let info = adapter.get_info();
            let (device, queue) = futures::executor::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("probe device"),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                    ..Default::default()
                },
            ))
            .map_err(|e| ProbeError::ContextUnavailable(e.to_string()))?;
            Ok(Box::new(AdapterContext {
                device: Some((device, queue)),
                info: format!("{} ({:?})", info.name, info.backend),
            }))
        }
    }
}
