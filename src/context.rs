//! The wgpu render backend.
//!
//! [`Context`] owns the surface, device and queue of one widget together with
//! every buffer the scene asked for. Scene code only sees opaque handles
//! through [`RenderBackend`]; disposing a handle destroys its buffers right
//! away and [`RenderBackend::release`] tears the whole device down.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::CameraUniform,
    capability::PowerPreference,
    data_structures::{instance::InstanceRaw, shape::MaterialDescriptor, texture::Texture},
    pipelines::{self, LightsUniform, MaterialUniform},
    render::{Draw, Frame, GeometryHandle, MaterialHandle, RenderBackend, RenderError},
    resources::geometry::GeometryData,
};

#[derive(Debug)]
struct GpuGeometry {
    vertices: wgpu::Buffer,
    indices: Option<wgpu::Buffer>,
    count: u32,
}

impl GpuGeometry {
    fn destroy(&self) {
        self.vertices.destroy();
        if let Some(indices) = &self.indices {
            indices.destroy();
        }
    }
}

#[derive(Debug)]
struct GpuMaterial {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    additive: bool,
}

#[derive(Debug)]
struct Pipelines {
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    points: wgpu::RenderPipeline,
    points_additive: wgpu::RenderPipeline,
}

#[derive(Debug)]
pub struct Context {
    window: Arc<Window>,
    depth_texture: Texture,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    camera_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    globals: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,
    geometries: HashMap<GeometryHandle, GpuGeometry>,
    materials: HashMap<MaterialHandle, GpuMaterial>,
    next_handle: u32,
    instances: wgpu::Buffer,
    instance_capacity: usize,
    is_surface_configured: bool,
    lost: Arc<AtomicBool>,
    released: bool,
}

const INSTANCE_STRIDE: wgpu::BufferAddress = std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress;

fn instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: INSTANCE_STRIDE * capacity.max(1) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl Context {
    pub async fn new(window: Arc<Window>, power: PowerPreference) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let init = |e: &dyn std::fmt::Display| RenderError::InitializationFailed(e.to_string());

        log::info!("wgpu setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| init(&e))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power.to_wgpu(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| init(&e))?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("widget device"),
                required_features: wgpu::Features::empty(),
                // Widgets must run on WebGL2, so stay within its limits everywhere.
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|e| init(&e))?;

        let lost = Arc::new(AtomicBool::new(false));
        {
            let lost = lost.clone();
            device.set_device_lost_callback(move |reason, message| {
                log::error!("device lost ({:?}): {}", reason, message);
                lost.store(true, Ordering::SeqCst);
            });
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| RenderError::InitializationFailed("surface has no formats".into()))?;
        // Widgets sit on top of the page, so prefer a surface that keeps alpha.
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|m| *m == wgpu::CompositeAlphaMode::PreMultiplied)
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[LightsUniform::new(&[])]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let globals_layout = pipelines::globals_layout(&device);
        let material_layout = pipelines::material_layout(&device);
        let globals = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
            label: Some("globals_bind_group"),
        });

        let pipelines = Pipelines {
            opaque: pipelines::mesh::mk_opaque_pipeline(&device, &config, &globals_layout, &material_layout),
            transparent: pipelines::mesh::mk_transparent_pipeline(
                &device,
                &config,
                &globals_layout,
                &material_layout,
            ),
            points: pipelines::points::mk_points_pipeline(
                &device,
                &config,
                &globals_layout,
                &material_layout,
                false,
            ),
            points_additive: pipelines::points::mk_points_pipeline(
                &device,
                &config,
                &globals_layout,
                &material_layout,
                true,
            ),
        };

        let depth_texture = Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        let instances = instance_buffer(&device, 64);

        log::info!("render context ready: {:?}", adapter.get_info().name);
        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera_buffer,
            lights_buffer,
            globals,
            material_layout,
            pipelines,
            geometries: HashMap::new(),
            materials: HashMap::new(),
            next_handle: 0,
            instances,
            instance_capacity: 64,
            is_surface_configured: false,
            lost,
            released: false,
        })
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_alive(&self) -> Result<(), RenderError> {
        if self.released {
            return Err(RenderError::ContextLost("context was released".into()));
        }
        if self.lost.load(Ordering::SeqCst) {
            return Err(RenderError::ContextLost("device lost".into()));
        }
        Ok(())
    }

    fn reserve_instances(&mut self, count: usize) {
        if count <= self.instance_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        self.instances.destroy();
        self.instances = instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
    }

    fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, draw: &Draw, slot: wgpu::BufferAddress) {
        let (Some(geometry), Some(material)) = (
            self.geometries.get(&draw.geometry),
            self.materials.get(&draw.material),
        ) else {
            return;
        };
        render_pass.set_bind_group(1, &material.bind_group, &[]);
        render_pass.set_vertex_buffer(0, geometry.vertices.slice(..));
        render_pass.set_vertex_buffer(
            1,
            self.instances
                .slice(slot * INSTANCE_STRIDE..(slot + 1) * INSTANCE_STRIDE),
        );
        match &geometry.indices {
            Some(indices) => {
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..geometry.count, 0, 0..1);
            }
            None => render_pass.draw(0..geometry.count, 0..1),
        }
    }

    fn validate(&self, draws: &[Draw]) -> Result<(), RenderError> {
        for draw in draws {
            if !self.geometries.contains_key(&draw.geometry) {
                return Err(RenderError::InvalidResource(format!("geometry {:?}", draw.geometry)));
            }
            if !self.materials.contains_key(&draw.material) {
                return Err(RenderError::InvalidResource(format!("material {:?}", draw.material)));
            }
        }
        Ok(())
    }
}

impl RenderBackend for Context {
    fn create_geometry(&mut self, data: &GeometryData) -> Result<GeometryHandle, RenderError> {
        self.check_alive()?;
        if data.element_count() == 0 {
            return Err(RenderError::InvalidResource(format!("empty {} geometry", data.label())));
        }
        let geometry = match data {
            GeometryData::Mesh {
                label,
                vertices,
                indices,
            } => GpuGeometry {
                vertices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", label)),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Index Buffer", label)),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                })),
                count: indices.len() as u32,
            },
            GeometryData::Points { vertices } => GpuGeometry {
                vertices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Points Vertex Buffer"),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: None,
                count: vertices.len() as u32,
            },
        };
        let handle = GeometryHandle(self.next());
        self.geometries.insert(handle, geometry);
        Ok(handle)
    }

    fn create_material(&mut self, material: &MaterialDescriptor) -> Result<MaterialHandle, RenderError> {
        self.check_alive()?;
        let uniform = MaterialUniform::from(material);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("material_bind_group"),
        });
        let handle = MaterialHandle(self.next());
        self.materials.insert(
            handle,
            GpuMaterial {
                buffer,
                bind_group,
                additive: uniform.is_additive(),
            },
        );
        Ok(handle)
    }

    fn dispose_geometry(&mut self, handle: GeometryHandle) {
        match self.geometries.remove(&handle) {
            Some(geometry) => geometry.destroy(),
            None => log::warn!("geometry {:?} disposed twice", handle),
        }
    }

    fn dispose_material(&mut self, handle: MaterialHandle) {
        match self.materials.remove(&handle) {
            Some(material) => material.buffer.destroy(),
            None => log::warn!("material {:?} disposed twice", handle),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.released {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        self.is_surface_configured = true;
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.check_alive()?;
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }
        let batches = &frame.batches;
        self.validate(&batches.opaque)?;
        self.validate(&batches.transparent)?;
        self.validate(&batches.points)?;

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Timeout) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(e) => return Err(RenderError::ContextLost(e.to_string())),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[frame.camera]));
        self.queue.write_buffer(
            &self.lights_buffer,
            0,
            bytemuck::cast_slice(&[LightsUniform::new(&frame.lights)]),
        );
        let transforms: Vec<InstanceRaw> = batches.iter().map(|d| d.transform).collect();
        self.reserve_instances(transforms.len());
        if !transforms.is_empty() {
            self.queue
                .write_buffer(&self.instances, 0, bytemuck::cast_slice(&transforms));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_bind_group(0, &self.globals, &[]);

            // Draws are submitted in batch order, matching the instance buffer.
            let mut slot: wgpu::BufferAddress = 0;
            render_pass.set_pipeline(&self.pipelines.opaque);
            for draw in &batches.opaque {
                self.draw(&mut render_pass, draw, slot);
                slot += 1;
            }
            render_pass.set_pipeline(&self.pipelines.transparent);
            for draw in &batches.transparent {
                self.draw(&mut render_pass, draw, slot);
                slot += 1;
            }
            for draw in &batches.points {
                let additive = self
                    .materials
                    .get(&draw.material)
                    .is_some_and(|m| m.additive);
                render_pass.set_pipeline(if additive {
                    &self.pipelines.points_additive
                } else {
                    &self.pipelines.points
                });
                self.draw(&mut render_pass, draw, slot);
                slot += 1;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for (_, geometry) in self.geometries.drain() {
            geometry.destroy();
        }
        for (_, material) in self.materials.drain() {
            material.buffer.destroy();
        }
        self.instances.destroy();
        self.camera_buffer.destroy();
        self.lights_buffer.destroy();
        self.device.destroy();
        log::info!("render context released");
    }
}
