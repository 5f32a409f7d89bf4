//! Render pipelines of the wgpu backend.
//!
//! Three pipelines cover every widget: lit opaque meshes, lit blended
//! meshes and point clouds. All of them share the globals bind group
//! (camera + lights, group 0) and a per-material bind group (group 1).

pub mod mesh;
pub mod points;

use crate::{
    data_structures::shape::{MaterialDescriptor, Shading},
    render::{LightRaw, MAX_LIGHTS},
};

/// Globals as laid out in the shaders: camera, then the light table.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    /// x = number of active lights.
    pub count: [u32; 4],
    pub lights: [LightRaw; MAX_LIGHTS],
}

impl LightsUniform {
    pub fn new(lights: &[LightRaw]) -> Self {
        let mut uniform = Self {
            count: [0; 4],
            lights: [LightRaw::default(); MAX_LIGHTS],
        };
        if lights.len() > MAX_LIGHTS {
            log::warn!("{} lights in scene, only {} are used", lights.len(), MAX_LIGHTS);
        }
        for (slot, light) in uniform.lights.iter_mut().zip(lights) {
            *slot = *light;
        }
        uniform.count[0] = lights.len().min(MAX_LIGHTS) as u32;
        uniform
    }
}

/// Material parameters as laid out in the shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    /// rgb + opacity
    pub color: [f32; 4],
    /// shading kind (0 phong, 1 standard, 2 shadow, 3 points), shininess,
    /// metalness, roughness
    pub params: [f32; 4],
    /// emissive factor, point size, additive flag, unused
    pub extra: [f32; 4],
}

impl MaterialUniform {
    pub fn is_additive(&self) -> bool {
        self.extra[2] > 0.5
    }
}

impl From<&MaterialDescriptor> for MaterialUniform {
    fn from(material: &MaterialDescriptor) -> Self {
        let [r, g, b] = material.color.to_array();
        let (params, size, additive) = match material.shading {
            Shading::Phong { shininess } => ([0.0, shininess, 0.0, 0.0], 0.0, false),
            Shading::Standard {
                metalness,
                roughness,
            } => ([1.0, 0.0, metalness, roughness], 0.0, false),
            Shading::Shadow => ([2.0, 0.0, 0.0, 0.0], 0.0, false),
            Shading::Points { size, additive } => ([3.0, 0.0, 0.0, 0.0], size, additive),
        };
        Self {
            color: [r, g, b, material.opacity.clamp(0.0, 1.0)],
            params,
            extra: [material.emissive, size, if additive { 1.0 } else { 0.0 }, 0.0],
        }
    }
}

pub fn uniform_layout_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_layout_entry(0, stages), uniform_layout_entry(1, stages)],
        label: Some("globals_bind_group_layout"),
    })
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_layout_entry(
            0,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        )],
        label: Some("material_bind_group_layout"),
    })
}

/// Fixed-function state that differs between the pipelines.
#[derive(Clone, Copy, Debug)]
pub struct PipelineState {
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub blend: Option<wgpu::BlendState>,
    pub depth_write: bool,
}

pub const ALPHA_BLENDING: wgpu::BlendState = wgpu::BlendState::ALPHA_BLENDING;

pub const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    state: PipelineState,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: state.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: state.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: state.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: state.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
