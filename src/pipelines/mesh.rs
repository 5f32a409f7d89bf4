use crate::{
    data_structures::{instance::InstanceRaw, texture::Texture},
    resources::geometry::{ModelVertex, Vertex},
};

use super::{ALPHA_BLENDING, PipelineState, mk_render_pipeline};

fn mesh_layout(
    device: &wgpu::Device,
    globals_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts: &[globals_layout, material_layout],
        push_constant_ranges: &[],
    })
}

fn shader() -> wgpu::ShaderModuleDescriptor<'static> {
    wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("mesh.wgsl").into()),
    }
}

pub fn mk_opaque_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    globals_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    mk_render_pipeline(
        device,
        "Opaque Pipeline",
        &mesh_layout(device, globals_layout, material_layout),
        config.format,
        Some(Texture::DEPTH_FORMAT),
        PipelineState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            blend: Some(wgpu::BlendState::REPLACE),
            depth_write: true,
        },
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader(),
    )
}

/// Blended meshes keep depth testing but do not write depth, and draw both
/// faces so translucent bars show their back side.
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    globals_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    mk_render_pipeline(
        device,
        "Transparent Pipeline",
        &mesh_layout(device, globals_layout, material_layout),
        config.format,
        Some(Texture::DEPTH_FORMAT),
        PipelineState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            blend: Some(ALPHA_BLENDING),
            depth_write: false,
        },
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader(),
    )
}
