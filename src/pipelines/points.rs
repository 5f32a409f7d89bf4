use crate::{
    data_structures::{instance::InstanceRaw, texture::Texture},
    resources::geometry::{PointVertex, Vertex},
};

use super::{ADDITIVE_BLENDING, ALPHA_BLENDING, PipelineState, mk_render_pipeline};

/// Point clouds for particle fields. Points are rasterized at one pixel
/// (WebGL2 through wgpu has no point size), without depth writes.
pub fn mk_points_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    globals_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
    additive: bool,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Points Pipeline Layout"),
        bind_group_layouts: &[globals_layout, material_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Points Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("points.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        if additive {
            "Additive Points Pipeline"
        } else {
            "Points Pipeline"
        },
        &layout,
        config.format,
        Some(Texture::DEPTH_FORMAT),
        PipelineState {
            topology: wgpu::PrimitiveTopology::PointList,
            cull_mode: None,
            blend: Some(if additive {
                ADDITIVE_BLENDING
            } else {
                ALPHA_BLENDING
            }),
            depth_write: false,
        },
        &[PointVertex::desc(), InstanceRaw::desc()],
        shader,
    )
}
