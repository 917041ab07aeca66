use super::{mk_layout, mk_render_pipeline, DepthMode, NORMAL_LAYOUT, POSITION_LAYOUT};

/// The mirror surface: samples the live cube map along the reflected view ray.
pub fn mk_reflect_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    uniform_layout: &wgpu::BindGroupLayout,
    cube_layout: &wgpu::BindGroupLayout,
    source: &str,
) -> wgpu::RenderPipeline {
    let layout = mk_layout(device, "Reflect Pipeline Layout", &[uniform_layout, cube_layout]);
    mk_render_pipeline(
        device,
        "Reflect Pipeline",
        &layout,
        Some(color_format),
        DepthMode::OPAQUE,
        &[POSITION_LAYOUT, NORMAL_LAYOUT],
        source,
    )
}
