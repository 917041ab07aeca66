use super::{mk_layout, mk_render_pipeline, DepthMode, NORMAL_LAYOUT, POSITION_LAYOUT, TEXCOORD_LAYOUT};

/// Phong-lit, textured and shadowed shapes. Group 1 carries the shadow map and the diffuse texture.
pub fn mk_main_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    uniform_layout: &wgpu::BindGroupLayout,
    shadow_diffuse_layout: &wgpu::BindGroupLayout,
    source: &str,
) -> wgpu::RenderPipeline {
    let layout = mk_layout(
        device,
        "Main Pipeline Layout",
        &[uniform_layout, shadow_diffuse_layout],
    );
    mk_render_pipeline(
        device,
        "Main Pipeline",
        &layout,
        Some(color_format),
        DepthMode::OPAQUE,
        &[POSITION_LAYOUT, NORMAL_LAYOUT, TEXCOORD_LAYOUT],
        source,
    )
}
