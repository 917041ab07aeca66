use super::{mk_layout, mk_render_pipeline, DepthMode, POSITION_LAYOUT};

/// The skybox. It sits on the far plane, so it passes the depth test only
/// where nothing else was drawn and never writes depth itself.
pub fn mk_envcube_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    uniform_layout: &wgpu::BindGroupLayout,
    cube_layout: &wgpu::BindGroupLayout,
    source: &str,
) -> wgpu::RenderPipeline {
    let layout = mk_layout(device, "Envcube Pipeline Layout", &[uniform_layout, cube_layout]);
    let depth = DepthMode {
        compare: wgpu::CompareFunction::LessEqual,
        write: false,
        ..DepthMode::OPAQUE
    };
    mk_render_pipeline(
        device,
        "Envcube Pipeline",
        &layout,
        Some(color_format),
        depth,
        &[POSITION_LAYOUT],
        source,
    )
}
