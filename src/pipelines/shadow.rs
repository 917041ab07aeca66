use super::{mk_layout, mk_render_pipeline, DepthMode, POSITION_LAYOUT};

/// Depth-only pipeline rendering shapes from the light into the shadow map.
pub fn mk_shadow_pipeline(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
    source: &str,
) -> wgpu::RenderPipeline {
    let layout = mk_layout(device, "Shadow Pipeline Layout", &[uniform_layout]);
    // Pushes stored depth away from the light to keep lit faces from shadowing themselves.
    let depth = DepthMode {
        bias: wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        },
        ..DepthMode::OPAQUE
    };
    mk_render_pipeline(
        device,
        "Shadow Pipeline",
        &layout,
        None,
        depth,
        &[POSITION_LAYOUT],
        source,
    )
}
