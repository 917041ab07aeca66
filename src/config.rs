//! Renderer configuration.

/// Tunables for the offscreen passes and the frame clear.
///
/// `Default` mirrors the values the levels were designed around: a 2048²
/// shadow map rendered with a 100° light frustum and a 512² mirror cube.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub shadow_map_size: u32,
    /// Vertical field of view of the light frustum, in degrees.
    pub shadow_fov: f32,
    pub reflection_size: u32,
    /// Flat colour multiplied into the mirror's cube-map sample.
    pub mirror_tint: [f32; 3],
    pub clear_colour: wgpu::Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            shadow_fov: 100.0,
            reflection_size: 512,
            mirror_tint: [0.9, 0.95, 1.0],
            clear_colour: wgpu::Color::BLACK,
        }
    }
}
