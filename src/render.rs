//! Frame composition.
//!
//! This module defines the CPU-side description of one `draw()`: a [`Frame`]
//! is an ordered list of [`Pass`]es, each naming the target it renders into,
//! the program it renders with and the [`DrawCall`]s it issues. Everything a
//! draw needs is already computed into its [`DrawUniforms`], so a backend
//! only has to bind and draw.
//!
//! # Key types
//!
//! - [`Frame`] is the whole frame, executed front to back
//! - [`Pass`] is one render pass over one target
//! - [`DrawCall`] draws one registered mesh
//! - [`DrawUniforms`] is the per-draw uniform block, laid out like the WGSL struct
//!

use cgmath::{Matrix4, Point3, SquareMatrix};

use crate::backend::{CubeFace, MeshId, TextureId};

/// Where a pass renders to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Depth-only square map rendered from the light.
    ShadowMap,
    /// The window surface (or the offscreen colour target when headless).
    Surface,
    /// One face of the mirror's cube map.
    ReflectionFace(CubeFace),
}

/// Which of the four pipelines draws a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Program {
    Shadow,
    Main,
    Reflect,
    EnvCube,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
}

/// Per-draw uniform block.
///
/// Every program reads the same struct and ignores what it does not need.
/// Vec3s are packed next to a scalar so the Rust and WGSL layouts agree
/// without implicit padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub model_matrix: [[f32; 4]; 4],
    pub mvp_matrix: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub light_mvp_matrix: [[f32; 4]; 4],
    pub view_dir_inverse: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub ambient_light: f32,
    pub camera_position: [f32; 3],
    pub diffuse_light: f32,
    pub tint: [f32; 3],
    pub specular_light: f32,
    pub shininess: f32,
    pub _padding: [f32; 3],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        Self {
            model_matrix: identity,
            mvp_matrix: identity,
            normal_matrix: identity,
            light_mvp_matrix: identity,
            view_dir_inverse: identity,
            light_position: [0.0; 3],
            ambient_light: 0.0,
            camera_position: [0.0; 3],
            diffuse_light: 0.0,
            tint: [1.0; 3],
            specular_light: 0.0,
            shininess: 1.0,
            _padding: [0.0; 3],
        }
    }
}

impl DrawUniforms {
    pub fn model(&self) -> Matrix4<f32> {
        self.model_matrix.into()
    }

    pub fn mvp(&self) -> Matrix4<f32> {
        self.mvp_matrix.into()
    }

    pub fn normal(&self) -> Matrix4<f32> {
        self.normal_matrix.into()
    }

    pub fn light_mvp(&self) -> Matrix4<f32> {
        self.light_mvp_matrix.into()
    }

    pub fn view_dir_inverse(&self) -> Matrix4<f32> {
        self.view_dir_inverse.into()
    }

    pub fn camera(&self) -> Point3<f32> {
        self.camera_position.into()
    }
}

/// One draw of one registered mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub mesh: MeshId,
    /// Diffuse texture. Only the main program samples one.
    pub texture: Option<TextureId>,
    pub vertex_count: u32,
    pub uniforms: DrawUniforms,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pass {
    pub target: Target,
    pub program: Program,
    pub viewport: Viewport,
    /// Clear colour and depth before drawing. Otherwise both are loaded.
    pub clear: bool,
    pub draws: Vec<DrawCall>,
}

impl Pass {
    pub fn new(target: Target, program: Program, viewport: Viewport, clear: bool) -> Self {
        Self {
            target,
            program,
            viewport,
            clear,
            draws: Vec::new(),
        }
    }
}

/// Everything one `draw()` renders, in execution order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub clear_colour: wgpu::Color,
    pub passes: Vec<Pass>,
}

impl Frame {
    pub fn passes_for(&self, program: Program) -> impl Iterator<Item = &Pass> {
        self.passes.iter().filter(move |p| p.program == program)
    }

    pub fn pass_on(&self, target: Target) -> Option<&Pass> {
        self.passes.iter().find(|p| p.target == target)
    }
}
