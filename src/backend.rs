//! The seam between the draw protocol and the GPU.
//!
//! The [`Renderer`](crate::renderer::Renderer) decides *what* to draw and
//! describes it as a [`Frame`]; a [`Backend`] owns the GPU objects the frame
//! refers to by handle and executes it. [`WgpuBackend`](crate::gpu::WgpuBackend)
//! is the production implementation.

use cgmath::Vector3;

use crate::{error::RenderError, render::Frame};

/// Handle to the three vertex buffers of one registered shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Handle to an uploaded 2D texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Borrowed, already expanded vertex streams of a shape.
#[derive(Clone, Copy, Debug)]
pub struct MeshData<'a> {
    pub positions: &'a [f32],
    pub normals: &'a [f32],
    pub texcoords: &'a [f32],
}

/// The six faces of a cube map in layer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// Layer order, which is also the order the mirror captures faces in.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }

    /// The direction a camera looks in to capture this face.
    pub fn direction(self) -> Vector3<f32> {
        match self {
            CubeFace::PositiveX => Vector3::new(1.0, 0.0, 0.0),
            CubeFace::NegativeX => Vector3::new(-1.0, 0.0, 0.0),
            CubeFace::PositiveY => Vector3::new(0.0, 1.0, 0.0),
            CubeFace::NegativeY => Vector3::new(0.0, -1.0, 0.0),
            CubeFace::PositiveZ => Vector3::new(0.0, 0.0, 1.0),
            CubeFace::NegativeZ => Vector3::new(0.0, 0.0, -1.0),
        }
    }

    /// Up vector for the capture camera in cube-map convention. Captures pair it
    /// with a y-flipped projection so the sampled image is not inverted.
    pub fn up(self) -> Vector3<f32> {
        match self {
            CubeFace::PositiveY => Vector3::new(0.0, 0.0, 1.0),
            CubeFace::NegativeY => Vector3::new(0.0, 0.0, -1.0),
            _ => Vector3::new(0.0, -1.0, 0.0),
        }
    }
}

/// GPU-side operations the renderer needs.
///
/// All calls happen on the rendering thread. Handles returned by one backend
/// are meaningless to another.
pub trait Backend {
    /// Uploads the three static vertex buffers of a shape.
    fn upload_mesh(&mut self, label: &str, mesh: MeshData<'_>) -> Result<MeshId, RenderError>;

    fn release_mesh(&mut self, mesh: MeshId);

    fn upload_texture(&mut self, name: &str, image: &image::RgbaImage) -> Result<TextureId, RenderError>;

    /// Frees a texture. Frames submitted afterwards must not refer to it.
    fn release_texture(&mut self, texture: TextureId);

    /// Allocates the static skybox cube map, replacing any previous one.
    fn create_environment_cube(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    fn write_environment_face(&mut self, face: CubeFace, image: &image::RgbaImage) -> Result<(), RenderError>;

    /// Size of the presentation target in pixels.
    fn surface_size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Executes every pass of `frame` in order and presents the result.
    fn submit(&mut self, frame: &Frame) -> Result<(), RenderError>;
}
