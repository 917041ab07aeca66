#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use mirror_ngin::{
    backend::{Backend, CubeFace, MeshData, MeshId, TextureId},
    config::RendererConfig,
    data_structures::shape::{Shape, ShapeRef},
    error::RenderError,
    render::Frame,
    renderer::{LightCoefficients, Renderer},
    transform::{Perspective, View},
};

/// A backend that keeps every call instead of talking to a GPU.
#[derive(Debug)]
pub struct RecordingBackend {
    size: (u32, u32),
    next_id: u32,
    pub meshes: HashMap<MeshId, (String, usize)>,
    pub released_meshes: Vec<MeshId>,
    pub textures: HashMap<TextureId, String>,
    pub released_textures: Vec<TextureId>,
    pub environment: Option<(u32, u32)>,
    pub faces_written: HashSet<CubeFace>,
    pub frames: Vec<Frame>,
    /// Mesh uploads fail once this many have succeeded.
    pub fail_uploads_after: Option<usize>,
    uploads: usize,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_id: 0,
            meshes: HashMap::new(),
            released_meshes: Vec::new(),
            textures: HashMap::new(),
            released_textures: Vec::new(),
            environment: None,
            faces_written: HashSet::new(),
            frames: Vec::new(),
            fail_uploads_after: None,
            uploads: 0,
        }
    }

    pub fn last_frame(&self) -> &Frame {
        self.frames.last().expect("no frame was submitted")
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl Backend for RecordingBackend {
    fn upload_mesh(&mut self, label: &str, mesh: MeshData<'_>) -> Result<MeshId, RenderError> {
        if self.fail_uploads_after.is_some_and(|limit| self.uploads >= limit) {
            return Err(RenderError::Asset(format!("{label}: out of buffer memory")));
        }
        self.uploads += 1;
        let id = MeshId(self.next());
        self.meshes.insert(id, (label.to_string(), mesh.positions.len() / 3));
        Ok(id)
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        self.meshes.remove(&mesh);
        self.released_meshes.push(mesh);
    }

    fn upload_texture(&mut self, name: &str, _image: &image::RgbaImage) -> Result<TextureId, RenderError> {
        let id = TextureId(self.next());
        self.textures.insert(id, name.to_string());
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.released_textures.push(texture);
    }

    fn create_environment_cube(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.environment = Some((width, height));
        self.faces_written.clear();
        Ok(())
    }

    fn write_environment_face(&mut self, face: CubeFace, image: &image::RgbaImage) -> Result<(), RenderError> {
        match self.environment {
            Some(size) if size == image.dimensions() => {
                self.faces_written.insert(face);
                Ok(())
            }
            Some((w, h)) => Err(RenderError::Asset(format!(
                "face is {:?}, cube is {w}x{h}",
                image.dimensions()
            ))),
            None => Err(RenderError::Asset("no environment cube".into())),
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn submit(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

pub fn renderer() -> Renderer<RecordingBackend> {
    Renderer::with_backend(RecordingBackend::new(800, 600), RendererConfig::default())
}

pub fn white(size: u32) -> image::RgbaImage {
    image::RgbaImage::from_pixel(size, size, image::Rgba([255, 255, 255, 255]))
}

/// A unit cube textured "white", lit from (3, 3, 3) and seen from (4, 4, 4).
pub fn cube_scene() -> (Renderer<RecordingBackend>, ShapeRef) {
    let mut renderer = renderer();
    renderer.add_texture(&white(2), "white").unwrap();
    let cube = Shape::cube([1.0, 1.0, 1.0], "white").into_ref();
    renderer.add_shape(&cube).unwrap();
    renderer.set_environment([3.0, 3.0, 3.0], [4.0, 4.0, 4.0], LightCoefficients::default());
    renderer.set_perspective_view(
        Perspective::new(90.0, 1.0, 1.0, 100.0),
        View::new([4.0, 4.0, 4.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    );
    (renderer, cube)
}

pub fn assert_matrix_eq(a: cgmath::Matrix4<f32>, b: cgmath::Matrix4<f32>) {
    let a: [[f32; 4]; 4] = a.into();
    let b: [[f32; 4]; 4] = b.into();
    for (col_a, col_b) in a.iter().zip(&b) {
        for (x, y) in col_a.iter().zip(col_b) {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }
}
