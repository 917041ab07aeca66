//! Registration state and the per-frame draw protocol.
//!
//! A level registers textures and shapes once, then every frame updates the
//! shapes' matrices plus the light/camera/view state and calls
//! [`Renderer::draw`]. Each draw builds a [`Frame`] in a fixed order:
//!
//! 1. shadow pass: every shape into the shadow map, seen from the light
//! 2. main pass: every shape onto the surface, lit and shadowed
//! 3. reflection (with a reflector): the mirror itself, sampling the cube map
//!    captured last frame, then the six cube faces recaptured from the
//!    camera mirrored across the reflector
//! 4. skybox (with an environment cube): the static cube map behind everything
//!
//! Frames are skipped, not failed, while the scene is incomplete: the next
//! frame is the retry.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    rc::Rc,
};

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector3};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::{
    backend::{Backend, CubeFace, MeshData, MeshId, TextureId},
    config::RendererConfig,
    context::Context,
    data_structures::{
        model::Model,
        shape::{Shape, ShapeRef},
    },
    error::RenderError,
    gpu::WgpuBackend,
    render::{DrawCall, DrawUniforms, Frame, Pass, Program, Target, Viewport},
    resources::{shaders::ShaderSources, texture::load_image},
    transform::{self, Axis, Perspective, View},
};

/// Phong weights shared by every lit draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightCoefficients {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for LightCoefficients {
    fn default() -> Self {
        Self {
            ambient: 0.3,
            diffuse: 1.2,
            specular: 0.9,
            shininess: 30.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct SceneState {
    light: Option<Point3<f32>>,
    coefficients: Option<LightCoefficients>,
    camera: Option<Point3<f32>>,
    perspective: Option<Perspective>,
    view: Option<View>,
}

/// [`SceneState`] once every part of it is set.
struct Scene {
    light: Point3<f32>,
    coefficients: LightCoefficients,
    camera: Point3<f32>,
    perspective: Perspective,
    view: View,
}

/// Why a frame was not drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoShapes,
    NoLight,
    NoCamera,
    NoPerspectiveView,
    /// A declared texture has not been added yet.
    TexturePending(String),
    /// A shape names a texture that was never added.
    UnknownTexture(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoShapes => f.write_str("no shapes registered"),
            SkipReason::NoLight => f.write_str("light not set"),
            SkipReason::NoCamera => f.write_str("camera not set"),
            SkipReason::NoPerspectiveView => f.write_str("perspective or view not set"),
            SkipReason::TexturePending(name) => write!(f, "texture '{name}' is still loading"),
            SkipReason::UnknownTexture(name) => write!(f, "texture '{name}' was never added"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Drawn,
    Skipped(SkipReason),
}

struct Registered {
    shape: ShapeRef,
    mesh: MeshId,
    vertex_count: u32,
}

struct Reflector {
    entry: Registered,
    axis: Axis,
}

pub struct Renderer<B: Backend = WgpuBackend> {
    backend: B,
    config: RendererConfig,
    state: SceneState,
    textures: HashMap<String, TextureId>,
    declared: HashSet<String>,
    shapes: Vec<Registered>,
    reflector: Option<Reflector>,
    environment: Option<Registered>,
}

impl Renderer<WgpuBackend> {
    /// Compiles the built-in shaders, builds every pipeline and allocates the
    /// offscreen targets.
    pub async fn init(context: Context, config: RendererConfig) -> Result<Self, RenderError> {
        Self::init_with_shaders(context, config, ShaderSources::default()).await
    }

    pub async fn init_with_shaders(
        context: Context,
        config: RendererConfig,
        shaders: ShaderSources,
    ) -> Result<Self, RenderError> {
        let backend = WgpuBackend::new(context, &config, &shaders).await.inspect_err(|e| {
            log::error!("{e}");
        })?;
        log::info!("Renderer initialised");
        Ok(Self::with_backend(backend, config))
    }

    pub fn context(&self) -> &Context {
        self.backend.context()
    }
}

impl<B: Backend> Renderer<B> {
    pub fn with_backend(backend: B, config: RendererConfig) -> Self {
        Self {
            backend,
            config,
            state: SceneState::default(),
            textures: HashMap::new(),
            declared: HashSet::new(),
            shapes: Vec::new(),
            reflector: None,
            environment: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_light(&mut self, position: [f32; 3], coefficients: LightCoefficients) {
        self.state.light = Some(position.into());
        self.state.coefficients = Some(coefficients);
    }

    pub fn set_camera(&mut self, position: [f32; 3]) {
        self.state.camera = Some(position.into());
    }

    /// Sets light and camera in one call.
    pub fn set_environment(&mut self, light: [f32; 3], camera: [f32; 3], coefficients: LightCoefficients) {
        self.set_light(light, coefficients);
        self.set_camera(camera);
    }

    pub fn set_perspective_view(&mut self, perspective: Perspective, view: View) {
        self.state.perspective = Some(perspective);
        self.state.view = Some(view);
    }

    pub fn perspective(&self) -> Option<Perspective> {
        self.state.perspective
    }

    pub fn view(&self) -> Option<View> {
        self.state.view
    }

    /// Announces a texture that will arrive later. Frames are skipped until it does.
    pub fn declare_texture(&mut self, name: &str) {
        self.declared.insert(name.to_string());
    }

    /// True once every declared texture has been added.
    pub fn textures_ready(&self) -> bool {
        self.declared.iter().all(|name| self.textures.contains_key(name))
    }

    /// Uploads `image` under `name`. An earlier texture of the same name is released.
    pub fn add_texture(&mut self, image: &image::RgbaImage, name: &str) -> Result<(), RenderError> {
        let texture = self.backend.upload_texture(name, image)?;
        if let Some(previous) = self.textures.remove(name) {
            log::info!("Replacing texture '{name}'");
            self.backend.release_texture(previous);
        }
        self.textures.insert(name.to_string(), texture);
        Ok(())
    }

    /// Declares `name`, then fetches, decodes and adds the image at `file_name`.
    pub async fn load_texture(&mut self, file_name: &str, name: &str) -> Result<(), RenderError> {
        self.declare_texture(name);
        let image = load_image(file_name)
            .await
            .map_err(|e| RenderError::Asset(format!("{file_name}: {e}")))?;
        self.add_texture(&image.to_rgba8(), name)
    }

    /// Uploads the shape's vertex buffers and appends it to the draw list.
    pub fn add_shape(&mut self, shape: &ShapeRef) -> Result<(), RenderError> {
        validate(&shape.borrow(), true).inspect_err(|e| log::warn!("Rejected shape: {e}"))?;
        let entry = self.upload(shape)?;
        self.shapes.push(entry);
        Ok(())
    }

    /// Registers the single reflective surface. It is drawn by the mirror
    /// program only, never into the shadow map or the cube faces.
    pub fn add_reflector(&mut self, shape: &ShapeRef, axis: Axis) -> Result<(), RenderError> {
        if self.reflector.is_some() {
            return Err(RenderError::validation(
                "reflector",
                "only one reflective surface can be registered",
            ));
        }
        validate(&shape.borrow(), false).inspect_err(|e| log::warn!("Rejected reflector: {e}"))?;
        let entry = self.upload(shape)?;
        self.reflector = Some(Reflector { entry, axis });
        Ok(())
    }

    /// Registers every shape of `model`. Nothing stays registered if any
    /// shape is invalid or fails to upload.
    pub fn add_model(&mut self, model: &Model) -> Result<(), RenderError> {
        if model.is_empty() {
            log::warn!("Rejected model {}: it has no shapes", model.name());
            return Err(RenderError::validation(
                "model",
                format!("{} has no shapes", model.name()),
            ));
        }
        for shape in model.shapes() {
            validate(&shape.borrow(), true)?;
        }
        let start = self.shapes.len();
        for shape in model.shapes() {
            if let Err(e) = self.add_shape(shape) {
                log::warn!("Rolling back model {}: {e}", model.name());
                for entry in self.shapes.drain(start..) {
                    self.backend.release_mesh(entry.mesh);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Registers the skybox geometry and allocates a `width` x `height` cube
    /// map for it. Faces arrive through [`Renderer::set_environment_face`].
    pub fn add_environment_cube(&mut self, shape: &ShapeRef, width: u32, height: u32) -> Result<(), RenderError> {
        if shape.borrow().positions().is_empty() {
            return Err(RenderError::validation("positions", "skybox has no vertices"));
        }
        if width == 0 || height == 0 {
            return Err(RenderError::validation(
                "environment",
                format!("cube faces must not be empty, got {width}x{height}"),
            ));
        }
        self.backend.create_environment_cube(width, height)?;
        let entry = self.upload(shape)?;
        if let Some(previous) = self.environment.replace(entry) {
            self.backend.release_mesh(previous.mesh);
        }
        Ok(())
    }

    /// Registers the skybox, then fetches the six face images (`+X, -X, +Y,
    /// -Y, +Z, -Z`) concurrently and writes each one as it arrives.
    ///
    /// A face that cannot be loaded or written is logged and left blank.
    pub async fn load_environment_cube(
        &mut self,
        shape: &ShapeRef,
        files: [&str; 6],
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        self.add_environment_cube(shape, width, height)?;

        let mut pending: FuturesUnordered<_> = CubeFace::ALL
            .into_iter()
            .zip(files)
            .map(|(face, file_name)| async move { (face, file_name, load_image(file_name).await) })
            .collect();
        while let Some((face, file_name, loaded)) = pending.next().await {
            let written = loaded
                .map_err(|e| RenderError::Asset(format!("{file_name}: {e}")))
                .and_then(|image| self.backend.write_environment_face(face, &image.to_rgba8()));
            if let Err(e) = written {
                log::error!("Skybox face {face:?} was not loaded: {e}");
            }
        }
        Ok(())
    }

    pub fn set_environment_face(&mut self, face: CubeFace, image: &image::RgbaImage) -> Result<(), RenderError> {
        if self.environment.is_none() {
            return Err(RenderError::validation(
                "environment",
                "no environment cube has been registered",
            ));
        }
        self.backend.write_environment_face(face, image)
    }

    /// Drops every shape and the reflector. Textures and the skybox stay.
    pub fn clear_shapes(&mut self) {
        for entry in self.shapes.drain(..) {
            self.backend.release_mesh(entry.mesh);
        }
        if let Some(reflector) = self.reflector.take() {
            self.backend.release_mesh(reflector.entry.mesh);
        }
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn has_reflector(&self) -> bool {
        self.reflector.is_some()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.backend.resize(width, height);
        }
    }

    /// Builds the frame and hands it to the backend.
    pub fn draw(&mut self) -> Result<FrameStatus, RenderError> {
        match self.build_frame() {
            Ok(frame) => {
                self.backend.submit(&frame)?;
                Ok(FrameStatus::Drawn)
            }
            Err(reason) => {
                match &reason {
                    SkipReason::TexturePending(_) => log::debug!("Skipping frame: {reason}"),
                    _ => log::warn!("Skipping frame: {reason}"),
                }
                Ok(FrameStatus::Skipped(reason))
            }
        }
    }

    /// Computes every pass of the next frame without touching the GPU.
    pub fn build_frame(&self) -> Result<Frame, SkipReason> {
        let scene = self.scene()?;
        let (width, height) = self.backend.surface_size();
        let surface = Viewport { width, height };

        let models: Vec<Matrix4<f32>> = self
            .shapes
            .iter()
            .map(|entry| entry.shape.borrow().model_matrix())
            .collect();

        // The main pass only ever reads light MVPs from this list, which has
        // one entry per shape.
        let light_view_proj = Perspective::new(
            self.config.shadow_fov,
            1.0,
            scene.perspective.near,
            scene.perspective.far,
        )
        .to_matrix()
            * Matrix4::look_at_rh(scene.light, Point3::origin(), Vector3::unit_y());
        let light_mvps: Vec<Matrix4<f32>> = models.iter().map(|model| light_view_proj * *model).collect();

        let mut passes = Vec::new();

        let mut shadow = Pass::new(
            Target::ShadowMap,
            Program::Shadow,
            Viewport::square(self.config.shadow_map_size),
            true,
        );
        shadow.draws = self
            .shapes
            .iter()
            .zip(&light_mvps)
            .map(|(entry, light_mvp)| DrawCall {
                mesh: entry.mesh,
                texture: None,
                vertex_count: entry.vertex_count,
                uniforms: DrawUniforms {
                    mvp_matrix: (*light_mvp).into(),
                    light_mvp_matrix: (*light_mvp).into(),
                    ..Default::default()
                },
            })
            .collect();
        passes.push(shadow);

        let view_proj = scene.perspective.to_matrix() * scene.view.to_matrix();
        let mut main = Pass::new(Target::Surface, Program::Main, surface, true);
        main.draws = self.lit_draws(&scene, view_proj, scene.camera, &models, &light_mvps);
        passes.push(main);

        if let Some(reflector) = &self.reflector {
            passes.push(self.reflector_pass(reflector, &scene, view_proj, surface));

            // Cube sampling reads row 0 as the top of a face, and wgpu puts
            // NDC +y on row 0, so y is flipped to pair with the face up vectors.
            let face_projection = Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0)
                * Perspective::new(90.0, 1.0, scene.perspective.near, scene.perspective.far).to_matrix();
            let surface_position = reflector.entry.shape.borrow().position();
            let eye = transform::mirror_eye(scene.camera, surface_position, reflector.axis);
            for face in CubeFace::ALL {
                let view = View {
                    eye,
                    at: eye + face.direction(),
                    up: face.up(),
                };
                let mut pass = Pass::new(
                    Target::ReflectionFace(face),
                    Program::Main,
                    Viewport::square(self.config.reflection_size),
                    true,
                );
                pass.draws = self.lit_draws(&scene, face_projection * view.to_matrix(), eye, &models, &light_mvps);
                passes.push(pass);
            }
        }

        if let Some(environment) = &self.environment {
            passes.push(skybox_pass(environment, &scene, surface));
        }

        Ok(Frame {
            clear_colour: self.config.clear_colour,
            passes,
        })
    }

    fn scene(&self) -> Result<Scene, SkipReason> {
        if self.shapes.is_empty() {
            return Err(SkipReason::NoShapes);
        }
        let (Some(light), Some(coefficients)) = (self.state.light, self.state.coefficients) else {
            return Err(SkipReason::NoLight);
        };
        let Some(camera) = self.state.camera else {
            return Err(SkipReason::NoCamera);
        };
        let (Some(perspective), Some(view)) = (self.state.perspective, self.state.view) else {
            return Err(SkipReason::NoPerspectiveView);
        };
        if let Some(pending) = self
            .declared
            .iter()
            .filter(|name| !self.textures.contains_key(*name))
            .min()
        {
            return Err(SkipReason::TexturePending(pending.clone()));
        }
        if let Some(unknown) = self
            .shapes
            .iter()
            .map(|entry| entry.shape.borrow().texture().to_string())
            .find(|name| !self.textures.contains_key(name))
        {
            return Err(SkipReason::UnknownTexture(unknown));
        }

        Ok(Scene {
            light,
            coefficients,
            camera,
            perspective,
            view,
        })
    }

    /// Main-program draws of every shape for one view.
    fn lit_draws(
        &self,
        scene: &Scene,
        view_proj: Matrix4<f32>,
        eye: Point3<f32>,
        models: &[Matrix4<f32>],
        light_mvps: &[Matrix4<f32>],
    ) -> Vec<DrawCall> {
        let c = scene.coefficients;
        self.shapes
            .iter()
            .zip(models)
            .zip(light_mvps)
            .map(|((entry, model), light_mvp)| DrawCall {
                mesh: entry.mesh,
                texture: self.textures.get(entry.shape.borrow().texture()).copied(),
                vertex_count: entry.vertex_count,
                uniforms: DrawUniforms {
                    model_matrix: (*model).into(),
                    mvp_matrix: (view_proj * *model).into(),
                    normal_matrix: transform::normal_matrix(model).into(),
                    light_mvp_matrix: (*light_mvp).into(),
                    light_position: scene.light.into(),
                    camera_position: eye.into(),
                    ambient_light: c.ambient,
                    diffuse_light: c.diffuse,
                    specular_light: c.specular,
                    shininess: c.shininess,
                    ..Default::default()
                },
            })
            .collect()
    }

    fn reflector_pass(&self, reflector: &Reflector, scene: &Scene, view_proj: Matrix4<f32>, surface: Viewport) -> Pass {
        let model = reflector.entry.shape.borrow().model_matrix();
        let mut pass = Pass::new(Target::Surface, Program::Reflect, surface, false);
        pass.draws.push(DrawCall {
            mesh: reflector.entry.mesh,
            texture: None,
            vertex_count: reflector.entry.vertex_count,
            uniforms: DrawUniforms {
                model_matrix: model.into(),
                mvp_matrix: (view_proj * model).into(),
                normal_matrix: transform::normal_matrix(&model).into(),
                camera_position: scene.camera.into(),
                tint: self.config.mirror_tint,
                ..Default::default()
            },
        });
        pass
    }

    fn upload(&mut self, shape: &ShapeRef) -> Result<Registered, RenderError> {
        let borrowed = shape.borrow();
        let label = format!("{:?} '{}'", borrowed.kind(), borrowed.texture());
        let mesh = self.backend.upload_mesh(
            &label,
            MeshData {
                positions: borrowed.positions(),
                normals: borrowed.normals(),
                texcoords: borrowed.texcoords(),
            },
        )?;
        Ok(Registered {
            shape: Rc::clone(shape),
            mesh,
            vertex_count: borrowed.vertex_count() as u32,
        })
    }
}

/// The skybox direction matrix: projection times the view without its translation.
///
/// Its inverse takes a clip-space position on the far plane to the world
/// direction seen through that pixel. wgpu's NDC +y is the top of the
/// screen and cube faces are stored top row first, so no axis flip is needed.
pub fn skybox_direction(perspective: &Perspective, view: &View) -> Matrix4<f32> {
    perspective.to_matrix() * transform::without_translation(&view.to_matrix())
}

fn skybox_pass(environment: &Registered, scene: &Scene, surface: Viewport) -> Pass {
    let view_dir_inverse = skybox_direction(&scene.perspective, &scene.view)
        .invert()
        .unwrap_or_else(|| {
            log::warn!("Skybox direction matrix is singular, drawing with identity.");
            Matrix4::identity()
        });
    let mut pass = Pass::new(Target::Surface, Program::EnvCube, surface, false);
    pass.draws.push(DrawCall {
        mesh: environment.mesh,
        texture: None,
        vertex_count: environment.vertex_count,
        uniforms: DrawUniforms {
            view_dir_inverse: view_dir_inverse.into(),
            ..Default::default()
        },
    });
    pass
}

fn validate(shape: &Shape, needs_texture: bool) -> Result<(), RenderError> {
    if shape.positions().is_empty() {
        return Err(RenderError::validation("positions", "shape has no vertices"));
    }
    if shape.normals().is_empty() {
        return Err(RenderError::validation("normals", "shape has no normals"));
    }
    if shape.texcoords().is_empty() {
        return Err(RenderError::validation("texcoords", "shape has no texture coordinates"));
    }
    if needs_texture && shape.texture().is_empty() {
        return Err(RenderError::validation("texture", "shape has no texture name"));
    }
    Ok(())
}
