//! mirror-ngin
//!
//! A small cross-platform renderer for shape-based puzzle levels. Levels
//! describe their scene as plain shapes (cubes, spheres, cylinders and
//! meshes loaded from OBJ files) each carrying three transform matrices, and
//! the renderer turns them into a shadow-mapped, Phong-lit frame with an
//! optional live cube-map mirror and a static skybox. The crate builds for
//! native targets and for the web (WebGL2 through wgpu).
//!
//! High-level modules
//! - `app`: winit event loop that drives a [`app::Level`] once per frame
//! - `backend`: the seam between the draw protocol and the GPU
//! - `config`: renderer configuration
//! - `context`: wgpu instance/surface/device creation
//! - `data_structures`: shapes, models, vertex math and GPU textures
//! - `error`: the crate's structured error type
//! - `gpu`: the wgpu implementation of [`backend::Backend`]
//! - `pipelines`: render pipelines for the main, shadow, reflect and skybox programs
//! - `render`: CPU-side frame description (passes, draw calls, uniforms)
//! - `renderer`: registration state and the per-frame draw protocol
//! - `resources`: helpers to load text, images, shaders and meshes
//! - `transform`: projection, view and normal-matrix helpers
//!

pub mod app;
pub mod backend;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod gpu;
pub mod pipelines;
pub mod render;
pub mod renderer;
pub mod resources;
pub mod transform;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::event::WindowEvent;
