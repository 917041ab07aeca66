//! Meshes loaded from OBJ files, split into one shape per geometry.
//!
//! A [`Model`] is only a loading and bulk-update convenience: the renderer
//! registers its shapes one by one and never keeps the model itself.

use cgmath::Matrix4;

use crate::{
    data_structures::shape::{Shape, ShapeRef},
    error::RenderError,
    resources::mesh::{self, MeshGroup},
};

#[derive(Debug)]
pub struct Model {
    name: String,
    shapes: Vec<ShapeRef>,
}

impl Model {
    /// Loads an OBJ file and pairs geometry `i` with `textures[i]`.
    ///
    /// An unreachable, empty or face-less file is not fatal: it is logged and
    /// the model ends up without shapes. Supplying fewer textures than the file
    /// has geometries is a validation error.
    pub async fn load(path: &str, textures: &[&str]) -> Result<Self, RenderError> {
        match mesh::load_obj(path).await {
            Ok(groups) => Self::from_groups(path, groups, textures),
            Err(e) => {
                log::error!("Error loading model {path}: {e}");
                Ok(Self::empty(path))
            }
        }
    }

    /// Same as [`Model::load`] for OBJ text that is already in memory.
    pub fn parse(name: &str, text: &str, textures: &[&str]) -> Result<Self, RenderError> {
        match mesh::parse_obj(name, text) {
            Ok(groups) => Self::from_groups(name, groups, textures),
            Err(e) => {
                log::error!("Error parsing model {name}: {e}");
                Ok(Self::empty(name))
            }
        }
    }

    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shapes: Vec::new(),
        }
    }

    fn from_groups(name: &str, groups: Vec<MeshGroup>, textures: &[&str]) -> Result<Self, RenderError> {
        if groups.is_empty() {
            log::warn!("No geometries found in {name}");
            return Ok(Self::empty(name));
        }
        if textures.len() < groups.len() {
            return Err(RenderError::validation(
                "textures",
                format!(
                    "{} has {} geometries but only {} textures were given",
                    name,
                    groups.len(),
                    textures.len()
                ),
            ));
        }

        let shapes = groups
            .into_iter()
            .zip(textures)
            .map(|(group, texture)| {
                Shape::custom(group.positions, group.normals, group.texcoords, texture).map(Shape::into_ref)
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("Loaded {} with {} geometries", name, shapes.len());

        Ok(Self {
            name: name.to_string(),
            shapes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shapes(&self) -> &[ShapeRef] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn set_model_matrices(&self, pos: Matrix4<f32>, shape: Matrix4<f32>, view: Matrix4<f32>) {
        self.shapes
            .iter()
            .for_each(|s| s.borrow_mut().set_model_matrices(pos, shape, view));
    }

    pub fn set_model_pos_matrix(&self, pos: Matrix4<f32>) {
        self.shapes.iter().for_each(|s| s.borrow_mut().set_model_pos_matrix(pos));
    }

    pub fn set_model_shape_matrix(&self, shape: Matrix4<f32>) {
        self.shapes.iter().for_each(|s| s.borrow_mut().set_model_shape_matrix(shape));
    }

    pub fn set_model_view_matrix(&self, view: Matrix4<f32>) {
        self.shapes.iter().for_each(|s| s.borrow_mut().set_model_view_matrix(view));
    }
}
