//! Renderable shapes and their primitive constructors.
//!
//! A [`Shape`] owns flat, non-indexed vertex streams (positions, normals,
//! texture coordinates), the name of the texture it is drawn with and three
//! transforms that compose into its model matrix:
//!
//! - `view` places a whole group of shapes (a shared parent transform)
//! - `pos` places the shape in the world
//! - `shape` adjusts the shape locally (e.g. an offset inside its group)
//!
//! The model matrix is `view * pos * shape`, so `shape` applies first.

use std::{cell::RefCell, f32::consts::PI, rc::Rc};

use cgmath::{Deg, Matrix4, SquareMatrix, Vector3};

use crate::{
    data_structures::vertex::{expand_indexed, face_normals},
    error::RenderError,
    transform,
};

/// A shape shared between the level that animates it and the renderer that draws it.
///
/// `Rc` keeps shapes on the thread that renders them.
pub type ShapeRef = Rc<RefCell<Shape>>;

/// The closed set of shape variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Cube,
    Sphere { detail: u32 },
    Cylinder { detail: u32 },
    Custom,
}

#[derive(Clone, Debug)]
pub struct Shape {
    kind: ShapeKind,
    size: Vector3<f32>,
    positions: Vec<f32>,
    normals: Vec<f32>,
    texcoords: Vec<f32>,
    texture: String,
    view: Matrix4<f32>,
    pos: Matrix4<f32>,
    shape: Matrix4<f32>,
}

// Corner order: top-right-front, top-left-front, bottom-left-front,
// bottom-right-front, then the same four at the back.
#[rustfmt::skip]
const CUBE_INDICES: [u32; 36] = [
    0, 1, 2, 0, 2, 3, // front
    0, 3, 4, 4, 3, 7, // right
    0, 5, 1, 0, 4, 5, // up
    5, 6, 1, 1, 6, 2, // left
    3, 2, 6, 3, 6, 7, // bottom
    4, 7, 6, 4, 6, 5, // back
];

const CUBE_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

// Every face is two triangles over the same quad: the first corner of each
// face maps to the top-right texel corner.
const CUBE_FACE_UV_INDICES: [u32; 6] = [2, 3, 0, 2, 0, 1];

impl Shape {
    fn with_geometry(
        kind: ShapeKind,
        size: Vector3<f32>,
        texture: &str,
        positions: Vec<f32>,
        normals: Vec<f32>,
        texcoords: Vec<f32>,
    ) -> Self {
        Self {
            kind,
            size,
            positions,
            normals,
            texcoords,
            texture: texture.to_string(),
            view: Matrix4::identity(),
            pos: Matrix4::identity(),
            shape: Matrix4::identity(),
        }
    }

    /// An axis-aligned box centred on the origin with the given edge lengths.
    pub fn cube(size: [f32; 3], texture: &str) -> Self {
        let [hw, hh, hd] = size.map(|s| s / 2.0);
        let corners = [
            [hw, hh, hd],
            [-hw, hh, hd],
            [-hw, -hh, hd],
            [hw, -hh, hd],
            [hw, hh, -hd],
            [-hw, hh, -hd],
            [-hw, -hh, -hd],
            [hw, -hh, -hd],
        ];
        let uv_indices: Vec<u32> = CUBE_FACE_UV_INDICES
            .iter()
            .copied()
            .cycle()
            .take(CUBE_INDICES.len())
            .collect();

        Self::with_geometry(
            ShapeKind::Cube,
            size.into(),
            texture,
            expand_indexed(&corners, &CUBE_INDICES),
            face_normals(&corners, &CUBE_INDICES),
            expand_indexed(&CUBE_UVS, &uv_indices),
        )
    }

    /// An ellipsoid with radii `size`, tessellated into `detail` latitude and longitude bands.
    ///
    /// The triangles of the first and last band that would collapse onto a
    /// pole are left out so no face normal is degenerate.
    pub fn sphere(size: [f32; 3], texture: &str, detail: u32) -> Self {
        let detail = detail.max(2);
        let mut vertices = Vec::with_capacity(((detail + 1) * (detail + 1)) as usize);
        let mut uvs = Vec::with_capacity(vertices.capacity());

        for lat in 0..=detail {
            let theta = lat as f32 * PI / detail as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            for long in 0..=detail {
                let phi = long as f32 * 2.0 * PI / detail as f32;
                let (sin_phi, cos_phi) = phi.sin_cos();
                vertices.push([
                    size[0] * cos_phi * sin_theta,
                    size[1] * cos_theta,
                    size[2] * sin_phi * sin_theta,
                ]);
                uvs.push([
                    long as f32 / detail as f32,
                    lat as f32 / detail as f32,
                ]);
            }
        }

        let mut indices = Vec::with_capacity((detail * detail * 6) as usize);
        for lat in 0..detail {
            for long in 0..detail {
                let first = lat * (detail + 1) + long;
                let second = first + detail + 1;
                if lat != 0 {
                    indices.extend_from_slice(&[first + 1, second, first]);
                }
                if lat != detail - 1 {
                    indices.extend_from_slice(&[first + 1, second + 1, second]);
                }
            }
        }

        Self::with_geometry(
            ShapeKind::Sphere { detail },
            size.into(),
            texture,
            expand_indexed(&vertices, &indices),
            face_normals(&vertices, &indices),
            expand_indexed(&uvs, &indices),
        )
    }

    /// An elliptic cylinder standing on the y axis with `detail` rim segments.
    ///
    /// `size.x` and `size.z` are the diameters, `size.y` the height.
    pub fn cylinder(size: [f32; 3], texture: &str, detail: u32) -> Self {
        let detail = detail.max(3);
        let radius_x = size[0] / 2.0;
        let radius_z = size[2] / 2.0;
        let half_height = size[1] / 2.0;

        // 0 and 1 are the cap centres, then bottom/top rim pairs from 2 on.
        let mut vertices = vec![[0.0, -half_height, 0.0], [0.0, half_height, 0.0]];
        let mut uvs = vec![[0.5, 0.5], [0.5, 0.5]];
        for i in 0..=detail {
            let theta = i as f32 * 2.0 * PI / detail as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let u = i as f32 / detail as f32;
            vertices.push([radius_x * cos_theta, -half_height, radius_z * sin_theta]);
            uvs.push([u, 1.0]);
            vertices.push([radius_x * cos_theta, half_height, radius_z * sin_theta]);
            uvs.push([u, 0.0]);
        }

        let mut indices = Vec::with_capacity((detail * 12) as usize);
        for i in 0..detail {
            let bottom = 2 + i * 2;
            let top = bottom + 1;
            let bottom_next = bottom + 2;
            let top_next = top + 2;

            indices.extend_from_slice(&[0, bottom, bottom_next]);
            indices.extend_from_slice(&[1, top_next, top]);
            indices.extend_from_slice(&[bottom, top, bottom_next]);
            indices.extend_from_slice(&[bottom_next, top, top_next]);
        }

        Self::with_geometry(
            ShapeKind::Cylinder { detail },
            size.into(),
            texture,
            expand_indexed(&vertices, &indices),
            face_normals(&vertices, &indices),
            expand_indexed(&uvs, &indices),
        )
    }

    /// A shape from already expanded streams, e.g. a mesh group or a skybox quad.
    pub fn custom(
        positions: Vec<f32>,
        normals: Vec<f32>,
        texcoords: Vec<f32>,
        texture: &str,
    ) -> Result<Self, RenderError> {
        check_streams(&positions, &normals, &texcoords)?;
        Ok(Self::with_geometry(
            ShapeKind::Custom,
            Vector3::new(1.0, 1.0, 1.0),
            texture,
            positions,
            normals,
            texcoords,
        ))
    }

    pub fn into_ref(self) -> ShapeRef {
        Rc::new(RefCell::new(self))
    }

    /// Replaces the vertex streams. The vertex count is fixed once the shape exists.
    pub fn set_vertices(
        &mut self,
        positions: Vec<f32>,
        normals: Vec<f32>,
        texcoords: Vec<f32>,
    ) -> Result<(), RenderError> {
        check_streams(&positions, &normals, &texcoords)?;
        if positions.len() != self.positions.len() {
            return Err(RenderError::validation(
                "positions",
                format!(
                    "vertex count is fixed at {} but {} were given",
                    self.vertex_count(),
                    positions.len() / 3
                ),
            ));
        }
        self.positions = positions;
        self.normals = normals;
        self.texcoords = texcoords;
        Ok(())
    }

    pub fn set_model_matrices(&mut self, pos: Matrix4<f32>, shape: Matrix4<f32>, view: Matrix4<f32>) {
        self.pos = pos;
        self.shape = shape;
        self.view = view;
    }

    pub fn set_model_pos_matrix(&mut self, pos: Matrix4<f32>) {
        self.pos = pos;
    }

    pub fn set_model_shape_matrix(&mut self, shape: Matrix4<f32>) {
        self.shape = shape;
    }

    pub fn set_model_view_matrix(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    pub fn set_texture(&mut self, texture: &str) {
        self.texture = texture.to_string();
    }

    /// Moves the shape in its local frame.
    pub fn translate(&mut self, offset: [f32; 3]) {
        self.shape = self.shape * Matrix4::from_translation(offset.into());
    }

    /// Rotates the shape in its local frame by Euler angles in degrees, applied z, y then x.
    pub fn rotate(&mut self, angles: [f32; 3]) {
        self.shape = self.shape
            * Matrix4::from_angle_z(Deg(angles[2]))
            * Matrix4::from_angle_y(Deg(angles[1]))
            * Matrix4::from_angle_x(Deg(angles[0]));
    }

    pub fn scale(&mut self, factors: [f32; 3]) {
        self.shape = self.shape * Matrix4::from_nonuniform_scale(factors[0], factors[1], factors[2]);
    }

    pub fn transform(&mut self, offset: [f32; 3], angles: [f32; 3], factors: [f32; 3]) {
        self.translate(offset);
        self.rotate(angles);
        self.scale(factors);
    }

    /// `view * pos * shape`.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.view * self.pos * self.shape
    }

    /// World position of the shape ignoring its `view` group transform.
    pub fn position(&self) -> Vector3<f32> {
        transform::translation(&(self.pos * self.shape))
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn size(&self) -> Vector3<f32> {
        self.size
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn texcoords(&self) -> &[f32] {
        &self.texcoords
    }

    pub fn texture(&self) -> &str {
        &self.texture
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn pos_matrix(&self) -> Matrix4<f32> {
        self.pos
    }

    pub fn shape_matrix(&self) -> Matrix4<f32> {
        self.shape
    }
}

fn check_streams(positions: &[f32], normals: &[f32], texcoords: &[f32]) -> Result<(), RenderError> {
    if positions.len() % 3 != 0 {
        return Err(RenderError::validation(
            "positions",
            format!("length {} is not a multiple of 3", positions.len()),
        ));
    }
    if normals.len() != positions.len() {
        return Err(RenderError::validation(
            "normals",
            format!("expected {} components, got {}", positions.len(), normals.len()),
        ));
    }
    let expected_texcoords = positions.len() / 3 * 2;
    if texcoords.len() != expected_texcoords {
        return Err(RenderError::validation(
            "texcoords",
            format!("expected {} components, got {}", expected_texcoords, texcoords.len()),
        ));
    }
    Ok(())
}
