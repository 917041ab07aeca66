//! Projection, view and normal-matrix helpers.
//!
//! All matrices are `cgmath::Matrix4<f32>` values using the column-vector
//! convention: in `a * b * c` the matrix `c` transforms a point first.
//! Nothing in here mutates in place, so a matrix can be handed to any
//! consumer without copying it first.

use cgmath::{Deg, EuclideanSpace, Matrix, Matrix4, Point3, SquareMatrix, Vector3, Vector4};

/// cgmath builds OpenGL clip space (z in -1..1) while wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Symmetric perspective frustum. `fov` is the vertical field of view in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Perspective {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(self.fov), self.aspect, self.near, self.far)
    }
}

/// A look-at camera description.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    pub eye: Point3<f32>,
    pub at: Point3<f32>,
    pub up: Vector3<f32>,
}

impl View {
    pub fn new(eye: [f32; 3], at: [f32; 3], up: [f32; 3]) -> Self {
        Self {
            eye: eye.into(),
            at: at.into(),
            up: up.into(),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.at, self.up)
    }
}

/// A unit axis, used to pick the plane a mirror reflects across.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Transpose of the inverse of `model`.
///
/// Keeps normals perpendicular to their surface under non-uniform scale.
/// A singular model matrix (e.g. a zero scale) has no inverse; the identity
/// is used instead so the draw still goes through.
pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix4<f32> {
    match model.invert() {
        Some(inverse) => inverse.transpose(),
        None => {
            log::warn!("Singular model matrix, falling back to an identity normal matrix.");
            Matrix4::identity()
        }
    }
}

/// The translation column of `m`.
pub fn translation(m: &Matrix4<f32>) -> Vector3<f32> {
    m.w.truncate()
}

/// `m` with its translation removed, used so the skybox never moves with the camera.
pub fn without_translation(m: &Matrix4<f32>) -> Matrix4<f32> {
    let mut rotation = *m;
    rotation.w = Vector4::new(0.0, 0.0, 0.0, 1.0);
    rotation
}

/// Mirrors `eye` across the plane through `surface` whose normal is `axis`.
pub fn mirror_eye(eye: Point3<f32>, surface: Vector3<f32>, axis: Axis) -> Point3<f32> {
    let mut mirrored = eye.to_vec();
    match axis {
        Axis::X => mirrored.x = 2.0 * surface.x - eye.x,
        Axis::Y => mirrored.y = 2.0 * surface.y - eye.y,
        Axis::Z => mirrored.z = 2.0 * surface.z - eye.z,
    }
    Point3::from_vec(mirrored)
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Rad, Transform};

    use super::*;

    #[test]
    fn normal_matrix_of_uniform_scale_rotation_is_orthogonal() {
        let model = Matrix4::from_translation(Vector3::new(3.0, -1.0, 2.0))
            * Matrix4::from_axis_angle(Vector3::new(1.0, 1.0, 0.0).normalize(), Rad(0.7))
            * Matrix4::from_scale(2.5);
        let normal = normal_matrix(&model);
        let columns = [normal.x.truncate(), normal.y.truncate(), normal.z.truncate()];

        for i in 0..3 {
            for j in (i + 1)..3 {
                assert!(columns[i].dot(columns[j]).abs() < 1e-5);
            }
            assert!((columns[i].magnitude() - columns[0].magnitude()).abs() < 1e-5);
        }
        // Same direction as the model's own rotation part.
        let model_x = model.x.truncate().normalize();
        assert!((columns[0].normalize() - model_x).magnitude() < 1e-5);
    }

    #[test]
    fn normal_matrix_of_singular_model_is_identity() {
        let model = Matrix4::from_nonuniform_scale(1.0, 0.0, 1.0);
        assert_eq!(normal_matrix(&model), Matrix4::identity());
    }

    #[test]
    fn perspective_maps_near_and_far_to_wgpu_depth_range() {
        let projection = Perspective::new(90.0, 1.0, 1.0, 100.0).to_matrix();
        let near = projection.transform_point(Point3::new(0.0, 0.0, -1.0));
        let far = projection.transform_point(Point3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mirror_eye_only_touches_the_chosen_axis() {
        let eye = Point3::new(4.0, 4.0, 4.0);
        let surface = Vector3::new(1.0, 0.0, -1.0);
        assert_eq!(mirror_eye(eye, surface, Axis::X), Point3::new(-2.0, 4.0, 4.0));
        assert_eq!(mirror_eye(eye, surface, Axis::Y), Point3::new(4.0, -4.0, 4.0));
        assert_eq!(mirror_eye(eye, surface, Axis::Z), Point3::new(4.0, 4.0, -6.0));
    }

    #[test]
    fn without_translation_keeps_rotation() {
        let view = View::new([4.0, 4.0, 4.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]).to_matrix();
        let stripped = without_translation(&view);
        assert_eq!(translation(&stripped), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(stripped.x, view.x);
        assert_eq!(stripped.z, view.z);
    }
}
