use mirror_ngin::{
    Matrix4, SquareMatrix, Vector3,
    data_structures::shape::{Shape, ShapeKind},
    error::RenderError,
};

mod common;
use common::test_utils::assert_matrix_eq;

fn triangle() -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    (
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
    )
}

#[test]
fn new_shape_has_identity_transforms() {
    let shape = Shape::cube([1.0, 1.0, 1.0], "crate");
    assert_eq!(shape.model_matrix(), Matrix4::identity());
    assert_eq!(shape.position(), Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(shape.texture(), "crate");
}

#[test]
fn model_matrix_is_view_then_pos_then_shape() {
    let mut shape = Shape::cube([1.0, 1.0, 1.0], "crate");
    let pos = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
    let local = Matrix4::from_scale(2.0);
    let view = Matrix4::from_angle_y(mirror_ngin::Deg(90.0));
    shape.set_model_matrices(pos, local, view);
    assert_eq!(shape.model_matrix(), view * pos * local);
    assert_eq!(shape.pos_matrix(), pos);
    assert_eq!(shape.shape_matrix(), local);
    assert_eq!(shape.view_matrix(), view);
}

#[test]
fn setting_model_matrices_twice_is_idempotent() {
    let mut shape = Shape::cube([1.0, 1.0, 1.0], "crate");
    let pos = Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0));
    shape.set_model_matrices(pos, Matrix4::identity(), Matrix4::identity());
    let once = shape.model_matrix();
    shape.set_model_matrices(pos, Matrix4::identity(), Matrix4::identity());
    assert_eq!(shape.model_matrix(), once);
}

#[test]
fn translate_moves_the_position() {
    let mut shape = Shape::cylinder([1.0, 1.0, 1.0], "pillar", 8);
    shape.translate([1.0, 2.0, 3.0]);
    assert_eq!(shape.position(), Vector3::new(1.0, 2.0, 3.0));
}

#[test]
fn translate_applies_before_the_world_position() {
    let mut shape = Shape::cube([1.0, 1.0, 1.0], "crate");
    shape.set_model_pos_matrix(Matrix4::from_angle_z(mirror_ngin::Deg(90.0)));
    shape.translate([1.0, 0.0, 0.0]);
    // The local offset along x is rotated onto y by the world position.
    let position = shape.position();
    assert!(position.x.abs() < 1e-6);
    assert!((position.y - 1.0).abs() < 1e-6);
}

#[test]
fn position_ignores_the_group_view() {
    let mut shape = Shape::sphere([1.0, 1.0, 1.0], "ball", 4);
    shape.set_model_pos_matrix(Matrix4::from_translation(Vector3::new(1.0, 0.0, -1.0)));
    shape.set_model_view_matrix(Matrix4::from_translation(Vector3::new(10.0, 10.0, 10.0)));
    assert_eq!(shape.position(), Vector3::new(1.0, 0.0, -1.0));
}

#[test]
fn transform_composes_translate_rotate_scale() {
    let mut shape = Shape::cube([1.0, 1.0, 1.0], "crate");
    shape.transform([0.0, 1.0, 0.0], [0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
    assert_matrix_eq(
        shape.shape_matrix(),
        Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0)) * Matrix4::from_scale(2.0),
    );
}

#[test]
fn custom_shape_keeps_its_streams() {
    let (positions, normals, texcoords) = triangle();
    let shape = Shape::custom(positions.clone(), normals, texcoords, "").unwrap();
    assert_eq!(shape.kind(), ShapeKind::Custom);
    assert_eq!(shape.vertex_count(), 3);
    assert_eq!(shape.positions(), positions.as_slice());
}

#[test]
fn custom_shape_rejects_mismatched_streams() {
    let (positions, normals, texcoords) = triangle();

    let err = Shape::custom(positions[..8].to_vec(), normals.clone(), texcoords.clone(), "t").unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "positions", .. }));

    let err = Shape::custom(positions.clone(), normals[..6].to_vec(), texcoords.clone(), "t").unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "normals", .. }));

    let err = Shape::custom(positions, normals, texcoords[..4].to_vec(), "t").unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "texcoords", .. }));
}

#[test]
fn set_vertices_keeps_the_vertex_count() {
    let (positions, normals, texcoords) = triangle();
    let mut shape = Shape::custom(positions.clone(), normals.clone(), texcoords.clone(), "t").unwrap();

    let moved: Vec<f32> = positions.iter().map(|p| p + 1.0).collect();
    shape.set_vertices(moved.clone(), normals.clone(), texcoords.clone()).unwrap();
    assert_eq!(shape.positions(), moved.as_slice());

    let err = shape
        .set_vertices([positions.clone(), positions].concat(), [normals.clone(), normals].concat(), [texcoords.clone(), texcoords].concat())
        .unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "positions", .. }));
    assert_eq!(shape.positions(), moved.as_slice());
}
