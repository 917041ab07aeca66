use mirror_ngin::{
    EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3,
    backend::CubeFace,
    data_structures::shape::Shape,
    error::RenderError,
    render::{Program, Target, Viewport},
    renderer::{FrameStatus, SkipReason, skybox_direction},
    transform::{Axis, Perspective, View},
};

mod common;
use common::test_utils::{assert_matrix_eq, cube_scene, renderer, white};

fn sky_quad() -> mirror_ngin::data_structures::shape::ShapeRef {
    let positions = vec![-1.0, -1.0, 1.0, 3.0, -1.0, 1.0, -1.0, 3.0, 1.0];
    Shape::custom(positions, vec![0.0; 9], vec![0.0; 6], "").unwrap().into_ref()
}

#[test]
fn single_cube_draws_one_shadow_and_one_main_draw() {
    let (mut renderer, _cube) = cube_scene();
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Drawn);

    let frame = renderer.backend().last_frame();
    assert_eq!(frame.passes.len(), 2);

    let shadow = &frame.passes[0];
    assert_eq!(shadow.target, Target::ShadowMap);
    assert_eq!(shadow.program, Program::Shadow);
    assert_eq!(shadow.viewport, Viewport::square(2048));
    assert!(shadow.clear);
    assert_eq!(shadow.draws.len(), 1);
    assert_eq!(shadow.draws[0].vertex_count, 36);

    let main = &frame.passes[1];
    assert_eq!(main.target, Target::Surface);
    assert_eq!(main.program, Program::Main);
    assert_eq!(main.viewport, Viewport { width: 800, height: 600 });
    assert!(main.clear);
    assert_eq!(main.draws.len(), 1);
    assert!(main.draws[0].texture.is_some());
}

#[test]
fn main_draw_reuses_the_shadow_pass_light_mvp() {
    let (mut renderer, _cube) = cube_scene();
    renderer.draw().unwrap();
    let frame = renderer.backend().last_frame();

    let shadow = &frame.passes[0].draws[0].uniforms;
    let main = &frame.passes[1].draws[0].uniforms;
    assert_eq!(main.light_mvp_matrix, shadow.mvp_matrix);

    let expected = Perspective::new(100.0, 1.0, 1.0, 100.0).to_matrix()
        * Matrix4::look_at_rh(Point3::new(3.0, 3.0, 3.0), Point3::origin(), Vector3::unit_y());
    assert_matrix_eq(shadow.mvp(), expected);
}

#[test]
fn main_draw_carries_camera_light_and_matrices() {
    let (mut renderer, cube) = cube_scene();
    cube.borrow_mut()
        .set_model_pos_matrix(Matrix4::from_nonuniform_scale(1.0, 2.0, 1.0));
    renderer.draw().unwrap();
    let uniforms = &renderer.backend().last_frame().passes[1].draws[0].uniforms;

    let model = Matrix4::from_nonuniform_scale(1.0, 2.0, 1.0);
    let view_proj = Perspective::new(90.0, 1.0, 1.0, 100.0).to_matrix()
        * View::new([4.0, 4.0, 4.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]).to_matrix();
    assert_eq!(uniforms.model(), model);
    assert_matrix_eq(uniforms.mvp(), view_proj * model);
    assert_matrix_eq(uniforms.normal(), Matrix4::from_nonuniform_scale(1.0, 0.5, 1.0));
    assert_eq!(uniforms.camera(), Point3::new(4.0, 4.0, 4.0));
    assert_eq!(uniforms.light_position, [3.0, 3.0, 3.0]);
    assert_eq!(uniforms.ambient_light, 0.3);
    assert_eq!(uniforms.shininess, 30.0);
}

#[test]
fn shapes_are_read_live_every_frame() {
    let (mut renderer, cube) = cube_scene();
    renderer.draw().unwrap();
    let before = renderer.backend().last_frame().passes[1].draws[0].uniforms.model();

    let moved = Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0));
    cube.borrow_mut().set_model_pos_matrix(moved);
    renderer.draw().unwrap();
    let after = renderer.backend().last_frame().passes[1].draws[0].uniforms.model();

    assert_eq!(before, Matrix4::identity());
    assert_eq!(after, moved);
    assert_eq!(renderer.backend().frames.len(), 2);
}

#[test]
fn frame_is_skipped_until_the_scene_is_complete() {
    let mut renderer = renderer();
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Skipped(SkipReason::NoShapes));

    renderer.add_shape(&Shape::cube([1.0, 1.0, 1.0], "white").into_ref()).unwrap();
    assert_eq!(renderer.build_frame().unwrap_err(), SkipReason::NoLight);

    renderer.set_light([3.0, 3.0, 3.0], Default::default());
    assert_eq!(renderer.build_frame().unwrap_err(), SkipReason::NoCamera);

    renderer.set_camera([4.0, 4.0, 4.0]);
    assert_eq!(renderer.build_frame().unwrap_err(), SkipReason::NoPerspectiveView);

    renderer.set_perspective_view(
        Perspective::new(90.0, 1.0, 1.0, 100.0),
        View::new([4.0, 4.0, 4.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    );
    assert_eq!(
        renderer.build_frame().unwrap_err(),
        SkipReason::UnknownTexture("white".into())
    );

    renderer.declare_texture("white");
    assert!(!renderer.textures_ready());
    assert_eq!(
        renderer.draw().unwrap(),
        FrameStatus::Skipped(SkipReason::TexturePending("white".into()))
    );

    renderer.add_texture(&white(2), "white").unwrap();
    assert!(renderer.textures_ready());
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Drawn);
    assert_eq!(renderer.backend().frames.len(), 1);
}

#[test]
fn shapes_without_texture_or_geometry_are_rejected() {
    let mut renderer = renderer();
    let err = renderer
        .add_shape(&Shape::cube([1.0, 1.0, 1.0], "").into_ref())
        .unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "texture", .. }));

    let empty = Shape::custom(vec![], vec![], vec![], "white").unwrap().into_ref();
    let err = renderer.add_shape(&empty).unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "positions", .. }));

    assert_eq!(renderer.shape_count(), 0);
    assert!(renderer.backend().meshes.is_empty());
}

#[test]
fn replacing_a_texture_releases_the_old_one() {
    let (mut renderer, _cube) = cube_scene();
    renderer.draw().unwrap();
    let old = renderer.backend().last_frame().passes[1].draws[0].texture.unwrap();

    renderer.add_texture(&white(4), "white").unwrap();
    renderer.draw().unwrap();
    let new = renderer.backend().last_frame().passes[1].draws[0].texture.unwrap();

    assert_ne!(old, new);
    assert_eq!(renderer.backend().released_textures, vec![old]);
    assert!(!renderer.backend().textures.contains_key(&old));
}

#[test]
fn reflector_captures_six_faces_from_the_mirrored_camera() {
    let (mut renderer, _cube) = cube_scene();
    let mirror = Shape::cube([0.1, 2.0, 2.0], "").into_ref();
    mirror
        .borrow_mut()
        .set_model_pos_matrix(Matrix4::from_translation(Vector3::new(1.0, 0.0, -1.0)));
    renderer.add_reflector(&mirror, Axis::X).unwrap();
    assert!(renderer.has_reflector());

    renderer.draw().unwrap();
    let frame = renderer.backend().last_frame();
    assert_eq!(frame.passes.len(), 2 + 1 + 6);

    // The mirror itself is drawn over the main pass but never cast into shadows.
    assert_eq!(frame.passes[0].draws.len(), 1);
    let reflect = &frame.passes[2];
    assert_eq!(reflect.program, Program::Reflect);
    assert_eq!(reflect.target, Target::Surface);
    assert!(!reflect.clear);
    assert_eq!(reflect.draws.len(), 1);
    assert_eq!(reflect.draws[0].uniforms.camera(), Point3::new(4.0, 4.0, 4.0));
    assert_eq!(reflect.draws[0].uniforms.tint, renderer.config().mirror_tint);

    let faces: Vec<Target> = frame.passes[3..].iter().map(|p| p.target).collect();
    let expected: Vec<Target> = CubeFace::ALL.iter().map(|f| Target::ReflectionFace(*f)).collect();
    assert_eq!(faces, expected);

    for pass in &frame.passes[3..] {
        assert_eq!(pass.program, Program::Main);
        assert_eq!(pass.viewport, Viewport::square(512));
        assert!(pass.clear);
        assert_eq!(pass.draws.len(), 1);
        assert_eq!(pass.draws[0].uniforms.camera(), Point3::new(-2.0, 4.0, 4.0));
    }
}

#[test]
fn reflection_face_looks_along_its_axis() {
    let (mut renderer, _cube) = cube_scene();
    renderer.add_reflector(&Shape::cube([0.1, 1.0, 1.0], "").into_ref(), Axis::X).unwrap();
    renderer.draw().unwrap();
    let frame = renderer.backend().last_frame();
    let pass = frame.pass_on(Target::ReflectionFace(CubeFace::NegativeZ)).unwrap();

    // Mirrored across x = 0, the eye stays at (-4, 4, 4).
    let eye = Point3::new(-4.0, 4.0, 4.0);
    let expected = Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0)
        * Perspective::new(90.0, 1.0, 1.0, 100.0).to_matrix()
        * Matrix4::look_at_rh(eye, eye + Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, -1.0, 0.0));
    assert_matrix_eq(pass.draws[0].uniforms.mvp(), expected);
}

/// Face, s and t a cube-map lookup of direction `d` reads, rows counted from the top.
fn cube_lookup(d: Vector3<f32>) -> (CubeFace, f32, f32) {
    let (x, y, z) = (d.x, d.y, d.z);
    let (face, sc, tc, ma) = if x.abs() >= y.abs() && x.abs() >= z.abs() {
        if x > 0.0 {
            (CubeFace::PositiveX, -z, -y, x)
        } else {
            (CubeFace::NegativeX, z, -y, -x)
        }
    } else if y.abs() >= z.abs() {
        if y > 0.0 {
            (CubeFace::PositiveY, x, z, y)
        } else {
            (CubeFace::NegativeY, x, -z, -y)
        }
    } else if z > 0.0 {
        (CubeFace::PositiveZ, x, -y, z)
    } else {
        (CubeFace::NegativeZ, -x, -y, -z)
    };
    (face, (sc / ma + 1.0) / 2.0, (tc / ma + 1.0) / 2.0)
}

#[test]
fn reflection_faces_land_where_cube_sampling_reads_them() {
    let (mut renderer, _cube) = cube_scene();
    renderer.add_reflector(&Shape::cube([0.1, 1.0, 1.0], "").into_ref(), Axis::X).unwrap();
    renderer.draw().unwrap();
    let frame = renderer.backend().last_frame();
    let eye = Point3::new(-4.0, 4.0, 4.0);

    for face in CubeFace::ALL {
        let pass = frame.pass_on(Target::ReflectionFace(face)).unwrap();
        // The cube sits at the origin, so its mvp is the face's view-projection.
        let mvp = pass.draws[0].uniforms.mvp();
        let forward = face.direction();
        let sideways = if forward.x == 0.0 {
            Vector3::new(0.5, 0.0, 0.0)
        } else {
            Vector3::new(0.0, 0.0, 0.5)
        };
        let lifted = if forward.y == 0.0 {
            Vector3::new(0.0, 0.25, 0.0)
        } else {
            Vector3::new(0.0, 0.0, 0.25)
        };
        let direction = forward + sideways + lifted;

        let clip = mvp * (eye + direction).to_homogeneous();
        let column = (clip.x / clip.w + 1.0) / 2.0;
        let row = (1.0 - clip.y / clip.w) / 2.0;

        let (sampled_face, s, t) = cube_lookup(direction);
        assert_eq!(sampled_face, face);
        assert!((column - s).abs() < 1e-4, "{face:?}: column {column}, sampled at {s}");
        assert!((row - t).abs() < 1e-4, "{face:?}: row {row}, sampled at {t}");
    }
}

#[test]
fn second_reflector_is_rejected() {
    let (mut renderer, _cube) = cube_scene();
    renderer.add_reflector(&Shape::cube([0.1, 1.0, 1.0], "").into_ref(), Axis::X).unwrap();
    let err = renderer
        .add_reflector(&Shape::cube([1.0, 0.1, 1.0], "").into_ref(), Axis::Y)
        .unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "reflector", .. }));
}

#[test]
fn clear_shapes_releases_every_mesh() {
    let (mut renderer, _cube) = cube_scene();
    renderer.add_reflector(&Shape::cube([0.1, 1.0, 1.0], "").into_ref(), Axis::X).unwrap();
    assert_eq!(renderer.backend().meshes.len(), 2);

    renderer.clear_shapes();
    assert_eq!(renderer.shape_count(), 0);
    assert!(!renderer.has_reflector());
    assert!(renderer.backend().meshes.is_empty());
    assert_eq!(renderer.backend().released_meshes.len(), 2);
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Skipped(SkipReason::NoShapes));
}

#[test]
fn skybox_is_drawn_last_with_the_inverse_direction_matrix() {
    let (mut renderer, _cube) = cube_scene();
    renderer.add_environment_cube(&sky_quad(), 4, 4).unwrap();
    for face in CubeFace::ALL {
        renderer.set_environment_face(face, &white(4)).unwrap();
    }
    assert_eq!(renderer.backend().faces_written.len(), 6);

    renderer.draw().unwrap();
    let frame = renderer.backend().last_frame();
    let sky = frame.passes.last().unwrap();
    assert_eq!(sky.program, Program::EnvCube);
    assert_eq!(sky.target, Target::Surface);
    assert!(!sky.clear);
    assert_eq!(sky.draws.len(), 1);
    assert_eq!(sky.draws[0].vertex_count, 3);

    let direction = skybox_direction(
        &renderer.perspective().unwrap(),
        &renderer.view().unwrap(),
    );
    assert_matrix_eq(sky.draws[0].uniforms.view_dir_inverse() * direction, Matrix4::identity());
}

#[test]
fn skybox_ignores_camera_translation() {
    let view = View::new([4.0, 4.0, 4.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
    let moved = View::new([14.0, 14.0, 14.0], [10.0, 10.0, 10.0], [0.0, 1.0, 0.0]);
    let perspective = Perspective::new(90.0, 1.0, 1.0, 100.0);
    assert_matrix_eq(skybox_direction(&perspective, &view), skybox_direction(&perspective, &moved));
}

fn sky_direction_at(view_dir_inverse: Matrix4<f32>, x: f32, y: f32) -> Vector3<f32> {
    let t = view_dir_inverse * mirror_ngin::Vector4::new(x, y, 1.0, 1.0);
    (t.truncate() / t.w).normalize()
}

#[test]
fn top_of_the_screen_samples_the_sky_above() {
    let (mut renderer, _cube) = cube_scene();
    renderer.set_perspective_view(
        Perspective::new(90.0, 1.0, 1.0, 100.0),
        View::new([0.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    );
    renderer.add_environment_cube(&sky_quad(), 4, 4).unwrap();
    renderer.draw().unwrap();
    let inverse = renderer.backend().last_frame().passes.last().unwrap().draws[0]
        .uniforms
        .view_dir_inverse();

    let centre = sky_direction_at(inverse, 0.0, 0.0);
    let top = sky_direction_at(inverse, 0.0, 1.0);
    let right = sky_direction_at(inverse, 1.0, 0.0);
    assert!((centre - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-4);
    assert!(top.y > 0.5, "{top:?}");
    assert!(right.x > 0.5, "{right:?}");
}

#[test]
fn pitched_camera_still_sees_the_sky_above() {
    let (mut renderer, _cube) = cube_scene();
    renderer.add_environment_cube(&sky_quad(), 4, 4).unwrap();
    renderer.draw().unwrap();
    let inverse = renderer.backend().last_frame().passes.last().unwrap().draws[0]
        .uniforms
        .view_dir_inverse();

    // Looking down from (4, 4, 4) at the origin.
    let centre = sky_direction_at(inverse, 0.0, 0.0);
    let top = sky_direction_at(inverse, 0.0, 1.0);
    assert!(centre.y < 0.0);
    assert!(top.y > centre.y, "{top:?} vs {centre:?}");
}

#[test]
fn environment_faces_need_a_registered_cube() {
    let mut renderer = renderer();
    let err = renderer
        .set_environment_face(CubeFace::PositiveX, &white(4))
        .unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "environment", .. }));

    let err = renderer.add_environment_cube(&sky_quad(), 0, 4).unwrap_err();
    assert!(matches!(err, RenderError::Validation { field: "environment", .. }));

    renderer.add_environment_cube(&sky_quad(), 4, 4).unwrap();
    let err = renderer
        .set_environment_face(CubeFace::PositiveX, &white(8))
        .unwrap_err();
    assert!(matches!(err, RenderError::Asset(_)));
}

#[test]
fn replacing_the_environment_cube_releases_its_mesh() {
    let mut renderer = renderer();
    renderer.add_environment_cube(&sky_quad(), 4, 4).unwrap();
    renderer.add_environment_cube(&sky_quad(), 8, 8).unwrap();
    assert_eq!(renderer.backend().released_meshes.len(), 1);
    assert_eq!(renderer.backend().environment, Some((8, 8)));
}

#[test]
fn resize_changes_the_surface_viewport() {
    let (mut renderer, _cube) = cube_scene();
    renderer.resize(1024, 768);
    renderer.resize(0, 300);
    renderer.draw().unwrap();
    let main = renderer.backend().last_frame().pass_on(Target::Surface).unwrap();
    assert_eq!(main.viewport, Viewport { width: 1024, height: 768 });
}

#[tokio::test]
async fn environment_cube_loads_the_faces_that_arrive() {
    let dir = format!("environment-cube-{}", std::process::id());
    std::fs::create_dir_all(format!("assets/{dir}")).unwrap();
    let files: Vec<String> = ["px", "nx", "py", "ny", "pz"]
        .iter()
        .map(|face| {
            let file = format!("{dir}/{face}.png");
            white(4).save(format!("assets/{file}")).unwrap();
            file
        })
        .collect();
    let missing = format!("{dir}/nz.png");

    let (mut renderer, _cube) = cube_scene();
    let result = renderer
        .load_environment_cube(
            &sky_quad(),
            [
                files[0].as_str(),
                files[1].as_str(),
                files[2].as_str(),
                files[3].as_str(),
                files[4].as_str(),
                missing.as_str(),
            ],
            4,
            4,
        )
        .await;
    std::fs::remove_dir_all(format!("assets/{dir}")).unwrap();

    result.unwrap();
    let written = &renderer.backend().faces_written;
    assert_eq!(written.len(), 5);
    assert!(!written.contains(&CubeFace::NegativeZ));

    assert_eq!(renderer.draw().unwrap(), FrameStatus::Drawn);
    let last = renderer.backend().last_frame().passes.last().unwrap();
    assert_eq!(last.program, Program::EnvCube);
}
