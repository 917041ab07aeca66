//! A small room: a floor, a spinning cube, a ball and a pillar in front of
//! a mirror, under a procedural skybox. All textures are generated in memory.
//!
//! Run with `cargo run --example mirror-level`. Space pauses the animation.

use std::time::Duration;

use mirror_ngin::{
    Deg, Matrix4, Vector3,
    app::{Level, run},
    backend::CubeFace,
    config::RendererConfig,
    data_structures::shape::{Shape, ShapeRef},
    renderer::{LightCoefficients, Renderer},
    transform::{Axis, Perspective, View},
};
use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{Key, NamedKey},
};

const CAMERA: [f32; 3] = [6.0, 5.0, 7.0];
const LIGHT: [f32; 3] = [3.0, 8.0, 4.0];
const SKY_FACE_SIZE: u32 = 64;

struct MirrorLevel {
    spinner: ShapeRef,
    ball: ShapeRef,
    angle: f32,
    time: f32,
    paused: bool,
}

fn checker(a: [u8; 3], b: [u8; 3]) -> image::RgbaImage {
    image::RgbaImage::from_fn(64, 64, |x, y| {
        let [r, g, bl] = if (x / 8 + y / 8) % 2 == 0 { a } else { b };
        image::Rgba([r, g, bl, 255])
    })
}

fn sky_face(face: CubeFace) -> image::RgbaImage {
    let tint = match face {
        CubeFace::PositiveY => [120, 170, 255],
        CubeFace::NegativeY => [60, 50, 40],
        _ => [150, 190, 240],
    };
    image::RgbaImage::from_fn(SKY_FACE_SIZE, SKY_FACE_SIZE, |_, y| {
        let fade = 1.0 - 0.4 * y as f32 / SKY_FACE_SIZE as f32;
        let [r, g, b] = tint.map(|c| (c as f32 * fade) as u8);
        image::Rgba([r, g, b, 255])
    })
}

/// Two triangles covering the screen, already in clip space.
fn sky_quad() -> anyhow::Result<ShapeRef> {
    #[rustfmt::skip]
    let positions = vec![
        -1.0, -1.0, 1.0,   1.0, -1.0, 1.0,  -1.0, 1.0, 1.0,
        -1.0,  1.0, 1.0,   1.0, -1.0, 1.0,   1.0, 1.0, 1.0,
    ];
    let normals = [0.0, 0.0, 1.0].repeat(6);
    let texcoords = vec![0.0; 12];
    Ok(Shape::custom(positions, normals, texcoords, "")?.into_ref())
}

fn place(shape: &ShapeRef, position: [f32; 3]) {
    shape
        .borrow_mut()
        .set_model_pos_matrix(Matrix4::from_translation(position.into()));
}

impl Level for MirrorLevel {
    async fn init(renderer: &mut Renderer) -> anyhow::Result<Self> {
        renderer.add_texture(&checker([200, 200, 200], [90, 90, 90]), "floor")?;
        renderer.add_texture(&checker([220, 60, 40], [250, 200, 60]), "crate")?;
        renderer.add_texture(&checker([40, 120, 220], [250, 250, 250]), "ball")?;
        renderer.add_texture(&checker([90, 200, 120], [30, 80, 40]), "pillar")?;

        let floor = Shape::cube([12.0, 0.2, 12.0], "floor").into_ref();
        place(&floor, [0.0, -0.1, 0.0]);
        let spinner = Shape::cube([1.0, 1.0, 1.0], "crate").into_ref();
        let ball = Shape::sphere([0.5, 0.5, 0.5], "ball", 24).into_ref();
        let pillar = Shape::cylinder([0.8, 2.5, 0.8], "pillar", 24).into_ref();
        place(&pillar, [2.0, 0.0, -1.5]);
        for shape in [&floor, &spinner, &ball, &pillar] {
            renderer.add_shape(shape)?;
        }

        let mirror = Shape::cube([0.1, 3.0, 4.0], "").into_ref();
        place(&mirror, [-3.0, 1.5, 0.0]);
        renderer.add_reflector(&mirror, Axis::X)?;

        renderer.add_environment_cube(&sky_quad()?, SKY_FACE_SIZE, SKY_FACE_SIZE)?;
        for face in CubeFace::ALL {
            renderer.set_environment_face(face, &sky_face(face))?;
        }

        renderer.set_light(LIGHT, LightCoefficients::default());
        renderer.set_camera(CAMERA);

        Ok(Self {
            spinner,
            ball,
            angle: 0.0,
            time: 0.0,
            paused: false,
        })
    }

    fn on_frame(&mut self, renderer: &mut Renderer, dt: Duration) {
        if !self.paused {
            self.angle = (self.angle + 60.0 * dt.as_secs_f32()) % 360.0;
            self.time += dt.as_secs_f32();
        }

        self.spinner.borrow_mut().set_model_matrices(
            Matrix4::from_translation(Vector3::new(0.0, 0.8, 0.0)),
            Matrix4::from_angle_y(Deg(self.angle)) * Matrix4::from_angle_x(Deg(self.angle / 2.0)),
            Matrix4::from_translation(Vector3::new(0.0, 0.0, 1.0)),
        );
        place(&self.ball, [-1.0, 0.5 + 0.5 * self.time.sin().abs(), -1.0]);

        let (width, height) = renderer.context().size();
        renderer.set_perspective_view(
            Perspective::new(60.0, width as f32 / height.max(1) as f32, 0.5, 100.0),
            View::new(CAMERA, [0.0, 0.5, 0.0], [0.0, 1.0, 0.0]),
        );
    }

    fn on_window_event(&mut self, _renderer: &mut Renderer, event: &WindowEvent) {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Space),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        {
            self.paused = !self.paused;
        }
    }
}

fn main() -> anyhow::Result<()> {
    run::<MirrorLevel>(RendererConfig::default())
}
