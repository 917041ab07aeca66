//! The wgpu implementation of [`Backend`].
//!
//! Owns every GPU object the renderer refers to by handle: vertex buffers,
//! diffuse textures with their bind groups, the shadow map, the depth
//! buffers, the mirror's cube map and the skybox cube map. A frame is
//! recorded into a single command encoder and submitted once.
//!
//! Every draw's uniforms share one buffer bound with a dynamic offset. The
//! buffer is written once per frame and grows to the next power of two
//! when a frame has more draws than it holds.

use std::{collections::HashMap, iter, mem::size_of};

use wgpu::util::DeviceExt;

use crate::{
    backend::{Backend, CubeFace, MeshData, MeshId, TextureId},
    config::RendererConfig,
    context::Context,
    data_structures::texture::{CubeTexture, Texture},
    error::RenderError,
    pipelines::{
        envcube::mk_envcube_pipeline, main::mk_main_pipeline, reflect::mk_reflect_pipeline,
        shadow::mk_shadow_pipeline,
    },
    render::{DrawUniforms, Frame, Pass, Program, Target},
    resources::{
        shaders::ShaderSources,
        texture::{cube_layout, shadow_diffuse_layout, uniform_layout},
    },
};

struct Layouts {
    uniform: wgpu::BindGroupLayout,
    shadow_diffuse: wgpu::BindGroupLayout,
    cube: wgpu::BindGroupLayout,
}

struct Pipelines {
    main: wgpu::RenderPipeline,
    shadow: wgpu::RenderPipeline,
    reflect: wgpu::RenderPipeline,
    envcube: wgpu::RenderPipeline,
}

struct GpuMesh {
    positions: wgpu::Buffer,
    normals: wgpu::Buffer,
    texcoords: wgpu::Buffer,
}

/// A diffuse texture bound together with the shadow map, ready for the main program.
struct GpuTexture {
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

struct Environment {
    cube: CubeTexture,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuBackend {
    ctx: Context,
    layouts: Layouts,
    pipelines: Pipelines,
    depth: Texture,
    /// Colour target standing in for the surface when headless.
    offscreen: Option<wgpu::Texture>,
    shadow_map: Texture,
    reflection: CubeTexture,
    reflection_depth: Texture,
    reflection_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    /// Draw slots the uniform buffer holds.
    uniform_capacity: u32,
    uniform_stride: u32,
    uniform_bind_group: wgpu::BindGroup,
    environment: Option<Environment>,
    meshes: HashMap<MeshId, GpuMesh>,
    textures: HashMap<TextureId, GpuTexture>,
    next_mesh: u32,
    next_texture: u32,
}

impl WgpuBackend {
    /// Compiles the four programs and allocates the offscreen targets.
    ///
    /// Shader or pipeline validation errors are collected in an error scope
    /// and returned instead of reaching the device's uncaptured-error handler.
    pub async fn new(ctx: Context, config: &RendererConfig, shaders: &ShaderSources) -> Result<Self, RenderError> {
        let device = &ctx.device;
        let format = ctx.config.format;
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layouts = Layouts {
            uniform: uniform_layout(device),
            shadow_diffuse: shadow_diffuse_layout(device),
            cube: cube_layout(device),
        };
        let pipelines = Pipelines {
            main: mk_main_pipeline(device, format, &layouts.uniform, &layouts.shadow_diffuse, &shaders.main),
            shadow: mk_shadow_pipeline(device, &layouts.uniform, &shaders.shadow),
            reflect: mk_reflect_pipeline(device, format, &layouts.uniform, &layouts.cube, &shaders.reflect),
            envcube: mk_envcube_pipeline(device, format, &layouts.uniform, &layouts.cube, &shaders.envcube),
        };

        let depth = Texture::create_depth_texture(device, [ctx.config.width, ctx.config.height], "depth_texture");
        let offscreen = ctx.surface.is_none().then(|| create_offscreen(device, &ctx.config));
        let shadow_map = Texture::create_shadow_map(device, config.shadow_map_size);
        let reflection_size = [config.reflection_size, config.reflection_size];
        let reflection = CubeTexture::new(
            device,
            reflection_size,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
            "reflection_cube",
        );
        let reflection_depth = Texture::create_depth_texture(device, reflection_size, "reflection_depth");
        let reflection_bind_group = cube_bind_group(device, &layouts.cube, &reflection, "reflection_bind_group");

        let min_alignment = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let uniform_stride = align_to(size_of::<DrawUniforms>() as u32, min_alignment);
        let uniform_capacity = 64;
        let (uniform_buffer, uniform_bind_group) =
            create_uniform_buffer(device, &layouts.uniform, uniform_stride, uniform_capacity);

        if let Some(error) = error_scope.pop().await {
            return Err(RenderError::Initialization(error.to_string()));
        }
        log::info!(
            "GPU resources ready: {}x{} {:?}, shadow map {}², mirror faces {}²",
            ctx.config.width,
            ctx.config.height,
            format,
            config.shadow_map_size,
            config.reflection_size
        );

        Ok(Self {
            ctx,
            layouts,
            pipelines,
            depth,
            offscreen,
            shadow_map,
            reflection,
            reflection_depth,
            reflection_bind_group,
            uniform_buffer,
            uniform_capacity,
            uniform_stride,
            uniform_bind_group,
            environment: None,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            next_mesh: 0,
            next_texture: 0,
        })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The colour target frames render into when there is no surface.
    pub fn offscreen_target(&self) -> Option<&wgpu::Texture> {
        self.offscreen.as_ref()
    }

    fn ensure_uniform_capacity(&mut self, required: u32) {
        if required <= self.uniform_capacity {
            return;
        }
        let capacity = required.next_power_of_two();
        log::debug!("Growing draw uniform buffer to {capacity} slots");
        let (buffer, bind_group) =
            create_uniform_buffer(&self.ctx.device, &self.layouts.uniform, self.uniform_stride, capacity);
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.uniform_capacity = capacity;
    }

    fn pipeline(&self, program: Program) -> &wgpu::RenderPipeline {
        match program {
            Program::Main => &self.pipelines.main,
            Program::Shadow => &self.pipelines.shadow,
            Program::Reflect => &self.pipelines.reflect,
            Program::EnvCube => &self.pipelines.envcube,
        }
    }

    fn record_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &Pass,
        first_slot: u32,
        surface_view: &wgpu::TextureView,
        clear_colour: wgpu::Color,
    ) {
        let (colour_view, depth_view) = match pass.target {
            Target::ShadowMap => (None, &self.shadow_map.view),
            Target::Surface => (Some(surface_view), &self.depth.view),
            Target::ReflectionFace(face) => (
                Some(&self.reflection.faces[face.layer() as usize]),
                &self.reflection_depth.view,
            ),
        };
        let (colour_load, depth_load) = if pass.clear {
            (wgpu::LoadOp::Clear(clear_colour), wgpu::LoadOp::Clear(1.0))
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };
        let colour_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colour_view
            .map(|view| wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: colour_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
            .into_iter()
            .map(Some)
            .collect();

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass_label(pass)),
            color_attachments: &colour_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });
        render_pass.set_viewport(
            0.0,
            0.0,
            pass.viewport.width as f32,
            pass.viewport.height as f32,
            0.0,
            1.0,
        );
        render_pass.set_pipeline(self.pipeline(pass.program));

        let shared_group = match pass.program {
            Program::Shadow | Program::Main => None,
            Program::Reflect => Some(&self.reflection_bind_group),
            Program::EnvCube => match &self.environment {
                Some(environment) => Some(&environment.bind_group),
                None => {
                    log::warn!("Skybox pass without an environment cube");
                    return;
                }
            },
        };
        if let Some(group) = shared_group {
            render_pass.set_bind_group(1, group, &[]);
        }

        for (slot, draw) in (first_slot..).zip(&pass.draws) {
            let Some(mesh) = self.meshes.get(&draw.mesh) else {
                log::warn!("Draw of unknown mesh {:?}", draw.mesh);
                continue;
            };
            if pass.program == Program::Main {
                let Some(texture) = draw.texture.and_then(|id| self.textures.get(&id)) else {
                    log::warn!("Draw of mesh {:?} without a loaded texture", draw.mesh);
                    continue;
                };
                render_pass.set_bind_group(1, &texture.bind_group, &[]);
            }
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[slot * self.uniform_stride]);
            render_pass.set_vertex_buffer(0, mesh.positions.slice(..));
            render_pass.set_vertex_buffer(1, mesh.normals.slice(..));
            render_pass.set_vertex_buffer(2, mesh.texcoords.slice(..));
            render_pass.draw(0..draw.vertex_count, 0..1);
        }
    }
}

impl Backend for WgpuBackend {
    fn upload_mesh(&mut self, label: &str, mesh: MeshData<'_>) -> Result<MeshId, RenderError> {
        if mesh.positions.is_empty() {
            return Err(RenderError::validation("positions", format!("{label} has no vertices")));
        }
        let device = &self.ctx.device;
        let buffer = |contents: &[f32], stream: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} {stream}")),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::VERTEX,
            })
        };
        let gpu_mesh = GpuMesh {
            positions: buffer(mesh.positions, "positions"),
            normals: buffer(mesh.normals, "normals"),
            texcoords: buffer(mesh.texcoords, "texcoords"),
        };

        let id = MeshId(self.next_mesh);
        self.next_mesh += 1;
        self.meshes.insert(id, gpu_mesh);
        Ok(id)
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        self.meshes.remove(&mesh);
    }

    fn upload_texture(&mut self, name: &str, image: &image::RgbaImage) -> Result<TextureId, RenderError> {
        let texture = Texture::from_image(&self.ctx.device, &self.ctx.queue, image, Some(name))
            .map_err(|e| RenderError::Asset(format!("texture '{name}': {e}")))?;
        let (Some(shadow_sampler), Some(diffuse_sampler)) = (&self.shadow_map.sampler, &texture.sampler) else {
            return Err(RenderError::Asset(format!("texture '{name}' has no sampler")));
        };
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layouts.shadow_diffuse,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(diffuse_sampler),
                },
            ],
            label: Some(name),
        });

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id, GpuTexture { texture, bind_group });
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(released) = self.textures.remove(&texture) {
            released.texture.texture.destroy();
        }
    }

    fn create_environment_cube(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let device = &self.ctx.device;
        let cube = CubeTexture::new(
            device,
            [width, height],
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::COPY_DST,
            "environment_cube",
        );
        let bind_group = cube_bind_group(device, &self.layouts.cube, &cube, "environment_bind_group");
        self.environment = Some(Environment { cube, bind_group });
        Ok(())
    }

    fn write_environment_face(&mut self, face: CubeFace, image: &image::RgbaImage) -> Result<(), RenderError> {
        let Some(environment) = &self.environment else {
            return Err(RenderError::validation("environment", "no environment cube allocated"));
        };
        environment
            .cube
            .write_face(&self.ctx.queue, face.layer(), image)
            .map_err(|e| RenderError::Asset(format!("{face:?}: {e}")))
    }

    fn surface_size(&self) -> (u32, u32) {
        self.ctx.size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        let device = &self.ctx.device;
        self.depth = Texture::create_depth_texture(device, [self.ctx.config.width, self.ctx.config.height], "depth_texture");
        if self.offscreen.is_some() {
            self.offscreen = Some(create_offscreen(device, &self.ctx.config));
        }
    }

    fn submit(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let (output, surface_view) = match (&self.ctx.surface, &self.offscreen) {
            (Some(surface), _) => {
                let output = surface.get_current_texture()?;
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                (Some(output), view)
            }
            (None, Some(offscreen)) => (None, offscreen.create_view(&wgpu::TextureViewDescriptor::default())),
            (None, None) => {
                return Err(RenderError::Initialization("no surface and no offscreen target".into()));
            }
        };

        self.ensure_uniform_capacity(draw_count(frame));
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, 0, &pack_uniforms(frame, self.uniform_stride));

        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        let mut first_slot = 0;
        for pass in &frame.passes {
            self.record_pass(&mut encoder, pass, first_slot, &surface_view, frame.clear_colour);
            first_slot += pass.draws.len() as u32;
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));

        if let Some(output) = output {
            output.present();
        }
        Ok(())
    }
}

#[cfg(feature = "integration-tests")]
impl WgpuBackend {
    /// Copies the headless colour target back to the CPU.
    pub async fn read_offscreen(&self) -> anyhow::Result<image::RgbaImage> {
        let target = self
            .offscreen
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("backend renders to a surface"))?;
        let (width, height) = self.ctx.size();
        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Readback Buffer"),
            mapped_at_creation: false,
        });
        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(std::time::Duration::from_secs(3)),
        })?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow::anyhow!("readback channel closed"))??;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in data.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow::anyhow!("readback has the wrong size"))
    }
}

fn create_offscreen(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn cube_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    cube: &CubeTexture,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&cube.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&cube.sampler),
            },
        ],
        label: Some(label),
    })
}

fn create_uniform_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u32,
    capacity: u32,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer"),
        size: u64::from(stride) * u64::from(capacity),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(size_of::<DrawUniforms>() as u64),
            }),
        }],
        label: Some("draw_uniform_bind_group"),
    });
    (buffer, bind_group)
}

fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn draw_count(frame: &Frame) -> u32 {
    frame.passes.iter().map(|pass| pass.draws.len() as u32).sum()
}

/// Every draw's uniforms in submission order, one per `stride` bytes.
fn pack_uniforms(frame: &Frame, stride: u32) -> Vec<u8> {
    let stride = stride as usize;
    let mut bytes = vec![0u8; draw_count(frame) as usize * stride];
    let draws = frame.passes.iter().flat_map(|pass| &pass.draws);
    for (chunk, draw) in bytes.chunks_exact_mut(stride).zip(draws) {
        chunk[..size_of::<DrawUniforms>()].copy_from_slice(bytemuck::bytes_of(&draw.uniforms));
    }
    bytes
}

fn pass_label(pass: &Pass) -> &'static str {
    match (pass.program, pass.target) {
        (Program::Shadow, _) => "Shadow Pass",
        (Program::Main, Target::ReflectionFace(_)) => "Reflection Face Pass",
        (Program::Main, _) => "Main Pass",
        (Program::Reflect, _) => "Mirror Pass",
        (Program::EnvCube, _) => "Skybox Pass",
    }
}
