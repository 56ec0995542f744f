use std::{ops::Range, sync::Arc};

use glam::Vec2;
use itertools::Itertools;
use wgpu::{Device, MultisampleState, PipelineCompilationOptions, ShaderSource};

use crate::{
    camera::PerspectiveCamera,
    config::TextureConfig,
    lens_flare::{FlareTexture, LensFlare},
    rendering::{
        passes::pass::Pass,
        render_common::RenderCommon,
        shader_loader::{PipelineCache, PipelineCacheBuilder, PipelineId, ShaderDefinition},
        texture::Texture,
    },
    scene_graph::{ObjectKind, Scene},
};

pub const LENS_FLARE_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Lens flare shader",
    path: "lens_flare.wgsl",
};

/// One flare element quad. Matches `FlareInstance` in `assets/shaders/lens_flare.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FlareInstance {
    /// Quad center in NDC.
    pub center: [f32; 2],
    /// Quad half extents in NDC.
    pub scale: [f32; 2],
    pub color: [f32; 4],
    /// Projected light position in NDC, used for the occlusion test.
    pub light: [f32; 4],
}

impl FlareInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
        3 => Float32x4
    ];

    pub fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<FlareInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Flare quads for one frame, sorted so that each texture is drawn with a single call.
#[derive(Debug, Default)]
pub struct FlareBatch {
    pub instances: Vec<FlareInstance>,
    pub ranges: Vec<(FlareTexture, Range<u32>)>,
}

impl FlareBatch {
    pub fn gather(scene: &Scene, camera: &PerspectiveCamera, viewport: Vec2) -> Self {
        let mut sprites = Vec::new();

        for (object, flare) in scene.objects_of_kind(|kind| match kind {
            ObjectKind::LensFlare(flare) => Some(flare),
            _ => None,
        }) {
            let light_position = object.transform.world_position();
            let Some(projection) = LensFlare::project(light_position, camera, viewport) else {
                continue;
            };

            let light = projection.ndc.extend(0.0).to_array();
            sprites.extend(flare.sprites(&projection, viewport).map(|sprite| {
                (
                    sprite.texture,
                    FlareInstance {
                        center: sprite.center.to_array(),
                        scale: sprite.scale.to_array(),
                        color: sprite.color.to_vec3().extend(1.0).to_array(),
                        light,
                    },
                )
            }));
        }

        // Stable, so elements of one flare keep their order within a texture
        sprites.sort_by_key(|(texture, _)| *texture);

        let mut ranges = Vec::new();
        let mut start = 0u32;
        for (texture, group) in &sprites.iter().chunk_by(|(texture, _)| *texture) {
            let end = start + group.count() as u32;
            ranges.push((texture, start..end));
            start = end;
        }

        Self {
            instances: sprites.into_iter().map(|(_, instance)| instance).collect(),
            ranges,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn texture_path(textures: &TextureConfig, texture: FlareTexture) -> &std::path::Path {
    match texture {
        FlareTexture::Main => &textures.flare_main,
        FlareTexture::Ring => &textures.flare_ring,
    }
}

/// Draws lens flare sprites additively over the shaded scene. Reads the scene depth to fade
/// flares whose light is hidden behind geometry.
pub struct LensFlarePass {
    pipeline_id: PipelineId,
    depth_bind_group_layout: wgpu::BindGroupLayout,
    depth_bind_group: wgpu::BindGroup,
    texture_bind_groups: Vec<wgpu::BindGroup>,
    _textures: Vec<Texture>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

pub struct LensFlareTextureViews {
    pub color: wgpu::TextureView,
}

impl LensFlarePass {
    const INITIAL_CAPACITY: usize = 64;

    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        common: Arc<RenderCommon>,
        cache_builder: &mut PipelineCacheBuilder,
        depth_view: &wgpu::TextureView,
        texture_config: &TextureConfig,
    ) -> anyhow::Result<Self> {
        let depth_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lens flare depth bind group layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }],
            });

        let depth_bind_group = Self::create_depth_bind_group(device, &depth_bind_group_layout, depth_view);

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lens flare texture bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let textures: Vec<Texture> = FlareTexture::ALL
            .iter()
            .map(|&texture| {
                Texture::load_or_fallback(
                    device,
                    queue,
                    texture_path(texture_config, texture),
                    &format!("Lens flare texture ({:?})", texture),
                )
            })
            .collect();

        let texture_bind_groups = FlareTexture::ALL
            .iter()
            .zip(&textures)
            .map(|(texture_kind, texture)| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Lens flare bind group ({:?})", texture_kind)),
                    layout: &texture_bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&texture.sampler),
                        },
                    ],
                })
            })
            .collect();

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Lens flare render pipeline layout"),
                bind_group_layouts: &[&depth_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });

        let output_format = common.surface_format();

        let pipeline_id = cache_builder.add_shader(
            LENS_FLARE_SHADER,
            Box::new(
                move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(shader_def.name),
                        source: ShaderSource::Wgsl(source.into()),
                    });

                    let additive = wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::SrcAlpha,
                        dst_factor: wgpu::BlendFactor::One,
                        operation: wgpu::BlendOperation::Add,
                    };

                    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("Lens flare render pipeline"),
                        layout: Some(&render_pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[FlareInstance::descriptor()],
                            compilation_options: PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: Some("fs_main"),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: output_format,
                                blend: Some(wgpu::BlendState {
                                    color: additive,
                                    alpha: additive,
                                }),
                                write_mask: wgpu::ColorWrites::COLOR,
                            })],
                            compilation_options: PipelineCompilationOptions::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu::PrimitiveTopology::TriangleList,
                            cull_mode: None,
                            ..Default::default()
                        },
                        depth_stencil: None,
                        multisample: MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    });

                    Ok(pipeline)
                },
            ),
        );

        Ok(Self {
            pipeline_id,
            depth_bind_group_layout,
            depth_bind_group,
            texture_bind_groups,
            _textures: textures,
            instance_buffer: Self::create_instance_buffer(device, Self::INITIAL_CAPACITY),
            instance_capacity: Self::INITIAL_CAPACITY,
        })
    }

    fn create_depth_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        depth_view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lens flare depth bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(depth_view),
            }],
        })
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lens flare instance buffer"),
            size: (std::mem::size_of::<FlareInstance>() * capacity) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Rebinds the depth texture after it was recreated.
    pub fn resize(&mut self, device: &wgpu::Device, depth_view: &wgpu::TextureView) {
        self.depth_bind_group =
            Self::create_depth_bind_group(device, &self.depth_bind_group_layout, depth_view);
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, batch: &FlareBatch) {
        if batch.is_empty() {
            return;
        }

        if batch.instances.len() > self.instance_capacity {
            self.instance_capacity = batch.instances.len().next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(device, self.instance_capacity);
        }

        queue.write_buffer(
            &self.instance_buffer,
            0,
            bytemuck::cast_slice(&batch.instances),
        );
    }
}

impl Pass for LensFlarePass {
    type TextureViews = LensFlareTextureViews;
    type Input<'a> = &'a FlareBatch;

    fn render(
        &self,
        texture_views: &LensFlareTextureViews,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        batch: &FlareBatch,
    ) {
        if batch.is_empty() {
            return;
        }

        let Some(pipeline) = pipeline_cache.get(self.pipeline_id) else {
            return;
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lens flare pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture_views.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.depth_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));

        for (texture, range) in &batch.ranges {
            render_pass.set_bind_group(1, &self.texture_bind_groups[texture.index()], &[]);
            render_pass.draw(0..6, range.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use winit::dpi::PhysicalSize;

    use super::*;
    use crate::{
        color::Color,
        config::{DemoConfig, Variant},
        demo::DemoState,
    };

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    fn demo() -> DemoState {
        let config = DemoConfig {
            variant: Variant::Instanced,
            seed: Some(3),
            ..Default::default()
        };
        DemoState::new(&config, PhysicalSize::new(800, 600)).unwrap()
    }

    #[test]
    fn instance_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<FlareInstance>(), 48);
        assert_eq!(
            FlareInstance::descriptor().array_stride,
            std::mem::size_of::<FlareInstance>() as u64
        );
    }

    #[test]
    fn only_the_light_in_view_produces_sprites() {
        let demo = demo();
        let batch = FlareBatch::gather(&demo.scene, &demo.camera, VIEWPORT);

        // The two lights at x = 5000 are outside the initial view
        assert_eq!(batch.instances.len(), 5);
        assert_eq!(
            batch.ranges,
            vec![(FlareTexture::Main, 0..1), (FlareTexture::Ring, 1..5)]
        );

        let main = batch.instances[0];
        assert_eq!(main.color, Color::from_hsl(0.08, 0.8, 0.5).to_vec3().extend(1.0).to_array());
        assert!(main.center[0].abs() < 1e-5 && main.center[1].abs() < 1e-5);
        assert!(batch.instances.iter().all(|instance| instance.light == main.light));
    }

    #[test]
    fn turning_away_hides_every_flare() {
        let mut demo = demo();
        demo.camera.orientation = glam::Quat::from_rotation_y(std::f32::consts::PI);

        let batch = FlareBatch::gather(&demo.scene, &demo.camera, VIEWPORT);
        assert!(batch.is_empty());
        assert!(batch.ranges.is_empty());
    }

    #[test]
    fn ring_sprites_keep_element_order() {
        let demo = demo();
        let batch = FlareBatch::gather(&demo.scene, &demo.camera, VIEWPORT);

        let widths: Vec<f32> = batch.instances[1..]
            .iter()
            .map(|instance| instance.scale[0] * VIEWPORT.x)
            .collect();
        let expected = [60.0, 70.0, 120.0, 70.0];
        for (width, expected) in widths.iter().zip(expected) {
            assert!((width - expected).abs() < 1e-3);
        }
    }
}
