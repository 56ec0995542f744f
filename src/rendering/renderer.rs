use std::sync::Arc;

use anyhow::Context;
use glam::Vec2;
use id_arena::Arena;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::CameraUniform,
    config::DemoConfig,
    demo::DemoState,
    rendering::{
        global_uniform::GlobalUniformState,
        instance::{gather_all_instances, gather_instances},
        passes::{
            lens_flare_pass::{FlareBatch, LensFlarePass, LensFlareTextureViews},
            mesh_pass::{MeshPass, MeshPassInput, MeshPassTextureViews},
            overlay_pass::{OverlayPass, OverlayTextureViews},
            pass::Pass,
        },
        render_common::RenderCommon,
        render_model::RenderModel,
        scene_uniforms::gather_lights,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::DepthTexture,
    },
};

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: Arc<RenderCommon>,
    camera_uniform: CameraUniform,
    depth_texture: DepthTexture,
    render_models: Arena<RenderModel>,

    shader_loader: ShaderLoader,

    mesh_pass: MeshPass,
    lens_flare_pass: LensFlarePass,
    overlay_pass: OverlayPass,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        config: &DemoConfig,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to request device")?;

        let camera_uniform = CameraUniform::default();
        let camera_uniform_buffer = camera_uniform.create_buffer(&device);

        let common = RenderCommon::new(&device, &adapter, &surface, size, camera_uniform_buffer)?;
        let common = Arc::new(common);

        let depth_texture = DepthTexture::new(&device, size, "Depth texture");

        let mut cache_builder = PipelineCacheBuilder::new();

        let mesh_pass = MeshPass::create(&device, common.clone(), &mut cache_builder)?;
        let lens_flare_pass = LensFlarePass::create(
            &device,
            &queue,
            common.clone(),
            &mut cache_builder,
            depth_texture.view(),
            &config.textures,
        )?;

        let shader_loader = ShaderLoader::new(device.clone(), cache_builder)?;

        let overlay_pass = OverlayPass::create(&device, &queue, &common, imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            common,
            camera_uniform,
            depth_texture,
            render_models: Arena::new(),
            shader_loader,
            mesh_pass,
            lens_flare_pass,
            overlay_pass,
        })
    }

    pub fn load_models(&mut self, demo_state: &mut DemoState) {
        for (_id, scene_model) in &mut demo_state.scene.models {
            let render_model = RenderModel::from_scene_model(
                &self.device,
                scene_model,
                self.mesh_pass.material_bind_group_layout(),
            );
            let render_model_id = self.render_models.alloc(render_model);
            scene_model.render_model = Some(render_model_id);
            log::info!(
                "Loaded model {} with {} primitives",
                scene_model.name(),
                scene_model.model.primitives.len()
            );
        }

        gather_all_instances(&demo_state.scene, &mut self.render_models);
    }

    /// Reconfigures the surface and depth buffer. Returns false for zero sizes, which are
    /// ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        if new_size.width == 0 || new_size.height == 0 {
            return false;
        }

        self.size = new_size;
        {
            let mut config = match self.common.output_surface_config.write() {
                Ok(config) => config,
                Err(poisoned) => poisoned.into_inner(),
            };
            config.width = new_size.width;
            config.height = new_size.height;
            self.surface.configure(&self.device, &config);
        }

        self.depth_texture.resize(&self.device, new_size);
        self.lens_flare_pass
            .resize(&self.device, self.depth_texture.view());

        true
    }

    /// Draws one frame. Also finishes the imgui frame started by the caller.
    pub fn render(
        &mut self,
        demo_state: &DemoState,
        imgui_context: &mut imgui::Context,
    ) -> Result<(), wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        let scene = &demo_state.scene;

        self.camera_uniform.update(&demo_state.camera);
        self.camera_uniform
            .update_buffer(&self.queue, &self.common.camera_uniform_buffer);

        self.common
            .global_uniform
            .update(&self.queue, GlobalUniformState::new(scene.fog.as_ref()));

        let lights = gather_lights(scene);
        self.queue.write_buffer(
            &self.common.lights_buffer,
            0,
            bytemuck::cast_slice(&[lights]),
        );

        gather_instances(scene, &mut self.render_models, &self.device, &self.queue);

        let viewport = Vec2::new(self.size.width as f32, self.size.height as f32);
        let flares = FlareBatch::gather(scene, &demo_state.camera, viewport);
        self.lens_flare_pass
            .upload(&self.device, &self.queue, &flares);

        // Ends the imgui frame even when the surface is unavailable
        let draw_data = imgui_context.render();

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render encoder"),
            });

        let pipeline_cache = &self.shader_loader.cache;

        self.mesh_pass.render(
            &MeshPassTextureViews {
                color: view.clone(),
                depth: self.depth_texture.view().clone(),
            },
            &mut encoder,
            pipeline_cache,
            MeshPassInput {
                render_models: &self.render_models,
                clear_color: scene.background.to_wgpu(),
            },
        );

        self.lens_flare_pass.render(
            &LensFlareTextureViews {
                color: view.clone(),
            },
            &mut encoder,
            pipeline_cache,
            &flares,
        );

        self.overlay_pass.render(
            &OverlayTextureViews { color: view },
            &mut encoder,
            &self.device,
            &self.queue,
            draw_data,
        );

        self.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        output.present();

        Ok(())
    }
}
