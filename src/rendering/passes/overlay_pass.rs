use imgui_wgpu::RendererConfig;

use crate::rendering::render_common::RenderCommon;

/// Draws the imgui overlay over the finished frame.
pub struct OverlayPass {
    renderer: imgui_wgpu::Renderer,
}

pub struct OverlayTextureViews {
    pub color: wgpu::TextureView,
}

impl OverlayPass {
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        common: &RenderCommon,
        context: &mut imgui::Context,
    ) -> Self {
        let renderer = imgui_wgpu::Renderer::new(
            context,
            device,
            queue,
            RendererConfig {
                texture_format: common.surface_format(),
                ..Default::default()
            },
        );

        Self { renderer }
    }

    pub fn render(
        &mut self,
        texture_views: &OverlayTextureViews,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        draw_data: &imgui::DrawData,
    ) {
        // https://github.com/imgui-rs/imgui-rs/issues/325
        if draw_data.draw_lists_count() == 0 {
            return;
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture_views.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Err(e) = self
            .renderer
            .render(draw_data, queue, device, &mut render_pass)
        {
            log::error!("Failed to draw overlay: {:?}", e);
        }
    }
}
