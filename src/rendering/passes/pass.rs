use crate::rendering::shader_loader::PipelineCache;

pub trait Pass {
    type TextureViews;
    /// Per-frame data the pass draws.
    type Input<'a>;

    fn render(
        &self,
        texture_views: &Self::TextureViews,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        input: Self::Input<'_>,
    );
}
