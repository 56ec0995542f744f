use std::{
    path::Path,
    sync::{
        mpsc::{self, channel},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt,
    notify::{RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{PollType, RenderPipeline};

const SHADER_FOLDER: &str = "assets/shaders";
const SHARED_SHADER_MODULES_FOLDER: &str = "assets/shaders/shared";

pub type PipelineFactory = Box<
    dyn Sync
        + Send
        + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<wgpu::RenderPipeline>,
>;

#[derive(Debug, Clone)]
pub struct ShaderDefinition {
    pub name: &'static str,
    /// Relative to `assets/shaders`.
    pub path: &'static str,
}

pub struct ShaderEntry {
    pipeline_id: PipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type PipelineId = Id<PipelineCacheEntry>;

#[derive(Default)]
pub struct PipelineCacheEntry(Option<wgpu::RenderPipeline>);

impl PipelineCacheEntry {
    pub fn set_pipeline(&mut self, pipeline: wgpu::RenderPipeline) {
        self.0 = Some(pipeline);
    }
}

#[derive(Default)]
pub struct PipelineCacheBuilder {
    shaders: Arena<ShaderEntry>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shader(
        &mut self,
        shader_def: ShaderDefinition,
        factory: PipelineFactory,
    ) -> PipelineId {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        self.shaders.alloc(ShaderEntry {
            pipeline_id,
            def: shader_def,
            factory,
        });
        pipeline_id
    }

    pub fn build(self) -> PipelineCache {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache {
    shaders: Arc<Arena<ShaderEntry>>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCache {
    /// `None` until the pipeline has compiled at least once.
    pub fn get(&self, id: PipelineId) -> Option<&RenderPipeline> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn get_entry_mut(&mut self, id: PipelineId) -> Option<&mut PipelineCacheEntry> {
        self.pipelines.get_mut(id)
    }

    fn iter_shaders_and_pipelines_mut(
        &mut self,
    ) -> impl Iterator<Item = (&ShaderEntry, &mut PipelineCacheEntry)> {
        // Both arenas are filled together by add_shader, so their order matches
        self.shaders
            .iter()
            .map(|(_, shader_entry)| shader_entry)
            .zip(
                self.pipelines
                    .iter_mut()
                    .map(|(_, pipeline_entry)| pipeline_entry),
            )
    }
}

type CompiledPipeline = (&'static str, PipelineId, wgpu::RenderPipeline);

/// Compiles every registered shader up front and recompiles them on a watcher thread when
/// their source changes on disk.
pub struct ShaderLoader {
    pub cache: PipelineCache,
    device: wgpu::Device,
    receiver: mpsc::Receiver<CompiledPipeline>,
    composer: Arc<RwLock<Composer>>,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl ShaderLoader {
    pub fn new(device: wgpu::Device, cache_builder: PipelineCacheBuilder) -> anyhow::Result<Self> {
        let cache = cache_builder.build();

        let (send_new_pipelines, recv_new_pipelines) = channel();

        let composer = create_composer().context("Failed to create shader composer")?;
        let composer = Arc::new(RwLock::new(composer));

        let debouncer = watch_shaders(
            device.clone(),
            cache.shaders.clone(),
            composer.clone(),
            send_new_pipelines,
        )
        .map_err(|e| log::warn!("Shader hot reload disabled: {:#}", e))
        .ok();

        let mut shader_loader = Self {
            device,
            cache,
            receiver: recv_new_pipelines,
            composer,
            _debouncer: debouncer,
        };

        shader_loader.create_all_pipelines()?;

        Ok(shader_loader)
    }

    pub fn create_all_pipelines(&mut self) -> anyhow::Result<()> {
        let device = &self.device;
        let composer = &self.composer;

        for (shader, pipeline_entry) in self.cache.iter_shaders_and_pipelines_mut() {
            let pipeline = compile_file(device, &shader.def, &shader.factory, composer)
                .with_context(|| format!("Failed to compile shader: {}", shader.def.name))?;
            pipeline_entry.set_pipeline(pipeline);
        }

        Ok(())
    }

    /// Swaps in pipelines recompiled by the watcher since the last call.
    pub fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.receiver.try_recv() {
            if let Some(entry) = self.cache.get_entry_mut(pipeline_id) {
                log::info!("Shader reloaded: {}", name);
                entry.set_pipeline(pipeline);
            }
        }
    }
}

fn watch_shaders(
    device: wgpu::Device,
    shaders: Arc<Arena<ShaderEntry>>,
    composer: Arc<RwLock<Composer>>,
    sender: mpsc::Sender<CompiledPipeline>,
) -> anyhow::Result<Debouncer<RecommendedWatcher>> {
    let mut debouncer = new_debouncer_opt(
        notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
        move |res: DebounceEventResult| match res {
            Ok(events) => {
                for event in events {
                    if event.kind != DebouncedEventKind::Any {
                        continue;
                    }

                    let Some((_, entry)) = shaders
                        .iter()
                        .find(|(_, entry)| event.path.ends_with(entry.def.path))
                    else {
                        continue;
                    };

                    match compile_file(&device, &entry.def, &entry.factory, &composer) {
                        Ok(pipeline) => {
                            if sender
                                .send((entry.def.name, entry.pipeline_id, pipeline))
                                .is_err()
                            {
                                log::debug!("Renderer gone, dropping reloaded {}", entry.def.name);
                            }
                        }
                        Err(e) => log::error!("Failed to reload shader: {:#}", e),
                    }
                }
            }
            Err(e) => log::error!("Error debouncing shader changes: {}", e),
        },
    )
    .context("Failed to create shader watcher")?;

    let absolute_shader_folder = Path::new(SHADER_FOLDER)
        .canonicalize()
        .with_context(|| format!("Shader folder {} not found", SHADER_FOLDER))?;

    debouncer
        .watcher()
        .watch(&absolute_shader_folder, RecursiveMode::Recursive)
        .context("Failed to watch shader folder")?;

    Ok(debouncer)
}

fn compile_file(
    device: &wgpu::Device,
    shader_def: &ShaderDefinition,
    factory: &PipelineFactory,
    composer: &RwLock<Composer>,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let module = compose_module(shader_def, composer)?;

    // wgpu validates again when the module is created
    let info = naga::valid::Validator::new(ValidationFlags::empty(), Capabilities::all())
        .validate(&module)
        .context("Failed to validate Naga module")?;

    let shader_code = naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("Failed to convert Naga module to WGSL string")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = factory(device, shader_def, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        return Err(anyhow::anyhow!(
            "Shader compilation failed for {}: {}",
            shader_def.name,
            error
        ));
    }

    pipeline
}

/// Reads a shader from `assets/shaders` and resolves its imports from the shared modules.
fn compose_module(
    shader_def: &ShaderDefinition,
    composer: &RwLock<Composer>,
) -> anyhow::Result<naga::Module> {
    let path = Path::new(SHADER_FOLDER).join(shader_def.path);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;

    let file_path = path.to_string_lossy().to_string();

    let mut composer = composer
        .write()
        .map_err(|_| anyhow::anyhow!("Shader composer lock poisoned"))?;

    composer
        .make_naga_module(NagaModuleDescriptor {
            file_path: &file_path,
            source: &shader_code,
            ..Default::default()
        })
        .with_context(|| format!("Failed to compose {}", file_path))
}

fn create_composer() -> anyhow::Result<Composer> {
    let shared_files = std::fs::read_dir(SHARED_SHADER_MODULES_FOLDER).with_context(|| {
        format!(
            "Failed to read shared shader modules directory {}",
            SHARED_SHADER_MODULES_FOLDER
        )
    })?;

    let mut paths = shared_files
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list shared shader modules")?;

    // Stable load order across platforms
    paths.sort();

    let mut composer = Composer::default();

    for path in paths {
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read shared shader module {}", path.display()))?;

        let file_path = path.to_string_lossy().to_string();

        composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .with_context(|| format!("Failed to add shared shader module: {}", file_path))?;

        log::debug!("Added shared shader module {}", file_path);
    }

    Ok(composer)
}

#[cfg(test)]
mod tests {
    use naga::{proc::Layouter, valid::Validator, ResourceBinding};

    use super::*;
    use crate::{
        camera::CameraUniform,
        lights::LightsUniform,
        rendering::{
            global_uniform::GlobalUniformState,
            passes::{lens_flare_pass::LENS_FLARE_SHADER, mesh_pass::MESH_SHADER},
            render_model::MaterialUniform,
        },
    };

    fn compose_and_validate(shader_def: &ShaderDefinition) -> naga::Module {
        let composer = RwLock::new(create_composer().unwrap());
        let module = compose_module(shader_def, &composer).unwrap();

        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|e| panic!("{} failed validation: {:?}", shader_def.path, e));

        module
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module
            .entry_points
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Size in bytes of the uniform bound at `@group(group) @binding(0)`.
    fn uniform_size(module: &naga::Module, group: u32) -> usize {
        let mut layouter = Layouter::default();
        layouter.update(module.to_ctx()).unwrap();

        let (_, variable) = module
            .global_variables
            .iter()
            .find(|(_, variable)| variable.binding == Some(ResourceBinding { group, binding: 0 }))
            .unwrap_or_else(|| panic!("no binding in group {}", group));

        layouter[variable.ty].size as usize
    }

    #[test]
    fn mesh_shader_composes_with_shared_modules() {
        let module = compose_and_validate(&MESH_SHADER);
        assert_eq!(entry_points(&module), vec!["vs_main", "fs_main"]);
    }

    #[test]
    fn mesh_shader_uniforms_match_cpu_layouts() {
        let module = compose_and_validate(&MESH_SHADER);

        assert_eq!(uniform_size(&module, 0), std::mem::size_of::<CameraUniform>());
        assert_eq!(uniform_size(&module, 1), std::mem::size_of::<GlobalUniformState>());
        assert_eq!(uniform_size(&module, 2), std::mem::size_of::<LightsUniform>());
        assert_eq!(uniform_size(&module, 3), std::mem::size_of::<MaterialUniform>());
    }

    #[test]
    fn lens_flare_shader_composes() {
        let module = compose_and_validate(&LENS_FLARE_SHADER);
        assert_eq!(entry_points(&module), vec!["vs_main", "fs_main"]);
    }

    #[test]
    fn missing_shader_file_is_reported() {
        let composer = RwLock::new(create_composer().unwrap());
        let missing = ShaderDefinition {
            name: "Missing",
            path: "does_not_exist.wgsl",
        };

        let err = compose_module(&missing, &composer).unwrap_err();
        assert!(format!("{:#}", err).contains("does_not_exist.wgsl"));
    }
}
