pub mod global_uniform;
pub mod instance;
pub mod passes;
pub mod render_common;
pub mod render_model;
pub mod renderer;
pub mod scene_uniforms;
pub mod shader_loader;
pub mod texture;
