pub mod lens_flare_pass;
pub mod mesh_pass;
pub mod overlay_pass;
pub mod pass;
