use anyhow::Result;
use clap::Parser;

mod camera;
mod cli;
mod color;
mod config;
mod demo;
mod engine;
mod fly_controls;
mod frame_stats;
mod geometry;
mod lens_flare;
mod lights;
mod model;
mod rendering;
mod scene_graph;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let opt = cli::CliOpt::parse();
    let config = opt.resolve_config()?;

    log::debug!("Resolved config: {:?}", config);

    pollster::block_on(window::run(config))?;

    Ok(())
}
