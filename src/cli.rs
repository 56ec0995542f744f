//! CLI options.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::config::{DemoConfig, Variant};

/// Lens flare demo scene.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct CliOpt {
    /// Scene rendition to run
    #[arg(long, value_enum)]
    pub variant: Option<Variant>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for the box layout
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of boxes to scatter
    #[arg(long)]
    pub boxes: Option<usize>,

    /// Hide the stats overlay
    #[arg(long)]
    pub no_stats: bool,
}

impl CliOpt {
    /// Loads the config file, if any, and applies command line overrides on top.
    pub fn resolve_config(&self) -> anyhow::Result<DemoConfig> {
        let mut config = match &self.config {
            Some(path) => DemoConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => DemoConfig::default(),
        };

        if let Some(variant) = self.variant {
            config.variant = variant;
        }

        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }

        if let Some(boxes) = self.boxes {
            config.boxes.count = boxes;
        }

        if self.no_stats {
            config.stats.enabled = false;
        }

        Ok(config)
    }
}
