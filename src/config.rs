//! Demo configuration, loaded from an optional TOML file.

use std::{
    f32::consts::PI,
    path::{Path, PathBuf},
};

use serde::Deserialize;

/// Which rendition of the scene to build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// One instanced mesh holding every box matrix.
    #[default]
    Instanced,
    /// One scene object per box, sharing geometry and material.
    Individual,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub variant: Variant,
    /// Seed for the box layout. A fresh layout is generated when unset.
    pub seed: Option<u64>,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub boxes: BoxesConfig,
    pub fog: FogConfig,
    pub textures: TextureConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub movement_speed: f32,
    /// Radians per second.
    pub roll_speed: f32,
    pub drag_to_look: bool,
    pub auto_forward: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoxesConfig {
    pub count: usize,
    pub size: f32,
    /// Boxes are scattered in `[-spread, spread]` on each axis.
    pub spread: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub flare_main: PathBuf,
    pub flare_ring: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub enabled: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 40.0,
            near: 1.0,
            far: 15000.0,
            position: [0.0, 0.0, 250.0],
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            movement_speed: 2500.0,
            roll_speed: PI / 6.0,
            drag_to_look: false,
            auto_forward: false,
        }
    }
}

impl Default for BoxesConfig {
    fn default() -> Self {
        Self {
            count: 3000,
            size: 250.0,
            spread: 8000.0,
        }
    }
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            near: 3500.0,
            far: 15000.0,
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            flare_main: PathBuf::from("assets/textures/lensflare/lensflare0.png"),
            flare_ring: PathBuf::from("assets/textures/lensflare/lensflare3.png"),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl DemoConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DemoConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;

        let numbers = [
            ("camera.fov", camera.fov),
            ("camera.near", camera.near),
            ("camera.far", camera.far),
            ("camera.position.x", camera.position[0]),
            ("camera.position.y", camera.position[1]),
            ("camera.position.z", camera.position[2]),
            ("controls.movement_speed", self.controls.movement_speed),
            ("controls.roll_speed", self.controls.roll_speed),
            ("boxes.size", self.boxes.size),
            ("boxes.spread", self.boxes.spread),
            ("fog.near", self.fog.near),
            ("fog.far", self.fog.far),
        ];

        if let Some((name, value)) = numbers.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }

        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.fov must be in (0, 180), got {}",
                camera.fov
            )));
        }

        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera clip planes must satisfy 0 < near < far, got near={} far={}",
                camera.near, camera.far
            )));
        }

        if self.fog.far <= self.fog.near {
            return Err(ConfigError::Invalid(format!(
                "fog.far must be greater than fog.near, got near={} far={}",
                self.fog.near, self.fog.far
            )));
        }

        if self.boxes.size <= 0.0 || self.boxes.spread < 0.0 {
            return Err(ConfigError::Invalid(
                "boxes.size must be positive and boxes.spread non-negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_scene() {
        let config = DemoConfig::default();
        assert_eq!(config.variant, Variant::Instanced);
        assert_eq!(config.camera.fov, 40.0);
        assert_eq!(config.camera.position, [0.0, 0.0, 250.0]);
        assert_eq!(config.boxes.count, 3000);
        assert_eq!(config.controls.movement_speed, 2500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DemoConfig::from_toml_str(
            r#"
            variant = "individual"
            seed = 7

            [boxes]
            count = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.variant, Variant::Individual);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.boxes.count, 10);
        assert_eq!(config.boxes.size, 250.0);
        assert_eq!(config.fog, FogConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let err = DemoConfig::from_toml_str("[camera]\nnear = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = DemoConfig::from_toml_str("[fog]\nnear = 100.0\nfar = 50.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = DemoConfig::from_toml_str("variant = \"wireframe\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_non_finite_numbers() {
        for source in [
            "[fog]\nnear = nan",
            "[fog]\nfar = inf",
            "[boxes]\nspread = nan",
            "[controls]\nmovement_speed = -inf",
        ] {
            let err = DemoConfig::from_toml_str(source).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid(ref message) if message.contains("finite")),
                "{source} gave {err}"
            );
        }
    }

    #[test]
    fn example_config_matches_defaults() {
        let mut config =
            DemoConfig::from_toml_str(include_str!("../lensflares.example.toml")).unwrap();
        assert_eq!(config.seed, Some(42));

        config.seed = None;
        assert_eq!(config, DemoConfig::default());
    }

    #[test]
    fn only_toml_files_are_loaded() {
        let err = DemoConfig::load_from_file(Path::new("demo.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));

        let err = DemoConfig::load_from_file(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
