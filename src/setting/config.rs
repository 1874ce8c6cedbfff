use std::{
    fs,
    io::{ErrorKind, Write},
    path::PathBuf,
};

use crate::{error::Error, pipeline::BlendMode, result::Result};

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
pub struct Config {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
pub struct ModelConfig {
    /// The detector is the only mandatory model.
    pub detector: PathBuf,
    pub embedder: Option<PathBuf>,
    pub swapper: Option<PathBuf>,
    pub restorer: Option<PathBuf>,
    pub cuda: bool,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
pub struct PipelineConfig {
    pub blend_mode: BlendMode,
    /// Global ratio used by the fixed blend mode, `[0, 1]`.
    pub blend_strength: f32,
    pub enable_restoration: bool,
    pub enable_stabilization: bool,
    /// Share of the stabilized output taken from history, `[0, 1]`.
    pub stabilization_strength: f32,
    pub enhance_contrast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                detector: PathBuf::from("face_detection_yunet_2023mar.onnx"),
                embedder: None,
                swapper: None,
                restorer: None,
                cuda: false,
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::Mask,
            blend_strength: 0.95,
            enable_restoration: false,
            enable_stabilization: true,
            stabilization_strength: 0.7,
            enhance_contrast: false,
        }
    }
}

impl Config {
    pub fn get() -> Result<Config> {
        let config_dir = Self::get_config_dir()?;

        let config_str = match fs::read_to_string(config_dir.clone()) {
            Ok(config) => config,
            Err(err) => {
                if err.kind() == ErrorKind::NotFound {
                    return Self::upsert_new(config_dir);
                }
                return Ok(Self::default());
            }
        };

        match config::Config::builder()
            .add_source(config::File::from_str(
                &config_str,
                config::FileFormat::Json,
            ))
            .build()
            .map_err(Error::ConfigError)?
            .try_deserialize::<Config>()
        {
            Ok(cfg) => Ok(cfg.clamped()),
            Err(_) => Self::upsert_new(config_dir),
        }
    }

    /// Pulls out-of-range ratios back into `[0, 1]` instead of rejecting the
    /// file.
    fn clamped(mut self) -> Self {
        self.pipeline.blend_strength = self.pipeline.blend_strength.clamp(0., 1.);
        self.pipeline.stabilization_strength = self.pipeline.stabilization_strength.clamp(0., 1.);
        self
    }

    fn get_config_dir() -> Result<PathBuf> {
        Ok(std::env::current_dir()
            .map_err(|_| Error::UnknownError("failed to get current directory".into()))?
            .join("config.json"))
    }

    fn upsert_new(config_dir: PathBuf) -> Result<Config> {
        let config = Self::default();
        Self::upsert_config_file(config_dir, &config)?;
        Ok(config)
    }

    fn upsert_config_file(config_dir: PathBuf, config: &Config) -> Result<()> {
        fs::File::create(config_dir)
            .map_err(|err| Error::UnknownError(Box::new(err)))?
            .write_all(
                serde_json::to_string(config)
                    .map_err(|err| Error::UnknownError(Box::new(err)))?
                    .as_bytes(),
            )
            .map_err(|err| Error::UnknownError(Box::new(err)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_pipeline_options_match_the_documented_surface() {
        let config = Config::default();

        assert_eq!(config.pipeline.blend_mode, BlendMode::Mask);
        assert_eq!(config.pipeline.blend_strength, 0.95);
        assert!(!config.pipeline.enable_restoration);
        assert!(config.pipeline.enable_stabilization);
        assert_eq!(config.pipeline.stabilization_strength, 0.7);
        assert!(!config.pipeline.enhance_contrast);
        assert!(config.model.embedder.is_none());
        assert!(!config.model.cuda);
    }

    #[test]
    fn out_of_range_ratios_are_clamped() {
        let mut config = Config::default();
        config.pipeline.blend_strength = 3.;
        config.pipeline.stabilization_strength = -0.5;

        let clamped = config.clamped();

        assert_eq!(clamped.pipeline.blend_strength, 1.);
        assert_eq!(clamped.pipeline.stabilization_strength, 0.);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.pipeline.blend_mode, config.pipeline.blend_mode);
        assert_eq!(parsed.model.detector, config.model.detector);
    }
}
