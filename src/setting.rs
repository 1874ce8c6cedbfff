pub use self::config::{Config, ModelConfig, PipelineConfig};

use crate::result::Result;

pub mod config;

#[derive(Default)]
pub struct Setting {
    pub config: Config,
}

impl Setting {
    pub fn get() -> Result<Self> {
        let config = Config::get()?;
        Ok(Self { config })
    }
}
