//! Configuration file support.
//!
//! Everything is optional; a missing default file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fare_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use wingo_client::ClientConfig;

const CONFIG_DIR: &str = "farewatch";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the snapshot archive and route cache live.
    pub data_dir: Option<PathBuf>,
    pub client: ClientConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load from `path`, or from the platform config directory when no path
    /// is given. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .pipeline
            .validate()
            .with_context(|| format!("Invalid pipeline settings in {}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Data directory: command line, then config file, then `./data`.
    pub fn data_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}
