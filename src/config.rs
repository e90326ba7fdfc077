use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::PawtrackError;
use crate::analysis::distribution::DEFAULT_BINS;
use crate::analysis::occupancy::DEFAULT_GRID_SIZE;
use crate::discontinuity::RepairSettings;
use crate::tracking::DEFAULT_FPS;
use crate::zones::DEFAULT_CIRCLE_RESOLUTION;

const CONFIG_DIR_NAME: &str = "pawtrack";
const CONFIG_FILE_NAME: &str = "config.json";

/// User defaults, overridden by command line flags.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Used when the tracking metadata has no fps
    pub default_fps: f64,
    pub repair: RepairSettings,
    pub occupancy_grid_size: usize,
    pub histogram_bins: usize,
    pub circle_resolution: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_fps: DEFAULT_FPS,
            repair: RepairSettings::default(),
            occupancy_grid_size: DEFAULT_GRID_SIZE,
            histogram_bins: DEFAULT_BINS,
            circle_resolution: DEFAULT_CIRCLE_RESOLUTION,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf, PawtrackError> {
        Ok(dirs::config_dir()
            .ok_or(PawtrackError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// The saved config, `None` when nothing was saved yet.
    pub fn from_local_file() -> Result<Option<Self>, PawtrackError> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load(&config_path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn load(path: &Path) -> Result<Self, PawtrackError> {
        let file = File::open(path).map_err(|e| PawtrackError::ConfigIOError { source: e })?;
        let config =
            serde_json::from_reader(file).map_err(|e| PawtrackError::ConfigSerializeError { source: e })?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, PawtrackError> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PawtrackError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PawtrackError::ConfigIOError { source: e })?;
        }
        let file = File::create(path).map_err(|e| PawtrackError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| PawtrackError::ConfigSerializeError { source: e })
    }
}
