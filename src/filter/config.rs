use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NUM_ANIMALS};
use crate::PawtrackError;
use crate::tracking::{BodypartSetting, TrackingFile, index_keyed};

pub const FILTER_CONFIG_FILE_NAME: &str = "dlc_filter_config.json";

/// Reusable filter choices, saved next to the data so the same bodypart names
/// and selection can be applied to other recordings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub num_animals: usize,
    pub confidence_threshold: f64,
    #[serde(deserialize_with = "index_keyed")]
    pub bodyparts: BTreeMap<usize, BodypartSetting>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            num_animals: DEFAULT_NUM_ANIMALS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            bodyparts: BTreeMap::new(),
        }
    }
}

impl FilterConfig {
    /// A config listing every bodypart found in the data, all included.
    pub fn for_data(tracking: &TrackingFile) -> Self {
        Self {
            bodyparts: (0..tracking.summary().num_bodyparts)
                .map(|index| (index, BodypartSetting::included(index)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, PawtrackError> {
        let file = File::open(path).map_err(|e| PawtrackError::ConfigIOError { source: e })?;
        let config: FilterConfig = serde_json::from_reader(file)
            .map_err(|e| PawtrackError::ConfigSerializeError { source: e })?;
        info!(
            "Loaded filter config with {} bodyparts from {:?}",
            config.bodyparts.len(),
            path
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), PawtrackError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PawtrackError::ConfigIOError { source: e })?;
        }
        let file = File::create(path).map_err(|e| PawtrackError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| PawtrackError::ConfigSerializeError { source: e })
    }
}
