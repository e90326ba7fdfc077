// Confidence and selection filtering of tracking data

pub mod config;

use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::tracking::{BodypartSetting, DEFAULT_FPS, Keypoint, TrackingFile};

pub use config::FilterConfig;

pub const DEFAULT_NUM_ANIMALS: usize = 2;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Parameters of the filter step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Animals kept, counted from the first
    pub num_animals: usize,
    /// Keypoints below this confidence are blanked
    pub confidence_threshold: f64,
    /// Names and inclusion flags by bodypart index
    #[serde(deserialize_with = "crate::tracking::index_keyed")]
    pub bodyparts: BTreeMap<usize, BodypartSetting>,
    pub fps: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            num_animals: DEFAULT_NUM_ANIMALS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            bodyparts: BTreeMap::new(),
            fps: DEFAULT_FPS,
        }
    }
}

impl FilterSettings {
    /// Default settings with every bodypart of the data included under its
    /// default name.
    pub fn for_data(tracking: &TrackingFile) -> Self {
        Self {
            fps: tracking.fps(),
            ..Default::default()
        }
        .with_config(&FilterConfig::for_data(tracking))
    }

    /// Threshold clamped into `[0, 1]`; not-a-number becomes the default.
    pub fn clamped_threshold(&self) -> f64 {
        if self.confidence_threshold.is_nan() {
            DEFAULT_CONFIDENCE_THRESHOLD
        } else {
            self.confidence_threshold.clamp(0.0, 1.0)
        }
    }

    pub fn selected_bodyparts(&self) -> Vec<usize> {
        self.bodyparts
            .iter()
            .filter(|(_, setting)| setting.include)
            .map(|(index, _)| *index)
            .collect()
    }

    /// The reusable part of these settings, for saving next to the data.
    pub fn to_config(&self) -> FilterConfig {
        FilterConfig {
            num_animals: self.num_animals,
            confidence_threshold: self.clamped_threshold(),
            bodyparts: self.bodyparts.clone(),
        }
    }

    pub fn with_config(mut self, config: &FilterConfig) -> Self {
        self.num_animals = config.num_animals;
        self.confidence_threshold = config.confidence_threshold;
        self.bodyparts = config.bodyparts.clone();
        self
    }
}

/// Applies the filter step, returning a new file with the same frame count.
///
/// Animals beyond `num_animals` are dropped from the boxes, scores and
/// keypoints. Keypoints below the threshold, or outside a non-empty bodypart
/// selection, are replaced by missing values. The bodypart settings and fps
/// are stored in the output metadata for the plotting step.
pub fn apply(tracking: &TrackingFile, settings: &FilterSettings) -> TrackingFile {
    let threshold = settings.clamped_threshold();
    let selected = settings.selected_bodyparts();
    let mut filtered = tracking.clone();

    for frame in filtered.frames.iter_mut() {
        if let Some(bboxes) = frame.bboxes.as_mut() {
            bboxes.truncate(settings.num_animals);
        }
        if let Some(scores) = frame.bbox_scores.as_mut() {
            scores.truncate(settings.num_animals);
        }
        if let Some(bodyparts) = frame.bodyparts.as_mut() {
            bodyparts.truncate(settings.num_animals);
            for animal in bodyparts.iter_mut() {
                for (index, keypoint) in animal.iter_mut().enumerate() {
                    if keypoint.confidence < threshold
                        || (!selected.is_empty() && !selected.contains(&index))
                    {
                        *keypoint = Keypoint::missing();
                    }
                }
            }
        }
    }

    filtered.metadata.bodypart_names = settings.bodyparts.clone();
    filtered.metadata.fps = Some(settings.fps);

    let before = tracking.summary();
    let after = filtered.summary();
    info!(
        "Filtered {} frames: animals {} -> {}, threshold {}, {} bodyparts selected",
        after.num_frames,
        before.num_animals,
        after.num_animals,
        threshold,
        selected.len()
    );
    filtered
}
