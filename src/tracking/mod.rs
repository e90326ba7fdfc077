// Pose tracking data model shared by every processing step

pub mod loader;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value};

pub use loader::{load_tracking_json, parse_tracking_json};

/// Confidence value the pose model writes when it lost the whole animal in a frame.
pub const LOST_FRAME_CONFIDENCE: f64 = -1.0;
/// Frames per second assumed when the metadata doesn't say otherwise.
pub const DEFAULT_FPS: f64 = 30.0;

/// A single tracked body point. Missing coordinates are stored as `NaN`.
///
/// On the wire a keypoint is the 3-array `[x, y, confidence]`, with `null`
/// standing in for values that are not numbers.
#[derive(Clone, Copy, Debug)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    pub fn missing() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    /// True when either coordinate is missing.
    pub fn is_missing(&self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }

    /// True when the model flagged the whole frame as lost.
    pub fn is_lost_frame(&self) -> bool {
        self.confidence == LOST_FRAME_CONFIDENCE
    }

    /// A keypoint usable as an interpolation anchor.
    pub fn is_valid(&self) -> bool {
        !self.is_missing() && !self.is_lost_frame()
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self::missing()
    }
}

impl Serialize for Keypoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let as_option = |v: f64| if v.is_nan() { None } else { Some(v) };
        [as_option(self.x), as_option(self.y), as_option(self.confidence)].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Keypoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x, y, confidence] = <[Option<f64>; 3]>::deserialize(deserializer)?;
        Ok(Self {
            x: x.unwrap_or(f64::NAN),
            y: y.unwrap_or(f64::NAN),
            confidence: confidence.unwrap_or(f64::NAN),
        })
    }
}

/// One video frame of model output, indexed `bodyparts[animal][bodypart]`.
///
/// Bounding boxes are only ever truncated, never inspected, so they are kept
/// as raw JSON. Fields we don't know about survive a load/export cycle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bboxes: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox_scores: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bodyparts: Option<Vec<Vec<Keypoint>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Frame {
    pub fn with_bodyparts(bodyparts: Vec<Vec<Keypoint>>) -> Self {
        Self {
            bodyparts: Some(bodyparts),
            ..Default::default()
        }
    }

    /// Per-animal keypoint lists, empty when the frame carries no bodyparts.
    pub fn animals(&self) -> &[Vec<Keypoint>] {
        self.bodyparts.as_deref().unwrap_or_default()
    }

    pub fn keypoint(&self, animal: usize, bodypart: usize) -> Option<&Keypoint> {
        self.bodyparts.as_ref()?.get(animal)?.get(bodypart)
    }

    pub fn keypoint_mut(&mut self, animal: usize, bodypart: usize) -> Option<&mut Keypoint> {
        self.bodyparts.as_mut()?.get_mut(animal)?.get_mut(bodypart)
    }
}

/// Display name and inclusion flag for one bodypart index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodypartSetting {
    /// Optional in files, where it defaults to the name of its index
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub include: bool,
}

impl BodypartSetting {
    pub fn default_name(index: usize) -> String {
        format!("Bodypart {index}")
    }

    pub fn included(index: usize) -> Self {
        Self {
            name: Self::default_name(index),
            include: true,
        }
    }
}

/// Information the processing steps attach to the frames.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Confidence written on interpolated keypoints by the gap repair step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interp_confidence: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "index_keyed"
    )]
    pub bodypart_names: BTreeMap<usize, BodypartSetting>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reads a bodypart map keyed by index strings. Entries without a name get
/// the default name of their index.
///
/// Flattened structs are buffered before deserializing, and the buffer won't
/// turn string keys into integers on its own.
pub(crate) fn index_keyed<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<usize, BodypartSetting>, D::Error> {
    BTreeMap::<String, BodypartSetting>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, mut setting)| {
            let index: usize = key
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid bodypart index '{key}'")))?;
            if setting.name.is_empty() {
                setting.name = BodypartSetting::default_name(index);
            }
            Ok((index, setting))
        })
        .collect()
}

/// Frames plus metadata. Always written in the wrapped `{data, metadata}` form.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingFile {
    #[serde(rename = "data")]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DataSummary {
    pub num_frames: usize,
    pub num_animals: usize,
    pub num_bodyparts: usize,
}

impl fmt::Display for DataSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Frames: {}", self.num_frames)?;
        writeln!(f, "Animals Detected: {}", self.num_animals)?;
        write!(f, "Body Parts Available: {}", self.num_bodyparts)
    }
}

impl TrackingFile {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            metadata: Metadata::default(),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Shape of the data as seen in the first frame. The animal count prefers
    /// the detector scores over the keypoint lists, like the model output does.
    pub fn summary(&self) -> DataSummary {
        let Some(first) = self.frames.first() else {
            return DataSummary::default();
        };

        let num_animals = match (&first.bbox_scores, &first.bodyparts) {
            (Some(scores), _) => scores.len(),
            (None, Some(bodyparts)) => bodyparts.len(),
            (None, None) => 0,
        };
        let num_bodyparts = if num_animals > 0 {
            first.animals().first().map(Vec::len).unwrap_or(0)
        } else {
            0
        };

        DataSummary {
            num_frames: self.frames.len(),
            num_animals,
            num_bodyparts,
        }
    }

    pub fn keypoint(&self, frame: usize, animal: usize, bodypart: usize) -> Option<&Keypoint> {
        self.frames.get(frame)?.keypoint(animal, bodypart)
    }

    pub fn fps(&self) -> f64 {
        self.metadata
            .fps
            .filter(|fps| fps.is_finite() && *fps > 0.)
            .unwrap_or(DEFAULT_FPS)
    }

    pub fn bodypart_name(&self, index: usize) -> String {
        self.metadata
            .bodypart_names
            .get(&index)
            .map(|setting| setting.name.clone())
            .unwrap_or_else(|| BodypartSetting::default_name(index))
    }

    /// Bodyparts worth offering for plotting and export, as `(index, name)`.
    ///
    /// Uses the names stored by the filter step when present; otherwise every
    /// bodypart of the first animal that has at least one real coordinate.
    pub fn available_bodyparts(&self) -> Vec<(usize, String)> {
        if !self.metadata.bodypart_names.is_empty() {
            return self
                .metadata
                .bodypart_names
                .iter()
                .filter(|(_, setting)| setting.include)
                .map(|(index, setting)| (*index, setting.name.clone()))
                .collect();
        }

        let num_bodyparts = self
            .frames
            .first()
            .and_then(|frame| frame.animals().first())
            .map(Vec::len)
            .unwrap_or(0);

        (0..num_bodyparts)
            .filter(|bodypart| {
                self.frames.iter().any(|frame| {
                    frame
                        .keypoint(0, *bodypart)
                        .is_some_and(|keypoint| !keypoint.is_missing())
                })
            })
            .map(|bodypart| (bodypart, BodypartSetting::default_name(bodypart)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{Frame, Keypoint, TrackingFile};

    /// Builds a file with one frame per entry of `frames`, each entry listing
    /// animals, each animal listing `(x, y, confidence)` per bodypart.
    pub(crate) fn tracking_file(frames: Vec<Vec<Vec<(f64, f64, f64)>>>) -> TrackingFile {
        TrackingFile::new(
            frames
                .into_iter()
                .map(|animals| {
                    Frame::with_bodyparts(
                        animals
                            .into_iter()
                            .map(|points| {
                                points
                                    .into_iter()
                                    .map(|(x, y, c)| Keypoint::new(x, y, c))
                                    .collect()
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// A single animal with a single bodypart moving along `xs`.
    pub(crate) fn single_track(points: &[(f64, f64, f64)]) -> TrackingFile {
        tracking_file(points.iter().map(|p| vec![vec![*p]]).collect())
    }
}
