use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{Discontinuity, GapScope, detect};
use crate::tracking::{Frame, Keypoint, TrackingFile};

/// Confidence written on interpolated keypoints unless configured otherwise.
/// Sits just above the repair threshold so repaired points pass the default filter.
pub const DEFAULT_INTERP_CONFIDENCE: f64 = 0.51;
pub const DEFAULT_MAX_GAP: usize = 10;
/// Keypoints inside a bodypart gap below this confidence get replaced.
const MIN_KEEP_CONFIDENCE: f64 = 0.5;
const EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Nearest,
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationMethod::Linear => write!(f, "linear"),
            InterpolationMethod::Nearest => write!(f, "nearest"),
        }
    }
}

impl FromStr for InterpolationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(InterpolationMethod::Linear),
            "nearest" => Ok(InterpolationMethod::Nearest),
            other => Err(format!(
                "unknown interpolation method '{other}', expected 'linear' or 'nearest'"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSettings {
    pub method: InterpolationMethod,
    /// Longest gap, in frames, that will be filled
    pub max_gap: usize,
    /// Animals to repair, all when empty
    pub selected_animals: Vec<usize>,
    pub interp_confidence: f64,
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::default(),
            max_gap: DEFAULT_MAX_GAP,
            selected_animals: Vec::new(),
            interp_confidence: DEFAULT_INTERP_CONFIDENCE,
        }
    }
}

impl RepairSettings {
    /// The interpolation confidence to write, falling back to the default when
    /// the configured value is not a probability.
    pub fn effective_interp_confidence(&self) -> f64 {
        if (0.0..=1.0).contains(&self.interp_confidence) {
            self.interp_confidence
        } else {
            warn!(
                "Interpolation confidence {} is outside [0, 1], using {}",
                self.interp_confidence, DEFAULT_INTERP_CONFIDENCE
            );
            DEFAULT_INTERP_CONFIDENCE
        }
    }

    pub fn is_animal_selected(&self, animal: usize) -> bool {
        self.selected_animals.is_empty() || self.selected_animals.contains(&animal)
    }

    /// Toggles one animal out of `num_animals`. Selecting every animal is
    /// stored as the empty selection.
    pub fn set_animal_selected(&mut self, animal: usize, selected: bool, num_animals: usize) {
        let mut animals: Vec<usize> = (0..num_animals)
            .filter(|other| {
                if *other == animal {
                    selected
                } else {
                    self.is_animal_selected(*other)
                }
            })
            .collect();
        if animals.len() == num_animals {
            animals.clear();
        }
        self.selected_animals = animals;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub discontinuities: Vec<Discontinuity>,
    /// Discontinuities where at least one keypoint was written
    pub fixed_discontinuities: usize,
    /// Longest gap seen, including the ones too long to fill
    pub max_gap_found: usize,
    /// Keypoints written
    pub fixed_points: usize,
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discontinuities found: {}", self.discontinuities.len())?;
        writeln!(f, "Discontinuities fixed: {}", self.fixed_discontinuities)?;
        writeln!(f, "Points interpolated: {}", self.fixed_points)?;
        write!(f, "Largest gap: {} frames", self.max_gap_found)
    }
}

#[derive(Clone, Copy, Debug)]
struct Anchor {
    frame: usize,
    x: f64,
    y: f64,
}

fn anchor_at(frames: &[Frame], frame: usize, animal: usize, bodypart: usize) -> Option<Anchor> {
    frames[frame]
        .keypoint(animal, bodypart)
        .filter(|keypoint| keypoint.is_valid())
        .map(|keypoint| Anchor {
            frame,
            x: keypoint.x,
            y: keypoint.y,
        })
}

/// Nearest valid keypoints at or before `before` and at or after `after`.
fn find_anchors(
    frames: &[Frame],
    animal: usize,
    bodypart: usize,
    before: usize,
    after: usize,
) -> Option<(Anchor, Anchor)> {
    let previous = (0..=before)
        .rev()
        .find_map(|frame| anchor_at(frames, frame, animal, bodypart))?;
    let next = (after..frames.len()).find_map(|frame| anchor_at(frames, frame, animal, bodypart))?;
    Some((previous, next))
}

fn interpolate(method: InterpolationMethod, previous: Anchor, next: Anchor, frame: usize) -> (f64, f64) {
    match method {
        InterpolationMethod::Linear => {
            let progress =
                (frame - previous.frame) as f64 / (next.frame - previous.frame) as f64;
            (
                previous.x + progress * (next.x - previous.x),
                previous.y + progress * (next.y - previous.y),
            )
        }
        InterpolationMethod::Nearest => {
            if frame - previous.frame <= next.frame - frame {
                (previous.x, previous.y)
            } else {
                (next.x, next.y)
            }
        }
    }
}

/// Fills gaps between valid anchors and returns the repaired copy.
///
/// Gaps longer than `max_gap`, touching either end of the recording, or
/// without a valid anchor on both sides are left alone. Whole-frame gaps
/// overwrite every bodypart; bodypart gaps only overwrite keypoints that are
/// missing or below 0.5 confidence. Repairs are applied in detection order,
/// so later anchor searches see earlier repairs.
pub fn repair(tracking: &TrackingFile, settings: &RepairSettings) -> (TrackingFile, RepairReport) {
    let interp_confidence = settings.effective_interp_confidence();
    let discontinuities = detect(tracking, &settings.selected_animals);

    let mut processed = tracking.clone();
    let mut report = RepairReport::default();
    let num_frames = processed.frames.len();

    for gap in &discontinuities {
        report.max_gap_found = report.max_gap_found.max(gap.len());
        if gap.len() > settings.max_gap {
            debug!("Skipping gap longer than {}: {}", settings.max_gap, gap);
            continue;
        }
        if gap.start_frame == 0 || gap.end_frame + 1 >= num_frames {
            debug!("Skipping gap at the edge of the recording: {}", gap);
            continue;
        }

        let (bodyparts, overwrite_all) = match gap.scope {
            GapScope::Frame => {
                let num_bodyparts = processed.frames[0]
                    .animals()
                    .get(gap.animal)
                    .map(Vec::len)
                    .unwrap_or(0);
                ((0..num_bodyparts).collect::<Vec<_>>(), true)
            }
            GapScope::Bodypart(bodypart) => (vec![bodypart], false),
        };

        let mut written = 0;
        for bodypart in bodyparts {
            let Some((previous, next)) = find_anchors(
                &processed.frames,
                gap.animal,
                bodypart,
                gap.start_frame - 1,
                gap.end_frame + 1,
            ) else {
                continue;
            };

            for frame in gap.start_frame..=gap.end_frame {
                let Some(keypoint) = processed.frames[frame].keypoint_mut(gap.animal, bodypart)
                else {
                    continue;
                };
                if !overwrite_all
                    && !(keypoint.is_missing() || keypoint.confidence < MIN_KEEP_CONFIDENCE)
                {
                    continue;
                }
                let (x, y) = interpolate(settings.method, previous, next, frame);
                *keypoint = Keypoint::new(x, y, interp_confidence);
                written += 1;
            }
        }

        if written > 0 {
            report.fixed_discontinuities += 1;
            report.fixed_points += written;
        }
    }

    processed.metadata.interp_confidence = Some(interp_confidence);
    info!(
        "Repaired {} of {} discontinuities ({} points) using {} interpolation",
        report.fixed_discontinuities,
        discontinuities.len(),
        report.fixed_points,
        settings.method
    );
    report.discontinuities = discontinuities;
    (processed, report)
}

fn interp_confidence_of(tracking: &TrackingFile) -> f64 {
    tracking
        .metadata
        .interp_confidence
        .unwrap_or(DEFAULT_INTERP_CONFIDENCE)
}

fn moved(original: &Keypoint, processed: &Keypoint) -> bool {
    (original.x - processed.x).abs() > EPSILON || (original.y - processed.y).abs() > EPSILON
}

/// Counts keypoints carrying the interpolation confidence whose position
/// differs from the original (or whose original was missing).
pub fn count_fixed_points(original: &TrackingFile, processed: &TrackingFile) -> usize {
    let interp_confidence = interp_confidence_of(processed);

    original
        .frames
        .iter()
        .zip(processed.frames.iter())
        .flat_map(|(original_frame, processed_frame)| {
            original_frame.animals().iter().zip(processed_frame.animals().iter())
        })
        .flat_map(|(original_animal, processed_animal)| {
            original_animal.iter().zip(processed_animal.iter())
        })
        .filter(|(original, processed)| {
            (processed.confidence - interp_confidence).abs() < EPSILON
                && (original.is_missing() || moved(original, processed))
        })
        .count()
}

/// Repaired points for one animal and bodypart as `(frame, x, y)`, for previews.
pub fn fixed_points(
    original: &TrackingFile,
    processed: &TrackingFile,
    animal: usize,
    bodypart: usize,
) -> Vec<(usize, f64, f64)> {
    let interp_confidence = interp_confidence_of(processed);

    original
        .frames
        .iter()
        .zip(processed.frames.iter())
        .enumerate()
        .filter_map(|(frame, (original_frame, processed_frame))| {
            let before = original_frame.keypoint(animal, bodypart)?;
            let after = processed_frame.keypoint(animal, bodypart)?;

            let was_missing = before.is_missing() || before.confidence < MIN_KEEP_CONFIDENCE;
            let is_fixed = (was_missing && !after.is_missing())
                || (after.confidence - interp_confidence).abs() < EPSILON
                || (!was_missing && moved(before, after));
            is_fixed.then_some((frame, after.x, after.y))
        })
        .collect()
}

/// Copy of `tracking` where interpolated keypoints carry full confidence, so
/// downstream tools treat them as regular detections.
pub fn normalize_interpolated(tracking: &TrackingFile) -> TrackingFile {
    let interp_confidence = interp_confidence_of(tracking);
    let mut normalized = tracking.clone();

    normalized
        .frames
        .iter_mut()
        .filter_map(|frame| frame.bodyparts.as_mut())
        .flatten()
        .flatten()
        .filter(|keypoint| (keypoint.confidence - interp_confidence).abs() < EPSILON)
        .for_each(|keypoint| keypoint.confidence = 1.0);

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::test_support::{single_track, tracking_file};
    use proptest::prelude::*;

    const NAN: f64 = f64::NAN;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_linear_repair_of_bodypart_gap() {
        let tracking = single_track(&[
            (0., 10., 0.9),
            (NAN, NAN, 0.1),
            (NAN, NAN, 0.1),
            (NAN, NAN, 0.1),
            (4., 14., 0.9),
        ]);
        let (processed, report) = repair(&tracking, &RepairSettings::default());

        assert_eq!(report.discontinuities.len(), 1);
        assert_eq!(report.fixed_discontinuities, 1);
        assert_eq!(report.fixed_points, 3);
        assert_eq!(report.max_gap_found, 3);
        for frame in 1..4 {
            let keypoint = processed.keypoint(frame, 0, 0).unwrap();
            assert_close(keypoint.x, frame as f64);
            assert_close(keypoint.y, 10. + frame as f64);
            assert_close(keypoint.confidence, DEFAULT_INTERP_CONFIDENCE);
        }
        assert_eq!(processed.metadata.interp_confidence, Some(DEFAULT_INTERP_CONFIDENCE));
        // the input is left untouched
        assert!(tracking.keypoint(2, 0, 0).unwrap().is_missing());
    }

    #[test]
    fn test_nearest_repair_prefers_previous_on_ties() {
        let tracking = single_track(&[(0., 0., 0.9), (NAN, NAN, 0.), (NAN, NAN, 0.), (3., 3., 0.9)]);
        let settings = RepairSettings {
            method: InterpolationMethod::Nearest,
            ..Default::default()
        };
        let (processed, _) = repair(&tracking, &settings);
        assert_close(processed.keypoint(1, 0, 0).unwrap().x, 0.);
        assert_close(processed.keypoint(2, 0, 0).unwrap().x, 3.);
    }

    #[test]
    fn test_gaps_longer_than_max_are_skipped() {
        let tracking = single_track(&[
            (0., 0., 0.9),
            (NAN, NAN, 0.),
            (NAN, NAN, 0.),
            (NAN, NAN, 0.),
            (4., 4., 0.9),
        ]);
        let settings = RepairSettings {
            max_gap: 2,
            ..Default::default()
        };
        let (processed, report) = repair(&tracking, &settings);
        assert_eq!(report.fixed_discontinuities, 0);
        assert_eq!(report.max_gap_found, 3);
        assert!(processed.keypoint(2, 0, 0).unwrap().is_missing());
    }

    #[test]
    fn test_gaps_at_the_edges_are_skipped() {
        let tracking = single_track(&[(NAN, NAN, 0.), (1., 1., 0.9), (NAN, NAN, 0.)]);
        let (_, report) = repair(&tracking, &RepairSettings::default());
        assert_eq!(report.discontinuities.len(), 2);
        assert_eq!(report.fixed_discontinuities, 0);
    }

    #[test]
    fn test_lost_frame_repair_overwrites_all_bodyparts() {
        let tracking = tracking_file(vec![
            vec![vec![(0., 0., 0.9), (10., 10., 0.9)]],
            vec![vec![(7., 7., -1.), (8., 8., 0.95)]],
            vec![vec![(2., 2., 0.9), (12., 12., 0.9)]],
        ]);
        let (processed, report) = repair(&tracking, &RepairSettings::default());

        assert_eq!(report.fixed_discontinuities, 1);
        assert_eq!(report.fixed_points, 2);
        let first = processed.keypoint(1, 0, 0).unwrap();
        let second = processed.keypoint(1, 0, 1).unwrap();
        assert_close(first.x, 1.);
        assert_close(second.x, 11.);
        assert_close(second.confidence, DEFAULT_INTERP_CONFIDENCE);
    }

    #[test]
    fn test_anchor_search_skips_invalid_neighbours() {
        // frame 1 is lost for the animal and frame 2 is missing, so the
        // first repair anchors on frames 0 and 3
        let tracking = tracking_file(vec![
            vec![vec![(0., 0., 0.9)]],
            vec![vec![(5., 5., -1.)]],
            vec![vec![(NAN, NAN, 0.)]],
            vec![vec![(3., 3., 0.9)]],
        ]);
        let settings = RepairSettings {
            max_gap: 1,
            ..Default::default()
        };
        let (processed, report) = repair(&tracking, &settings);
        assert_eq!(report.discontinuities.len(), 2);

        // the lost frame is repaired first, and becomes the anchor for frame 2
        let lost = processed.keypoint(1, 0, 0).unwrap();
        assert_close(lost.x, 1.);
        let gap = processed.keypoint(2, 0, 0).unwrap();
        assert_close(gap.x, 2.);
    }

    #[test]
    fn test_invalid_interp_confidence_falls_back() {
        let settings = RepairSettings {
            interp_confidence: 1.5,
            ..Default::default()
        };
        assert_eq!(settings.effective_interp_confidence(), DEFAULT_INTERP_CONFIDENCE);
        let settings = RepairSettings {
            interp_confidence: NAN,
            ..Default::default()
        };
        assert_eq!(settings.effective_interp_confidence(), DEFAULT_INTERP_CONFIDENCE);
    }

    #[test]
    fn test_fixed_point_accounting_and_normalization() {
        let tracking = single_track(&[(0., 0., 0.9), (NAN, NAN, 0.), (2., 2., 0.9)]);
        let settings = RepairSettings {
            interp_confidence: 0.42,
            ..Default::default()
        };
        let (processed, _) = repair(&tracking, &settings);

        assert_eq!(count_fixed_points(&tracking, &processed), 1);
        assert_eq!(fixed_points(&tracking, &processed, 0, 0), vec![(1, 1., 1.)]);

        let normalized = normalize_interpolated(&processed);
        assert_eq!(normalized.keypoint(1, 0, 0).unwrap().confidence, 1.0);
        assert_eq!(normalized.keypoint(0, 0, 0).unwrap().confidence, 0.9);
    }

    #[test]
    fn test_animal_selection_toggles() {
        let mut settings = RepairSettings::default();
        assert!(settings.is_animal_selected(2));

        settings.set_animal_selected(1, false, 3);
        assert_eq!(settings.selected_animals, vec![0, 2]);
        assert!(!settings.is_animal_selected(1));

        settings.set_animal_selected(0, false, 3);
        assert_eq!(settings.selected_animals, vec![2]);

        settings.set_animal_selected(0, true, 3);
        settings.set_animal_selected(1, true, 3);
        assert!(settings.selected_animals.is_empty());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("Linear".parse::<InterpolationMethod>(), Ok(InterpolationMethod::Linear));
        assert_eq!("nearest".parse::<InterpolationMethod>(), Ok(InterpolationMethod::Nearest));
        assert!("cubic".parse::<InterpolationMethod>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_linear_fill_stays_between_anchors(
            start in -1000.0f64..1000.0,
            end in -1000.0f64..1000.0,
            gap in 1usize..10,
        ) {
            let mut points = vec![(start, start, 0.9)];
            points.extend(std::iter::repeat_n((NAN, NAN, 0.), gap));
            points.push((end, end, 0.9));
            let tracking = single_track(&points);

            let (processed, report) = repair(&tracking, &RepairSettings::default());
            prop_assert_eq!(report.fixed_points, gap);

            let (low, high) = if start <= end { (start, end) } else { (end, start) };
            for frame in 1..=gap {
                let keypoint = processed.keypoint(frame, 0, 0).unwrap();
                prop_assert!(keypoint.x >= low - 1e-9 && keypoint.x <= high + 1e-9);
            }
        }
    }
}
