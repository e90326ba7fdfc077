// Detection and repair of tracking gaps
//
// A gap is a run of consecutive frames where a keypoint is missing. The pose
// model also flags whole frames as lost for an animal by writing a confidence
// of -1 on its keypoints; those runs are reported once per animal instead of
// once per bodypart.

pub mod repair;

use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::tracking::TrackingFile;

pub use repair::{
    InterpolationMethod, RepairReport, RepairSettings, count_fixed_points, fixed_points,
    normalize_interpolated, repair,
};

/// What a discontinuity covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum GapScope {
    /// Every bodypart of the animal was lost in these frames
    Frame,
    /// A single bodypart was missing
    Bodypart(usize),
}

/// An inclusive run of frames `[start_frame, end_frame]` with missing data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Discontinuity {
    pub animal: usize,
    pub scope: GapScope,
    pub start_frame: usize,
    pub end_frame: usize,
}

impl Discontinuity {
    pub fn len(&self) -> usize {
        self.end_frame - self.start_frame + 1
    }
}

impl fmt::Display for Discontinuity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            GapScope::Frame => "all bodyparts".to_string(),
            GapScope::Bodypart(bodypart) => format!("bodypart {bodypart}"),
        };
        write!(
            f,
            "Animal {}, {}: frames {}-{} ({} frames)",
            self.animal + 1,
            scope,
            self.start_frame,
            self.end_frame,
            self.len()
        )
    }
}

/// Collects maximal runs of `true` from `(frame, flag)` pairs.
///
/// Frames that are not yielded at all neither open nor close a run.
fn runs(flags: impl Iterator<Item = (usize, bool)>, last_frame: usize) -> Vec<(usize, usize)> {
    let mut output = Vec::new();
    let mut open: Option<usize> = None;
    for (frame, flagged) in flags {
        match (flagged, open) {
            (true, None) => open = Some(frame),
            (false, Some(start)) => {
                output.push((start, frame - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        output.push((start, last_frame));
    }
    output
}

/// Finds all discontinuities for the selected animals (all animals when the
/// selection is empty).
///
/// Results are ordered per animal: whole-frame gaps first, then per-bodypart
/// gaps by bodypart index.
pub fn detect(tracking: &TrackingFile, selected_animals: &[usize]) -> Vec<Discontinuity> {
    let mut discontinuities = Vec::new();
    let frames = &tracking.frames;
    let Some(first) = frames.first() else {
        return discontinuities;
    };

    let num_animals = first.animals().len();
    let num_bodyparts = first.animals().first().map(Vec::len).unwrap_or(0);
    let last_frame = frames.len() - 1;

    let animals: Vec<usize> = if selected_animals.is_empty() {
        (0..num_animals).collect()
    } else {
        selected_animals.to_vec()
    };

    for animal in animals {
        if animal >= num_animals {
            debug!("Skipping animal {} which is not in the data", animal);
            continue;
        }

        // frames where the model lost the whole animal
        let lost_frames = runs(
            frames.iter().enumerate().filter_map(|(frame_idx, frame)| {
                let keypoints = frame.animals().get(animal)?;
                let lost = keypoints
                    .iter()
                    .take(num_bodyparts)
                    .any(|keypoint| keypoint.is_lost_frame());
                Some((frame_idx, lost))
            }),
            last_frame,
        );
        let lost_set: HashSet<usize> = lost_frames
            .iter()
            .flat_map(|(start, end)| *start..=*end)
            .collect();
        discontinuities.extend(lost_frames.iter().map(|(start, end)| Discontinuity {
            animal,
            scope: GapScope::Frame,
            start_frame: *start,
            end_frame: *end,
        }));

        for bodypart in 0..num_bodyparts {
            let gaps = runs(
                frames
                    .iter()
                    .enumerate()
                    .filter(|(frame_idx, _)| !lost_set.contains(frame_idx))
                    .filter_map(|(frame_idx, frame)| {
                        let keypoint = frame.keypoint(animal, bodypart)?;
                        Some((frame_idx, keypoint.is_missing()))
                    }),
                last_frame,
            );
            discontinuities.extend(gaps.into_iter().map(|(start, end)| Discontinuity {
                animal,
                scope: GapScope::Bodypart(bodypart),
                start_frame: start,
                end_frame: end,
            }));
        }
    }

    debug!("Detected {} discontinuities", discontinuities.len());
    discontinuities
}
