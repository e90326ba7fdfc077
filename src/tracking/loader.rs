use std::borrow::Cow;
use std::fs;
use std::path::Path;

use log::{debug, info};

use super::{Frame, TrackingFile};
use crate::PawtrackError;

/// Loads tracking data from a JSON file.
///
/// Accepts both the bare frame list written by the pose model and the wrapped
/// `{"data": [...], "metadata": {...}}` form written by our own exports.
pub fn load_tracking_json(source_file: &Path) -> Result<TrackingFile, PawtrackError> {
    if !source_file.exists() {
        return Err(PawtrackError::TrackingFileNotFound {
            path: format!("{:?}", source_file),
        });
    }

    let content = fs::read_to_string(source_file)
        .map_err(|e| PawtrackError::TrackingLoaderError { source: e })?;
    let tracking = parse_tracking_json(&content)?;

    let summary = tracking.summary();
    info!(
        "Loaded {:?}, found {} frames with {} animals and {} bodyparts",
        source_file, summary.num_frames, summary.num_animals, summary.num_bodyparts
    );
    Ok(tracking)
}

pub fn parse_tracking_json(content: &str) -> Result<TrackingFile, PawtrackError> {
    let content = sanitize_non_finite(content);
    if content.trim_start().starts_with('[') {
        debug!("Parsing bare frame list");
        let frames: Vec<Frame> = serde_json::from_str(&content)
            .map_err(|e| PawtrackError::InvalidTrackingData { source: e })?;
        Ok(TrackingFile::new(frames))
    } else {
        debug!("Parsing wrapped tracking file");
        serde_json::from_str(&content).map_err(|e| PawtrackError::InvalidTrackingData { source: e })
    }
}

/// Python's json module writes `NaN`, `Infinity` and `-Infinity` as bare
/// tokens, which are not JSON. Rewrites them to `null` outside of strings.
pub(crate) fn sanitize_non_finite(content: &str) -> Cow<'_, str> {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    if !TOKENS.iter().any(|token| content.contains(token)) {
        return Cow::Borrowed(content);
    }

    let mut output = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = content;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|token| rest.starts_with(*token)) {
            output.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        output.push(c);
        rest = &rest[c.len_utf8()..];
    }

    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::BodypartSetting;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sanitize_leaves_strings_alone() {
        let input = r#"{"note": "NaN inside \" a string", "v": [NaN, -Infinity, Infinity]}"#;
        let sanitized = sanitize_non_finite(input);
        assert_eq!(
            sanitized,
            r#"{"note": "NaN inside \" a string", "v": [null, null, null]}"#
        );
    }

    #[test]
    fn test_sanitize_borrows_clean_input() {
        assert!(matches!(sanitize_non_finite("[1, 2]"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parse_bare_model_output() {
        let tracking = parse_tracking_json(
            r#"[
                {"bboxes": [[0, 0, 10, 10]], "bbox_scores": [0.9], "bodyparts": [[[1.0, 2.0, 0.8], [NaN, NaN, 0.1]]]},
                {"bboxes": [[0, 0, 10, 10]], "bbox_scores": [0.9], "bodyparts": [[[1.5, 2.5, 0.7], [3.0, 4.0, -1]]]}
            ]"#,
        )
        .unwrap();

        assert_eq!(tracking.num_frames(), 2);
        assert!(tracking.keypoint(0, 0, 1).unwrap().is_missing());
        assert!(tracking.keypoint(1, 0, 1).unwrap().is_lost_frame());
        assert_eq!(tracking.summary().num_animals, 1);
        assert_eq!(tracking.summary().num_bodyparts, 2);
    }

    #[test]
    fn test_parse_wrapped_export() {
        let tracking = parse_tracking_json(
            r#"{"data": [{"bodyparts": [[[1.0, 2.0, 0.8]]]}],
                "metadata": {"fps": 25, "bodypart_names": {"0": {"name": "nose", "include": true}}}}"#,
        )
        .unwrap();

        assert_eq!(tracking.fps(), 25.);
        assert_eq!(
            tracking.metadata.bodypart_names.get(&0),
            Some(&BodypartSetting {
                name: "nose".to_string(),
                include: true
            })
        );
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let result = parse_tracking_json("{not json");
        assert!(matches!(
            result,
            Err(PawtrackError::InvalidTrackingData { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_tracking_json(Path::new("/definitely/not/here.json"));
        assert!(matches!(
            result,
            Err(PawtrackError::TrackingFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"[{{"bodyparts": [[[1, 2, 0.9]]]}}]"#).unwrap();
        file.flush().unwrap();

        let tracking = load_tracking_json(file.path()).unwrap();
        assert_eq!(tracking.num_frames(), 1);
    }
}
