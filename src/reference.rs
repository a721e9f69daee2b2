//! Reference ("ground truth") track loading.
//!
//! On-disk format is a JSON array with one object per recorded frame,
//! mapping the stringified landmark id to `[x, y, z]`:
//!
//! ```json
//! [{"0": [0.51, 0.22, -0.3], "1": [0.52, 0.20, -0.28], ...}, ...]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::pose::{Keypoint, KeypointSet, LandmarkId};

/// Structural problems found while loading a keypoint track.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed keypoint JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("track contains no frames")]
    Empty,

    #[error("frame {frame}: no landmarks")]
    EmptyFrame { frame: usize },

    #[error("frame {frame}: invalid landmark id {key:?}")]
    InvalidLandmark { frame: usize, key: String },

    #[error("frame {frame}, landmark {landmark}: expected at least 2 coordinates, got {len}")]
    ShortCoordinates {
        frame: usize,
        landmark: LandmarkId,
        len: usize,
    },

    #[error("frame {frame}, landmark {landmark}: non-finite coordinate")]
    NonFinite { frame: usize, landmark: LandmarkId },
}

/// One recorded frame as it appears in the JSON file.
pub(crate) type RawFrame = BTreeMap<String, Vec<f32>>;

/// Validate one raw frame and convert it to a [`KeypointSet`].
pub(crate) fn parse_frame(frame: usize, raw: &RawFrame) -> Result<KeypointSet, ReferenceError> {
    if raw.is_empty() {
        return Err(ReferenceError::EmptyFrame { frame });
    }

    let mut set = KeypointSet::new();
    for (key, coords) in raw {
        let landmark = key
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(LandmarkId::new)
            .ok_or_else(|| ReferenceError::InvalidLandmark {
                frame,
                key: key.clone(),
            })?;

        if coords.len() < 2 {
            return Err(ReferenceError::ShortCoordinates {
                frame,
                landmark,
                len: coords.len(),
            });
        }
        // z is optional on disk
        let z = coords.get(2).copied().unwrap_or(0.0);
        let keypoint = Keypoint::new(coords[0], coords[1], z);
        if !keypoint.is_finite() {
            return Err(ReferenceError::NonFinite { frame, landmark });
        }
        set.insert(landmark, keypoint);
    }
    Ok(set)
}

/// お手本ダンスのキーポイント列。読み込み後は不変
#[derive(Debug, Clone)]
pub struct ReferenceTrack {
    frames: Vec<KeypointSet>,
}

impl ReferenceTrack {
    /// Build a track from already-validated frames.
    pub fn from_frames(frames: Vec<KeypointSet>) -> Result<Self, ReferenceError> {
        if frames.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if let Some(frame) = frames.iter().position(|f| f.is_empty()) {
            return Err(ReferenceError::EmptyFrame { frame });
        }
        Ok(Self { frames })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ReferenceError> {
        let raw: Vec<RawFrame> = serde_json::from_str(json)?;
        let frames = raw
            .iter()
            .enumerate()
            .map(|(i, f)| parse_frame(i, f))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_frames(frames)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let track = Self::from_json_str(&content)?;
        info!("loaded reference track {} ({} frames)", path.display(), track.len());
        Ok(track)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false for a successfully constructed track.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&KeypointSet> {
        self.frames.get(index)
    }

    /// 録画FPSでの再生時間 (秒)
    pub fn duration_secs(&self, fps: f64) -> f64 {
        self.frames.len() as f64 / fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    #[test]
    fn test_parse_two_frames() {
        let json = r#"[
            {"0": [0.1, 0.2, 0.3], "12": [0.5, 0.5, 0.0]},
            {"0": [0.2, 0.3, 0.4]}
        ]"#;
        let track = ReferenceTrack::from_json_str(json).unwrap();
        assert_eq!(track.len(), 2);
        let first = track.frame(0).unwrap();
        assert_eq!(first.len(), 2);
        let shoulder = first.get(Landmark::RightShoulder.id()).unwrap();
        assert_eq!(shoulder.x, 0.5);
        assert!(track.frame(2).is_none());
    }

    #[test]
    fn test_z_is_optional() {
        let track = ReferenceTrack::from_json_str(r#"[{"3": [0.1, 0.2]}]"#).unwrap();
        let kp = track.frame(0).unwrap().get(LandmarkId::new(3).unwrap()).unwrap();
        assert_eq!(kp.z, 0.0);
    }

    #[test]
    fn test_empty_track_rejected() {
        assert!(matches!(
            ReferenceTrack::from_json_str("[]"),
            Err(ReferenceError::Empty)
        ));
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(matches!(
            ReferenceTrack::from_json_str(r#"[{"0": [0.1, 0.1, 0.0]}, {}]"#),
            Err(ReferenceError::EmptyFrame { frame: 1 })
        ));
    }

    #[test]
    fn test_out_of_range_landmark_rejected() {
        let err = ReferenceTrack::from_json_str(r#"[{"33": [0.1, 0.1, 0.0]}]"#).unwrap_err();
        assert!(matches!(err, ReferenceError::InvalidLandmark { frame: 0, .. }));
    }

    #[test]
    fn test_non_numeric_landmark_rejected() {
        let err = ReferenceTrack::from_json_str(r#"[{"wrist": [0.1, 0.1, 0.0]}]"#).unwrap_err();
        assert!(matches!(err, ReferenceError::InvalidLandmark { .. }));
    }

    #[test]
    fn test_short_coordinates_rejected() {
        let err = ReferenceTrack::from_json_str(r#"[{"0": [0.1]}]"#).unwrap_err();
        assert!(matches!(err, ReferenceError::ShortCoordinates { len: 1, .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = ReferenceTrack::from_json_str(r#"[{"0": "oops"}]"#).unwrap_err();
        assert!(matches!(err, ReferenceError::Json(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReferenceTrack::load("no/such/track.json").unwrap_err();
        assert!(matches!(err, ReferenceError::Io { .. }));
    }

    #[test]
    fn test_duration() {
        let json = format!("[{}]", vec![r#"{"0": [0.0, 0.0, 0.0]}"#; 60].join(","));
        let track = ReferenceTrack::from_json_str(&json).unwrap();
        assert!((track.duration_secs(30.0) - 2.0).abs() < 1e-9);
    }
}
