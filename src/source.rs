use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::pose::KeypointSet;
use crate::reference::{parse_frame, RawFrame};

/// Per-frame landmark provider (camera + pose model, or a recording).
pub trait KeypointSource {
    /// Blocks until the next frame. `None` means no person was detected.
    fn next_keypoints(&mut self) -> Option<KeypointSet>;

    /// No more frames will ever be produced.
    fn is_finished(&self) -> bool {
        false
    }
}

/// 録画済みキーポイントをキャプチャFPSで再生するソース
///
/// JSON layout matches the reference track, except that a frame may be
/// `null` or `{}` for "no detection".
pub struct RecordedSource {
    frames: Vec<Option<KeypointSet>>,
    cursor: usize,
    looping: bool,
    mirror_x: bool,
    interval: Option<Duration>,
    last_emit: Option<Instant>,
}

impl RecordedSource {
    pub fn new(frames: Vec<Option<KeypointSet>>) -> Self {
        Self {
            frames,
            cursor: 0,
            looping: false,
            mirror_x: false,
            interval: None,
            last_emit: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<Option<RawFrame>> = serde_json::from_str(json).context("malformed keypoint recording")?;
        let frames = raw
            .iter()
            .enumerate()
            .map(|(i, frame)| match frame {
                Some(f) if !f.is_empty() => parse_frame(i, f).map(Some),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(frames))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let source = Self::from_json_str(&content)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!("loaded live recording {} ({} frames)", path.display(), source.frames.len());
        Ok(source)
    }

    /// 末尾で先頭に戻る
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// 左右反転
    pub fn mirror_x(mut self, mirror: bool) -> Self {
        self.mirror_x = mirror;
        self
    }

    /// Emit at most one frame per `1 / fps` seconds.
    pub fn paced(mut self, fps: f64) -> Self {
        self.interval = (fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn wait_for_slot(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl KeypointSource for RecordedSource {
    fn next_keypoints(&mut self) -> Option<KeypointSet> {
        if self.is_finished() {
            return None;
        }
        if self.cursor >= self.frames.len() {
            self.cursor = 0;
        }
        self.wait_for_slot();

        let frame = self.frames[self.cursor].clone();
        self.cursor += 1;
        if self.mirror_x {
            frame.map(|f| f.mirrored())
        } else {
            frame
        }
    }

    fn is_finished(&self) -> bool {
        self.frames.is_empty() || (!self.looping && self.cursor >= self.frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::LandmarkId;

    const RECORDING: &str = r#"[
        {"0": [0.25, 0.5, 0.0]},
        null,
        {},
        {"0": [0.75, 0.5, 0.0]}
    ]"#;

    #[test]
    fn test_plays_frames_in_order() {
        let mut src = RecordedSource::from_json_str(RECORDING).unwrap();
        assert_eq!(src.len(), 4);
        let nose = LandmarkId::new(0).unwrap();

        let first = src.next_keypoints().unwrap();
        assert_eq!(first.get(nose).unwrap().x, 0.25);
        assert!(src.next_keypoints().is_none());
        assert!(src.next_keypoints().is_none());
        assert_eq!(src.next_keypoints().unwrap().get(nose).unwrap().x, 0.75);
        assert!(src.is_finished());
        assert!(src.next_keypoints().is_none());
    }

    #[test]
    fn test_looping_never_finishes() {
        let mut src = RecordedSource::from_json_str(RECORDING).unwrap().looping(true);
        for _ in 0..10 {
            src.next_keypoints();
        }
        assert!(!src.is_finished());
    }

    #[test]
    fn test_mirror_x() {
        let mut src = RecordedSource::from_json_str(RECORDING).unwrap().mirror_x(true);
        let nose = LandmarkId::new(0).unwrap();
        assert_eq!(src.next_keypoints().unwrap().get(nose).unwrap().x, 0.75);
    }

    #[test]
    fn test_pacing_spaces_frames() {
        let mut src = RecordedSource::from_json_str(RECORDING).unwrap().paced(100.0);
        let t0 = Instant::now();
        for _ in 0..4 {
            src.next_keypoints();
        }
        assert!(t0.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_bad_landmark_fails_load() {
        assert!(RecordedSource::from_json_str(r#"[{"99": [0.0, 0.0, 0.0]}]"#).is_err());
    }

    #[test]
    fn test_empty_recording_is_finished() {
        let src = RecordedSource::new(Vec::new());
        assert!(src.is_finished());
    }
}
