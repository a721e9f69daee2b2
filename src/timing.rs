use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::bail;
use serde::Serialize;

use crate::config::PlaybackConfig;

/// 再生速度プリセット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackRate {
    Normal,
    Slow,
}

impl PlaybackRate {
    /// リファレンスを進める速度 (frames/sec)
    pub fn fps(self, config: &PlaybackConfig) -> f64 {
        match self {
            PlaybackRate::Normal => config.normal_fps,
            PlaybackRate::Slow => config.slow_fps,
        }
    }
}

impl FromStr for PlaybackRate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(PlaybackRate::Normal),
            "slow" => Ok(PlaybackRate::Slow),
            other => bail!("unknown playback mode {other:?} (expected normal or slow)"),
        }
    }
}

impl fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackRate::Normal => f.write_str("normal"),
            PlaybackRate::Slow => f.write_str("slow"),
        }
    }
}

/// Where the session currently is in the reference track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPosition {
    Frame(usize),
    /// index >= track length; terminal for the session
    Exhausted(usize),
}

impl TrackPosition {
    pub fn index(self) -> usize {
        match self {
            TrackPosition::Frame(i) | TrackPosition::Exhausted(i) => i,
        }
    }
}

/// 経過時間 → リファレンスフレーム番号
///
/// The live capture rate is independent of `fps`; the index only depends on
/// wall-clock time since the session started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalIndexer {
    fps: f64,
}

impl TemporalIndexer {
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }

    pub fn from_rate(rate: PlaybackRate, config: &PlaybackConfig) -> Self {
        Self::new(rate.fps(config))
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// floor(elapsed * fps)
    pub fn index_for(&self, elapsed: Duration) -> usize {
        (elapsed.as_secs_f64() * self.fps).floor() as usize
    }

    pub fn position(&self, elapsed: Duration, track_len: usize) -> TrackPosition {
        let index = self.index_for(elapsed);
        if index >= track_len {
            TrackPosition::Exhausted(index)
        } else {
            TrackPosition::Frame(index)
        }
    }
}
