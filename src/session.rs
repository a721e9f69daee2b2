//! Session state shared between the frame loop and status queries.
//!
//! The whole state block lives behind one mutex. [`Session`] is a cheap
//! cloneable handle; the producer calls [`Session::process_frame`] and any
//! number of readers call [`Session::latest_feedback`] or
//! [`Session::snapshot`], which return owned copies.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{PlaybackConfig, ScoringConfig};
use crate::feedback::{classify, Feedback, Observation};
use crate::pose::{KeypointSet, LimbGroup};
use crate::reference::ReferenceTrack;
use crate::scoring::{score, PoseScore};
use crate::timing::{PlaybackRate, TemporalIndexer, TrackPosition};

/// フィードバック変化の記録
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEntry {
    pub elapsed_secs: f64,
    pub reference_index: usize,
    pub feedback: String,
}

#[derive(Debug, Clone, Default)]
struct RunStats {
    frames_scored: u32,
    frames_perfect: u32,
    match_percent_sum: f64,
    limb_flags: [u32; 4],
}

impl RunStats {
    fn record(&mut self, score: &PoseScore, feedback: &Feedback) {
        self.frames_scored += 1;
        self.match_percent_sum += score.match_percent as f64;
        if feedback.is_perfect() {
            self.frames_perfect += 1;
        }
        for (i, group) in LimbGroup::ALL.iter().enumerate() {
            if score.is_flagged(*group) {
                self.limb_flags[i] += 1;
            }
        }
    }
}

#[derive(Debug)]
struct SessionState {
    active: bool,
    start: Option<Instant>,
    rate: PlaybackRate,
    indexer: TemporalIndexer,
    reference_index: usize,
    feedback: Feedback,
    completed: bool,
    tracked: bool,
    log: Vec<FeedbackEntry>,
    stats: RunStats,
}

impl SessionState {
    fn idle(playback: &PlaybackConfig) -> Self {
        Self {
            active: false,
            start: None,
            rate: PlaybackRate::Normal,
            indexer: TemporalIndexer::from_rate(PlaybackRate::Normal, playback),
            reference_index: 0,
            feedback: Feedback::Waiting,
            completed: false,
            tracked: false,
            log: Vec::new(),
            stats: RunStats::default(),
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.start
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default()
    }
}

/// Owned copy of the session state for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub rate: PlaybackRate,
    pub reference_index: usize,
    pub track_len: usize,
    pub elapsed_secs: f64,
    pub completed: bool,
    pub feedback: String,
}

/// 1回の再生のまとめ
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub rate: PlaybackRate,
    pub playback_fps: f64,
    pub track_len: usize,
    pub completed: bool,
    pub frames_scored: u32,
    pub frames_perfect: u32,
    pub mean_match_percent: Option<f64>,
    pub limb_flags: BTreeMap<String, u32>,
    pub final_feedback: String,
    pub log: Vec<FeedbackEntry>,
}

impl SessionReport {
    /// `<dir>/session_<YYYYmmdd_HHMMSS>.json` に保存
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("session_{}.json", ts));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("session report saved: {}", path.display());
        Ok(path)
    }
}

#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    reference: Arc<ReferenceTrack>,
    scoring: ScoringConfig,
    playback: PlaybackConfig,
}

impl Session {
    pub fn new(reference: Arc<ReferenceTrack>, scoring: ScoringConfig, playback: PlaybackConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::idle(&playback))),
            reference,
            scoring,
            playback,
        }
    }

    // Plain data behind the lock; a panicked writer cannot leave it unusable.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn start(&self, rate: PlaybackRate) {
        self.start_at(rate, Instant::now());
    }

    /// Start (or restart) a run as of `now`.
    pub fn start_at(&self, rate: PlaybackRate, now: Instant) {
        let mut state = self.lock();
        *state = SessionState {
            active: true,
            start: Some(now),
            rate,
            indexer: TemporalIndexer::from_rate(rate, &self.playback),
            ..SessionState::idle(&self.playback)
        };
        info!(
            "session started: {} ({} fps, {} reference frames)",
            rate,
            state.indexer.fps(),
            self.reference.len()
        );
    }

    /// 停止。最後のフィードバックは残す
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.active {
            state.active = false;
            info!("session stopped at reference frame {}", state.reference_index);
        }
    }

    pub fn reset(&self) {
        *self.lock() = SessionState::idle(&self.playback);
        info!("session reset");
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn latest_feedback(&self) -> String {
        self.lock().feedback.to_string()
    }

    pub fn feedback(&self) -> Feedback {
        self.lock().feedback.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// `reference_index` is floor((now - start) * fps) while running, capped
    /// at the track length and never below the last processed frame.
    pub fn snapshot_at(&self, now: Instant) -> SessionSnapshot {
        let state = self.lock();
        let track_len = self.reference.len();
        let reference_index = if state.active {
            let current = state.indexer.index_for(state.elapsed(now)).min(track_len);
            state.reference_index.max(current)
        } else {
            state.reference_index
        };
        SessionSnapshot {
            active: state.active,
            rate: state.rate,
            reference_index,
            track_len,
            elapsed_secs: if state.active { state.elapsed(now).as_secs_f64() } else { 0.0 },
            completed: state.completed,
            feedback: state.feedback.to_string(),
        }
    }

    /// Run the index → score → classify pipeline for one live frame.
    ///
    /// Returns `None` without touching the state while the session is idle.
    pub fn process_frame(&self, live: Option<&KeypointSet>, now: Instant) -> Option<Feedback> {
        let mut state = self.lock();
        if !state.active {
            return None;
        }

        let elapsed = state.elapsed(now);
        let track_len = self.reference.len();
        let position = state.indexer.position(elapsed, track_len);
        // never move backwards, even if the caller's clock does
        state.reference_index = state.reference_index.max(position.index().min(track_len));

        let frame = match position {
            TrackPosition::Frame(_) => self.reference.frame(state.reference_index),
            TrackPosition::Exhausted(_) => None,
        };

        let pose_score = match (live, frame) {
            (Some(live), Some(reference)) if !live.is_empty() => Some(score(live, reference, &self.scoring)),
            _ => None,
        };

        let feedback = classify(
            &Observation {
                exhausted: frame.is_none(),
                score: pose_score.as_ref(),
                tracked_before: state.tracked,
            },
            &self.scoring,
        );

        if feedback.is_complete() && !state.completed {
            state.completed = true;
            info!("reference track complete after {:.1}s", elapsed.as_secs_f64());
        }

        if let Some(s) = pose_score.as_ref().filter(|s| !s.is_empty()) {
            state.tracked = true;
            state.stats.record(s, &feedback);
            debug!(
                index = state.reference_index,
                distance = s.average_distance,
                match_percent = s.match_percent,
                "scored frame"
            );
        }

        // match_percent is a raw float; only a visible change is logged
        let text = feedback.to_string();
        if text != state.feedback.to_string() {
            let entry = FeedbackEntry {
                elapsed_secs: elapsed.as_secs_f64(),
                reference_index: state.reference_index,
                feedback: text,
            };
            state.log.push(entry);
        }
        state.feedback = feedback.clone();

        Some(feedback)
    }

    pub fn report(&self) -> SessionReport {
        let state = self.lock();
        let stats = &state.stats;
        SessionReport {
            rate: state.rate,
            playback_fps: state.indexer.fps(),
            track_len: self.reference.len(),
            completed: state.completed,
            frames_scored: stats.frames_scored,
            frames_perfect: stats.frames_perfect,
            mean_match_percent: (stats.frames_scored > 0)
                .then(|| stats.match_percent_sum / stats.frames_scored as f64),
            limb_flags: LimbGroup::ALL
                .iter()
                .zip(stats.limb_flags)
                .map(|(g, n)| (g.name().to_string(), n))
                .collect(),
            final_feedback: state.feedback.to_string(),
            log: state.log.clone(),
        }
    }
}
