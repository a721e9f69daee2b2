use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use crate::session::Session;
use crate::source::KeypointSource;

/// フレームループの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub detections: u64,
    pub scored: u64,
}

/// Pull frames until `running` is cleared or the source runs dry.
///
/// Frames with no detection are still fed to the session so the status
/// reflects lost tracking; they never end the loop.
pub fn run_frame_loop<S: KeypointSource>(session: &Session, source: &mut S, running: &AtomicBool) -> LoopStats {
    let mut stats = LoopStats::default();
    while running.load(Ordering::Relaxed) && !source.is_finished() {
        let keypoints = source.next_keypoints();
        stats.frames += 1;
        if keypoints.as_ref().is_some_and(|k| !k.is_empty()) {
            stats.detections += 1;
        } else {
            debug!("frame {}: no detection", stats.frames);
        }
        if session.process_frame(keypoints.as_ref(), Instant::now()).is_some() {
            stats.scored += 1;
        }
    }
    stats
}

/// 別スレッドで回るフレームループ
pub struct Producer {
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<LoopStats>,
}

impl Producer {
    pub fn spawn<S>(session: Session, mut source: S) -> Self
    where
        S: KeypointSource + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = Arc::clone(&running);
        let handle = thread::spawn(move || {
            info!("frame loop started");
            let stats = run_frame_loop(&session, &mut source, &running_ref);
            info!(
                "frame loop ended: {} frames, {} detections, {} scored",
                stats.frames, stats.detections, stats.scored
            );
            stats
        });
        Self { running, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the loop to exit after the current frame and wait for it.
    pub fn shutdown(self) -> Result<LoopStats> {
        self.running.store(false, Ordering::Relaxed);
        self.join()
    }

    pub fn join(self) -> Result<LoopStats> {
        self.handle.join().map_err(|_| anyhow!("frame loop panicked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlaybackConfig, ScoringConfig};
    use crate::pose::{Keypoint, KeypointSet, LandmarkId};
    use crate::reference::ReferenceTrack;
    use crate::source::RecordedSource;
    use crate::timing::PlaybackRate;

    fn nose_at(x: f32) -> KeypointSet {
        [(LandmarkId::new(0).unwrap(), Keypoint::new(x, 0.5, 0.0))]
            .into_iter()
            .collect()
    }

    fn session() -> Session {
        let track = ReferenceTrack::from_frames(vec![nose_at(0.5); 300]).unwrap();
        Session::new(Arc::new(track), ScoringConfig::default(), PlaybackConfig::default())
    }

    #[test]
    fn test_loop_skips_empty_frames() {
        let session = session();
        session.start(PlaybackRate::Normal);
        let mut source = RecordedSource::new(vec![Some(nose_at(0.5)), None, Some(KeypointSet::new()), Some(nose_at(0.5))]);
        let running = AtomicBool::new(true);
        let stats = run_frame_loop(&session, &mut source, &running);
        assert_eq!(stats, LoopStats { frames: 4, detections: 2, scored: 4 });
        assert!(session.feedback().is_perfect());
    }

    #[test]
    fn test_loop_keeps_running_while_idle() {
        let session = session();
        let mut source = RecordedSource::new(vec![Some(nose_at(0.5)); 5]);
        let running = AtomicBool::new(true);
        let stats = run_frame_loop(&session, &mut source, &running);
        assert_eq!(stats.frames, 5);
        assert_eq!(stats.scored, 0);
        assert_eq!(session.latest_feedback(), "Waiting to start...");
    }

    #[test]
    fn test_cleared_flag_stops_loop() {
        let session = session();
        let mut source = RecordedSource::new(vec![None]).looping(true);
        let running = AtomicBool::new(false);
        assert_eq!(run_frame_loop(&session, &mut source, &running).frames, 0);
    }

    #[test]
    fn test_producer_shutdown() {
        let session = session();
        session.start(PlaybackRate::Slow);
        let source = RecordedSource::new(vec![Some(nose_at(0.5))]).looping(true).paced(200.0);
        let producer = Producer::spawn(session.clone(), source);
        thread::sleep(std::time::Duration::from_millis(50));
        let stats = producer.shutdown().unwrap();
        assert!(stats.frames > 0);
        assert!(session.feedback().is_perfect());
    }
}
