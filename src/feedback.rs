use std::fmt;

use crate::config::ScoringConfig;
use crate::pose::LimbGroup;
use crate::scoring::PoseScore;

/// ユーザーに返すフィードバック
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    /// セッション未開始
    Waiting,
    /// 検出なし (このセッションでまだ一度も検出していない)
    NotDetected,
    /// 検出なし (途中で見失った)
    TrackingLost,
    /// リファレンスを最後まで再生した
    Complete,
    /// 3肢以上ずれている or 一致率が極端に低い
    OutOfFrame,
    Perfect { match_percent: f32 },
    NeedsImprovement { match_percent: f32, flagged: Vec<LimbGroup> },
    Correction { match_percent: f32, flagged: Vec<LimbGroup> },
}

impl Feedback {
    pub fn is_perfect(&self) -> bool {
        matches!(self, Feedback::Perfect { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Feedback::Complete)
    }
}

fn corrections(flagged: &[LimbGroup]) -> String {
    flagged
        .iter()
        .map(|g| format!("Move {g}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Waiting => f.write_str("Waiting to start..."),
            Feedback::NotDetected => f.write_str("Pose Not Detected"),
            Feedback::TrackingLost => f.write_str("Pose Not Detected - step back into view"),
            Feedback::Complete => f.write_str("No More Frames! Session complete."),
            Feedback::OutOfFrame => f.write_str("Make sure your whole body is in frame"),
            Feedback::Perfect { match_percent } => write!(f, "Perfect! Match: {match_percent:.1}%"),
            Feedback::NeedsImprovement { match_percent, flagged } if flagged.is_empty() => {
                write!(f, "Needs improvement! Match: {match_percent:.1}%")
            }
            Feedback::NeedsImprovement { match_percent, flagged } => {
                write!(f, "Needs improvement! {} | Match: {match_percent:.1}%", corrections(flagged))
            }
            Feedback::Correction { match_percent, flagged } if flagged.is_empty() => {
                write!(f, "Almost there! Match: {match_percent:.1}%")
            }
            Feedback::Correction { match_percent, flagged } => {
                write!(f, "{} | Match: {match_percent:.1}%", corrections(flagged))
            }
        }
    }
}

/// What the classifier knows about the current frame.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Reference index is at or past the end of the track.
    pub exhausted: bool,
    /// `None` when the source produced no detection.
    pub score: Option<&'a PoseScore>,
    /// A pose has been scored earlier in this run.
    pub tracked_before: bool,
}

/// 優先順位付きの判定表。最初に当てはまったものを返す
///
/// Detection-quality outcomes are checked before any movement critique so a
/// poorly framed dancer is never told to move a limb.
pub fn classify(obs: &Observation<'_>, config: &ScoringConfig) -> Feedback {
    if obs.exhausted {
        return Feedback::Complete;
    }

    let score = match obs.score {
        Some(s) if !s.is_empty() => s,
        _ if obs.tracked_before => return Feedback::TrackingLost,
        _ => return Feedback::NotDetected,
    };

    let m = score.match_percent;
    if score.flagged.len() >= 3 || m < config.low_confidence_match_percent {
        return Feedback::OutOfFrame;
    }

    if score.flagged.is_empty() && score.average_distance < config.perfect_distance_threshold {
        return Feedback::Perfect { match_percent: m };
    }

    if m < config.needs_improvement_match_percent {
        return Feedback::NeedsImprovement {
            match_percent: m,
            flagged: score.flagged.clone(),
        };
    }

    Feedback::Correction {
        match_percent: m,
        flagged: score.flagged.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(average_distance: f32, flagged: Vec<LimbGroup>) -> PoseScore {
        PoseScore {
            average_distance,
            match_percent: crate::scoring::match_percent(average_distance),
            flagged,
            compared: 12,
        }
    }

    fn run(s: Option<&PoseScore>) -> Feedback {
        classify(
            &Observation {
                exhausted: false,
                score: s,
                tracked_before: false,
            },
            &ScoringConfig::default(),
        )
    }

    #[test]
    fn test_exhausted_wins_over_everything() {
        let perfect = score(0.0, vec![]);
        for s in [None, Some(&perfect)] {
            let fb = classify(
                &Observation {
                    exhausted: true,
                    score: s,
                    tracked_before: true,
                },
                &ScoringConfig::default(),
            );
            assert_eq!(fb, Feedback::Complete);
        }
    }

    #[test]
    fn test_no_detection() {
        assert_eq!(run(None), Feedback::NotDetected);
        let empty = PoseScore {
            average_distance: 0.0,
            match_percent: 0.0,
            flagged: vec![],
            compared: 0,
        };
        assert_eq!(run(Some(&empty)), Feedback::NotDetected);
    }

    #[test]
    fn test_lost_tracking_mid_session() {
        let fb = classify(
            &Observation {
                exhausted: false,
                score: None,
                tracked_before: true,
            },
            &ScoringConfig::default(),
        );
        assert_eq!(fb, Feedback::TrackingLost);
        assert!(fb.to_string().contains("Pose Not Detected"));
    }

    #[test]
    fn test_three_flags_is_framing_issue_even_when_close() {
        let s = score(
            0.1,
            vec![LimbGroup::RightArm, LimbGroup::LeftArm, LimbGroup::RightLeg],
        );
        assert_eq!(run(Some(&s)), Feedback::OutOfFrame);
    }

    #[test]
    fn test_low_match_is_framing_issue() {
        let s = score(0.85, vec![]);
        assert_eq!(run(Some(&s)), Feedback::OutOfFrame);
    }

    #[test]
    fn test_perfect_message() {
        let s = score(0.0, vec![]);
        let fb = run(Some(&s));
        assert!(fb.is_perfect());
        assert_eq!(fb.to_string(), "Perfect! Match: 100.0%");
    }

    #[test]
    fn test_perfect_threshold_is_strict() {
        let s = score(0.35, vec![]);
        assert!(!run(Some(&s)).is_perfect());
    }

    #[test]
    fn test_flag_blocks_perfect() {
        let s = score(0.2, vec![LimbGroup::LeftLeg]);
        let fb = run(Some(&s));
        assert!(matches!(&fb, Feedback::Correction { flagged, .. } if flagged == &[LimbGroup::LeftLeg]));
        assert_eq!(fb.to_string(), "Move left leg | Match: 80.0%");
    }

    #[test]
    fn test_needs_improvement_band() {
        let s = score(0.6, vec![]);
        let fb = run(Some(&s));
        assert!(matches!(fb, Feedback::NeedsImprovement { .. }));
        assert_eq!(fb.to_string(), "Needs improvement! Match: 40.0%");
    }

    #[test]
    fn test_needs_improvement_lists_flagged_limbs() {
        let s = score(2.0 / 3.0, vec![LimbGroup::RightArm]);
        let fb = run(Some(&s));
        assert!(matches!(fb, Feedback::NeedsImprovement { .. }));
        assert_eq!(fb.to_string(), "Needs improvement! Move right arm | Match: 33.3%");
    }

    #[test]
    fn test_correction_joins_limbs() {
        let s = score(0.4, vec![LimbGroup::RightArm, LimbGroup::LeftLeg]);
        assert_eq!(
            run(Some(&s)).to_string(),
            "Move right arm, Move left leg | Match: 60.0%"
        );
    }

    #[test]
    fn test_unflagged_but_not_perfect() {
        let s = score(0.45, vec![]);
        assert_eq!(run(Some(&s)).to_string(), "Almost there! Match: 55.0%");
    }
}
