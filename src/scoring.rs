//! Live vs. reference pose similarity.
//!
//! `match_percent` is a linear display mapping of the mean normalized
//! distance (`100 - d * 100`, floored at 0), not a calibrated metric.

use crate::config::{MissingLandmarkPolicy, ScoringConfig};
use crate::pose::{KeypointSet, LandmarkId, LimbGroup};

/// 1フレーム分の比較結果
#[derive(Debug, Clone, PartialEq)]
pub struct PoseScore {
    /// 比較したランドマーク距離の平均
    pub average_distance: f32,
    /// 0〜100
    pub match_percent: f32,
    /// ずれている肢 (LimbGroup::ALL の順)
    pub flagged: Vec<LimbGroup>,
    /// 距離を計算できたランドマーク数 (Penalize 時は欠損分を含む)
    pub compared: usize,
}

impl PoseScore {
    /// Nothing could be compared, e.g. the live set shares no landmark with
    /// the reference under the exclude policy.
    pub fn is_empty(&self) -> bool {
        self.compared == 0
    }

    pub fn is_flagged(&self, group: LimbGroup) -> bool {
        self.flagged.contains(&group)
    }
}

/// True if any distance is strictly over `threshold`.
pub fn limb_is_off<I>(distances: I, threshold: f32) -> bool
where
    I: IntoIterator<Item = f32>,
{
    distances.into_iter().any(|d| d > threshold)
}

pub fn match_percent(average_distance: f32) -> f32 {
    (100.0 - average_distance * 100.0).max(0.0)
}

/// Per-landmark xy distances for every landmark in `reference`.
///
/// Missing live landmarks are dropped or replaced by `missing_penalty`
/// depending on the configured policy.
pub fn landmark_distances(
    live: &KeypointSet,
    reference: &KeypointSet,
    config: &ScoringConfig,
) -> Vec<(LandmarkId, f32)> {
    reference
        .iter()
        .filter_map(|(id, target)| match live.get(id) {
            Some(actual) => Some((id, actual.distance_xy(target))),
            None => match config.missing_landmark {
                MissingLandmarkPolicy::Exclude => None,
                MissingLandmarkPolicy::Penalize => Some((id, config.missing_penalty)),
            },
        })
        .collect()
}

pub fn score(live: &KeypointSet, reference: &KeypointSet, config: &ScoringConfig) -> PoseScore {
    let distances = landmark_distances(live, reference, config);

    if distances.is_empty() {
        return PoseScore {
            average_distance: 0.0,
            match_percent: 0.0,
            flagged: Vec::new(),
            compared: 0,
        };
    }

    let average_distance = distances.iter().map(|(_, d)| d).sum::<f32>() / distances.len() as f32;

    let flagged = LimbGroup::ALL
        .into_iter()
        .filter(|group| {
            let in_group = distances
                .iter()
                .filter(|(id, _)| group.contains(*id))
                .map(|(_, d)| *d);
            limb_is_off(in_group, config.limb_off_distance_threshold)
        })
        .collect();

    PoseScore {
        average_distance,
        match_percent: match_percent(average_distance),
        flagged,
        compared: distances.len(),
    }
}
