use std::collections::BTreeMap;

use super::landmark::LandmarkId;

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f32,
    /// 奥行き (比較には使わない)
    pub z: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// XY平面上のユークリッド距離 (zは無視)
    pub fn distance_xy(&self, other: &Keypoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// 左右反転 (鏡像表示のカメラ向け)
    pub fn mirrored(&self) -> Self {
        Self::new(1.0 - self.x, self.y, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

/// 1フレーム分のキーポイント。空 = 検出なし、部分的でもよい
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointSet {
    points: BTreeMap<LandmarkId, Keypoint>,
}

impl KeypointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: LandmarkId, keypoint: Keypoint) -> Option<Keypoint> {
        self.points.insert(id, keypoint)
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Keypoint> {
        self.points.get(&id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// id 昇順
    pub fn iter(&self) -> impl Iterator<Item = (LandmarkId, &Keypoint)> {
        self.points.iter().map(|(id, kp)| (*id, kp))
    }

    pub fn mirrored(&self) -> Self {
        self.iter().map(|(id, kp)| (id, kp.mirrored())).collect()
    }
}

impl FromIterator<(LandmarkId, Keypoint)> for KeypointSet {
    fn from_iter<I: IntoIterator<Item = (LandmarkId, Keypoint)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
