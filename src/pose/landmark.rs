use std::fmt;

/// MediaPipe Pose の 33 ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Landmark {
    pub const COUNT: usize = 33;

    pub fn id(self) -> LandmarkId {
        LandmarkId(self as u8)
    }
}

/// ランドマーク識別子 (0..33)
///
/// Keypoint sets are keyed by id rather than by [`Landmark`] so that tracks
/// recorded with any subset of the topology can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LandmarkId(u8);

impl LandmarkId {
    /// 範囲外なら None
    pub fn new(id: u32) -> Option<Self> {
        if (id as usize) < Landmark::COUNT {
            Some(Self(id as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 肩-肘-手首 / 腰-膝-足首 の 3 点グループ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LimbGroup {
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
}

impl LimbGroup {
    pub const ALL: [LimbGroup; 4] = [
        LimbGroup::RightArm,
        LimbGroup::LeftArm,
        LimbGroup::RightLeg,
        LimbGroup::LeftLeg,
    ];

    pub fn landmarks(self) -> [Landmark; 3] {
        match self {
            LimbGroup::RightArm => [Landmark::RightShoulder, Landmark::RightElbow, Landmark::RightWrist],
            LimbGroup::LeftArm => [Landmark::LeftShoulder, Landmark::LeftElbow, Landmark::LeftWrist],
            LimbGroup::RightLeg => [Landmark::RightHip, Landmark::RightKnee, Landmark::RightAnkle],
            LimbGroup::LeftLeg => [Landmark::LeftHip, Landmark::LeftKnee, Landmark::LeftAnkle],
        }
    }

    pub fn contains(self, id: LandmarkId) -> bool {
        self.landmarks().iter().any(|l| l.id() == id)
    }

    /// 表示名 ("right arm" など)
    pub fn name(self) -> &'static str {
        match self {
            LimbGroup::RightArm => "right arm",
            LimbGroup::LeftArm => "left arm",
            LimbGroup::RightLeg => "right leg",
            LimbGroup::LeftLeg => "left leg",
        }
    }
}

impl fmt::Display for LimbGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
