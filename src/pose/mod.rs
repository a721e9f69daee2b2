pub mod keypoint;
pub mod landmark;

pub use keypoint::{Keypoint, KeypointSet};
pub use landmark::{Landmark, LandmarkId, LimbGroup};
