// Face domain — detector seam, observation normalization, landmark schema.

pub mod analyzer;
pub mod detector;
pub mod types;

pub use analyzer::FaceAnalyzer;
pub use detector::{synthetic_detection, Detector, DetectorResult, LandmarkRegion, StaticDetector};
pub use types::{
    EulerAngles, FaceMesh, FaceObservation, HeadPose, KeyPoints, NormalizedRect, LANDMARK_COUNT,
};
