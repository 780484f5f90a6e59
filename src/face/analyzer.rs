use nalgebra::{Point2, Vector3};
use tracing::debug;

use crate::error::Result;
use crate::face::detector::{Detector, DetectorResult, LandmarkRegion};
use crate::face::types::{
    schema, EulerAngles, FaceObservation, HeadPose, KeyPoints, NormalizedRect, LANDMARK_COUNT,
};
use crate::frame::Frame;
use crate::pose::transform::rotation_matrix;

/// Centroid used to pad regions the detector did not report.
const PAD_POINT: Point2<f32> = Point2::new(0.5, 0.5);

/// Derivation gains from the reference tracker: yaw from eye-center
/// asymmetry, pitch from the eye-line-to-nose-tip drop.
const YAW_GAIN: f32 = 2.0;
const PITCH_GAIN: f32 = 1.5;

/// Adapts a [`Detector`] to the pipeline's [`FaceObservation`].
///
/// All detector coordinates are bottom-left origin and are flipped here;
/// everything downstream sees top-left-origin UV space. The analyzer keeps
/// the last observation so rapid re-entry (UI queries between frames) does
/// not re-run the model.
pub struct FaceAnalyzer {
    detector: Box<dyn Detector>,
    last: FaceObservation,
}

impl FaceAnalyzer {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        Self {
            detector,
            last: FaceObservation::absent(),
        }
    }

    /// Run the detector on one frame and normalize its output.
    ///
    /// "No face" yields `Ok` with `present == false`; only a detector
    /// failure is an error (the caller drops the frame and continues).
    pub fn analyze(&mut self, frame: &Frame<'_>) -> Result<FaceObservation> {
        let Some(raw) = self.detector.detect(frame)? else {
            self.last = FaceObservation::absent();
            return Ok(self.last.clone());
        };

        let obs = normalize(&raw);
        debug!(
            confidence = obs.confidence,
            yaw = obs.pose.euler.yaw,
            "face observation"
        );
        self.last = obs.clone();
        Ok(obs)
    }

    /// The most recent observation, without touching the detector.
    pub fn last_observation(&self) -> &FaceObservation {
        &self.last
    }

    /// Forget the last observation. Idempotent.
    pub fn reset(&mut self) {
        self.last = FaceObservation::absent();
    }
}

/// Convert a raw detection into the normalized observation.
fn normalize(raw: &DetectorResult) -> FaceObservation {
    let (bx, by, bw, bh) = raw.bbox_bottom_left;
    let bbox = NormalizedRect::from_bottom_left(bx, by, bw, bh);

    let landmarks = build_landmarks(raw);
    let keypoints = extract_keypoints(&landmarks);
    let euler = raw
        .pose_angles
        .unwrap_or_else(|| derive_euler(&keypoints));

    let nose = keypoints.nose_tip;
    let pose = HeadPose {
        euler,
        // x, y in NDC (+Y up); z carries the face width as a scale proxy.
        translation: Vector3::new(nose.x * 2.0 - 1.0, 1.0 - nose.y * 2.0, bbox.width),
        model_matrix: rotation_matrix(euler),
    };

    FaceObservation {
        present: true,
        confidence: raw.confidence.clamp(0.0, 1.0),
        bbox,
        landmarks,
        keypoints,
        pose,
    }
}

/// Assemble the 68-point schema: flip each reported region to top-left
/// origin, resample it to its schema cardinality, and pad missing regions
/// with the centroid.
fn build_landmarks(raw: &DetectorResult) -> Vec<Point2<f32>> {
    let mut points = vec![PAD_POINT; LANDMARK_COUNT];
    for region in LandmarkRegion::ALL {
        let reported = raw
            .regions
            .iter()
            .find(|(r, pts)| *r == region && !pts.is_empty())
            .map(|(_, pts)| pts.as_slice());
        let Some(src) = reported else {
            continue;
        };

        let flipped: Vec<Point2<f32>> = src
            .iter()
            .map(|p| Point2::new(p.x.clamp(0.0, 1.0), (1.0 - p.y).clamp(0.0, 1.0)))
            .collect();
        let resampled = resample(&flipped, region.schema_len());
        let offset = region.schema_offset();
        points[offset..offset + resampled.len()].copy_from_slice(&resampled);
    }
    points
}

/// Resample a polyline to `target` points by piecewise-linear
/// interpolation along its parameter.
fn resample(points: &[Point2<f32>], target: usize) -> Vec<Point2<f32>> {
    debug_assert!(!points.is_empty());
    if points.len() == 1 {
        return vec![points[0]; target];
    }
    if points.len() == target {
        return points.to_vec();
    }
    (0..target)
        .map(|i| {
            let t = i as f32 / (target - 1) as f32 * (points.len() - 1) as f32;
            let lo = t.floor() as usize;
            let hi = (lo + 1).min(points.len() - 1);
            let frac = t - lo as f32;
            Point2::new(
                points[lo].x + (points[hi].x - points[lo].x) * frac,
                points[lo].y + (points[hi].y - points[lo].y) * frac,
            )
        })
        .collect()
}

/// Average of a schema range.
fn region_center(points: &[Point2<f32>], range: std::ops::RangeInclusive<usize>) -> Point2<f32> {
    let mut x = 0.0;
    let mut y = 0.0;
    let n = (range.end() - range.start() + 1) as f32;
    for i in range {
        x += points[i].x;
        y += points[i].y;
    }
    Point2::new(x / n, y / n)
}

fn extract_keypoints(points: &[Point2<f32>]) -> KeyPoints {
    KeyPoints {
        left_eye: region_center(points, schema::LEFT_EYE),
        right_eye: region_center(points, schema::RIGHT_EYE),
        nose_tip: points[schema::NOSE_TIP],
        upper_lip: points[schema::UPPER_LIP],
        chin: points[schema::CHIN],
        left_ear: points[schema::LEFT_EAR],
        right_ear: points[schema::RIGHT_EAR],
        forehead: Point2::from((points[21].coords + points[22].coords) * 0.5),
    }
}

/// Derive pose angles from keypoints when the detector does not surface
/// them: roll from the eye line, yaw from eye-center asymmetry, pitch
/// from the eye line's height above the nose tip.
fn derive_euler(kp: &KeyPoints) -> EulerAngles {
    let dx = kp.left_eye.x - kp.right_eye.x;
    let dy = kp.left_eye.y - kp.right_eye.y;
    let eye_center_x = (kp.left_eye.x + kp.right_eye.x) * 0.5;
    let eye_center_y = (kp.left_eye.y + kp.right_eye.y) * 0.5;

    EulerAngles {
        pitch: (eye_center_y - kp.nose_tip.y) * PITCH_GAIN,
        yaw: (eye_center_x - 0.5) * YAW_GAIN,
        roll: dy.atan2(dx),
    }
}
