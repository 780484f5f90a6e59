use nalgebra::Point2;

use crate::error::Result;
use crate::face::types::EulerAngles;
use crate::frame::Frame;

/// Landmark regions reported by a detector, with the point count each
/// contributes to the 68-point schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkRegion {
    FaceContour,
    RightBrow,
    LeftBrow,
    NoseCrest,
    Nose,
    RightEye,
    LeftEye,
    OuterLips,
    InnerLips,
}

impl LandmarkRegion {
    pub const ALL: [LandmarkRegion; 9] = [
        Self::FaceContour,
        Self::RightBrow,
        Self::LeftBrow,
        Self::NoseCrest,
        Self::Nose,
        Self::RightEye,
        Self::LeftEye,
        Self::OuterLips,
        Self::InnerLips,
    ];

    /// Number of schema points this region is resampled to.
    pub fn schema_len(self) -> usize {
        match self {
            Self::FaceContour => 17,
            Self::RightBrow | Self::LeftBrow => 5,
            Self::NoseCrest => 4,
            Self::Nose => 5,
            Self::RightEye | Self::LeftEye => 6,
            Self::OuterLips => 12,
            Self::InnerLips => 8,
        }
    }

    /// First index of this region in the 68-point schema.
    pub fn schema_offset(self) -> usize {
        match self {
            Self::FaceContour => 0,
            Self::RightBrow => 17,
            Self::LeftBrow => 22,
            Self::NoseCrest => 27,
            Self::Nose => 31,
            Self::RightEye => 36,
            Self::LeftEye => 42,
            Self::OuterLips => 48,
            Self::InnerLips => 60,
        }
    }
}

/// Raw detection from a landmark detector, in the detector's own
/// bottom-left-origin normalized coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorResult {
    /// (x, y, w, h) with y measured from the bottom edge.
    pub bbox_bottom_left: (f32, f32, f32, f32),
    pub confidence: f32,
    /// Region polylines; a region may be missing or have any cardinality.
    pub regions: Vec<(LandmarkRegion, Vec<Point2<f32>>)>,
    /// Pose angles when the detector provides them directly.
    pub pose_angles: Option<EulerAngles>,
}

/// Narrow face-detector seam.
///
/// Implementations wrap a real landmark model; the pipeline serialises all
/// calls onto the processing executor, so reentrancy is not required.
/// "No face" is `Ok(None)`, never an error.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame<'_>) -> Result<Option<DetectorResult>>;
}

/// A detector that replays scripted results, for tests and headless runs.
///
/// Results are consumed in order; once the script is exhausted the last
/// entry repeats. An empty script always reports no face.
pub struct StaticDetector {
    script: Vec<Option<DetectorResult>>,
    cursor: usize,
}

impl StaticDetector {
    pub fn new(script: Vec<Option<DetectorResult>>) -> Self {
        Self { script, cursor: 0 }
    }

    /// A detector that never finds a face.
    pub fn no_face() -> Self {
        Self::new(vec![])
    }

    /// A detector that always reports the same face.
    pub fn always(result: DetectorResult) -> Self {
        Self::new(vec![Some(result)])
    }
}

impl Detector for StaticDetector {
    fn detect(&mut self, _frame: &Frame<'_>) -> Result<Option<DetectorResult>> {
        if self.script.is_empty() {
            return Ok(None);
        }
        let idx = self.cursor.min(self.script.len() - 1);
        self.cursor += 1;
        Ok(self.script[idx].clone())
    }
}

/// Build a plausible full-region detection centered in the given
/// bottom-left-origin box. Used by the synthetic camera path and tests.
pub fn synthetic_detection(bbox_bottom_left: (f32, f32, f32, f32)) -> DetectorResult {
    let (bx, by, bw, bh) = bbox_bottom_left;
    let cx = bx + bw * 0.5;
    let cy = by + bh * 0.5;

    // Trace each region along a simple arc or line inside the box.
    let arc = |n: usize, radius_x: f32, radius_y: f32, x_off: f32, y_off: f32, start: f32, sweep: f32| {
        (0..n)
            .map(|i| {
                let t = start + sweep * i as f32 / (n.max(2) - 1) as f32;
                Point2::new(
                    cx + x_off + radius_x * t.cos(),
                    cy + y_off + radius_y * t.sin(),
                )
            })
            .collect::<Vec<_>>()
    };
    let line = |n: usize, x0: f32, y0: f32, x1: f32, y1: f32| {
        (0..n)
            .map(|i| {
                let t = i as f32 / (n.max(2) - 1) as f32;
                Point2::new(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t)
            })
            .collect::<Vec<_>>()
    };

    use std::f32::consts::PI;
    let regions = vec![
        // Lower half of an ellipse, ear to ear through the chin.
        (
            LandmarkRegion::FaceContour,
            arc(17, bw * 0.5, bh * 0.5, 0.0, 0.0, PI, PI),
        ),
        (
            LandmarkRegion::RightBrow,
            line(5, cx - bw * 0.4, cy + bh * 0.25, cx - bw * 0.1, cy + bh * 0.3),
        ),
        (
            LandmarkRegion::LeftBrow,
            line(5, cx + bw * 0.1, cy + bh * 0.3, cx + bw * 0.4, cy + bh * 0.25),
        ),
        (
            LandmarkRegion::NoseCrest,
            line(4, cx, cy + bh * 0.2, cx, cy - bh * 0.05),
        ),
        (
            LandmarkRegion::Nose,
            line(5, cx - bw * 0.08, cy - bh * 0.08, cx + bw * 0.08, cy - bh * 0.08),
        ),
        (
            LandmarkRegion::RightEye,
            arc(6, bw * 0.08, bh * 0.04, -bw * 0.2, bh * 0.15, 0.0, 2.0 * PI),
        ),
        (
            LandmarkRegion::LeftEye,
            arc(6, bw * 0.08, bh * 0.04, bw * 0.2, bh * 0.15, 0.0, 2.0 * PI),
        ),
        (
            LandmarkRegion::OuterLips,
            arc(12, bw * 0.18, bh * 0.08, 0.0, -bh * 0.25, 0.0, 2.0 * PI),
        ),
        (
            LandmarkRegion::InnerLips,
            arc(8, bw * 0.10, bh * 0.04, 0.0, -bh * 0.25, 0.0, 2.0 * PI),
        ),
    ];

    DetectorResult {
        bbox_bottom_left,
        confidence: 0.95,
        regions,
        pose_angles: None,
    }
}
