use nalgebra::{Matrix4, Point2, Vector3};

/// Number of points in the normalized landmark schema.
pub const LANDMARK_COUNT: usize = 68;

/// Fixed point identities of the 68-point schema.
///
/// Index ranges follow the standard layout: jaw sweeps from the subject's
/// right ear across the chin to the left ear.
pub mod schema {
    use std::ops::RangeInclusive;

    pub const JAW: RangeInclusive<usize> = 0..=16;
    pub const RIGHT_BROW: RangeInclusive<usize> = 17..=21;
    pub const LEFT_BROW: RangeInclusive<usize> = 22..=26;
    pub const NOSE_CREST: RangeInclusive<usize> = 27..=30;
    pub const NOSE: RangeInclusive<usize> = 31..=35;
    pub const RIGHT_EYE: RangeInclusive<usize> = 36..=41;
    pub const LEFT_EYE: RangeInclusive<usize> = 42..=47;
    pub const OUTER_LIPS: RangeInclusive<usize> = 48..=59;
    pub const INNER_LIPS: RangeInclusive<usize> = 60..=67;

    pub const CHIN: usize = 8;
    pub const NOSE_TIP: usize = 30;
    pub const RIGHT_EAR: usize = 0;
    pub const LEFT_EAR: usize = 16;
    pub const RIGHT_CHEEK: usize = 2;
    pub const LEFT_CHEEK: usize = 14;
    pub const UPPER_LIP: usize = 51;
    pub const MOUTH_RIGHT: usize = 48;
    pub const MOUTH_LEFT: usize = 54;
}

/// Axis-aligned rectangle in normalized top-left-origin UV space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a bottom-left-origin rectangle (detector convention) to
    /// top-left origin.
    pub fn from_bottom_left(x: f32, y_bl: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y: 1.0 - y_bl - height,
            width,
            height,
        }
    }

    pub fn mid_x(&self) -> f32 {
        self.x + self.width * 0.5
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height * 0.5
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.mid_x(), self.mid_y())
    }

    pub fn contains(&self, u: f32, v: f32) -> bool {
        u >= self.x && u <= self.x + self.width && v >= self.y && v <= self.y + self.height
    }

    /// Smallest rectangle enclosing all points; empty input yields a zero rect.
    pub fn bounding(points: &[Point2<f32>]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Named fixed-arity keypoints extracted from the landmark schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoints {
    pub left_eye: Point2<f32>,
    pub right_eye: Point2<f32>,
    pub nose_tip: Point2<f32>,
    pub upper_lip: Point2<f32>,
    pub chin: Point2<f32>,
    pub left_ear: Point2<f32>,
    pub right_ear: Point2<f32>,
    pub forehead: Point2<f32>,
}

impl Default for KeyPoints {
    fn default() -> Self {
        let c = Point2::new(0.5, 0.5);
        Self {
            left_eye: c,
            right_eye: c,
            nose_tip: c,
            upper_lip: c,
            chin: c,
            left_ear: c,
            right_ear: c,
            forehead: c,
        }
    }
}

/// Euler angles in radians. Pitch rotates around X, yaw around Y, roll
/// around Z; the composed rotation is Rz·Ry·Rx.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Head pose: orientation, an informational translation (x, y in NDC,
/// z a scale proxy), and the rotation-only model matrix. On-screen
/// placement derives from the face bbox, not from this translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub euler: EulerAngles,
    pub translation: Vector3<f32>,
    pub model_matrix: Matrix4<f32>,
}

impl Default for HeadPose {
    fn default() -> Self {
        Self {
            euler: EulerAngles::default(),
            translation: Vector3::zeros(),
            model_matrix: Matrix4::identity(),
        }
    }
}

/// Per-frame output of the face analyzer.
///
/// When `present` is false, `landmarks` is empty and `bbox`, `keypoints`
/// and `pose` hold their type defaults; consumers must not interpret them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaceObservation {
    pub present: bool,
    pub confidence: f32,
    pub bbox: NormalizedRect,
    pub landmarks: Vec<Point2<f32>>,
    pub keypoints: KeyPoints,
    pub pose: HeadPose,
}

impl FaceObservation {
    /// The canonical "no face" observation.
    pub fn absent() -> Self {
        Self::default()
    }
}

/// A 68-point face in normalized [0,1]² space with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMesh {
    pub points: Vec<Point2<f32>>,
    pub bbox: NormalizedRect,
    pub confidence: f32,
}

impl FaceMesh {
    /// Build from an observation; returns `None` unless the observation
    /// carries the full schema.
    pub fn from_observation(obs: &FaceObservation) -> Option<Self> {
        if !obs.present || obs.landmarks.len() != LANDMARK_COUNT {
            return None;
        }
        Some(Self {
            points: obs.landmarks.clone(),
            bbox: obs.bbox,
            confidence: obs.confidence,
        })
    }
}
