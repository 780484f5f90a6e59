use nalgebra::{Matrix4, Vector3};

use crate::face::types::NormalizedRect;
use crate::pose::transform::{perspective, scaling, translation};

/// Vertical field of view of the virtual scene camera.
pub const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
/// Mask-to-face size ratio; the mask slightly overhangs the detected box.
pub const HEAD_SCALE: f32 = 1.33;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Model and view-projection matrices positioning a mask over the face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub model: Matrix4<f32>,
    pub view_projection: Matrix4<f32>,
}

/// Face-box center in NDC (+Y up). The box lives in top-left-origin UV
/// space, so the y axis inverts here.
fn ndc_center(bbox: &NormalizedRect) -> (f32, f32) {
    (2.0 * bbox.mid_x() - 1.0, 1.0 - 2.0 * bbox.mid_y())
}

/// Flat 2D placement: the overlay is sized to the face box and drawn
/// without projection.
pub fn sticker_placement(bbox: &NormalizedRect) -> Placement {
    let (cx, cy) = ndc_center(bbox);
    let model = translation(Vector3::new(cx, cy, 0.0))
        * scaling(2.0 * bbox.width, 2.0 * bbox.height, 1.0);
    Placement {
        model,
        view_projection: Matrix4::identity(),
    }
}

/// Full 3D placement: the head distance is recovered from the apparent
/// face width, the mask is oriented by the head rotation, and a
/// right-handed perspective projects it back onto the frame.
pub fn placement_3d(
    bbox: &NormalizedRect,
    rotation: &Matrix4<f32>,
    aspect: f32,
    user_scale: f32,
) -> Placement {
    let half_tan = (FOV_Y * 0.5).tan();
    let width = bbox.width.max(1e-3);
    let distance = 1.0 / (width * half_tan * 1.5);

    let (cx, cy) = ndc_center(bbox);
    let world = Vector3::new(
        cx * distance * aspect * half_tan,
        cy * distance * half_tan,
        -distance,
    );

    let s = HEAD_SCALE * user_scale;
    Placement {
        model: translation(world) * rotation * scaling(s, s, s),
        view_projection: perspective(aspect, FOV_Y, NEAR_PLANE, FAR_PLANE),
    }
}
