use nalgebra::{Point3, Vector3};

use crate::frame::FrameBuffer;

/// A triangle corner after projection and perspective divide.
#[derive(Debug, Clone, Copy)]
pub struct RasterVertex {
    /// Normalized device coordinates, +Y up, z used for depth testing.
    pub ndc: Point3<f32>,
    pub uv: [f32; 2],
    pub normal: Vector3<f32>,
}

/// Reset a depth buffer to "infinitely far" for a new frame.
pub fn clear_depth(depth: &mut [f32]) {
    depth.fill(f32::INFINITY);
}

/// Rasterize one triangle with depth test (less), depth write, and alpha
/// blending (SRC_ALPHA / ONE_MINUS_SRC_ALPHA for color, source alpha
/// written through).
///
/// `shade` receives the interpolated UV and normal and returns RGBA in
/// [0, 1]. Interpolation is screen-space affine.
pub fn draw_triangle(
    target: &mut FrameBuffer,
    depth: &mut [f32],
    verts: &[RasterVertex; 3],
    shade: &mut dyn FnMut([f32; 2], Vector3<f32>) -> [f32; 4],
) {
    let w = target.width as f32;
    let h = target.height as f32;
    let to_screen = |v: &RasterVertex| {
        (
            (v.ndc.x + 1.0) * 0.5 * w,
            (1.0 - v.ndc.y) * 0.5 * h,
        )
    };
    let (x0, y0) = to_screen(&verts[0]);
    let (x1, y1) = to_screen(&verts[1]);
    let (x2, y2) = to_screen(&verts[2]);

    let area = (x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0);
    if area.abs() < 1e-6 {
        return;
    }

    let min_x = x0.min(x1).min(x2).floor().max(0.0) as u32;
    let max_x = (x0.max(x1).max(x2).ceil() as i64).clamp(0, target.width as i64) as u32;
    let min_y = y0.min(y1).min(y2).floor().max(0.0) as u32;
    let max_y = (y0.max(y1).max(y2).ceil() as i64).clamp(0, target.height as i64) as u32;

    for py in min_y..max_y {
        for px in min_x..max_x {
            let cx = px as f32 + 0.5;
            let cy = py as f32 + 0.5;

            // Barycentric weights from edge functions; either winding
            // is accepted.
            let w0 = ((x1 - cx) * (y2 - cy) - (x2 - cx) * (y1 - cy)) / area;
            let w1 = ((x2 - cx) * (y0 - cy) - (x0 - cx) * (y2 - cy)) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = verts[0].ndc.z * w0 + verts[1].ndc.z * w1 + verts[2].ndc.z * w2;
            let idx = (py * target.width + px) as usize;
            if z >= depth[idx] {
                continue;
            }

            let uv = [
                verts[0].uv[0] * w0 + verts[1].uv[0] * w1 + verts[2].uv[0] * w2,
                verts[0].uv[1] * w0 + verts[1].uv[1] * w1 + verts[2].uv[1] * w2,
            ];
            let normal =
                verts[0].normal * w0 + verts[1].normal * w1 + verts[2].normal * w2;

            let src = shade(uv, normal);
            let alpha = src[3].clamp(0.0, 1.0);
            let dst = target.pixel(px, py);

            let blend = |s: f32, d: u8| -> u8 {
                let d = d as f32 / 255.0;
                ((s * alpha + d * (1.0 - alpha)).clamp(0.0, 1.0) * 255.0).round() as u8
            };
            target.set_pixel(
                px,
                py,
                [
                    blend(src[2], dst[0]), // B
                    blend(src[1], dst[1]), // G
                    blend(src[0], dst[2]), // R
                    (alpha * 255.0).round() as u8,
                ],
            );
            depth[idx] = z;
        }
    }
}
