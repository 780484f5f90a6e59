use nalgebra::{Point3, Vector3, Vector4};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::face::types::FaceObservation;
use crate::frame::{Frame, FrameBuffer};
use crate::mask::MaskGeometry;
use crate::pose::placement::{placement_3d, sticker_placement, Placement};
use crate::render::pool::FramePool;
use crate::render::raster::{clear_depth, draw_triangle, RasterVertex};
use crate::render::settings::RenderSettings;

/// Exponent applied to every output channel in the fragment path.
const GAMMA: f32 = 0.95;
/// Output buffers in flight at once before frames start dropping.
const OUTPUT_POOL_CAPACITY: usize = 4;

const AMBIENT: f32 = 0.25;
const LIGHT1_DIR: Vector3<f32> = Vector3::new(0.3, 0.5, 1.0);
const LIGHT1_INTENSITY: f32 = 0.8;
const LIGHT2_DIR: Vector3<f32> = Vector3::new(-0.5, -0.2, 0.6);
const LIGHT2_INTENSITY: f32 = 0.35;
const RIM_STRENGTH: f32 = 0.35;
const PATTERN_AMPLITUDE: f32 = 0.04;

/// Decoded RGBA mask texture, sampled nearest with edge clamping.
#[derive(Debug, Clone)]
pub struct MaskTexture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl MaskTexture {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        if rgba.len() != (width * height * 4) as usize {
            return Err(PipelineError::Config(format!(
                "mask texture: {} bytes for {width}x{height}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn from_image(img: &image::DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        }
    }

    /// Sample at a clamped UV, returning RGBA in [0, 1].
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = ((u.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height - 1);
        let off = ((y * self.width + x) * 4) as usize;
        [
            self.rgba[off] as f32 / 255.0,
            self.rgba[off + 1] as f32 / 255.0,
            self.rgba[off + 2] as f32 / 255.0,
            self.rgba[off + 3] as f32 / 255.0,
        ]
    }
}

/// Everything the mask sub-stage needs for one frame.
pub struct MaskAssets<'a> {
    pub geometry: &'a MaskGeometry,
    pub texture: Option<&'a MaskTexture>,
    /// Sticker mode: 2D placement, lighting bypassed.
    pub flat: bool,
}

/// Narrow compositing seam. A GPU-backed implementation drives the shader
/// runtime; [`SoftwareCompositor`] is the CPU reference used by tests and
/// headless hosts.
pub trait Compositor: Send {
    /// Produce one composited output frame. `mask` is `None` when the
    /// overlay is disabled.
    fn composite(
        &mut self,
        frame: &Frame<'_>,
        observation: &FaceObservation,
        settings: &RenderSettings,
        mask: Option<&MaskAssets<'_>>,
        time_s: f32,
    ) -> Result<FrameBuffer>;

    /// Return a delivered output buffer to the pool.
    fn recycle(&mut self, buffer: FrameBuffer);
}

/// CPU implementation of the render pass: background quad with optional
/// pixelation and gamma, debug overlay, and the depth-tested alpha-blended
/// mask overlay.
pub struct SoftwareCompositor {
    pool: FramePool,
    depth: Vec<f32>,
    gamma_lut: [u8; 256],
}

impl SoftwareCompositor {
    pub fn new() -> Self {
        let mut gamma_lut = [0u8; 256];
        for (i, slot) in gamma_lut.iter_mut().enumerate() {
            *slot = ((i as f32 / 255.0).powf(GAMMA) * 255.0).round() as u8;
        }
        Self {
            pool: FramePool::new(0, 0, OUTPUT_POOL_CAPACITY),
            depth: Vec::new(),
            gamma_lut,
        }
    }

    pub fn pool_dimensions(&self) -> (u32, u32) {
        self.pool.dimensions()
    }

    /// Tear down and rebuild resolution-dependent resources.
    fn ensure_resolution(&mut self, width: u32, height: u32) {
        if !self.pool.matches(width, height) {
            debug!(width, height, "rebuilding output pool and depth target");
            self.pool = FramePool::new(width, height, OUTPUT_POOL_CAPACITY);
            self.depth = vec![f32::INFINITY; (width * height) as usize];
        }
    }

    fn background_pass(
        &self,
        frame: &Frame<'_>,
        observation: &FaceObservation,
        settings: &RenderSettings,
        out: &mut FrameBuffer,
    ) {
        let w = frame.width;
        let h = frame.height;
        let pixelate =
            settings.pixelate && observation.present && settings.pixel_size > 0.0;
        let ps = settings.pixel_size;
        let bbox = &observation.bbox;

        for y in 0..h {
            for x in 0..w {
                let (mut sx, mut sy) = (x, y);
                if pixelate {
                    let u = (x as f32 + 0.5) / w as f32;
                    let v = (y as f32 + 0.5) / h as f32;
                    if bbox.contains(u, v) {
                        let su = ((u / ps).floor() + 0.5) * ps;
                        let sv = ((v / ps).floor() + 0.5) * ps;
                        sx = ((su * w as f32) as u32).min(w - 1);
                        sy = ((sv * h as f32) as u32).min(h - 1);
                    }
                }
                let src = frame.pixel(sx, sy);
                out.set_pixel(
                    x,
                    y,
                    [
                        self.gamma_lut[src[0] as usize],
                        self.gamma_lut[src[1] as usize],
                        self.gamma_lut[src[2] as usize],
                        255,
                    ],
                );
            }
        }
    }

    fn debug_pass(&self, observation: &FaceObservation, out: &mut FrameBuffer) {
        let w = out.width;
        let h = out.height;
        let bbox = &observation.bbox;

        // Dim everything outside the face by 50%
        for y in 0..h {
            for x in 0..w {
                let u = (x as f32 + 0.5) / w as f32;
                let v = (y as f32 + 0.5) / h as f32;
                if !bbox.contains(u, v) {
                    let px = out.pixel(x, y);
                    out.set_pixel(x, y, [px[0] / 2, px[1] / 2, px[2] / 2, px[3]]);
                }
            }
        }

        let to_px = |u: f32, v: f32| -> (i64, i64) {
            ((u * w as f32) as i64, (v * h as f32) as i64)
        };
        let (x0, y0) = to_px(bbox.x, bbox.y);
        let (x1, y1) = to_px(bbox.x + bbox.width, bbox.y + bbox.height);

        let green = [0, 255, 0, 255];
        for x in x0.max(0)..x1.min(w as i64) {
            for y in [y0, y1 - 1] {
                if (0..h as i64).contains(&y) {
                    out.set_pixel(x as u32, y as u32, green);
                }
            }
        }
        for y in y0.max(0)..y1.min(h as i64) {
            for x in [x0, x1 - 1] {
                if (0..w as i64).contains(&x) {
                    out.set_pixel(x as u32, y as u32, green);
                }
            }
        }

        // Head axes through the orientation matrix: X red, Y green, Z blue
        let center = ((bbox.mid_x() * w as f32), (bbox.mid_y() * h as f32));
        let len = bbox.width * w as f32 * 0.5;
        let orientation = &observation.pose.model_matrix;
        let axes = [
            (Vector3::x(), [0, 0, 255, 255]),
            (Vector3::y(), [0, 255, 0, 255]),
            (Vector3::z(), [255, 0, 0, 255]),
        ];
        for (axis, bgra) in axes {
            let dir = orientation.transform_vector(&axis);
            let end = (
                center.0 + dir.x * len,
                center.1 - dir.y * len,
            );
            draw_segment(out, center, end, bgra);
        }
    }

    fn mask_pass(
        &mut self,
        observation: &FaceObservation,
        settings: &RenderSettings,
        assets: &MaskAssets<'_>,
        aspect: f32,
        time_s: f32,
        out: &mut FrameBuffer,
    ) {
        let Placement {
            model,
            view_projection,
        } = if assets.flat {
            sticker_placement(&observation.bbox)
        } else {
            placement_3d(
                &observation.bbox,
                &observation.pose.model_matrix,
                aspect,
                settings.mask_scale,
            )
        };
        let mvp = view_projection * model;

        clear_depth(&mut self.depth);

        let geometry = assets.geometry;
        let verts = geometry.vertices();
        let uvs = geometry.uvs();
        let normals = geometry.normals();

        let mask_color = settings.mask_color;
        let texture = assets.texture;
        let flat = assets.flat;
        let mut shade = move |uv: [f32; 2], normal: Vector3<f32>| -> [f32; 4] {
            let sampled = texture.map(|t| t.sample(uv[0], uv[1]));
            if flat {
                // Sticker mode: sampled color verbatim, no lighting
                return sampled.unwrap_or(mask_color);
            }

            let base = match sampled {
                Some(t) => [
                    mask_color[0] + (t[0] - mask_color[0]) * t[3],
                    mask_color[1] + (t[1] - mask_color[1]) * t[3],
                    mask_color[2] + (t[2] - mask_color[2]) * t[3],
                ],
                None => [mask_color[0], mask_color[1], mask_color[2]],
            };

            let n = if normal.norm() > 1e-6 {
                normal.normalize()
            } else {
                Vector3::z()
            };
            let diffuse = AMBIENT
                + n.dot(&LIGHT1_DIR.normalize()).max(0.0) * LIGHT1_INTENSITY
                + n.dot(&LIGHT2_DIR.normalize()).max(0.0) * LIGHT2_INTENSITY;
            let rim = (1.0 - n.z.max(0.0)).powi(3) * RIM_STRENGTH;
            let pattern =
                ((uv[0] + uv[1]) * 24.0 + time_s * 2.0).sin() * PATTERN_AMPLITUDE;

            [
                (base[0] * diffuse + rim + pattern).clamp(0.0, 1.0),
                (base[1] * diffuse + rim + pattern).clamp(0.0, 1.0),
                (base[2] * diffuse + rim + pattern).clamp(0.0, 1.0),
                mask_color[3],
            ]
        };

        'triangles: for tri in geometry.indices().chunks_exact(3) {
            let mut corners = [RasterVertex {
                ndc: Point3::origin(),
                uv: [0.0, 0.0],
                normal: Vector3::z(),
            }; 3];
            for (slot, &index) in corners.iter_mut().zip(tri) {
                let i = index as usize;
                let clip = mvp * Vector4::new(verts[i].x, verts[i].y, verts[i].z, 1.0);
                if clip.w <= 1e-4 {
                    continue 'triangles;
                }
                slot.ndc = Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
                slot.uv = uvs[i];
                slot.normal = model.transform_vector(&normals[i]);
            }
            draw_triangle(out, &mut self.depth, &corners, &mut shade);
        }
    }
}

impl Default for SoftwareCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor for SoftwareCompositor {
    fn composite(
        &mut self,
        frame: &Frame<'_>,
        observation: &FaceObservation,
        settings: &RenderSettings,
        mask: Option<&MaskAssets<'_>>,
        time_s: f32,
    ) -> Result<FrameBuffer> {
        if frame.width == 0 || frame.height == 0 {
            return Err(PipelineError::Render("zero-sized frame".to_string()));
        }
        self.ensure_resolution(frame.width, frame.height);

        let mut out = self
            .pool
            .acquire(frame.timestamp_ns)
            .ok_or(PipelineError::PoolExhausted)?;

        self.background_pass(frame, observation, settings, &mut out);

        if settings.debug_overlay && observation.present {
            self.debug_pass(observation, &mut out);
        }

        if observation.present {
            if let Some(assets) = mask {
                let aspect = frame.width as f32 / frame.height as f32;
                self.mask_pass(observation, settings, assets, aspect, time_s, &mut out);
            }
        }

        Ok(out)
    }

    fn recycle(&mut self, buffer: FrameBuffer) {
        self.pool.release(buffer);
    }
}

/// Plot a line segment by uniform stepping.
fn draw_segment(out: &mut FrameBuffer, from: (f32, f32), to: (f32, f32), bgra: [u8; 4]) {
    let steps = ((to.0 - from.0).abs().max((to.1 - from.1).abs()) as u32).max(1);
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = from.0 + (to.0 - from.0) * t;
        let y = from.1 + (to.1 - from.1) * t;
        if x >= 0.0 && y >= 0.0 && (x as u32) < out.width && (y as u32) < out.height {
            out.set_pixel(x as u32, y as u32, bgra);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::detector::{synthetic_detection, StaticDetector};
    use crate::face::FaceAnalyzer;
    use crate::mask::MaskStyle;

    fn gray_frame(w: u32, h: u32) -> FrameBuffer {
        let mut buf = FrameBuffer::new(w, h, 1000);
        buf.fill([128, 128, 128, 255]);
        buf
    }

    fn centered_observation() -> FaceObservation {
        let mut analyzer = FaceAnalyzer::new(Box::new(StaticDetector::always(
            synthetic_detection((0.25, 0.25, 0.5, 0.5)),
        )));
        let buf = FrameBuffer::new(8, 8, 0);
        analyzer.analyze(&buf.as_frame()).unwrap()
    }

    fn gamma_of(value: u8) -> u8 {
        ((value as f32 / 255.0).powf(GAMMA) * 255.0).round() as u8
    }

    #[test]
    fn no_face_no_effects_passes_through_with_gamma() {
        let mut comp = SoftwareCompositor::new();
        let frame = gray_frame(32, 24);
        let settings = RenderSettings {
            mask_enabled: false,
            pixelate: false,
            ..RenderSettings::default()
        };
        let out = comp
            .composite(
                &frame.as_frame(),
                &FaceObservation::absent(),
                &settings,
                None,
                0.0,
            )
            .unwrap();

        let expected = gamma_of(128);
        for y in 0..24 {
            for x in 0..32 {
                let px = out.pixel(x, y);
                for c in 0..3 {
                    assert!(
                        (px[c] as i32 - expected as i32).abs() <= 2,
                        "({x},{y}) channel {c}: {} vs {expected}",
                        px[c]
                    );
                }
            }
        }
    }

    #[test]
    fn pixelation_is_blocky_inside_bbox_and_clean_outside() {
        // Checkerboard so neighbouring pixels differ
        let mut frame = FrameBuffer::new(40, 40, 0);
        for y in 0..40 {
            for x in 0..40 {
                let v = if (x + y) % 2 == 0 { 200 } else { 40 };
                frame.set_pixel(x, y, [v, v, v, 255]);
            }
        }

        let mut obs = centered_observation();
        obs.bbox = crate::face::types::NormalizedRect::new(0.25, 0.25, 0.5, 0.5);
        let settings = RenderSettings {
            pixelate: true,
            pixel_size: 0.25, // 10px cells on a 40px frame
            mask_enabled: false,
            ..RenderSettings::default()
        };

        let mut comp = SoftwareCompositor::new();
        let out = comp
            .composite(&frame.as_frame(), &obs, &settings, None, 0.0)
            .unwrap();

        // Inside the box: the cell spanning [10, 20) is uniform
        let reference = out.pixel(11, 11);
        for y in 11..19 {
            for x in 11..19 {
                assert_eq!(out.pixel(x, y), reference, "at ({x},{y})");
            }
        }
        // Outside the box the checkerboard survives (gamma-adjusted)
        assert_ne!(out.pixel(0, 0), out.pixel(1, 0));
    }

    #[test]
    fn mask_is_suppressed_without_a_face() {
        let mut comp = SoftwareCompositor::new();
        let frame = gray_frame(32, 24);
        let settings = RenderSettings::default(); // mask enabled
        let geometry = MaskStyle::Helmet.build();
        let assets = MaskAssets {
            geometry: &geometry,
            texture: None,
            flat: false,
        };

        let masked = comp
            .composite(
                &frame.as_frame(),
                &FaceObservation::absent(),
                &settings,
                Some(&assets),
                0.0,
            )
            .unwrap();
        let plain = comp
            .composite(
                &frame.as_frame(),
                &FaceObservation::absent(),
                &RenderSettings {
                    mask_enabled: false,
                    ..RenderSettings::default()
                },
                None,
                0.0,
            )
            .unwrap();
        assert_eq!(masked.data, plain.data);
    }

    #[test]
    fn mask_draws_over_a_present_face() {
        let mut comp = SoftwareCompositor::new();
        let frame = gray_frame(64, 48);
        let obs = centered_observation();
        let geometry = MaskStyle::Helmet.build();
        let assets = MaskAssets {
            geometry: &geometry,
            texture: None,
            flat: false,
        };

        let out = comp
            .composite(&frame.as_frame(), &obs, &RenderSettings::default(), Some(&assets), 0.0)
            .unwrap();
        // Center of the face no longer matches the gamma'd gray
        let center = out.pixel(32, 24);
        let expected = gamma_of(128);
        let diff = (center[0] as i32 - expected as i32).abs()
            + (center[1] as i32 - expected as i32).abs()
            + (center[2] as i32 - expected as i32).abs();
        assert!(diff > 10, "mask did not render: {center:?}");
    }

    #[test]
    fn sticker_mode_emits_texture_color_verbatim() {
        let mut comp = SoftwareCompositor::new();
        let frame = gray_frame(64, 48);
        let obs = centered_observation();
        let geometry = MaskStyle::Quad.build();
        let texture = MaskTexture::from_rgba(1, 1, vec![255, 0, 0, 255]).unwrap();
        let assets = MaskAssets {
            geometry: &geometry,
            texture: Some(&texture),
            flat: true,
        };

        let out = comp
            .composite(&frame.as_frame(), &obs, &RenderSettings::default(), Some(&assets), 0.0)
            .unwrap();
        // Pure red, unlit: BGRA = (0, 0, 255)
        let center = out.pixel(32, 24);
        assert_eq!(center[2], 255);
        assert_eq!(center[1], 0);
        assert_eq!(center[0], 0);
    }

    #[test]
    fn resolution_change_rebuilds_the_pool() {
        let mut comp = SoftwareCompositor::new();
        let settings = RenderSettings {
            mask_enabled: false,
            ..RenderSettings::default()
        };
        let obs = FaceObservation::absent();

        let a = gray_frame(16, 12);
        let out = comp
            .composite(&a.as_frame(), &obs, &settings, None, 0.0)
            .unwrap();
        comp.recycle(out);
        assert_eq!(comp.pool_dimensions(), (16, 12));

        let b = gray_frame(32, 24);
        let out = comp
            .composite(&b.as_frame(), &obs, &settings, None, 0.0)
            .unwrap();
        assert_eq!(comp.pool_dimensions(), (32, 24));
        assert_eq!((out.width, out.height), (32, 24));
    }

    #[test]
    fn pool_exhaustion_surfaces_as_an_error() {
        let mut comp = SoftwareCompositor::new();
        let frame = gray_frame(8, 8);
        let settings = RenderSettings {
            mask_enabled: false,
            ..RenderSettings::default()
        };
        let obs = FaceObservation::absent();

        let mut held = Vec::new();
        loop {
            match comp.composite(&frame.as_frame(), &obs, &settings, None, 0.0) {
                Ok(out) => held.push(out),
                Err(PipelineError::PoolExhausted) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
            assert!(held.len() <= 16, "pool never exhausted");
        }
        // Recycling one buffer unblocks the next frame
        comp.recycle(held.pop().unwrap());
        assert!(comp
            .composite(&frame.as_frame(), &obs, &settings, None, 0.0)
            .is_ok());
    }

    #[test]
    fn debug_overlay_dims_outside_and_marks_the_bbox() {
        let mut comp = SoftwareCompositor::new();
        let frame = gray_frame(40, 40);
        let mut obs = centered_observation();
        obs.bbox = crate::face::types::NormalizedRect::new(0.25, 0.25, 0.5, 0.5);
        let settings = RenderSettings {
            mask_enabled: false,
            debug_overlay: true,
            ..RenderSettings::default()
        };

        let out = comp
            .composite(&frame.as_frame(), &obs, &settings, None, 0.0)
            .unwrap();

        let expected = gamma_of(128);
        // Outside the box: dimmed to half
        let outside = out.pixel(1, 1);
        assert!((outside[0] as i32 - expected as i32 / 2).abs() <= 2);
        // Box edge: green outline
        assert_eq!(out.pixel(20, 10), [0, 255, 0, 255]);
    }

    #[test]
    fn mask_texture_rejects_wrong_byte_count() {
        assert!(MaskTexture::from_rgba(2, 2, vec![0; 4]).is_err());
        assert!(MaskTexture::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn mask_texture_sampling_clamps_to_edges() {
        let texture = MaskTexture::from_rgba(
            2,
            1,
            vec![255, 0, 0, 255, 0, 255, 0, 255],
        )
        .unwrap();
        assert_eq!(texture.sample(-1.0, 0.5)[0], 1.0); // left texel, red
        assert_eq!(texture.sample(2.0, 0.5)[1], 1.0); // right texel, green
    }
}
