use nalgebra::{Point2, Point3};

use crate::face::types::{schema, FaceMesh};

/// Barycentric containment tolerance: a coordinate may spill slightly
/// past an edge and still count as inside.
const EDGE_TOLERANCE: f32 = -0.1;
/// Triangles flatter than this are skipped.
const MIN_TRIANGLE_AREA: f32 = 1e-6;
/// Solver guard against a collinear (or repeated) vertex basis.
const MIN_DENOM: f32 = 1e-9;

/// The nine semantic anchors used to triangulate a correspondence
/// between two faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Anchor {
    RightEye = 0,
    LeftEye = 1,
    NoseTip = 2,
    MouthRight = 3,
    MouthLeft = 4,
    Chin = 5,
    RightCheek = 6,
    LeftCheek = 7,
    Forehead = 8,
}

pub const ANCHOR_COUNT: usize = 9;

/// Fixed triangulation of the face over the nine anchors. Triangles are
/// probed in order; overlap is resolved by first match.
pub const ANCHOR_TRIANGLES: [(usize, usize, usize); 11] = [
    // forehead-eyes
    (Anchor::Forehead as usize, Anchor::RightEye as usize, Anchor::LeftEye as usize),
    // eye-nose-forehead pair
    (Anchor::Forehead as usize, Anchor::RightEye as usize, Anchor::NoseTip as usize),
    (Anchor::Forehead as usize, Anchor::LeftEye as usize, Anchor::NoseTip as usize),
    // cheek-eye-nose pair
    (Anchor::RightCheek as usize, Anchor::RightEye as usize, Anchor::NoseTip as usize),
    (Anchor::LeftCheek as usize, Anchor::LeftEye as usize, Anchor::NoseTip as usize),
    // nose-mouth
    (Anchor::NoseTip as usize, Anchor::MouthRight as usize, Anchor::MouthLeft as usize),
    // mouth-cheek-nose pair
    (Anchor::MouthRight as usize, Anchor::RightCheek as usize, Anchor::NoseTip as usize),
    (Anchor::MouthLeft as usize, Anchor::LeftCheek as usize, Anchor::NoseTip as usize),
    // chin-cheek-mouth pair
    (Anchor::Chin as usize, Anchor::RightCheek as usize, Anchor::MouthRight as usize),
    (Anchor::Chin as usize, Anchor::LeftCheek as usize, Anchor::MouthLeft as usize),
    // center-chin
    (Anchor::MouthLeft as usize, Anchor::MouthRight as usize, Anchor::Chin as usize),
];

/// Extract the nine-anchor skeleton from a 68-point mesh.
pub fn extract_anchors(mesh: &FaceMesh) -> [Point2<f32>; ANCHOR_COUNT] {
    let pts = &mesh.points;
    let ring_center = |range: std::ops::RangeInclusive<usize>| {
        let n = (range.end() - range.start() + 1) as f32;
        let mut x = 0.0;
        let mut y = 0.0;
        for i in range {
            x += pts[i].x;
            y += pts[i].y;
        }
        Point2::new(x / n, y / n)
    };

    [
        ring_center(schema::RIGHT_EYE),
        ring_center(schema::LEFT_EYE),
        pts[schema::NOSE_TIP],
        pts[schema::MOUTH_RIGHT],
        pts[schema::MOUTH_LEFT],
        pts[schema::CHIN],
        pts[schema::RIGHT_CHEEK],
        pts[schema::LEFT_CHEEK],
        Point2::from((pts[21].coords + pts[22].coords) * 0.5),
    ]
}

/// Solve for barycentric coordinates of `p` in triangle (v1, v2, v3)
/// using the two-edge-dot formulation.
///
/// Returns `Some((u, v, w))` only when all three coordinates are within
/// the edge tolerance; `u` weights v3, `v` weights v2, `w` weights v1,
/// and u + v + w = 1.
pub fn barycentric(
    p: Point2<f32>,
    v1: Point2<f32>,
    v2: Point2<f32>,
    v3: Point2<f32>,
) -> Option<(f32, f32, f32)> {
    let e0 = v3 - v1;
    let e1 = v2 - v1;
    let e2 = p - v1;

    let dot00 = e0.dot(&e0);
    let dot01 = e0.dot(&e1);
    let dot02 = e0.dot(&e2);
    let dot11 = e1.dot(&e1);
    let dot12 = e1.dot(&e2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < MIN_DENOM {
        return None;
    }
    let u = (dot11 * dot02 - dot01 * dot12) / denom;
    let v = (dot00 * dot12 - dot01 * dot02) / denom;
    let w = 1.0 - u - v;

    if u >= EDGE_TOLERANCE && v >= EDGE_TOLERANCE && w >= EDGE_TOLERANCE {
        Some((u, v, w))
    } else {
        None
    }
}

fn triangle_area(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f32 {
    ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() * 0.5
}

/// Maps mask vertices to texture UVs through a live↔texture landmark
/// correspondence.
///
/// The texture face is extracted once when the user loads a replacement
/// image; per frame, the live face re-triangulates the mapping.
#[derive(Debug, Default)]
pub struct FaceMapper {
    texture_face: Option<FaceMesh>,
}

impl FaceMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the face found in the user-supplied texture.
    pub fn set_texture_face(&mut self, mesh: FaceMesh) {
        self.texture_face = Some(mesh);
    }

    /// Drop the registered texture face; mapping reverts to identity.
    pub fn clear_texture_face(&mut self) {
        self.texture_face = None;
    }

    pub fn has_texture_face(&self) -> bool {
        self.texture_face.is_some()
    }

    /// Produce one texture UV per mask vertex.
    ///
    /// Vertices live in mask-local space ([-0.5, 0.5]² across the face);
    /// `v.xy + 0.5` is the identity UV. With both faces available, each
    /// vertex is located in the live triangulation and its UV interpolated
    /// from the corresponding texture triangle; vertices outside every
    /// triangle fall back to an affine box-to-box mapping.
    pub fn generate_uvs(
        &self,
        vertices: &[Point3<f32>],
        live_face: Option<&FaceMesh>,
    ) -> Vec<[f32; 2]> {
        let identity = |v: &Point3<f32>| -> [f32; 2] {
            [(v.x + 0.5).clamp(0.0, 1.0), (v.y + 0.5).clamp(0.0, 1.0)]
        };

        let (Some(texture), Some(live)) = (self.texture_face.as_ref(), live_face) else {
            return vertices.iter().map(identity).collect();
        };
        if live.points.len() < crate::face::types::LANDMARK_COUNT {
            return vertices.iter().map(identity).collect();
        }

        let live_anchors = extract_anchors(live);
        let tex_anchors = extract_anchors(texture);

        vertices
            .iter()
            .map(|v| {
                let p = Point2::new(v.x + 0.5, v.y + 0.5);
                for &(i, j, k) in &ANCHOR_TRIANGLES {
                    let (l1, l2, l3) = (live_anchors[i], live_anchors[j], live_anchors[k]);
                    if triangle_area(l1, l2, l3) < MIN_TRIANGLE_AREA {
                        continue;
                    }
                    if let Some((u, bv, w)) = barycentric(p, l1, l2, l3) {
                        let (t1, t2, t3) = (tex_anchors[i], tex_anchors[j], tex_anchors[k]);
                        let tx = t1.x * w + t2.x * bv + t3.x * u;
                        let ty = t1.y * w + t2.y * bv + t3.y * u;
                        return [tx.clamp(0.0, 1.0), ty.clamp(0.0, 1.0)];
                    }
                }
                affine_fallback(p, &live.bbox, &texture.bbox)
            })
            .collect()
    }
}

/// Box-to-box affine mapping for points outside the triangulation.
fn affine_fallback(
    p: Point2<f32>,
    live: &crate::face::types::NormalizedRect,
    texture: &crate::face::types::NormalizedRect,
) -> [f32; 2] {
    let sx = if live.width > 1e-6 {
        texture.width / live.width
    } else {
        1.0
    };
    let sy = if live.height > 1e-6 {
        texture.height / live.height
    } else {
        1.0
    };
    let u = texture.mid_x() + (p.x - live.mid_x()) * sx;
    let v = texture.mid_y() + (p.y - live.mid_y()) * sy;
    [u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)]
}
