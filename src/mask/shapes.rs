use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::face::types::{schema, FaceMesh};
use crate::mask::geometry::MaskGeometry;

/// The selectable mask shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskStyle {
    #[default]
    Helmet,
    Ellipsoid,
    LowPoly,
    Disc,
    Quad,
}

impl MaskStyle {
    /// Flat styles render in sticker mode: 2D placement, no lighting.
    pub fn is_flat(self) -> bool {
        matches!(self, Self::Disc | Self::Quad)
    }

    /// Build the geometry for this style.
    pub fn build(self) -> MaskGeometry {
        match self {
            Self::Helmet => hemisphere(16, 24),
            Self::Ellipsoid => ellipsoid(14, 20),
            Self::LowPoly => hemisphere(4, 8),
            Self::Disc => disc(24),
            Self::Quad => quad(),
        }
    }
}

/// Identity UV for a mask-local vertex.
fn uv_for(x: f32, y: f32) -> [f32; 2] {
    [(x + 0.5).clamp(0.0, 1.0), (y + 0.5).clamp(0.0, 1.0)]
}

/// Hemispheric helmet facing the camera: rings sweep from the +Z pole to
/// the rim at z = 0.
fn hemisphere(rings: u16, segments: u16) -> MaskGeometry {
    let mut vertices = Vec::new();
    let mut uvs = Vec::new();

    for ring in 0..=rings {
        let phi = ring as f32 / rings as f32 * (PI * 0.5);
        for seg in 0..segments {
            let theta = seg as f32 / segments as f32 * 2.0 * PI;
            let x = 0.5 * phi.sin() * theta.cos();
            let y = 0.5 * phi.sin() * theta.sin();
            let z = 0.5 * phi.cos();
            vertices.push(Point3::new(x, y, z));
            uvs.push(uv_for(x, y));
        }
    }

    let indices = grid_indices(rings, segments);
    MaskGeometry::new(vertices, indices, uvs).expect("hemisphere construction is well-formed")
}

/// Organic full ellipsoid: a sphere stretched to head proportions with a
/// gentle jaw taper.
fn ellipsoid(rings: u16, segments: u16) -> MaskGeometry {
    let (rx, ry, rz) = (0.45, 0.58, 0.48);
    let mut vertices = Vec::new();
    let mut uvs = Vec::new();

    for ring in 0..=rings {
        let phi = ring as f32 / rings as f32 * PI;
        for seg in 0..segments {
            let theta = seg as f32 / segments as f32 * 2.0 * PI;
            // Narrower below the midline, suggesting a jaw
            let taper = 1.0 - 0.15 * (1.0 - phi.cos()).max(0.0) * 0.5;
            let x = rx * taper * phi.sin() * theta.cos();
            let y = ry * phi.cos();
            let z = rz * taper * phi.sin() * theta.sin();
            vertices.push(Point3::new(x, y, z));
            uvs.push(uv_for(x, y));
        }
    }

    let indices = grid_indices(rings, segments);
    MaskGeometry::new(vertices, indices, uvs).expect("ellipsoid construction is well-formed")
}

/// Triangle indices for a ring/segment grid with wrapped seams.
fn grid_indices(rings: u16, segments: u16) -> Vec<u16> {
    let mut indices = Vec::new();
    for ring in 0..rings {
        for seg in 0..segments {
            let next_seg = (seg + 1) % segments;
            let a = ring * segments + seg;
            let b = ring * segments + next_seg;
            let c = (ring + 1) * segments + seg;
            let d = (ring + 1) * segments + next_seg;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    indices
}

/// Flat disc in the z = 0 plane, built as a fan around the center.
fn disc(segments: u16) -> MaskGeometry {
    let mut vertices = vec![Point3::new(0.0, 0.0, 0.0)];
    let mut uvs = vec![[0.5, 0.5]];
    for seg in 0..segments {
        let theta = seg as f32 / segments as f32 * 2.0 * PI;
        let (x, y) = (0.5 * theta.cos(), 0.5 * theta.sin());
        vertices.push(Point3::new(x, y, 0.0));
        uvs.push(uv_for(x, y));
    }

    let mut indices = Vec::new();
    for seg in 0..segments {
        let rim = seg + 1;
        let next_rim = (seg + 1) % segments + 1;
        indices.extend_from_slice(&[0, rim, next_rim]);
    }
    MaskGeometry::new(vertices, indices, uvs).expect("disc construction is well-formed")
}

/// Flat unit quad, corners at ±0.5.
fn quad() -> MaskGeometry {
    let vertices = vec![
        Point3::new(-0.5, -0.5, 0.0),
        Point3::new(0.5, -0.5, 0.0),
        Point3::new(0.5, 0.5, 0.0),
        Point3::new(-0.5, 0.5, 0.0),
    ];
    let uvs = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    MaskGeometry::new(vertices, vec![0, 1, 2, 0, 2, 3], uvs)
        .expect("quad construction is well-formed")
}

/// Mesh derived from live landmarks: a fan from the face centroid to the
/// closed outline (jaw, then brows right-to-left across the top).
///
/// Vertices are frame-anchored (`point − 0.5`), so the mapper's
/// `v.xy + 0.5` recovers the landmark positions exactly.
pub fn from_face_mesh(mesh: &FaceMesh) -> MaskGeometry {
    let outline: Vec<usize> = schema::JAW
        .chain(schema::LEFT_BROW.rev())
        .chain(schema::RIGHT_BROW.rev())
        .collect();

    let centroid = {
        let mut x = 0.0;
        let mut y = 0.0;
        for &i in &outline {
            x += mesh.points[i].x;
            y += mesh.points[i].y;
        }
        let n = outline.len() as f32;
        (x / n, y / n)
    };

    let mut vertices = vec![Point3::new(centroid.0 - 0.5, centroid.1 - 0.5, 0.12)];
    let mut uvs = vec![[centroid.0, centroid.1]];
    for &i in &outline {
        let p = mesh.points[i];
        vertices.push(Point3::new(p.x - 0.5, p.y - 0.5, 0.0));
        uvs.push([p.x, p.y]);
    }

    let n = outline.len() as u16;
    let mut indices = Vec::new();
    for seg in 0..n {
        let a = seg + 1;
        let b = (seg + 1) % n + 1;
        indices.extend_from_slice(&[0, a, b]);
    }
    MaskGeometry::new(vertices, indices, uvs).expect("landmark fan is well-formed")
}
