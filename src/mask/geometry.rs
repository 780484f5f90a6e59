use nalgebra::{Point3, Vector3};

use crate::error::{PipelineError, Result};

/// Indexed triangle mesh for a mask overlay.
///
/// Vertices live in mask-local space (roughly ±0.5 across the face),
/// indices are u16 triples, and every vertex carries a texture UV.
/// Construction validates `|vertices| == |uvs|` and index bounds, so a
/// built geometry can be rendered without per-frame checks.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGeometry {
    vertices: Vec<Point3<f32>>,
    indices: Vec<u16>,
    uvs: Vec<[f32; 2]>,
    normals: Vec<Vector3<f32>>,
}

impl MaskGeometry {
    pub fn new(vertices: Vec<Point3<f32>>, indices: Vec<u16>, uvs: Vec<[f32; 2]>) -> Result<Self> {
        if vertices.len() != uvs.len() {
            return Err(PipelineError::Config(format!(
                "mask geometry: {} vertices but {} uvs",
                vertices.len(),
                uvs.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(PipelineError::Config(format!(
                "mask geometry: index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(PipelineError::Config(format!(
                "mask geometry: index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        let normals = compute_normals(&vertices, &indices);
        Ok(Self {
            vertices,
            indices,
            uvs,
            normals,
        })
    }

    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Replace the UVs, e.g. with mapper-generated coordinates.
    pub fn set_uvs(&mut self, uvs: Vec<[f32; 2]>) -> Result<()> {
        if uvs.len() != self.vertices.len() {
            return Err(PipelineError::Config(format!(
                "mask geometry: {} uvs for {} vertices",
                uvs.len(),
                self.vertices.len()
            )));
        }
        self.uvs = uvs;
        Ok(())
    }
}

/// Area-weighted smooth vertex normals. Degenerate accumulations fall
/// back to +Z (facing the camera).
fn compute_normals(vertices: &[Point3<f32>], indices: &[u16]) -> Vec<Vector3<f32>> {
    let mut acc = vec![Vector3::zeros(); vertices.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let face = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }
    acc.into_iter()
        .map(|n| {
            let len = n.norm();
            if len.is_finite() && len > 1e-8 && n.iter().all(|c| c.is_finite()) {
                n / len
            } else {
                Vector3::z()
            }
        })
        .collect()
}
