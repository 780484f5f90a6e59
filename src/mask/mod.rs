// Mask domain — overlay geometry variants and the landmark-derived mesh.

pub mod geometry;
pub mod shapes;

pub use geometry::MaskGeometry;
pub use shapes::{from_face_mesh, MaskStyle};
