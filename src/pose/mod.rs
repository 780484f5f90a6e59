// Pose domain — head rotation, screen placement, landmark UV mapping.

pub mod mapping;
pub mod placement;
pub mod transform;

pub use mapping::{barycentric, extract_anchors, Anchor, FaceMapper, ANCHOR_TRIANGLES};
pub use placement::{placement_3d, sticker_placement, Placement, FOV_Y, HEAD_SCALE};
pub use transform::{euler_from_matrix, perspective, rotation_matrix};
