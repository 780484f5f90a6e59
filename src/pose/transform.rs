use nalgebra::{Matrix4, Perspective3, Rotation3, Vector3};

use crate::face::types::EulerAngles;

/// Compose the head rotation R = Rz(roll)·Ry(yaw)·Rx(pitch).
pub fn rotation_matrix(euler: EulerAngles) -> Matrix4<f32> {
    // nalgebra's euler order is exactly Rz·Ry·Rx with arguments
    // (about-x, about-y, about-z).
    Rotation3::from_euler_angles(euler.pitch, euler.yaw, euler.roll).to_homogeneous()
}

/// Recover euler angles from a rotation matrix. Valid away from gimbal
/// lock (|pitch|, |roll| < π/2).
pub fn euler_from_matrix(m: &Matrix4<f32>) -> EulerAngles {
    let rot = Rotation3::from_matrix_unchecked(m.fixed_view::<3, 3>(0, 0).into_owned());
    let (pitch, yaw, roll) = rot.euler_angles();
    EulerAngles { pitch, yaw, roll }
}

pub fn translation(v: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::new_translation(&v)
}

pub fn scaling(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(x, y, z))
}

/// Right-handed perspective projection.
pub fn perspective(aspect: f32, fovy: f32, near: f32, far: f32) -> Matrix4<f32> {
    Perspective3::new(aspect, fovy, near, far).to_homogeneous()
}
