//! Forward kinematics for the yaw / pitch / pitch arm.
//!
//! The shoulder sits at the base-frame origin. Joint 0 rotates the arm plane
//! about +z, joints 1 and 2 pitch the upper arm and forearm inside that
//! plane, measured from the horizontal with positive angles lifting the link.

use crate::robot::{RobotSpec, NUM_JOINTS};
use crate::types::Vec3;

/// End-effector position for joint positions `q`.
#[must_use]
pub fn forward_kinematics(spec: &RobotSpec, q: &[f32; NUM_JOINTS]) -> Vec3 {
    let [yaw, shoulder, elbow] = *q;
    let elbow_abs = shoulder + elbow;
    let radial = spec.upper_arm * shoulder.cos() + spec.forearm * elbow_abs.cos();
    let height = spec.upper_arm * shoulder.sin() + spec.forearm * elbow_abs.sin();
    Vec3::new(radial * yaw.cos(), radial * yaw.sin(), height)
}

/// Elbow position for joint positions `q`.
#[must_use]
pub fn elbow_position(spec: &RobotSpec, q: &[f32; NUM_JOINTS]) -> Vec3 {
    let [yaw, shoulder, _] = *q;
    let radial = spec.upper_arm * shoulder.cos();
    Vec3::new(radial * yaw.cos(), radial * yaw.sin(), spec.upper_arm * shoulder.sin())
}
