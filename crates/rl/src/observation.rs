//! Fixed-schema observation record.
//!
//! Field order of the flattened vector (schema version 1), for an arm with
//! `n` joints:
//!
//! | Index           | Field        | Meaning                                   |
//! |-----------------|--------------|-------------------------------------------|
//! | `0..n`          | `joint_pos`  | joint positions (rad)                     |
//! | `n..2n`         | `joint_vel`  | joint velocities (rad/s)                  |
//! | `2n..2n+3`      | `eef_pos`    | end-effector position, base frame (m)     |
//! | `2n+3..2n+6`    | `goal_delta` | `goal - eef_pos` (m)                      |
//!
//! Changing the order or adding a field requires bumping
//! [`OBSERVATION_VERSION`], since saved policies and normalization statistics
//! are indexed by position.

use physics::{ArmState, Vec3};

pub const OBSERVATION_VERSION: u32 = 1;

/// Field names in flattening order.
pub const OBSERVATION_FIELDS: [&str; 4] = ["joint_pos", "joint_vel", "eef_pos", "goal_delta"];

#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub joint_pos: Vec<f32>,
    pub joint_vel: Vec<f32>,
    pub eef_pos: Vec3,
    pub goal_delta: Vec3,
}

impl Observation {
    #[must_use]
    pub fn from_state(state: &ArmState, goal: Vec3) -> Self {
        Self {
            joint_pos: state.joint_pos.clone(),
            joint_vel: state.joint_vel.clone(),
            eef_pos: state.eef_pos,
            goal_delta: goal - state.eef_pos,
        }
    }

    /// Flattened length for an arm with `num_joints` joints.
    #[must_use]
    pub const fn dim(num_joints: usize) -> usize {
        2 * num_joints + 6
    }

    /// Distance from the end-effector to the goal.
    #[must_use]
    pub fn distance(&self) -> f32 {
        self.goal_delta.norm()
    }

    #[must_use]
    pub fn flatten(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(Self::dim(self.joint_pos.len()));
        self.write_into(&mut out);
        out
    }

    /// Append the flattened fields to `out`.
    pub fn write_into(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.joint_pos);
        out.extend_from_slice(&self.joint_vel);
        out.extend_from_slice(&self.eef_pos.to_array());
        out.extend_from_slice(&self.goal_delta.to_array());
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.joint_pos.iter().chain(&self.joint_vel).all(|v| v.is_finite())
            && self.eef_pos.is_finite()
            && self.goal_delta.is_finite()
    }
}
