//! # Robot Descriptions
//!
//! A [`RobotSpec`] is the data-only description of an arm: link lengths,
//! joint limits and actuation limits. Specs come either from a named preset
//! or from a JSON document such as
//!
//! ```json
//! {
//!   "name": "Reacher3",
//!   "upper_arm": 0.4,
//!   "forearm": 0.4,
//!   "joint_limits": [[-3.14, 3.14], [-1.5, 1.5], [-2.6, 2.6]],
//!   "home": [0.0, 0.8, -1.8]
//! }
//! ```

use crate::error::PhysicsError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of actuated joints: base yaw, shoulder pitch, elbow pitch.
pub const NUM_JOINTS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotSpec {
    pub name: String,
    /// Shoulder to elbow link length (m).
    pub upper_arm: f32,
    /// Elbow to end-effector link length (m).
    pub forearm: f32,
    /// `[lower, upper]` position limit per joint (rad).
    pub joint_limits: [[f32; 2]; NUM_JOINTS],
    /// Joint speed commanded by a unit action (rad/s).
    #[serde(default = "default_max_joint_speed")]
    pub max_joint_speed: f32,
    /// Fraction of the velocity error removed per integration substep.
    #[serde(default = "default_velocity_gain")]
    pub velocity_gain: f32,
    /// Nominal joint configuration that resets are sampled around.
    pub home: [f32; NUM_JOINTS],
}

fn default_max_joint_speed() -> f32 {
    1.0
}

fn default_velocity_gain() -> f32 {
    0.6
}

impl RobotSpec {
    /// Three-joint reduction of a Franka Panda: joints 1, 2 and 4 of the real
    /// arm with the wrist folded into the forearm.
    #[must_use]
    pub fn panda() -> Self {
        Self {
            name: "Panda".to_string(),
            upper_arm: 0.316,
            forearm: 0.384,
            joint_limits: [[-2.8973, 2.8973], [-1.7628, 1.7628], [-3.0718, -0.0698]],
            max_joint_speed: default_max_joint_speed(),
            velocity_gain: default_velocity_gain(),
            home: [0.0, 0.9, -2.0],
        }
    }

    /// Symmetric arm with equal link lengths.
    #[must_use]
    pub fn reacher3() -> Self {
        Self {
            name: "Reacher3".to_string(),
            upper_arm: 0.4,
            forearm: 0.4,
            joint_limits: [
                [-std::f32::consts::PI, std::f32::consts::PI],
                [-1.5, 1.5],
                [-2.6, 2.6],
            ],
            max_joint_speed: default_max_joint_speed(),
            velocity_gain: default_velocity_gain(),
            home: [0.0, 0.8, -1.8],
        }
    }

    /// Look up a preset by name, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::UnknownRobot`] if no preset has that name.
    pub fn named(name: &str) -> Result<Self, PhysicsError> {
        match name.to_ascii_lowercase().as_str() {
            "panda" => Ok(Self::panda()),
            "reacher3" => Ok(Self::reacher3()),
            _ => Err(PhysicsError::UnknownRobot(name.to_string())),
        }
    }

    /// Distance from the shoulder to the end-effector with the arm stretched.
    #[must_use]
    pub fn reach(&self) -> f32 {
        self.upper_arm + self.forearm
    }

    /// Check that the description is physically meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidRobot`] describing the first problem found.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.upper_arm > 0.0 && self.forearm > 0.0) {
            return Err(PhysicsError::InvalidRobot(format!(
                "link lengths must be positive, got {} and {}",
                self.upper_arm, self.forearm
            )));
        }
        if !(self.max_joint_speed.is_finite() && self.max_joint_speed > 0.0) {
            return Err(PhysicsError::InvalidRobot(format!(
                "max_joint_speed must be positive, got {}",
                self.max_joint_speed
            )));
        }
        if !(self.velocity_gain > 0.0 && self.velocity_gain <= 1.0) {
            return Err(PhysicsError::InvalidRobot(format!(
                "velocity_gain must be in (0, 1], got {}",
                self.velocity_gain
            )));
        }
        for (joint, ([lo, hi], home)) in self.joint_limits.iter().zip(self.home).enumerate() {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(PhysicsError::InvalidRobot(format!(
                    "joint {joint} has an empty range [{lo}, {hi}]"
                )));
            }
            if !(*lo..=*hi).contains(&home) {
                return Err(PhysicsError::InvalidRobot(format!(
                    "joint {joint} home position {home} lies outside [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for RobotSpec {
    type Err = PhysicsError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }
}
