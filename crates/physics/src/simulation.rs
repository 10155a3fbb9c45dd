//! # Arm Simulation Core
//!
//! [`ArmSim`] owns the joint state of one arm and advances it one control
//! cycle per [`Simulator::step`]. Randomness (reset noise) comes from a
//! seeded generator owned by the simulator, so two simulators built with the
//! same seed produce identical trajectories for identical actions.

use crate::error::PhysicsError;
use crate::integrator::{integrate_positions, relax_velocities};
use crate::kinematics::forward_kinematics;
use crate::robot::{RobotSpec, NUM_JOINTS};
use crate::types::ArmState;
use serde::{Deserialize, Serialize};

/// Interface a task environment needs from a physics backend.
pub trait Simulator {
    /// Number of action components consumed by [`Simulator::step`].
    fn action_dim(&self) -> usize;

    /// Number of joints reported in [`ArmState`].
    fn num_joints(&self) -> usize;

    /// Radius of the reachable workspace around the base-frame origin.
    fn workspace_radius(&self) -> f32;

    /// Put the simulator into a fresh initial state and return it.
    fn reset(&mut self) -> ArmState;

    /// Apply one control cycle with actions in `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::ActionDim`] for a malformed action and
    /// [`PhysicsError::Diverged`] when the resulting state is not physical.
    fn step(&mut self, action: &[f32]) -> Result<ArmState, PhysicsError>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Control cycles per simulated second.
    pub control_freq: f32,
    /// Integration substeps per control cycle.
    pub substeps: usize,
    /// Half-width of the uniform noise added to the home pose on reset (rad).
    pub initialization_noise: f32,
    /// Joint speed above which the state is considered diverged (rad/s).
    pub divergence_speed: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            control_freq: 20.0,
            substeps: 1,
            initialization_noise: 0.02,
            divergence_speed: 50.0,
        }
    }
}

impl SimConfig {
    fn validate(&self, spec: &RobotSpec) -> Result<(), PhysicsError> {
        if !(self.control_freq.is_finite() && self.control_freq > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "control_freq must be positive, got {}",
                self.control_freq
            )));
        }
        if self.substeps == 0 {
            return Err(PhysicsError::InvalidConfig("substeps must be at least 1".into()));
        }
        if !(self.initialization_noise >= 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "initialization_noise must be non-negative, got {}",
                self.initialization_noise
            )));
        }
        if !(self.divergence_speed.is_finite() && self.divergence_speed > spec.max_joint_speed) {
            return Err(PhysicsError::InvalidConfig(format!(
                "divergence_speed must exceed the max joint speed {}, got {}",
                spec.max_joint_speed, self.divergence_speed
            )));
        }
        Ok(())
    }
}

/// Kinematic three-joint arm driven by joint velocity commands.
pub struct ArmSim {
    spec: RobotSpec,
    config: SimConfig,
    pos: [f32; NUM_JOINTS],
    vel: [f32; NUM_JOINTS],
    rng: fastrand::Rng,
}

impl ArmSim {
    /// Build a simulator resting at the robot's home pose.
    ///
    /// # Errors
    ///
    /// Fails if the robot description or the simulator configuration is invalid.
    pub fn new(spec: RobotSpec, config: SimConfig, seed: u64) -> Result<Self, PhysicsError> {
        spec.validate()?;
        config.validate(&spec)?;
        Ok(Self {
            pos: spec.home,
            vel: [0.0; NUM_JOINTS],
            spec,
            config,
            rng: fastrand::Rng::with_seed(seed),
        })
    }

    #[must_use]
    pub fn spec(&self) -> &RobotSpec {
        &self.spec
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Control period in seconds.
    #[must_use]
    pub fn dt(&self) -> f32 {
        1.0 / self.config.control_freq
    }

    #[must_use]
    pub fn state(&self) -> ArmState {
        ArmState {
            joint_pos: self.pos.to_vec(),
            joint_vel: self.vel.to_vec(),
            eef_pos: forward_kinematics(&self.spec, &self.pos),
        }
    }

    /// Overwrite the joint state, bypassing limits. Used to script scenarios.
    pub fn set_joint_state(&mut self, pos: [f32; NUM_JOINTS], vel: [f32; NUM_JOINTS]) {
        self.pos = pos;
        self.vel = vel;
    }

    fn check_stability(&self) -> Result<(), PhysicsError> {
        for joint in 0..NUM_JOINTS {
            let (q, qd) = (self.pos[joint], self.vel[joint]);
            if !q.is_finite() || !qd.is_finite() {
                return Err(PhysicsError::Diverged(format!(
                    "joint {joint} state is not finite (q={q}, qd={qd})"
                )));
            }
            if qd.abs() > self.config.divergence_speed {
                return Err(PhysicsError::Diverged(format!(
                    "joint {joint} speed {qd} exceeds {}",
                    self.config.divergence_speed
                )));
            }
        }
        Ok(())
    }
}

impl Simulator for ArmSim {
    fn action_dim(&self) -> usize {
        NUM_JOINTS
    }

    fn num_joints(&self) -> usize {
        NUM_JOINTS
    }

    fn workspace_radius(&self) -> f32 {
        self.spec.reach()
    }

    fn reset(&mut self) -> ArmState {
        let noise = self.config.initialization_noise;
        for joint in 0..NUM_JOINTS {
            let [lo, hi] = self.spec.joint_limits[joint];
            let offset = (self.rng.f32() * 2.0 - 1.0) * noise;
            self.pos[joint] = (self.spec.home[joint] + offset).clamp(lo, hi);
        }
        self.vel = [0.0; NUM_JOINTS];
        self.state()
    }

    fn step(&mut self, action: &[f32]) -> Result<ArmState, PhysicsError> {
        if action.len() != NUM_JOINTS {
            return Err(PhysicsError::ActionDim {
                expected: NUM_JOINTS,
                got: action.len(),
            });
        }
        let mut target = [0.0; NUM_JOINTS];
        for (t, a) in target.iter_mut().zip(action) {
            *t = a.clamp(-1.0, 1.0) * self.spec.max_joint_speed;
        }

        let dt = self.dt() / self.config.substeps as f32;
        for _ in 0..self.config.substeps {
            relax_velocities(&mut self.vel, &target, self.spec.velocity_gain);
            integrate_positions(&mut self.pos, &mut self.vel, &self.spec.joint_limits, dt);
        }

        self.check_stability()?;
        Ok(self.state())
    }
}
