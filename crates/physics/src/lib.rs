#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::cast_precision_loss)]
//! # Reach Arm Simulator
//!
//! A small kinematic manipulator simulator used as the physics backend for
//! goal-reaching experiments.
//!
//! The crate models a three-joint arm (base yaw, shoulder pitch, elbow pitch)
//! whose joints are driven by velocity commands. It is deliberately simple:
//! there is no contact or gravity model, only joint-space integration with a
//! first-order velocity response and hard joint limits. What it does provide
//! is everything a training loop needs from a simulator: seeded, randomized
//! resets, a fixed control cycle, forward kinematics for the end-effector, and
//! explicit detection of numerically diverged states.
//!
//! ## Key Components
//!
//! -   **Robot models:** [`RobotSpec`] describes link lengths, joint limits
//!     and actuation. Presets are available through [`RobotSpec::named`] and
//!     custom arms can be parsed from JSON.
//! -   **Simulation:** [`ArmSim`] owns the joint state and advances it one
//!     control cycle at a time. It implements the [`Simulator`] trait, which
//!     is the seam higher-level task environments are generic over.
//! -   **Kinematics:** [`forward_kinematics`] maps joint positions to the
//!     end-effector position in the robot base frame.
//!
//! ## Usage
//!
//! ```rust
//! use physics::{ArmSim, RobotSpec, SimConfig, Simulator};
//!
//! let spec = RobotSpec::named("Panda").unwrap();
//! let mut sim = ArmSim::new(spec, SimConfig::default(), 7).unwrap();
//! let start = sim.reset();
//! let next = sim.step(&[0.0, 0.5, -0.5]).unwrap();
//! assert_ne!(start.joint_pos, next.joint_pos);
//! ```

pub mod error;
pub mod integrator;
pub mod kinematics;
pub mod robot;
pub mod simulation;
pub mod types;

pub use error::PhysicsError;
pub use kinematics::forward_kinematics;
pub use robot::{RobotSpec, NUM_JOINTS};
pub use simulation::{ArmSim, SimConfig, Simulator};
pub use types::{ArmState, Vec3};
