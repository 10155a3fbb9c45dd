//! # Reach: goal-conditioned arm training
//!
//! Welcome to the documentation for Reach, a small workspace that trains a
//! control policy to move a simulated arm's end-effector to a fixed point in
//! space, with PPO against a kinematic simulator.
//!
//! ## Project Architecture
//!
//! -   **`reach`:** The crate you are currently viewing. It is the
//!     documentation entry point and the command-line binary.
//! -   **[`physics`]:** A three-joint velocity-controlled arm simulator with
//!     JSON robot descriptions, forward kinematics and divergence detection.
//! -   **[`ml`]:** Environment traits, small dense networks with hand-written
//!     gradients, Adam, and the PPO learner.
//! -   **[`rl`]:** The reaching task itself: goals, observation schema,
//!     reward shaping, online normalization, checkpoints and the training
//!     session.
//!
//! ## Getting Started
//!
//! ```text
//! reach train --total-steps 25000 --target 0.3 0 0
//! reach evaluate --episodes 20
//! ```
//!
//! Running `train` again with the same checkpoint path continues the run:
//! policy, optimizer moments and normalization statistics are restored.
//! Deleting the checkpoint starts over. Set `RUST_LOG=debug` for per-update
//! detail.

pub use ml;
pub use physics;
pub use rl;
