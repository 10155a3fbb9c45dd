#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
//! # Goal-Reaching Training
//!
//! Orchestration for training a policy that moves an arm's end-effector to a
//! fixed point. The pieces are layered leaf-first:
//!
//! -   [`GoalSpec`]: the target position, validated on construction.
//! -   [`ReachTask`]: a finite-horizon task over any [`physics::Simulator`],
//!     with a shaped reward ([`RewardConfig`]) and a fixed-schema
//!     [`Observation`].
//! -   [`GymAdapter`]: the task behind the flat [`ml::Env`] interface.
//! -   [`VecNormalize`]: batches adapters and normalizes observations and
//!     rewards online with [`RunningMeanStd`].
//! -   [`TrainingSession`]: decides between a fresh start and a resume,
//!     drives the PPO learner, and writes atomic [`Checkpoint`]s.
//!
//! ## Usage
//!
//! ```no_run
//! use rl::{SessionConfig, TrainingSession};
//!
//! let config = SessionConfig::default();
//! let total = config.total_timesteps;
//! let mut session = TrainingSession::new(config)?;
//! let summary = session.run(total)?;
//! println!("trained {} steps", summary.num_timesteps);
//! # Ok::<(), rl::SessionError>(())
//! ```

pub mod adapter;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod goal;
pub mod observation;
pub mod reward;
pub mod running_stats;
pub mod session;
pub mod task;
pub mod telemetry;
pub mod vec_normalize;

pub use adapter::GymAdapter;
pub use checkpoint::{Checkpoint, StagedCheckpoint, FORMAT_VERSION};
pub use config::{RobotChoice, SessionConfig};
pub use error::{CheckpointError, ConfigurationError, SessionError};
pub use goal::GoalSpec;
pub use observation::{Observation, OBSERVATION_FIELDS, OBSERVATION_VERSION};
pub use reward::RewardConfig;
pub use running_stats::RunningMeanStd;
pub use session::{
    random_baseline, EvaluationReport, NormalizedReachEnv, ReachVecEnv, RunSummary, SessionStart,
    TrainingSession,
};
pub use task::{ReachTask, TaskConfig, TaskStep};
pub use telemetry::{JsonlLogger, PROGRESS_FILE};
pub use vec_normalize::{NormalizationState, NormalizeConfig, VecNormalize};
