//! Learning building blocks: environment interfaces, small dense networks
//! with hand-written backpropagation, Adam, and a PPO learner.
//!
//! Everything here works on plain `f32` vectors. Networks are tiny (a few
//! thousand parameters) so per-sample loops are fast enough and keep the
//! gradient code easy to audit against finite differences.

pub mod env;
pub mod logger;
pub mod nn;
pub mod optim;
pub mod policy;
pub mod ppo;
pub mod rollout;

pub use env::{
    BoxSpace, DummyVecEnv, Env, EnvError, EpisodeStats, StepInfo, Transition, VecEnv, VecStep,
};
pub use logger::{TracingLogger, TrainingLogger};
pub use nn::{Dense, Mlp};
pub use optim::{clip_grad_norm, Adam};
pub use policy::{Evaluation, GaussianPolicy};
pub use ppo::{Iteration, LearnError, LearnOutcome, Ppo, PpoConfig, PpoState, UpdateReport};
pub use rollout::RolloutBuffer;
