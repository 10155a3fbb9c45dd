use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("expected {expected} actions, one per environment, got {got}")]
    BatchSize { expected: usize, got: usize },
    #[error("action has {got} components, expected {expected}")]
    ActionDim { expected: usize, got: usize },
    #[error("action component {index} is not finite")]
    NonFiniteAction { index: usize },
    #[error("step called before reset")]
    NotReset,
    #[error("environment error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// An axis-aligned box of real vectors, `low[i] <= x[i] <= high[i]`.
///
/// Bounds may be infinite for unbounded observation components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
}

impl BoxSpace {
    #[must_use]
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "bounds must have the same length");
        Self { low, high }
    }

    /// Every component bounded by the same interval.
    #[must_use]
    pub fn uniform(dim: usize, low: f32, high: f32) -> Self {
        Self::new(vec![low; dim], vec![high; dim])
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.low.iter().chain(&self.high).all(|b| b.is_finite())
    }

    #[must_use]
    pub fn contains(&self, x: &[f32]) -> bool {
        x.len() == self.dim()
            && x.iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Component-wise clamp into the box.
    #[must_use]
    pub fn clip(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .zip(self.low.iter().zip(&self.high))
            .map(|(v, (lo, hi))| v.max(*lo).min(*hi))
            .collect()
    }

    /// Uniform sample from a bounded box; unbounded components are drawn
    /// from a standard normal instead.
    #[must_use]
    pub fn sample(&self, rng: &fastrand::Rng) -> Vec<f32> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(lo, hi)| {
                if lo.is_finite() && hi.is_finite() {
                    lo + rng.f32() * (hi - lo)
                } else {
                    crate::policy::standard_normal(rng)
                }
            })
            .collect()
    }
}

/// Summary of a finished episode, measured on the raw reward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub ret: f32,
    pub len: usize,
}

/// Diagnostics attached to every step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInfo {
    /// The episode ended because it ran out of time, not because the task
    /// reached a terminal state.
    pub truncated: bool,
    pub is_success: bool,
    /// The simulator reported a non-physical state and the episode was cut.
    pub unstable: bool,
    /// Task-specific distance to the goal, when the task has one.
    pub distance: Option<f32>,
    /// Set on the last step of an episode.
    pub episode: Option<EpisodeStats>,
    /// Final observation of an episode that a vectorized wrapper auto-reset.
    pub terminal_observation: Option<Vec<f32>>,
}

#[derive(Clone, Debug)]
pub struct Transition {
    pub obs: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Reinforcement learning environment trait.
///
/// Inspired by classic frameworks like OpenAI Gym, this trait defines the core
/// interface an environment must provide. Each call to [`step`] advances the
/// simulation by one action and returns the new observation vector, a reward
/// signal, whether the episode has terminated, and step diagnostics.
///
/// [`step`]: Env::step
pub trait Env {
    fn observation_space(&self) -> &BoxSpace;

    fn action_space(&self) -> &BoxSpace;

    /// Reset the environment to a starting state and return the initial
    /// observation vector.
    ///
    /// # Errors
    ///
    /// Implementations fail when the environment cannot produce a state.
    fn reset(&mut self) -> Result<Vec<f32>, EnvError>;

    /// Advance the environment by one action.
    ///
    /// # Errors
    ///
    /// Implementations fail for malformed actions or when stepping is not
    /// currently allowed.
    fn step(&mut self, action: &[f32]) -> Result<Transition, EnvError>;

    /// Size of the observation vector.
    fn obs_size(&self) -> usize {
        self.observation_space().dim()
    }

    /// Size of the action vector.
    fn action_size(&self) -> usize {
        self.action_space().dim()
    }
}

/// Result of one batched step; index `i` belongs to environment `i`.
#[derive(Clone, Debug, Default)]
pub struct VecStep {
    pub obs: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub infos: Vec<StepInfo>,
}

/// A batch of environments stepped in lockstep.
///
/// Environments that finish an episode are reset automatically inside
/// [`VecEnv::step`]: the returned observation is the first one of the new
/// episode and the last one of the old episode is moved into
/// [`StepInfo::terminal_observation`].
pub trait VecEnv {
    fn num_envs(&self) -> usize;

    fn observation_space(&self) -> &BoxSpace;

    fn action_space(&self) -> &BoxSpace;

    /// # Errors
    ///
    /// Propagates the first failing environment's error.
    fn reset(&mut self) -> Result<Vec<Vec<f32>>, EnvError>;

    /// # Errors
    ///
    /// Fails if `actions.len()` differs from [`VecEnv::num_envs`] or any
    /// environment rejects its action.
    fn step(&mut self, actions: &[Vec<f32>]) -> Result<VecStep, EnvError>;
}

/// Runs its environments sequentially on the calling thread.
pub struct DummyVecEnv<E> {
    envs: Vec<E>,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl<E: Env> DummyVecEnv<E> {
    /// # Panics
    ///
    /// Panics if `envs` is empty or the environments disagree on their spaces.
    #[must_use]
    pub fn new(envs: Vec<E>) -> Self {
        assert!(!envs.is_empty(), "DummyVecEnv needs at least one environment");
        let observation_space = envs[0].observation_space().clone();
        let action_space = envs[0].action_space().clone();
        assert!(
            envs.iter().all(|e| e.observation_space() == &observation_space
                && e.action_space() == &action_space),
            "all environments must share observation and action spaces"
        );
        Self {
            envs,
            observation_space,
            action_space,
        }
    }

    pub fn from_fn(num_envs: usize, make_env: impl FnMut(usize) -> E) -> Self {
        Self::new((0..num_envs).map(make_env).collect())
    }

    #[must_use]
    pub fn envs(&self) -> &[E] {
        &self.envs
    }

    pub fn envs_mut(&mut self) -> &mut [E] {
        &mut self.envs
    }
}

impl<E: Env> VecEnv for DummyVecEnv<E> {
    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    fn reset(&mut self) -> Result<Vec<Vec<f32>>, EnvError> {
        self.envs.iter_mut().map(Env::reset).collect()
    }

    fn step(&mut self, actions: &[Vec<f32>]) -> Result<VecStep, EnvError> {
        if actions.len() != self.envs.len() {
            return Err(EnvError::BatchSize {
                expected: self.envs.len(),
                got: actions.len(),
            });
        }

        let mut out = VecStep::default();
        for (env, action) in self.envs.iter_mut().zip(actions) {
            let Transition {
                obs,
                reward,
                done,
                mut info,
            } = env.step(action)?;
            let obs = if done {
                info.terminal_observation = Some(obs);
                env.reset()?
            } else {
                obs
            };
            out.obs.push(obs);
            out.rewards.push(reward);
            out.dones.push(done);
            out.infos.push(info);
        }
        Ok(out)
    }
}
