//! Goal-reaching task on top of a [`Simulator`].
//!
//! [`ReachTask`] turns a bare arm simulator into a finite-horizon episodic
//! problem: it owns the goal, counts steps, computes the shaped reward and
//! decides when an episode is over. The simulator owns the physical state;
//! the task only keeps the last valid observation so it can end an episode
//! cleanly when the simulator diverges.

use crate::error::ConfigurationError;
use crate::goal::GoalSpec;
use crate::observation::Observation;
use crate::reward::RewardConfig;
use ml::{EnvError, StepInfo};
use physics::{ArmSim, PhysicsError, SimConfig, Simulator};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Steps after which an episode is truncated.
    pub horizon: usize,
    /// Success radius around the goal (m), unless the goal overrides it.
    pub tolerance: f32,
    /// Dense shaped reward when true, success-only reward otherwise.
    pub reward_shaping: bool,
    pub reward: RewardConfig,
    /// End the episode as soon as the end-effector is inside the tolerance.
    pub terminate_on_success: bool,
    pub sim: SimConfig,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            horizon: 200,
            tolerance: 0.02,
            reward_shaping: true,
            reward: RewardConfig::default(),
            terminate_on_success: true,
            sim: SimConfig::default(),
        }
    }
}

impl TaskConfig {
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] for a zero horizon, a
    /// non-positive tolerance or negative reward weights.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.horizon == 0 {
            return Err(ConfigurationError::Invalid("task horizon must be at least 1".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigurationError::Invalid(format!(
                "task tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        self.reward.validate().map_err(ConfigurationError::Invalid)
    }
}

/// Outcome of one [`ReachTask::step`].
#[derive(Clone, Debug)]
pub struct TaskStep {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No episode started yet, or the last one has ended.
    Idle,
    Running,
}

pub struct ReachTask<S = ArmSim> {
    sim: S,
    config: TaskConfig,
    goal: GoalSpec,
    steps: usize,
    phase: Phase,
    last_obs: Option<Observation>,
}

impl<S: Simulator> ReachTask<S> {
    /// # Errors
    ///
    /// Fails for an invalid task configuration.
    pub fn new(sim: S, config: TaskConfig, goal: GoalSpec) -> Result<Self, ConfigurationError> {
        config.validate()?;
        warn_if_out_of_reach(&sim, &goal);
        Ok(Self {
            sim,
            config,
            goal,
            steps: 0,
            phase: Phase::Idle,
            last_obs: None,
        })
    }

    /// Replace the goal. Only allowed between episodes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EpisodeInProgress`] while an episode is
    /// running. A goal outside the arm's workspace is accepted; the policy can
    /// only learn to get as close as possible.
    pub fn configure(&mut self, goal: GoalSpec) -> Result<(), ConfigurationError> {
        if self.phase == Phase::Running {
            return Err(ConfigurationError::EpisodeInProgress);
        }
        warn_if_out_of_reach(&self.sim, &goal);
        self.goal = goal;
        Ok(())
    }

    pub fn reset(&mut self) -> Observation {
        let state = self.sim.reset();
        let obs = Observation::from_state(&state, self.goal.target_position());
        self.steps = 0;
        self.phase = Phase::Running;
        self.last_obs = Some(obs.clone());
        obs
    }

    /// Advance one control cycle.
    ///
    /// A diverged simulator ends the episode with `info.unstable` set and the
    /// last valid observation; it is not reported as an error.
    ///
    /// # Errors
    ///
    /// Fails when no episode is running or the action has the wrong length.
    pub fn step(&mut self, action: &[f32]) -> Result<TaskStep, EnvError> {
        let Some(prev) = self.last_obs.as_ref().filter(|_| self.phase == Phase::Running) else {
            return Err(EnvError::NotReset);
        };
        if action.len() != self.sim.action_dim() {
            return Err(EnvError::ActionDim {
                expected: self.sim.action_dim(),
                got: action.len(),
            });
        }

        let tolerance = self.tolerance();
        let (observation, unstable) = match self.sim.step(action) {
            Ok(state) => (
                Observation::from_state(&state, self.goal.target_position()),
                false,
            ),
            Err(PhysicsError::Diverged(reason)) => {
                warn!(step = self.steps + 1, %reason, "simulation unstable, ending episode");
                (prev.clone(), true)
            }
            Err(e) => return Err(EnvError::Backend(Box::new(e))),
        };
        self.steps += 1;

        let distance = observation.distance();
        let is_success = !unstable && distance < tolerance;
        let reward = if self.config.reward_shaping {
            self.config.reward.shaped(distance, action, is_success)
        } else {
            self.config.reward.sparse(is_success)
        };

        let terminated = unstable || (is_success && self.config.terminate_on_success);
        let truncated = !terminated && self.steps >= self.config.horizon;
        let done = terminated || truncated;
        if done {
            debug!(steps = self.steps, distance, is_success, "episode finished");
            self.phase = Phase::Idle;
        }
        self.last_obs = Some(observation.clone());

        Ok(TaskStep {
            observation,
            reward,
            done,
            info: StepInfo {
                truncated,
                is_success,
                unstable,
                distance: Some(distance),
                ..StepInfo::default()
            },
        })
    }

    /// Success radius in effect: the goal's override or the task default.
    #[must_use]
    pub fn tolerance(&self) -> f32 {
        self.goal.tolerance().unwrap_or(self.config.tolerance)
    }

    #[must_use]
    pub fn goal(&self) -> &GoalSpec {
        &self.goal
    }

    #[must_use]
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    #[must_use]
    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    /// Steps taken in the current (or last) episode.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    #[must_use]
    pub fn episode_running(&self) -> bool {
        self.phase == Phase::Running
    }

    #[must_use]
    pub fn observation_dim(&self) -> usize {
        Observation::dim(self.sim.num_joints())
    }

    #[must_use]
    pub fn action_dim(&self) -> usize {
        self.sim.action_dim()
    }
}

fn warn_if_out_of_reach(sim: &impl Simulator, goal: &GoalSpec) {
    let distance = goal.target_position().norm();
    let reach = sim.workspace_radius();
    if distance > reach {
        warn!(distance, reach, "goal lies outside the arm's workspace");
    }
}
