use crate::observation::Observation;
use crate::task::ReachTask;
use ml::{BoxSpace, Env, EnvError, EpisodeStats, Transition};
use physics::{ArmSim, Simulator};

/// Presents a [`ReachTask`] through the flat [`Env`] interface.
///
/// Observations are flattened in [`Observation`] field order. Actions must
/// have the declared length and be finite; finite components outside
/// `[-1, 1]` are clamped. Episode return and length are tracked on the raw
/// reward and attached to the last step of every episode.
pub struct GymAdapter<S = ArmSim> {
    task: ReachTask<S>,
    observation_space: BoxSpace,
    action_space: BoxSpace,
    episode_return: f32,
    episode_len: usize,
    episodes: usize,
}

impl<S: Simulator> GymAdapter<S> {
    #[must_use]
    pub fn new(task: ReachTask<S>) -> Self {
        let observation_space =
            BoxSpace::uniform(task.observation_dim(), f32::NEG_INFINITY, f32::INFINITY);
        let action_space = BoxSpace::uniform(task.action_dim(), -1.0, 1.0);
        Self {
            task,
            observation_space,
            action_space,
            episode_return: 0.0,
            episode_len: 0,
            episodes: 0,
        }
    }

    #[must_use]
    pub fn task(&self) -> &ReachTask<S> {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut ReachTask<S> {
        &mut self.task
    }

    /// Episodes completed since construction.
    #[must_use]
    pub fn episodes(&self) -> usize {
        self.episodes
    }
}

impl<S: Simulator> Env for GymAdapter<S> {
    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.episode_return = 0.0;
        self.episode_len = 0;
        Ok(self.task.reset().flatten())
    }

    fn step(&mut self, action: &[f32]) -> Result<Transition, EnvError> {
        if action.len() != self.action_space.dim() {
            return Err(EnvError::ActionDim {
                expected: self.action_space.dim(),
                got: action.len(),
            });
        }
        if let Some(index) = action.iter().position(|a| !a.is_finite()) {
            return Err(EnvError::NonFiniteAction { index });
        }
        let action = self.action_space.clip(action);

        let mut step = self.task.step(&action)?;
        self.episode_return += step.reward;
        self.episode_len += 1;
        if step.done {
            self.episodes += 1;
            step.info.episode = Some(EpisodeStats {
                ret: self.episode_return,
                len: self.episode_len,
            });
        }

        Ok(Transition {
            obs: step.observation.flatten(),
            reward: step.reward,
            done: step.done,
            info: step.info,
        })
    }
}
