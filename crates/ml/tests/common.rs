#![allow(dead_code)]

use ml::{BoxSpace, Env, EnvError, EpisodeStats, StepInfo, Transition};

/// One-step bandit: the reward peaks when the action equals `best`.
pub struct Bandit {
    pub best: f32,
    obs_space: BoxSpace,
    act_space: BoxSpace,
}

impl Bandit {
    pub fn new(best: f32) -> Self {
        Self {
            best,
            obs_space: BoxSpace::uniform(1, -1.0, 1.0),
            act_space: BoxSpace::uniform(1, -1.0, 1.0),
        }
    }
}

impl Env for Bandit {
    fn observation_space(&self) -> &BoxSpace {
        &self.obs_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.act_space
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        Ok(vec![1.0])
    }

    fn step(&mut self, action: &[f32]) -> Result<Transition, EnvError> {
        let reward = -(action[0] - self.best).powi(2);
        Ok(Transition {
            obs: vec![1.0],
            reward,
            done: true,
            info: StepInfo {
                episode: Some(EpisodeStats { ret: reward, len: 1 }),
                is_success: (action[0] - self.best).abs() < 0.1,
                ..StepInfo::default()
            },
        })
    }
}

/// Counts steps and truncates after `horizon`; the observation is the step
/// index within the episode.
pub struct Counter {
    pub horizon: usize,
    pub t: usize,
    pub resets: usize,
    space: BoxSpace,
}

impl Counter {
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            t: 0,
            resets: 0,
            space: BoxSpace::uniform(1, -1.0, 1.0),
        }
    }
}

impl Env for Counter {
    fn observation_space(&self) -> &BoxSpace {
        &self.space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.space
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.t = 0;
        self.resets += 1;
        Ok(vec![0.0])
    }

    fn step(&mut self, action: &[f32]) -> Result<Transition, EnvError> {
        if action.len() != 1 {
            return Err(EnvError::ActionDim {
                expected: 1,
                got: action.len(),
            });
        }
        self.t += 1;
        let done = self.t >= self.horizon;
        Ok(Transition {
            obs: vec![self.t as f32],
            reward: 1.0,
            done,
            info: StepInfo {
                truncated: done,
                episode: done.then_some(EpisodeStats {
                    ret: self.horizon as f32,
                    len: self.horizon,
                }),
                ..StepInfo::default()
            },
        })
    }
}
