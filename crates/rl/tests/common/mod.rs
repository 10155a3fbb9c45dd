#![allow(dead_code)]

use ml::{BoxSpace, Env, EnvError, PpoConfig, StepInfo, Transition};
use rl::SessionConfig;
use std::path::Path;

/// Session settings small enough for debug-mode tests.
pub fn quick_config(dir: &Path) -> SessionConfig {
    SessionConfig {
        checkpoint_path: dir.join("model.json"),
        log_dir: Some(dir.join("logs")),
        ppo: PpoConfig {
            n_steps: 64,
            batch_size: 32,
            n_epochs: 2,
            hidden_sizes: vec![16, 16],
            ..PpoConfig::default()
        },
        seed: 3,
        ..SessionConfig::default()
    }
}

/// Always observes `value`, pays `reward`, and ends an episode every
/// `horizon` steps.
pub struct ConstEnv {
    pub value: Vec<f32>,
    pub reward: f32,
    pub horizon: usize,
    t: usize,
    obs_space: BoxSpace,
    act_space: BoxSpace,
}

impl ConstEnv {
    pub fn new(value: Vec<f32>, reward: f32, horizon: usize) -> Self {
        let dim = value.len();
        Self {
            value,
            reward,
            horizon,
            t: 0,
            obs_space: BoxSpace::uniform(dim, f32::NEG_INFINITY, f32::INFINITY),
            act_space: BoxSpace::uniform(1, -1.0, 1.0),
        }
    }
}

impl Env for ConstEnv {
    fn observation_space(&self) -> &BoxSpace {
        &self.obs_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.act_space
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.t = 0;
        Ok(self.value.clone())
    }

    fn step(&mut self, _action: &[f32]) -> Result<Transition, EnvError> {
        self.t += 1;
        let done = self.t >= self.horizon;
        Ok(Transition {
            obs: self.value.clone(),
            reward: self.reward,
            done,
            info: StepInfo {
                truncated: done,
                ..StepInfo::default()
            },
        })
    }
}
