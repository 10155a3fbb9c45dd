//! Online observation and reward normalization for a batched environment.

use crate::error::CheckpointError;
use crate::running_stats::RunningMeanStd;
use ml::{BoxSpace, EnvError, VecEnv, VecStep};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub norm_obs: bool,
    pub norm_reward: bool,
    pub clip_obs: f32,
    pub clip_reward: f32,
    /// Discount of the return whose spread scales rewards.
    pub gamma: f32,
    pub epsilon: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            norm_obs: true,
            norm_reward: true,
            clip_obs: 10.0,
            clip_reward: 10.0,
            gamma: 0.99,
            epsilon: 1e-8,
        }
    }
}

/// Everything a [`VecNormalize`] needs to continue where it left off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizationState {
    pub config: NormalizeConfig,
    pub obs_rms: RunningMeanStd,
    pub ret_rms: RunningMeanStd,
}

/// Normalizing wrapper around a [`VecEnv`].
///
/// Observations become `(o - mean) / sqrt(var + eps)` clipped to
/// `clip_obs`. Rewards are divided by the running standard deviation of the
/// discounted return and clipped to `clip_reward`; their mean is not removed,
/// so the sign of the reward is preserved.
///
/// Statistics are only updated from observations returned by `step` while in
/// training mode, once per environment per step. The observation count
/// therefore equals the number of interactions consumed.
pub struct VecNormalize<V> {
    venv: V,
    config: NormalizeConfig,
    obs_rms: RunningMeanStd,
    ret_rms: RunningMeanStd,
    returns: Vec<f64>,
    training: bool,
    old_obs: Vec<Vec<f32>>,
    old_rewards: Vec<f32>,
}

impl<V: VecEnv> VecNormalize<V> {
    pub fn new(venv: V, config: NormalizeConfig) -> Self {
        let dim = venv.observation_space().dim();
        let state = NormalizationState {
            config,
            obs_rms: RunningMeanStd::new(dim),
            ret_rms: RunningMeanStd::new(1),
        };
        Self::assemble(venv, state)
    }

    /// Rebind saved statistics to a freshly built environment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::DimensionMismatch`] if the statistics were
    /// collected for a different observation size.
    pub fn from_state(venv: V, state: NormalizationState) -> Result<Self, CheckpointError> {
        let dim = venv.observation_space().dim();
        if state.obs_rms.dim() != dim {
            return Err(CheckpointError::DimensionMismatch {
                what: "normalization",
                expected: dim,
                found: state.obs_rms.dim(),
            });
        }
        if state.ret_rms.dim() != 1 {
            return Err(CheckpointError::DimensionMismatch {
                what: "return normalization",
                expected: 1,
                found: state.ret_rms.dim(),
            });
        }
        Ok(Self::assemble(venv, state))
    }

    fn assemble(venv: V, state: NormalizationState) -> Self {
        let n = venv.num_envs();
        Self {
            venv,
            config: state.config,
            obs_rms: state.obs_rms,
            ret_rms: state.ret_rms,
            returns: vec![0.0; n],
            training: true,
            old_obs: Vec::new(),
            old_rewards: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> NormalizationState {
        NormalizationState {
            config: self.config.clone(),
            obs_rms: self.obs_rms.clone(),
            ret_rms: self.ret_rms.clone(),
        }
    }

    /// Freeze (`false`) or resume (`true`) statistics updates.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    #[must_use]
    pub fn is_training(&self) -> bool {
        self.training
    }

    #[must_use]
    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    #[must_use]
    pub fn obs_rms(&self) -> &RunningMeanStd {
        &self.obs_rms
    }

    #[must_use]
    pub fn ret_rms(&self) -> &RunningMeanStd {
        &self.ret_rms
    }

    #[must_use]
    pub fn normalize_obs(&self, obs: &[f32]) -> Vec<f32> {
        if self.config.norm_obs {
            self.obs_rms.normalize(obs, self.config.clip_obs, self.config.epsilon)
        } else {
            obs.to_vec()
        }
    }

    #[must_use]
    pub fn normalize_reward(&self, reward: f32) -> f32 {
        if !self.config.norm_reward {
            return reward;
        }
        let std = (self.ret_rms.var()[0] + self.config.epsilon).sqrt();
        ((f64::from(reward) / std) as f32).clamp(-self.config.clip_reward, self.config.clip_reward)
    }

    /// Raw observations from the last `reset` or `step`.
    #[must_use]
    pub fn original_obs(&self) -> &[Vec<f32>] {
        &self.old_obs
    }

    /// Raw rewards from the last `step`.
    #[must_use]
    pub fn original_rewards(&self) -> &[f32] {
        &self.old_rewards
    }

    #[must_use]
    pub fn venv(&self) -> &V {
        &self.venv
    }

    pub fn venv_mut(&mut self) -> &mut V {
        &mut self.venv
    }

    fn update_returns(&mut self, rewards: &[f32]) {
        let gamma = f64::from(self.config.gamma);
        for (ret, r) in self.returns.iter_mut().zip(rewards) {
            *ret = *ret * gamma + f64::from(*r);
        }
        let batch: Vec<Vec<f32>> = self.returns.iter().map(|r| vec![*r as f32]).collect();
        self.ret_rms.update(&batch);
    }
}

impl<V: VecEnv> VecEnv for VecNormalize<V> {
    fn num_envs(&self) -> usize {
        self.venv.num_envs()
    }

    fn observation_space(&self) -> &BoxSpace {
        self.venv.observation_space()
    }

    fn action_space(&self) -> &BoxSpace {
        self.venv.action_space()
    }

    fn reset(&mut self) -> Result<Vec<Vec<f32>>, EnvError> {
        let obs = self.venv.reset()?;
        self.returns.iter_mut().for_each(|r| *r = 0.0);
        let normalized = obs.iter().map(|o| self.normalize_obs(o)).collect();
        self.old_obs = obs;
        Ok(normalized)
    }

    fn step(&mut self, actions: &[Vec<f32>]) -> Result<VecStep, EnvError> {
        let VecStep {
            obs,
            rewards,
            dones,
            mut infos,
        } = self.venv.step(actions)?;

        if self.training && self.config.norm_obs {
            self.obs_rms.update(&obs);
        }
        let normalized_obs = obs.iter().map(|o| self.normalize_obs(o)).collect();
        for info in &mut infos {
            if let Some(terminal) = info.terminal_observation.take() {
                info.terminal_observation = Some(self.normalize_obs(&terminal));
            }
        }

        if self.training && self.config.norm_reward {
            self.update_returns(&rewards);
        }
        let normalized_rewards = rewards.iter().map(|r| self.normalize_reward(*r)).collect();

        for (ret, done) in self.returns.iter_mut().zip(&dones) {
            if *done {
                *ret = 0.0;
            }
        }
        self.old_obs = obs;
        self.old_rewards = rewards;

        Ok(VecStep {
            obs: normalized_obs,
            rewards: normalized_rewards,
            dones,
            infos,
        })
    }
}
