//! Proximal Policy Optimization.
//!
//! One iteration collects `n_steps` batched steps from a [`VecEnv`], computes
//! GAE advantages, then runs `n_epochs` passes of shuffled minibatch updates
//! on the clipped surrogate objective.

use crate::env::{EnvError, EpisodeStats, VecEnv};
use crate::logger::TrainingLogger;
use crate::optim::{clip_grad_norm, Adam};
use crate::policy::GaussianPolicy;
use crate::rollout::RolloutBuffer;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// Episodes kept for the rolling return / length / success statistics.
const STATS_WINDOW: usize = 100;

#[derive(Error, Debug)]
pub enum LearnError {
    #[error("invalid PPO configuration: {0}")]
    Config(String),
    #[error("policy expects {expected_obs} observations and {expected_act} actions, environment has {obs} and {act}")]
    SpaceMismatch {
        expected_obs: usize,
        expected_act: usize,
        obs: usize,
        act: usize,
    },
    #[error("optimizer state does not match the policy parameters")]
    OptimizerMismatch,
    #[error("loss became non-finite during update {0}")]
    NonFinite(u64),
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("failed to record training metrics: {0}")]
    Logger(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    pub learning_rate: f32,
    /// Batched steps collected per iteration.
    pub n_steps: usize,
    pub batch_size: usize,
    pub n_epochs: usize,
    pub gamma: f32,
    pub gae_lambda: f32,
    pub clip_range: f32,
    pub ent_coef: f32,
    pub vf_coef: f32,
    pub max_grad_norm: f32,
    pub hidden_sizes: Vec<usize>,
    pub log_std_init: f32,
    pub seed: u64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            n_steps: 2048,
            batch_size: 64,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.2,
            ent_coef: 0.0,
            vf_coef: 0.5,
            max_grad_norm: 0.5,
            hidden_sizes: vec![64, 64],
            log_std_init: 0.0,
            seed: 0,
        }
    }
}

impl PpoConfig {
    /// # Errors
    ///
    /// Returns [`LearnError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), LearnError> {
        let bad = |msg: String| Err(LearnError::Config(msg));
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return bad(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.n_steps == 0 || self.batch_size == 0 || self.n_epochs == 0 {
            return bad("n_steps, batch_size and n_epochs must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.gamma) || !(0.0..=1.0).contains(&self.gae_lambda) {
            return bad(format!(
                "gamma and gae_lambda must be in [0, 1], got {} and {}",
                self.gamma, self.gae_lambda
            ));
        }
        if !(self.clip_range > 0.0) || !(self.max_grad_norm > 0.0) {
            return bad("clip_range and max_grad_norm must be positive".into());
        }
        if self.hidden_sizes.iter().any(|h| *h == 0) {
            return bad("hidden layer sizes must be non-zero".into());
        }
        Ok(())
    }
}

/// Everything needed to continue training: hyperparameters, network
/// parameters, optimizer moments and the timestep counter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PpoState {
    pub config: PpoConfig,
    pub policy: GaussianPolicy,
    pub optimizer: Adam,
    pub num_timesteps: u64,
    pub updates: u64,
}

/// Metrics for one optimization update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateReport {
    pub update: u64,
    pub num_timesteps: u64,
    pub rollout_steps: usize,
    pub ep_rew_mean: Option<f32>,
    pub ep_len_mean: Option<f32>,
    pub success_rate: Option<f32>,
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy: f32,
    pub approx_kl: f32,
    pub clip_fraction: f32,
    pub explained_variance: f32,
    pub std: f32,
    pub learning_rate: f32,
}

/// What one call to [`Ppo::iterate`] did.
#[derive(Clone, Debug)]
pub struct Iteration {
    /// Environment interactions consumed (steps times environments).
    pub consumed: u64,
    /// `None` when the rollout was cut short and no update ran.
    pub report: Option<UpdateReport>,
    pub interrupted: bool,
}

#[derive(Clone, Debug, Default)]
pub struct LearnOutcome {
    pub consumed: u64,
    pub updates: u64,
    pub interrupted: bool,
    pub last_report: Option<UpdateReport>,
}

pub struct Ppo {
    config: PpoConfig,
    policy: GaussianPolicy,
    optimizer: Adam,
    num_timesteps: u64,
    updates: u64,
    rng: fastrand::Rng,
    last_obs: Option<Vec<Vec<f32>>>,
    episodes: VecDeque<EpisodeStats>,
    successes: VecDeque<bool>,
}

impl Ppo {
    /// Fresh policy for the given observation and action sizes.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn new(config: PpoConfig, obs_dim: usize, act_dim: usize) -> Result<Self, LearnError> {
        config.validate()?;
        let rng = fastrand::Rng::with_seed(config.seed);
        let policy = GaussianPolicy::new(obs_dim, act_dim, &config.hidden_sizes, config.log_std_init, &rng);
        let optimizer = Adam::new(&policy.params(), config.learning_rate);
        Ok(Self::assemble(config, policy, optimizer, 0, 0, rng))
    }

    /// Rebuild a learner from saved state.
    ///
    /// The sampling generator is reseeded from the seed and the timestep
    /// counter, so a resumed run is reproducible but does not replay the
    /// random stream of the run it continues.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the optimizer state does not
    /// fit the policy.
    pub fn from_state(state: PpoState) -> Result<Self, LearnError> {
        state.config.validate()?;
        if !state.optimizer.is_compatible(&state.policy.params()) {
            return Err(LearnError::OptimizerMismatch);
        }
        let rng = fastrand::Rng::with_seed(state.config.seed ^ state.num_timesteps.rotate_left(17));
        Ok(Self::assemble(
            state.config,
            state.policy,
            state.optimizer,
            state.num_timesteps,
            state.updates,
            rng,
        ))
    }

    fn assemble(
        config: PpoConfig,
        policy: GaussianPolicy,
        optimizer: Adam,
        num_timesteps: u64,
        updates: u64,
        rng: fastrand::Rng,
    ) -> Self {
        Self {
            config,
            policy,
            optimizer,
            num_timesteps,
            updates,
            rng,
            last_obs: None,
            episodes: VecDeque::with_capacity(STATS_WINDOW),
            successes: VecDeque::with_capacity(STATS_WINDOW),
        }
    }

    #[must_use]
    pub fn state(&self) -> PpoState {
        PpoState {
            config: self.config.clone(),
            policy: self.policy.clone(),
            optimizer: self.optimizer.clone(),
            num_timesteps: self.num_timesteps,
            updates: self.updates,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    #[must_use]
    pub fn policy(&self) -> &GaussianPolicy {
        &self.policy
    }

    #[must_use]
    pub fn optimizer(&self) -> &Adam {
        &self.optimizer
    }

    #[must_use]
    pub fn num_timesteps(&self) -> u64 {
        self.num_timesteps
    }

    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Action for `obs`: the distribution mean when `deterministic`,
    /// otherwise a sample.
    #[must_use]
    pub fn predict(&self, obs: &[f32], deterministic: bool) -> Vec<f32> {
        if deterministic {
            self.policy.mean(obs)
        } else {
            self.policy.sample(obs, &self.rng).action
        }
    }

    /// Forget the current observations so the next iteration starts by
    /// resetting the environment. Needed when the learner is attached to a
    /// different environment instance.
    pub fn restart_episodes(&mut self) {
        self.last_obs = None;
    }

    fn check_spaces(&self, env: &impl VecEnv) -> Result<(), LearnError> {
        let obs = env.observation_space().dim();
        let act = env.action_space().dim();
        if obs != self.policy.obs_dim() || act != self.policy.act_dim() {
            return Err(LearnError::SpaceMismatch {
                expected_obs: self.policy.obs_dim(),
                expected_act: self.policy.act_dim(),
                obs,
                act,
            });
        }
        Ok(())
    }

    /// Train until `total_timesteps` more interactions have been consumed,
    /// logging every `log_interval` updates.
    ///
    /// # Errors
    ///
    /// Propagates environment, logger and numerical failures.
    pub fn learn(
        &mut self,
        env: &mut impl VecEnv,
        total_timesteps: u64,
        log_interval: u64,
        logger: &mut dyn TrainingLogger,
        stop: &AtomicBool,
    ) -> Result<LearnOutcome, LearnError> {
        self.restart_episodes();
        let mut outcome = LearnOutcome::default();
        while outcome.consumed < total_timesteps {
            let it = self.iterate(env, total_timesteps - outcome.consumed, stop)?;
            outcome.consumed += it.consumed;
            if let Some(report) = it.report {
                outcome.updates += 1;
                if log_interval > 0 && report.update % log_interval == 0 {
                    logger.log_update(&report)?;
                }
                outcome.last_report = Some(report);
            }
            if it.interrupted {
                outcome.interrupted = true;
                break;
            }
        }
        Ok(outcome)
    }

    /// One collect-and-update cycle consuming at most `budget` interactions,
    /// rounded up to whole batched steps.
    ///
    /// # Errors
    ///
    /// Propagates environment failures and reports non-finite losses.
    pub fn iterate(
        &mut self,
        env: &mut impl VecEnv,
        budget: u64,
        stop: &AtomicBool,
    ) -> Result<Iteration, LearnError> {
        self.check_spaces(env)?;
        let n_envs = env.num_envs() as u64;
        let steps = budget.div_ceil(n_envs).min(self.config.n_steps as u64) as usize;

        let mut buffer = RolloutBuffer::new(env.num_envs());
        let interrupted = self.collect_rollouts(env, &mut buffer, steps, stop)?;
        let consumed = buffer.len() as u64;
        if interrupted || buffer.is_empty() {
            return Ok(Iteration {
                consumed,
                report: None,
                interrupted,
            });
        }

        let last_obs = self.last_obs.as_deref().unwrap_or_default();
        let last_values: Vec<f32> = last_obs.iter().map(|o| self.policy.value(o)).collect();
        buffer.compute_returns_and_advantages(&last_values, self.config.gamma, self.config.gae_lambda);

        let mut report = self.train(&buffer)?;
        report.rollout_steps = buffer.steps();
        Ok(Iteration {
            consumed,
            report: Some(report),
            interrupted: false,
        })
    }

    fn collect_rollouts(
        &mut self,
        env: &mut impl VecEnv,
        buffer: &mut RolloutBuffer,
        steps: usize,
        stop: &AtomicBool,
    ) -> Result<bool, LearnError> {
        let mut obs = match self.last_obs.take() {
            Some(obs) => obs,
            None => env.reset()?,
        };
        let action_space = env.action_space().clone();

        for _ in 0..steps {
            if stop.load(Ordering::SeqCst) {
                self.last_obs = Some(obs);
                return Ok(true);
            }

            let samples: Vec<_> = obs.iter().map(|o| self.policy.sample(o, &self.rng)).collect();
            let clipped: Vec<Vec<f32>> = samples.iter().map(|s| action_space.clip(&s.action)).collect();
            let step = match env.step(&clipped) {
                Ok(step) => step,
                Err(e) => {
                    self.last_obs = None;
                    return Err(e.into());
                }
            };
            self.num_timesteps += obs.len() as u64;

            let mut rewards = step.rewards;
            for (i, info) in step.infos.iter().enumerate() {
                if info.truncated {
                    if let Some(terminal) = &info.terminal_observation {
                        rewards[i] += self.config.gamma * self.policy.value(terminal);
                    }
                }
                if let Some(ep) = info.episode {
                    push_window(&mut self.episodes, ep);
                    push_window(&mut self.successes, info.is_success);
                }
            }

            let values: Vec<f32> = samples.iter().map(|s| s.value).collect();
            let log_probs: Vec<f32> = samples.iter().map(|s| s.log_prob).collect();
            let actions = samples.into_iter().map(|s| s.action).collect();
            buffer.push(obs, actions, &rewards, &step.dones, &values, &log_probs);
            obs = step.obs;
        }

        self.last_obs = Some(obs);
        Ok(false)
    }

    #[allow(clippy::too_many_lines)]
    fn train(&mut self, buffer: &RolloutBuffer) -> Result<UpdateReport, LearnError> {
        let n = buffer.len();
        let clip = self.config.clip_range;
        let log_std_idx = self.policy.log_std_index();
        let mut indices: Vec<usize> = (0..n).collect();

        let mut policy_losses = Vec::new();
        let mut value_losses = Vec::new();
        let mut approx_kls = Vec::new();
        let mut clip_fractions = Vec::new();

        for _ in 0..self.config.n_epochs {
            self.rng.shuffle(&mut indices);
            for batch in indices.chunks(self.config.batch_size) {
                let b = batch.len() as f32;
                let advantages = normalized_advantages(buffer, batch);
                let mut grads = self.policy.zero_grads();
                let (mut policy_loss, mut value_loss, mut kl, mut clipped) = (0.0, 0.0, 0.0, 0usize);

                for (&i, &adv) in batch.iter().zip(&advantages) {
                    let eval = self.policy.evaluate(&buffer.obs[i], &buffer.actions[i]);
                    let log_ratio = eval.log_prob - buffer.log_probs[i];
                    let ratio = log_ratio.exp();
                    let surr1 = ratio * adv;
                    let surr2 = ratio.clamp(1.0 - clip, 1.0 + clip) * adv;
                    policy_loss -= surr1.min(surr2);
                    if (ratio - 1.0).abs() > clip {
                        clipped += 1;
                    }
                    kl += (ratio - 1.0) - log_ratio;

                    // the clipped branch is constant in the parameters
                    let d_log_prob = if surr1 <= surr2 { -adv * ratio / b } else { 0.0 };
                    let err = eval.value - buffer.returns[i];
                    value_loss += err * err;
                    let d_value = self.config.vf_coef * 2.0 * err / b;
                    self.policy.backward(&eval, d_log_prob, d_value, &mut grads);
                }

                // entropy bonus: d(-ent_coef * H)/d log_std = -ent_coef
                grads[log_std_idx].iter_mut().for_each(|g| *g -= self.config.ent_coef);

                let (policy_loss, value_loss) = (policy_loss / b, value_loss / b);
                if !(policy_loss.is_finite() && value_loss.is_finite()) {
                    return Err(LearnError::NonFinite(self.updates + 1));
                }
                let grad_norm = clip_grad_norm(&mut grads, self.config.max_grad_norm);
                if !grad_norm.is_finite() {
                    return Err(LearnError::NonFinite(self.updates + 1));
                }
                self.optimizer.step(&mut self.policy.params_mut(), &grads);

                policy_losses.push(policy_loss);
                value_losses.push(value_loss);
                approx_kls.push(kl / b);
                clip_fractions.push(clipped as f32 / b);
            }
        }

        self.updates += 1;
        let report = UpdateReport {
            update: self.updates,
            num_timesteps: self.num_timesteps,
            rollout_steps: 0,
            ep_rew_mean: mean_of(self.episodes.iter().map(|e| e.ret)),
            ep_len_mean: mean_of(self.episodes.iter().map(|e| e.len as f32)),
            success_rate: mean_of(self.successes.iter().map(|s| if *s { 1.0 } else { 0.0 })),
            policy_loss: mean_of(policy_losses.into_iter()).unwrap_or_default(),
            value_loss: mean_of(value_losses.into_iter()).unwrap_or_default(),
            entropy: self.policy.entropy(),
            approx_kl: mean_of(approx_kls.into_iter()).unwrap_or_default(),
            clip_fraction: mean_of(clip_fractions.into_iter()).unwrap_or_default(),
            explained_variance: explained_variance(&buffer.values, &buffer.returns),
            std: mean_of(self.policy.std().into_iter()).unwrap_or_default(),
            learning_rate: self.optimizer.learning_rate(),
        };
        if report.approx_kl > 0.5 {
            warn!(update = report.update, approx_kl = report.approx_kl, "large policy update");
        }
        debug!(?report, "ppo update finished");
        Ok(report)
    }
}

fn push_window<T>(window: &mut VecDeque<T>, item: T) {
    if window.len() == STATS_WINDOW {
        window.pop_front();
    }
    window.push_back(item);
}

fn mean_of(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f32)
}

fn normalized_advantages(buffer: &RolloutBuffer, batch: &[usize]) -> Vec<f32> {
    let adv: Vec<f32> = batch.iter().map(|&i| buffer.advantages[i]).collect();
    if adv.len() < 2 {
        return adv;
    }
    let mean = adv.iter().sum::<f32>() / adv.len() as f32;
    // sample standard deviation, matching the usual torch.std default
    let var = adv.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / (adv.len() - 1) as f32;
    let std = var.sqrt() + 1e-8;
    adv.iter().map(|a| (a - mean) / std).collect()
}

fn explained_variance(values: &[f32], returns: &[f32]) -> f32 {
    let n = returns.len() as f32;
    if n == 0.0 {
        return 0.0;
    }
    let var = |xs: &mut dyn Iterator<Item = f32>| {
        let v: Vec<f32> = xs.collect();
        let m = v.iter().sum::<f32>() / n;
        v.iter().map(|x| (x - m).powi(2)).sum::<f32>() / n
    };
    let var_returns = var(&mut returns.iter().copied());
    if var_returns == 0.0 {
        return f32::NAN;
    }
    1.0 - var(&mut returns.iter().zip(values).map(|(r, v)| r - v)) / var_returns
}
