//! Training session lifecycle: fresh start or resume, the learn loop, and
//! checkpointing.

use crate::adapter::GymAdapter;
use crate::checkpoint::Checkpoint;
use crate::config::SessionConfig;
use crate::error::{CheckpointError, ConfigurationError, SessionError};
use crate::task::ReachTask;
use crate::telemetry::JsonlLogger;
use crate::vec_normalize::VecNormalize;
use ml::{DummyVecEnv, EnvError, Ppo, TracingLogger, TrainingLogger, UpdateReport, VecEnv};
use physics::{ArmSim, RobotSpec};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Evaluation environments are seeded away from the training ones.
const EVAL_SEED_OFFSET: u64 = 0x5eed_0000;

pub type ReachVecEnv = DummyVecEnv<GymAdapter<ArmSim>>;
pub type NormalizedReachEnv = VecNormalize<ReachVecEnv>;

/// How a session begins, decided once from the checkpoint path.
#[derive(Debug)]
pub enum SessionStart {
    FreshStart,
    ResumedFrom(Box<Checkpoint>),
}

impl SessionStart {
    /// A readable checkpoint at `path` means resume; no file means a fresh
    /// start. A file that exists but cannot be loaded is an error, never a
    /// silent fresh start.
    ///
    /// # Errors
    ///
    /// Propagates checkpoint read, parse and validation failures.
    pub fn detect(path: &Path) -> Result<Self, CheckpointError> {
        let exists = path.try_exists().map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if exists {
            Ok(Self::ResumedFrom(Box::new(Checkpoint::load(path)?)))
        } else {
            Ok(Self::FreshStart)
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    /// Interactions consumed by this call.
    pub consumed: u64,
    /// Interactions over the whole training history, including resumed ones.
    pub num_timesteps: u64,
    pub updates: u64,
    pub interrupted: bool,
    pub checkpoint: PathBuf,
    pub last_report: Option<UpdateReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub episodes: usize,
    /// Mean undiscounted raw reward per episode.
    pub mean_return: f32,
    pub mean_length: f32,
    pub success_rate: f32,
}

pub struct TrainingSession {
    config: SessionConfig,
    robot: RobotSpec,
    env: NormalizedReachEnv,
    ppo: Ppo,
    logger: Box<dyn TrainingLogger>,
    stop: Arc<AtomicBool>,
    resumed_from: Option<u64>,
}

impl TrainingSession {
    /// Build the environment stack and either a fresh learner or the one
    /// stored at `config.checkpoint_path`.
    ///
    /// # Errors
    ///
    /// Fails for invalid configuration, an unreadable or incompatible
    /// checkpoint, or an unusable log directory.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let start = SessionStart::detect(&config.checkpoint_path)?;
        Self::with_start(config, start)
    }

    /// Like [`TrainingSession::new`], but a missing checkpoint is an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingCheckpoint`] when there is nothing to
    /// resume, otherwise as [`TrainingSession::new`].
    pub fn resume(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        match SessionStart::detect(&config.checkpoint_path)? {
            SessionStart::FreshStart => Err(SessionError::MissingCheckpoint(config.checkpoint_path)),
            start => Self::with_start(config, start),
        }
    }

    fn with_start(config: SessionConfig, start: SessionStart) -> Result<Self, SessionError> {
        let robot = config.robot.resolve()?;
        let path = config.checkpoint_path.display().to_string();

        let (env, ppo, resumed_from) = match start {
            SessionStart::FreshStart => {
                info!(checkpoint = %path, "no checkpoint found, starting fresh");
                let venv = build_vec_env(&config, &robot, config.seed, config.num_envs)?;
                let (obs_dim, act_dim) = dims(&venv);
                let ppo = Ppo::new(config.learner_config(), obs_dim, act_dim)?;
                (VecNormalize::new(venv, config.normalize.clone()), ppo, None)
            }
            SessionStart::ResumedFrom(checkpoint) => {
                let checkpoint = *checkpoint;
                let timesteps = checkpoint.num_timesteps();
                info!(checkpoint = %path, timesteps, "resuming from checkpoint");
                if checkpoint.robot != robot.name {
                    warn!(saved = %checkpoint.robot, current = %robot.name, "robot differs from the checkpoint");
                }
                if checkpoint.goal != config.goal {
                    info!(saved = ?checkpoint.goal, current = ?config.goal, "goal changed since the checkpoint");
                }

                let seed = config.seed.wrapping_add(timesteps);
                let venv = build_vec_env(&config, &robot, seed, config.num_envs)?;
                let (obs_dim, act_dim) = dims(&venv);
                checkpoint.validate_dims(obs_dim, act_dim)?;
                let env = VecNormalize::from_state(venv, checkpoint.normalization)?;
                let ppo = Ppo::from_state(checkpoint.learner).map_err(CheckpointError::Learner)?;
                (env, ppo, Some(timesteps))
            }
        };

        let logger: Box<dyn TrainingLogger> = match &config.log_dir {
            Some(dir) => Box::new(JsonlLogger::new(dir)?),
            None => Box::new(TracingLogger),
        };

        Ok(Self {
            config,
            robot,
            env,
            ppo,
            logger,
            stop: Arc::new(AtomicBool::new(false)),
            resumed_from,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Timesteps stored in the checkpoint this session resumed from.
    #[must_use]
    pub fn resumed_from(&self) -> Option<u64> {
        self.resumed_from
    }

    #[must_use]
    pub fn env(&self) -> &NormalizedReachEnv {
        &self.env
    }

    #[must_use]
    pub fn learner(&self) -> &Ppo {
        &self.ppo
    }

    #[must_use]
    pub fn num_timesteps(&self) -> u64 {
        self.ppo.num_timesteps()
    }

    /// Setting the flag stops [`TrainingSession::run`] after the current
    /// environment step; the run still writes its checkpoint.
    #[must_use]
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Train for `total_steps` more interactions, then save.
    ///
    /// # Errors
    ///
    /// Environment, learner, telemetry and checkpoint failures stop the run.
    pub fn run(&mut self, total_steps: u64) -> Result<RunSummary, SessionError> {
        info!(
            total_steps,
            already = self.ppo.num_timesteps(),
            num_envs = self.config.num_envs,
            "training started"
        );
        let mut consumed = 0;
        let mut updates = 0;
        let mut interrupted = false;
        let mut last_report = None;

        while consumed < total_steps {
            let it = self.ppo.iterate(&mut self.env, total_steps - consumed, &self.stop)?;
            consumed += it.consumed;
            if let Some(report) = it.report {
                updates += 1;
                if report.update % self.config.log_interval == 0 {
                    self.logger.log_update(&report)?;
                }
                let due = self
                    .config
                    .checkpoint_interval
                    .is_some_and(|every| updates % every == 0);
                if due && consumed < total_steps {
                    self.save()?;
                }
                last_report = Some(report);
            }
            if it.interrupted {
                warn!(consumed, "training interrupted");
                self.stop.store(false, Ordering::SeqCst);
                interrupted = true;
                break;
            }
        }

        self.save()?;
        Ok(RunSummary {
            consumed,
            num_timesteps: self.ppo.num_timesteps(),
            updates,
            interrupted,
            checkpoint: self.config.checkpoint_path.clone(),
            last_report,
        })
    }

    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            &self.robot.name,
            self.config.goal,
            self.ppo.state(),
            self.env.state(),
        )
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Checkpoint`] if the atomic write fails.
    pub fn save(&self) -> Result<(), SessionError> {
        self.checkpoint().save(&self.config.checkpoint_path)?;
        Ok(())
    }

    /// Run `episodes` episodes with the deterministic policy on a separate
    /// environment whose normalization statistics are a frozen copy of the
    /// training ones.
    ///
    /// # Errors
    ///
    /// Fails if the evaluation environment cannot be built or stepped.
    pub fn evaluate(&self, episodes: usize) -> Result<EvaluationReport, SessionError> {
        let seed = self.config.seed.wrapping_add(EVAL_SEED_OFFSET);
        let venv = build_vec_env(&self.config, &self.robot, seed, 1)?;
        let mut env = VecNormalize::from_state(venv, self.env.state())?;
        env.set_training(false);
        let ppo = &self.ppo;
        let report = run_episodes(&mut env, episodes, |obs| ppo.predict(obs, true))?;
        info!(
            episodes,
            mean_return = report.mean_return,
            success_rate = report.success_rate,
            "evaluation finished"
        );
        Ok(report)
    }
}

/// Same measurement as [`TrainingSession::evaluate`] with uniformly random
/// actions, on identically seeded environments.
///
/// # Errors
///
/// Fails for invalid configuration or environment errors.
pub fn random_baseline(config: &SessionConfig, episodes: usize) -> Result<EvaluationReport, SessionError> {
    config.validate()?;
    let robot = config.robot.resolve()?;
    let seed = config.seed.wrapping_add(EVAL_SEED_OFFSET);
    let mut env = build_vec_env(config, &robot, seed, 1)?;
    let space = env.action_space().clone();
    let rng = fastrand::Rng::with_seed(config.seed);
    Ok(run_episodes(&mut env, episodes, |_| space.sample(&rng))?)
}

fn build_adapter(
    config: &SessionConfig,
    robot: &RobotSpec,
    seed: u64,
) -> Result<GymAdapter<ArmSim>, ConfigurationError> {
    let sim = ArmSim::new(robot.clone(), config.task.sim.clone(), seed)?;
    let task = ReachTask::new(sim, config.task.clone(), config.goal)?;
    Ok(GymAdapter::new(task))
}

fn build_vec_env(
    config: &SessionConfig,
    robot: &RobotSpec,
    seed: u64,
    num_envs: usize,
) -> Result<ReachVecEnv, ConfigurationError> {
    let envs = (0..num_envs as u64)
        .map(|i| build_adapter(config, robot, seed.wrapping_add(i + 1)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DummyVecEnv::new(envs))
}

fn dims(env: &impl VecEnv) -> (usize, usize) {
    (env.observation_space().dim(), env.action_space().dim())
}

fn run_episodes(
    env: &mut impl VecEnv,
    episodes: usize,
    mut act: impl FnMut(&[f32]) -> Vec<f32>,
) -> Result<EvaluationReport, EnvError> {
    let space = env.action_space().clone();
    let mut obs = env.reset()?;
    let (mut total_return, mut total_len, mut successes, mut finished) = (0.0, 0usize, 0usize, 0usize);

    while finished < episodes {
        let actions: Vec<Vec<f32>> = obs.iter().map(|o| space.clip(&act(o))).collect();
        let step = env.step(&actions)?;
        for info in &step.infos {
            if let Some(ep) = info.episode.filter(|_| finished < episodes) {
                total_return += ep.ret;
                total_len += ep.len;
                successes += usize::from(info.is_success);
                finished += 1;
            }
        }
        obs = step.obs;
    }

    let n = episodes.max(1) as f32;
    Ok(EvaluationReport {
        episodes,
        mean_return: total_return / n,
        mean_length: total_len as f32 / n,
        success_rate: successes as f32 / n,
    })
}
