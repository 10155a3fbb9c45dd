use crate::error::ConfigurationError;
use crate::goal::GoalSpec;
use crate::task::TaskConfig;
use crate::vec_normalize::NormalizeConfig;
use ml::PpoConfig;
use physics::RobotSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Robot to simulate: a preset name or a full inline description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RobotChoice {
    Preset(String),
    Custom(RobotSpec),
}

impl Default for RobotChoice {
    fn default() -> Self {
        Self::Preset("Panda".to_string())
    }
}

impl RobotChoice {
    /// # Errors
    ///
    /// Fails for an unknown preset or an invalid inline description.
    pub fn resolve(&self) -> Result<RobotSpec, ConfigurationError> {
        let spec = match self {
            Self::Preset(name) => RobotSpec::named(name)?,
            Self::Custom(spec) => spec.clone(),
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Everything a [`TrainingSession`](crate::TrainingSession) needs; nothing is
/// read from globals or the environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Resume source and save destination. Its existence at startup decides
    /// between a fresh start and a resume.
    pub checkpoint_path: PathBuf,
    /// Directory for `progress.jsonl`; metrics only go to the log when unset.
    pub log_dir: Option<PathBuf>,
    pub goal: GoalSpec,
    pub task: TaskConfig,
    pub robot: RobotChoice,
    pub num_envs: usize,
    pub normalize: NormalizeConfig,
    /// Learner hyperparameters. `ppo.seed` is replaced by `seed`.
    pub ppo: PpoConfig,
    pub total_timesteps: u64,
    /// Seeds the learner and, offset per environment, the simulators.
    pub seed: u64,
    /// Updates between metric records.
    pub log_interval: u64,
    /// Updates between intermediate checkpoints; `None` saves only at the end.
    pub checkpoint_interval: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("point_model.json"),
            log_dir: Some(PathBuf::from("logs")),
            goal: GoalSpec::default(),
            task: TaskConfig::default(),
            robot: RobotChoice::default(),
            num_envs: 1,
            normalize: NormalizeConfig::default(),
            ppo: PpoConfig {
                learning_rate: 3e-4,
                n_steps: 3000,
                batch_size: 500,
                ..PpoConfig::default()
            },
            total_timesteps: 25_000,
            seed: 0,
            log_interval: 1,
            checkpoint_interval: None,
        }
    }
}

impl SessionConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or the result is invalid.
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first problem found in the task, robot, normalization or
    /// learner settings.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_envs == 0 {
            return Err(ConfigurationError::Invalid("num_envs must be at least 1".into()));
        }
        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(ConfigurationError::Invalid("checkpoint_path is empty".into()));
        }
        if self.log_interval == 0 {
            return Err(ConfigurationError::Invalid("log_interval must be at least 1".into()));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(ConfigurationError::Invalid(
                "checkpoint_interval must be at least 1 when set".into(),
            ));
        }
        let n = &self.normalize;
        if !(n.clip_obs > 0.0 && n.clip_reward > 0.0 && n.epsilon > 0.0)
            || !(0.0..=1.0).contains(&n.gamma)
        {
            return Err(ConfigurationError::Invalid(format!(
                "invalid normalization settings: {n:?}"
            )));
        }
        self.task.validate()?;
        self.robot.resolve()?;
        self.learner_config()
            .validate()
            .map_err(|e| ConfigurationError::Invalid(e.to_string()))
    }

    /// Learner hyperparameters with the session seed applied.
    #[must_use]
    pub fn learner_config(&self) -> PpoConfig {
        PpoConfig {
            seed: self.seed,
            ..self.ppo.clone()
        }
    }
}
