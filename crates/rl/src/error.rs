use ml::{EnvError, LearnError};
use physics::PhysicsError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with how an experiment is set up. These are always fatal.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("the goal cannot be changed while an episode is running")]
    EpisodeInProgress,
    #[error("malformed goal: {0}")]
    MalformedGoal(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Robot(#[from] PhysicsError),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("checkpoint {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("checkpoint format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("checkpoint {what} dimension is {found}, the environment has {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("failed to encode checkpoint: {0}")]
    Encode(serde_json::Error),
    #[error("checkpoint learner state is unusable: {0}")]
    Learner(LearnError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("no checkpoint at {0}")]
    MissingCheckpoint(PathBuf),
    #[error("telemetry sink failed: {0}")]
    Telemetry(#[from] std::io::Error),
}
