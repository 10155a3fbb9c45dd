//! Durable training state.
//!
//! A checkpoint is a single JSON document holding the learner (hyperparameters,
//! network parameters, optimizer moments, timestep counter) and the
//! normalization statistics it was trained against. It is written next to its
//! destination under a hidden temporary name, flushed to disk, and renamed
//! into place, so a reader only ever sees the previous complete checkpoint or
//! the new complete one.

use crate::error::CheckpointError;
use crate::goal::GoalSpec;
use crate::observation::OBSERVATION_VERSION;
use crate::vec_normalize::NormalizationState;
use ml::PpoState;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub observation_version: u32,
    pub obs_dim: usize,
    pub act_dim: usize,
    /// Robot the policy was trained on.
    pub robot: String,
    /// Goal of the run that wrote the checkpoint.
    pub goal: GoalSpec,
    pub learner: PpoState,
    pub normalization: NormalizationState,
}

impl Checkpoint {
    #[must_use]
    pub fn new(
        robot: &str,
        goal: GoalSpec,
        learner: PpoState,
        normalization: NormalizationState,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            observation_version: OBSERVATION_VERSION,
            obs_dim: learner.policy.obs_dim(),
            act_dim: learner.policy.act_dim(),
            robot: robot.to_string(),
            goal,
            learner,
            normalization,
        }
    }

    #[must_use]
    pub fn num_timesteps(&self) -> u64 {
        self.learner.num_timesteps
    }

    /// Read and validate a checkpoint.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, does not parse, was written by an
    /// unsupported format version, or is internally inconsistent.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let bytes = fs::read(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let checkpoint: Self =
            serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        checkpoint.check_consistency()?;
        debug!(path = %path.display(), timesteps = checkpoint.num_timesteps(), "checkpoint loaded");
        Ok(checkpoint)
    }

    fn check_consistency(&self) -> Result<(), CheckpointError> {
        if self.format_version != FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if self.observation_version != OBSERVATION_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.observation_version,
                expected: OBSERVATION_VERSION,
            });
        }
        let policy = &self.learner.policy;
        let checks = [
            ("policy observation", self.obs_dim, policy.obs_dim()),
            ("policy action", self.act_dim, policy.act_dim()),
        ];
        for (what, expected, found) in checks {
            if expected != found {
                return Err(CheckpointError::DimensionMismatch {
                    what,
                    expected,
                    found,
                });
            }
        }
        self.validate_dims(self.obs_dim, self.act_dim)
    }

    /// Check the checkpoint against the environment it is about to drive.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::DimensionMismatch`] naming the first
    /// disagreeing dimension.
    pub fn validate_dims(&self, obs_dim: usize, act_dim: usize) -> Result<(), CheckpointError> {
        let checks = [
            ("observation", obs_dim, self.obs_dim),
            ("action", act_dim, self.act_dim),
            ("normalization", obs_dim, self.normalization.obs_rms.dim()),
        ];
        for (what, expected, found) in checks {
            if expected != found {
                return Err(CheckpointError::DimensionMismatch {
                    what,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Write the checkpoint to `path`, replacing any previous one atomically.
    ///
    /// # Errors
    ///
    /// Fails on encoding or filesystem errors; the previous checkpoint, if
    /// any, is left untouched in that case.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        self.stage(path)?.commit()?;
        info!(path = %path.display(), timesteps = self.num_timesteps(), "checkpoint saved");
        Ok(())
    }

    /// First half of [`Checkpoint::save`]: the data is durable in a temporary
    /// file but not yet visible at `path`.
    ///
    /// # Errors
    ///
    /// Fails on encoding or filesystem errors.
    pub fn stage(&self, path: &Path) -> Result<StagedCheckpoint, CheckpointError> {
        let data = serde_json::to_vec(self).map_err(CheckpointError::Encode)?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&parent).map_err(io_err)?;

        let temp_name = format!(
            ".tmp_{}_{}",
            std::process::id(),
            path.file_name()
                .map(|s| s.to_string_lossy())
                .unwrap_or_default()
        );
        let staged = StagedCheckpoint {
            temp_path: parent.join(temp_name),
            dest: path.to_path_buf(),
            committed: false,
        };

        let mut file = File::create(&staged.temp_path).map_err(io_err)?;
        file.write_all(&data).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(staged)
    }
}

/// A fully written checkpoint waiting to be renamed into place.
///
/// Dropping it without [`StagedCheckpoint::commit`] discards the temporary
/// file and leaves the destination as it was.
#[derive(Debug)]
pub struct StagedCheckpoint {
    temp_path: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedCheckpoint {
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.dest
    }

    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if the rename fails.
    pub fn commit(mut self) -> Result<(), CheckpointError> {
        fs::rename(&self.temp_path, &self.dest).map_err(|source| CheckpointError::Io {
            path: self.dest.clone(),
            source,
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedCheckpoint {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}
