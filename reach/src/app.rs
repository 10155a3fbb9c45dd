//! # Reach Application Logic
//!
//! Turns command-line options into a [`SessionConfig`] and runs the requested
//! action. Everything the session needs is in that struct; the functions here
//! only merge overrides and report results.

use anyhow::{Context, Result};
use rl::{random_baseline, GoalSpec, SessionConfig, TrainingSession};
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub checkpoint: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub target: Option<Vec<f32>>,
    pub seed: Option<u64>,
}

/// # Errors
///
/// Fails if the config file cannot be loaded or an override is malformed.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<SessionConfig> {
    let mut config = match path {
        Some(path) => SessionConfig::from_path(path)
            .with_context(|| format!("loading session config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(checkpoint) = &overrides.checkpoint {
        config.checkpoint_path.clone_from(checkpoint);
    }
    if let Some(dir) = &overrides.log_dir {
        config.log_dir = Some(dir.clone());
    }
    if let Some(target) = &overrides.target {
        let goal = GoalSpec::from_slice(target)?;
        config.goal = match config.goal.tolerance() {
            Some(t) => goal.with_tolerance(t)?,
            None => goal,
        };
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

/// Train (or keep training) and save the checkpoint.
///
/// # Errors
///
/// Returns any session construction, training or checkpoint error.
pub fn train(config: SessionConfig, total_steps: Option<u64>) -> Result<()> {
    let total = total_steps.unwrap_or(config.total_timesteps);
    let mut session = TrainingSession::new(config)?;
    let summary = session.run(total)?;
    info!(
        consumed = summary.consumed,
        num_timesteps = summary.num_timesteps,
        updates = summary.updates,
        checkpoint = %summary.checkpoint.display(),
        "training finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Score the saved policy and a random baseline on the same environments.
///
/// Evaluation writes nothing: progress goes to the log only.
///
/// # Errors
///
/// Fails if there is no checkpoint or it cannot be loaded.
pub fn evaluate(mut config: SessionConfig, episodes: usize) -> Result<()> {
    config.log_dir = None;
    let session = TrainingSession::resume(config)?;
    let policy = session.evaluate(episodes)?;
    let baseline = random_baseline(session.config(), episodes)?;
    let report = serde_json::json!({
        "num_timesteps": session.num_timesteps(),
        "policy": policy,
        "random": baseline,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml::PpoConfig;
    use rl::SessionError;

    #[test]
    fn overrides_replace_config_values() {
        let overrides = Overrides {
            checkpoint: Some(PathBuf::from("runs/model.json")),
            log_dir: None,
            target: Some(vec![0.2, 0.1, 0.3]),
            seed: Some(9),
        };
        let config = load_config(None, &overrides).unwrap();
        assert_eq!(config.checkpoint_path, PathBuf::from("runs/model.json"));
        assert_eq!(config.goal.target_position().to_array(), [0.2, 0.1, 0.3]);
        assert_eq!(config.seed, 9);
        assert_eq!(config.log_dir, SessionConfig::default().log_dir);
    }

    fn scratch_config(dir: &Path) -> SessionConfig {
        SessionConfig {
            checkpoint_path: dir.join("model.json"),
            log_dir: Some(dir.join("logs")),
            ppo: PpoConfig {
                n_steps: 64,
                batch_size: 32,
                n_epochs: 1,
                hidden_sizes: vec![8],
                ..PpoConfig::default()
            },
            ..SessionConfig::default()
        }
    }

    #[test]
    fn evaluate_without_checkpoint_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        let err = evaluate(config, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::MissingCheckpoint(_))
        ));
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn evaluate_leaves_the_log_dir_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = scratch_config(dir.path());
        train(SessionConfig { log_dir: None, ..config.clone() }, Some(64)).unwrap();

        evaluate(config, 1).unwrap();
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn malformed_target_is_rejected() {
        let overrides = Overrides {
            target: Some(vec![f32::NAN, 0.0, 0.0]),
            ..Overrides::default()
        };
        assert!(load_config(None, &overrides).is_err());
    }
}
