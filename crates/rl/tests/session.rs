mod common;

use anyhow::Result;
use common::quick_config;
use ml::{Ppo, PpoConfig};
use rl::{
    Checkpoint, CheckpointError, GoalSpec, NormalizationState, NormalizeConfig, RunningMeanStd,
    SessionConfig, SessionError, SessionStart, TrainingSession, PROGRESS_FILE,
};
use std::sync::atomic::Ordering;
use tempfile::tempdir;

#[test]
fn fresh_start_then_resume() -> Result<()> {
    let dir = tempdir()?;
    let config = quick_config(dir.path());
    assert!(matches!(
        SessionStart::detect(&config.checkpoint_path)?,
        SessionStart::FreshStart
    ));

    let mut first = TrainingSession::new(config.clone())?;
    assert_eq!(first.resumed_from(), None);
    let summary = first.run(200)?;
    assert_eq!(summary.consumed, 200);
    assert_eq!(summary.updates, 4);
    assert!(!summary.interrupted);
    assert!(config.checkpoint_path.exists());
    assert_eq!(first.env().obs_rms().count(), 200);
    drop(first);

    assert!(matches!(
        SessionStart::detect(&config.checkpoint_path)?,
        SessionStart::ResumedFrom(_)
    ));
    let mut second = TrainingSession::new(config.clone())?;
    assert_eq!(second.resumed_from(), Some(200));
    assert_eq!(second.learner().updates(), 4);
    let summary = second.run(130)?;
    assert_eq!(summary.num_timesteps, 330);
    assert_eq!(second.env().obs_rms().count(), 330);

    let saved = Checkpoint::load(&config.checkpoint_path)?;
    assert_eq!(saved.num_timesteps(), 330);
    assert_eq!(saved.normalization.obs_rms.count(), 330);
    assert_eq!(saved.learner.updates, 7);
    Ok(())
}

#[test]
fn parallel_envs_count_every_interaction() -> Result<()> {
    let dir = tempdir()?;
    let config = SessionConfig {
        num_envs: 4,
        ..quick_config(dir.path())
    };
    let mut session = TrainingSession::new(config)?;
    let summary = session.run(300)?;
    // 256 + ceil(44 / 4) * 4
    assert_eq!(summary.consumed, 300);
    assert_eq!(session.env().obs_rms().count(), 300);
    Ok(())
}

#[test]
fn corrupt_checkpoint_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    let config = quick_config(dir.path());
    let partial = b"{\"format_version\": 1, \"obs";
    std::fs::write(&config.checkpoint_path, partial)?;

    let err = TrainingSession::new(config.clone()).err().unwrap();
    assert!(matches!(
        err,
        SessionError::Checkpoint(CheckpointError::Corrupt { .. })
    ));
    // the broken file is not replaced by a fresh policy
    assert_eq!(std::fs::read(&config.checkpoint_path)?, partial);
    Ok(())
}

#[test]
fn incompatible_checkpoint_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    let config = quick_config(dir.path());
    let learner = Ppo::new(PpoConfig::default(), 5, 3)?.state();
    let stale = Checkpoint::new(
        "Panda",
        GoalSpec::default(),
        learner,
        NormalizationState {
            config: NormalizeConfig::default(),
            obs_rms: RunningMeanStd::new(5),
            ret_rms: RunningMeanStd::new(1),
        },
    );
    stale.save(&config.checkpoint_path)?;

    let err = TrainingSession::new(config).err().unwrap();
    assert!(matches!(
        err,
        SessionError::Checkpoint(CheckpointError::DimensionMismatch { expected: 12, found: 5, .. })
    ));
    Ok(())
}

#[test]
fn resume_requires_a_checkpoint() {
    let dir = tempdir().unwrap();
    let err = TrainingSession::resume(quick_config(dir.path())).err().unwrap();
    assert!(matches!(err, SessionError::MissingCheckpoint(_)));
}

#[test]
fn interrupt_still_saves() -> Result<()> {
    let dir = tempdir()?;
    let config = quick_config(dir.path());
    let mut session = TrainingSession::new(config.clone())?;
    session.interrupt_handle().store(true, Ordering::SeqCst);

    let summary = session.run(1_000)?;
    assert!(summary.interrupted);
    assert_eq!(summary.consumed, 0);
    assert!(config.checkpoint_path.exists());
    // the flag is cleared so the session can continue
    assert!(!session.interrupt_handle().load(Ordering::SeqCst));
    let summary = session.run(64)?;
    assert_eq!(summary.consumed, 64);
    Ok(())
}

#[test]
fn progress_is_written_per_update() -> Result<()> {
    let dir = tempdir()?;
    let config = quick_config(dir.path());
    let log_dir = config.log_dir.clone().unwrap();
    let mut session = TrainingSession::new(config)?;
    session.run(192)?;

    let text = std::fs::read_to_string(log_dir.as_path().join(PROGRESS_FILE))?;
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["update"], 3);
    assert_eq!(lines[2]["num_timesteps"], 192);
    Ok(())
}

#[test]
fn intermediate_checkpoints() -> Result<()> {
    let dir = tempdir()?;
    let config = SessionConfig {
        checkpoint_interval: Some(1),
        ..quick_config(dir.path())
    };
    let mut session = TrainingSession::new(config.clone())?;
    let summary = session.run(128)?;
    assert_eq!(summary.updates, 2);
    assert_eq!(Checkpoint::load(&config.checkpoint_path)?.num_timesteps(), 128);
    Ok(())
}

#[test]
fn evaluation_uses_frozen_copy() -> Result<()> {
    let dir = tempdir()?;
    let mut session = TrainingSession::new(quick_config(dir.path()))?;
    session.run(128)?;
    let before = session.env().state();

    let report = session.evaluate(2)?;
    assert_eq!(report.episodes, 2);
    assert!(report.mean_length > 0.0 && report.mean_length <= 200.0);
    assert!((0.0..=1.0).contains(&report.success_rate));
    assert_eq!(session.env().state(), before);
    Ok(())
}
