mod common;

use common::{Bandit, Counter};
use ml::{DummyVecEnv, LearnError, Ppo, PpoConfig, TracingLogger, TrainingLogger, UpdateReport};
use std::sync::atomic::AtomicBool;

fn small_config() -> PpoConfig {
    PpoConfig {
        learning_rate: 1e-3,
        n_steps: 64,
        batch_size: 32,
        n_epochs: 4,
        hidden_sizes: vec![16],
        seed: 7,
        ..PpoConfig::default()
    }
}

#[derive(Default)]
struct Collect(Vec<UpdateReport>);

impl TrainingLogger for Collect {
    fn log_update(&mut self, report: &UpdateReport) -> std::io::Result<()> {
        self.0.push(report.clone());
        Ok(())
    }
}

#[test]
fn ppo_moves_mean_towards_best_action() {
    let mut env = DummyVecEnv::from_fn(4, |_| Bandit::new(0.5));
    let mut ppo = Ppo::new(small_config(), 1, 1).unwrap();
    let before = ppo.predict(&[1.0], true)[0];
    assert!(before.abs() < 0.1);

    let stop = AtomicBool::new(false);
    ppo.learn(&mut env, 20_000, 1, &mut TracingLogger, &stop).unwrap();

    let after = ppo.predict(&[1.0], true)[0];
    assert!(after > 0.25, "mean action {after}");
}

#[test]
fn learn_consumes_exact_budget() {
    let mut env = DummyVecEnv::from_fn(4, |_| Counter::new(10));
    let mut ppo = Ppo::new(small_config(), 1, 1).unwrap();
    let mut logger = Collect::default();
    let stop = AtomicBool::new(false);

    // 256 + 256 + 256 + 232
    let outcome = ppo.learn(&mut env, 1000, 1, &mut logger, &stop).unwrap();
    assert_eq!(outcome.consumed, 1000);
    assert_eq!(outcome.updates, 4);
    assert_eq!(ppo.num_timesteps(), 1000);
    assert_eq!(logger.0.len(), 4);
    assert_eq!(logger.0[3].rollout_steps, 58);
    assert_eq!(logger.0[3].num_timesteps, 1000);
    assert_eq!(logger.0[3].ep_len_mean, Some(10.0));
}

#[test]
fn log_interval_skips_updates() {
    let mut env = DummyVecEnv::from_fn(2, |_| Counter::new(10));
    let mut ppo = Ppo::new(small_config(), 1, 1).unwrap();
    let mut logger = Collect::default();
    let stop = AtomicBool::new(false);
    ppo.learn(&mut env, 128 * 4, 2, &mut logger, &stop).unwrap();
    let logged: Vec<u64> = logger.0.iter().map(|r| r.update).collect();
    assert_eq!(logged, vec![2, 4]);
}

#[test]
fn stop_flag_interrupts_before_stepping() {
    let mut env = DummyVecEnv::from_fn(2, |_| Counter::new(10));
    let mut ppo = Ppo::new(small_config(), 1, 1).unwrap();
    let stop = AtomicBool::new(true);
    let outcome = ppo.learn(&mut env, 1000, 1, &mut TracingLogger, &stop).unwrap();
    assert!(outcome.interrupted);
    assert_eq!(outcome.consumed, 0);
    assert_eq!(ppo.num_timesteps(), 0);
    assert_eq!(ppo.updates(), 0);
}

#[test]
fn state_restores_the_same_policy() {
    let mut env = DummyVecEnv::from_fn(2, |_| Bandit::new(-0.3));
    let mut ppo = Ppo::new(small_config(), 1, 1).unwrap();
    let stop = AtomicBool::new(false);
    ppo.learn(&mut env, 256, 1, &mut TracingLogger, &stop).unwrap();

    let json = serde_json::to_string(&ppo.state()).unwrap();
    let restored = Ppo::from_state(serde_json::from_str(&json).unwrap()).unwrap();
    assert_eq!(restored.num_timesteps(), ppo.num_timesteps());
    assert_eq!(restored.updates(), ppo.updates());
    let (a, b) = (restored.predict(&[1.0], true)[0], ppo.predict(&[1.0], true)[0]);
    assert!((a - b).abs() < 1e-5, "{a} vs {b}");
    assert_eq!(restored.optimizer().steps(), ppo.optimizer().steps());
}

#[test]
fn mismatched_optimizer_is_rejected() {
    let ppo = Ppo::new(small_config(), 1, 1).unwrap();
    let other = Ppo::new(small_config(), 3, 1).unwrap();
    let mut state = ppo.state();
    state.optimizer = other.optimizer().clone();
    assert!(matches!(
        Ppo::from_state(state),
        Err(LearnError::OptimizerMismatch)
    ));
}

#[test]
fn space_mismatch_is_reported() {
    let mut env = DummyVecEnv::from_fn(1, |_| Bandit::new(0.0));
    let mut ppo = Ppo::new(small_config(), 2, 1).unwrap();
    let stop = AtomicBool::new(false);
    let err = ppo.iterate(&mut env, 10, &stop).unwrap_err();
    assert!(matches!(err, LearnError::SpaceMismatch { obs: 1, .. }));
}

#[test]
fn invalid_config_is_rejected() {
    let config = PpoConfig {
        batch_size: 0,
        ..PpoConfig::default()
    };
    assert!(matches!(Ppo::new(config, 1, 1), Err(LearnError::Config(_))));
}
