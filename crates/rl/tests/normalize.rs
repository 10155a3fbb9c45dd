mod common;

use common::ConstEnv;
use ml::{DummyVecEnv, VecEnv};
use physics::{ArmSim, RobotSpec, SimConfig};
use rl::{
    CheckpointError, GoalSpec, GymAdapter, NormalizeConfig, ReachTask, RunningMeanStd, TaskConfig,
    VecNormalize,
};

fn const_env(n: usize, value: Vec<f32>, reward: f32, horizon: usize) -> VecNormalize<DummyVecEnv<ConstEnv>> {
    let venv = DummyVecEnv::from_fn(n, |_| ConstEnv::new(value.clone(), reward, horizon));
    VecNormalize::new(venv, NormalizeConfig::default())
}

#[test]
fn identical_observations_converge_to_zero_variance() {
    let mut rms = RunningMeanStd::new(2);
    for _ in 0..100 {
        rms.update(&[vec![2.5, -1.0]]);
    }
    assert_eq!(rms.count(), 100);
    assert!((rms.mean()[0] - 2.5).abs() < 1e-9);
    assert!((rms.mean()[1] + 1.0).abs() < 1e-9);
    assert!(rms.var().iter().all(|v| v.abs() < 1e-9));
}

#[test]
fn stats_count_steps_not_resets() {
    let mut env = const_env(3, vec![1.0, 2.0], 1.0, 4);
    env.reset().unwrap();
    env.reset().unwrap();
    assert_eq!(env.obs_rms().count(), 0);

    for _ in 0..10 {
        env.step(&vec![vec![0.0]; 3]).unwrap();
    }
    assert_eq!(env.obs_rms().count(), 30);
    assert_eq!(env.ret_rms().count(), 30);
}

#[test]
fn constant_observation_normalizes_to_zero() {
    let mut env = const_env(1, vec![4.0, -3.0], 0.5, 10);
    env.reset().unwrap();
    let mut last = Vec::new();
    for _ in 0..20 {
        last = env.step(&[vec![0.0]]).unwrap().obs;
    }
    assert!(last[0].iter().all(|v| v.abs() < 1e-3), "{last:?}");
    assert_eq!(env.original_obs(), &[vec![4.0, -3.0]]);
}

#[test]
fn outputs_are_clipped() {
    let mut env = const_env(1, vec![1.0], 1.0, 1000);
    env.reset().unwrap();
    let step = env.step(&[vec![0.0]]).unwrap();
    // one return sample has zero spread, so the scaled reward saturates
    assert_eq!(step.rewards, vec![10.0]);
    assert_eq!(env.original_rewards(), &[1.0]);

    let far = env.normalize_obs(&[1e6]);
    assert_eq!(far, vec![10.0]);
}

#[test]
fn reward_scale_follows_return_spread_without_centering() {
    let mut env = const_env(2, vec![0.0], -1.0, 5);
    env.reset().unwrap();
    let mut rewards = Vec::new();
    for _ in 0..50 {
        rewards = env.step(&vec![vec![0.0]; 2]).unwrap().rewards;
    }
    let std = env.ret_rms().var()[0].sqrt() as f32;
    assert!(std > 0.0);
    // negative raw rewards stay negative
    assert!(rewards.iter().all(|r| *r < 0.0));
    assert!((rewards[0] - (-1.0 / std)).abs() < 1e-3);
}

#[test]
fn frozen_statistics_do_not_move() {
    let mut env = const_env(1, vec![1.0, 1.0], 1.0, 5);
    env.reset().unwrap();
    for _ in 0..5 {
        env.step(&[vec![0.0]]).unwrap();
    }
    let snapshot = env.state();
    env.set_training(false);
    for _ in 0..5 {
        env.step(&[vec![0.0]]).unwrap();
    }
    assert_eq!(env.state(), snapshot);
    assert!(!env.is_training());
}

#[test]
fn terminal_observation_is_normalized() {
    let mut env = const_env(1, vec![3.0], 0.0, 2);
    env.reset().unwrap();
    env.step(&[vec![0.0]]).unwrap();
    let step = env.step(&[vec![0.0]]).unwrap();
    assert!(step.dones[0]);
    let terminal = step.infos[0].terminal_observation.clone().unwrap();
    assert_eq!(terminal, env.normalize_obs(&[3.0]));
}

#[test]
fn state_restores_into_matching_env_only() {
    let mut env = const_env(1, vec![1.0, 2.0], 1.0, 5);
    env.reset().unwrap();
    for _ in 0..7 {
        env.step(&[vec![0.0]]).unwrap();
    }
    let state = env.state();

    let same = DummyVecEnv::from_fn(2, |_| ConstEnv::new(vec![0.0, 0.0], 1.0, 5));
    let restored = VecNormalize::from_state(same, state.clone()).unwrap();
    assert_eq!(restored.obs_rms().count(), 7);

    let other = DummyVecEnv::from_fn(1, |_| ConstEnv::new(vec![0.0; 3], 1.0, 5));
    assert!(matches!(
        VecNormalize::from_state(other, state),
        Err(CheckpointError::DimensionMismatch { expected: 3, found: 2, .. })
    ));
}

#[test]
fn normalizes_the_reach_stack() {
    let venv = DummyVecEnv::from_fn(2, |i| {
        let sim = ArmSim::new(RobotSpec::panda(), SimConfig::default(), i as u64).unwrap();
        GymAdapter::new(ReachTask::new(sim, TaskConfig::default(), GoalSpec::default()).unwrap())
    });
    let mut env = VecNormalize::new(venv, NormalizeConfig::default());
    let obs = env.reset().unwrap();
    assert_eq!(obs.len(), 2);
    assert_eq!(obs[0].len(), 12);

    let rng = fastrand::Rng::with_seed(1);
    for _ in 0..25 {
        let actions: Vec<Vec<f32>> = (0..2).map(|_| env.action_space().sample(&rng)).collect();
        let step = env.step(&actions).unwrap();
        assert!(step.obs.iter().flatten().all(|v| v.abs() <= 10.0));
        assert!(step.rewards.iter().all(|r| r.abs() <= 10.0));
    }
    assert_eq!(env.obs_rms().count(), 50);
}
