use criterion::{criterion_group, criterion_main, Criterion};
use ml::{DummyVecEnv, Ppo, PpoConfig, VecEnv};
use physics::{ArmSim, RobotSpec, SimConfig};
use rl::{GoalSpec, GymAdapter, NormalizeConfig, ReachTask, ReachVecEnv, TaskConfig, VecNormalize};
use std::hint::black_box;
use std::sync::atomic::AtomicBool;

fn reach_env(num_envs: usize) -> VecNormalize<ReachVecEnv> {
    let venv = DummyVecEnv::from_fn(num_envs, |i| {
        let sim = ArmSim::new(RobotSpec::panda(), SimConfig::default(), i as u64)
            .expect("valid simulator");
        let task = ReachTask::new(sim, TaskConfig::default(), GoalSpec::default())
            .expect("reachable goal");
        GymAdapter::new(task)
    });
    VecNormalize::new(venv, NormalizeConfig::default())
}

fn bench_normalized_step(c: &mut Criterion) {
    let mut env = reach_env(8);
    env.reset().expect("reset");
    let actions = vec![vec![0.1, -0.2, 0.3]; 8];
    c.bench_function("vec_normalize_step_8", |b| {
        b.iter(|| black_box(env.step(black_box(&actions)).expect("step")));
    });
}

fn bench_ppo_iteration(c: &mut Criterion) {
    let config = PpoConfig {
        n_steps: 256,
        batch_size: 64,
        n_epochs: 4,
        ..PpoConfig::default()
    };
    let stop = AtomicBool::new(false);
    c.bench_function("ppo_iteration_256x4", |b| {
        let mut env = reach_env(4);
        let mut ppo = Ppo::new(config.clone(), 12, 3).expect("valid config");
        b.iter(|| {
            let it = ppo.iterate(&mut env, 1024, &stop).expect("iteration");
            black_box(it.report)
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_normalized_step, bench_ppo_iteration
}
criterion_main!(benches);
