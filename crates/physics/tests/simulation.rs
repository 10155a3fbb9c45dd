use physics::{ArmSim, PhysicsError, RobotSpec, SimConfig, Simulator};

fn sim(seed: u64) -> ArmSim {
    ArmSim::new(RobotSpec::panda(), SimConfig::default(), seed).unwrap()
}

#[test]
fn reset_is_near_home_and_at_rest() {
    let mut sim = sim(3);
    let home = RobotSpec::panda().home;
    for _ in 0..20 {
        let state = sim.reset();
        for (q, h) in state.joint_pos.iter().zip(home) {
            assert!((q - h).abs() <= 0.02 + 1e-6);
        }
        assert!(state.joint_vel.iter().all(|v| *v == 0.0));
    }
}

#[test]
fn resets_vary_but_are_reproducible() {
    let mut a = sim(11);
    let mut b = sim(11);
    let first = a.reset();
    let second = a.reset();
    assert_ne!(first.joint_pos, second.joint_pos);
    assert_eq!(first, b.reset());
    assert_eq!(second, b.reset());
}

#[test]
fn zero_action_holds_still() {
    let mut sim = sim(0);
    let start = sim.reset();
    let next = sim.step(&[0.0; 3]).unwrap();
    assert_eq!(start.joint_pos, next.joint_pos);
}

#[test]
fn velocity_converges_to_command() {
    let mut sim = ArmSim::new(RobotSpec::reacher3(), SimConfig::default(), 0).unwrap();
    sim.reset();
    let mut state = sim.state();
    for _ in 0..20 {
        state = sim.step(&[0.5, 0.0, 0.0]).unwrap();
    }
    assert!((state.joint_vel[0] - 0.5).abs() < 1e-3, "{:?}", state.joint_vel);
}

#[test]
fn actions_are_clamped_to_unit_range() {
    let mut a = sim(5);
    let mut b = sim(5);
    a.reset();
    b.reset();
    let sa = a.step(&[10.0, -10.0, 3.0]).unwrap();
    let sb = b.step(&[1.0, -1.0, 1.0]).unwrap();
    assert_eq!(sa, sb);
}

#[test]
fn joint_limits_are_respected() {
    let mut sim = sim(1);
    sim.reset();
    let spec = RobotSpec::panda();
    let mut state = sim.state();
    for _ in 0..400 {
        state = sim.step(&[1.0, 1.0, 1.0]).unwrap();
    }
    for (q, [lo, hi]) in state.joint_pos.iter().zip(spec.joint_limits) {
        assert!(*q >= lo && *q <= hi);
    }
    // the elbow is pinned against its upper stop
    assert!((state.joint_pos[2] - spec.joint_limits[2][1]).abs() < 1e-6);
}

#[test]
fn wrong_action_length_is_rejected() {
    let mut sim = sim(0);
    sim.reset();
    let err = sim.step(&[0.0; 2]).unwrap_err();
    assert!(matches!(err, PhysicsError::ActionDim { expected: 3, got: 2 }));
}

#[test]
fn non_finite_state_reports_divergence() {
    let mut sim = sim(0);
    sim.reset();
    sim.set_joint_state([0.0, f32::NAN, -1.0], [0.0; 3]);
    assert!(matches!(sim.step(&[0.0; 3]), Err(PhysicsError::Diverged(_))));
    // a reset recovers a valid state
    let state = sim.reset();
    assert!(state.eef_pos.is_finite());
    assert!(sim.step(&[0.0; 3]).is_ok());
}

#[test]
fn nan_action_reports_divergence() {
    let mut sim = sim(0);
    sim.reset();
    assert!(matches!(sim.step(&[f32::NAN, 0.0, 0.0]), Err(PhysicsError::Diverged(_))));
}

#[test]
fn invalid_config_is_rejected() {
    let config = SimConfig { substeps: 0, ..SimConfig::default() };
    assert!(matches!(
        ArmSim::new(RobotSpec::panda(), config, 0),
        Err(PhysicsError::InvalidConfig(_))
    ));
}

#[test]
fn divergence_speed_must_exceed_joint_speed() {
    let spec = RobotSpec::panda();
    for speed in [f32::NAN, spec.max_joint_speed, 0.5 * spec.max_joint_speed] {
        let config = SimConfig { divergence_speed: speed, ..SimConfig::default() };
        assert!(
            matches!(ArmSim::new(spec.clone(), config, 0), Err(PhysicsError::InvalidConfig(_))),
            "divergence_speed {speed} accepted"
        );
    }
    let config = SimConfig { divergence_speed: 2.0 * spec.max_joint_speed, ..SimConfig::default() };
    assert!(ArmSim::new(spec, config, 0).is_ok());
}
