//! # Joint Integration
//!
//! Velocity-commanded joints: each substep relaxes the joint velocity toward
//! its commanded target, then advances positions with explicit Euler and
//! clamps them to the joint limits.

/// Move each joint velocity a fraction `gain` of the way toward its target.
pub fn relax_velocities(vel: &mut [f32], target: &[f32], gain: f32) {
    for (v, t) in vel.iter_mut().zip(target) {
        *v += gain * (t - *v);
    }
}

/// Explicit Euler position update.
///
/// A joint that hits a limit is clamped there and its velocity is zeroed so
/// it does not keep pushing into the stop.
pub fn integrate_positions(pos: &mut [f32], vel: &mut [f32], limits: &[[f32; 2]], dt: f32) {
    for ((q, qd), [lo, hi]) in pos.iter_mut().zip(vel.iter_mut()).zip(limits) {
        *q += *qd * dt;
        if *q < *lo {
            *q = *lo;
            *qd = 0.0;
        } else if *q > *hi {
            *q = *hi;
            *qd = 0.0;
        }
    }
}
