use crate::nn::Mlp;
use serde::{Deserialize, Serialize};

const LOG_SQRT_2PI: f32 = 0.918_938_5;

/// Draw from N(0, 1) with the Box-Muller transform.
#[must_use]
pub fn standard_normal(rng: &fastrand::Rng) -> f32 {
    let u1 = 1.0 - rng.f32(); // (0, 1], keeps ln finite
    let u2 = rng.f32();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Diagonal Gaussian actor with a separate critic network.
///
/// The mean comes from `pi`, the state value from `vf`, and the log standard
/// deviation is a free parameter vector shared by all states.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianPolicy {
    pub pi: Mlp,
    pub vf: Mlp,
    pub log_std: Vec<f32>,
}

/// Action drawn during a rollout together with what the learner needs later.
#[derive(Clone, Debug)]
pub struct Sample {
    pub action: Vec<f32>,
    pub log_prob: f32,
    pub value: f32,
}

/// Forward pass for a stored (observation, action) pair, with the activations
/// needed to backpropagate through both networks.
pub struct Evaluation {
    pub log_prob: f32,
    pub value: f32,
    action: Vec<f32>,
    mean: Vec<f32>,
    pi_inputs: Vec<Vec<f32>>,
    vf_inputs: Vec<Vec<f32>>,
}

impl GaussianPolicy {
    #[must_use]
    pub fn new(
        obs_dim: usize,
        act_dim: usize,
        hidden: &[usize],
        log_std_init: f32,
        rng: &fastrand::Rng,
    ) -> Self {
        Self {
            pi: Mlp::new(obs_dim, hidden, act_dim, 0.01, rng),
            vf: Mlp::new(obs_dim, hidden, 1, 1.0, rng),
            log_std: vec![log_std_init; act_dim],
        }
    }

    #[must_use]
    pub fn obs_dim(&self) -> usize {
        self.pi.in_dim()
    }

    #[must_use]
    pub fn act_dim(&self) -> usize {
        self.log_std.len()
    }

    #[must_use]
    pub fn mean(&self, obs: &[f32]) -> Vec<f32> {
        self.pi.forward(obs)
    }

    #[must_use]
    pub fn value(&self, obs: &[f32]) -> f32 {
        self.vf.forward(obs)[0]
    }

    #[must_use]
    pub fn std(&self) -> Vec<f32> {
        self.log_std.iter().map(|s| s.exp()).collect()
    }

    #[must_use]
    pub fn log_prob(&self, mean: &[f32], action: &[f32]) -> f32 {
        action
            .iter()
            .zip(mean)
            .zip(&self.log_std)
            .map(|((a, m), ls)| {
                let z = (a - m) / ls.exp();
                -0.5 * z * z - ls - LOG_SQRT_2PI
            })
            .sum()
    }

    /// Differential entropy of the action distribution (state independent).
    #[must_use]
    pub fn entropy(&self) -> f32 {
        self.log_std.iter().map(|ls| 0.5 + LOG_SQRT_2PI + ls).sum()
    }

    #[must_use]
    pub fn sample(&self, obs: &[f32], rng: &fastrand::Rng) -> Sample {
        let mean = self.mean(obs);
        let action: Vec<f32> = mean
            .iter()
            .zip(&self.log_std)
            .map(|(m, ls)| m + ls.exp() * standard_normal(rng))
            .collect();
        Sample {
            log_prob: self.log_prob(&mean, &action),
            value: self.value(obs),
            action,
        }
    }

    #[must_use]
    pub fn evaluate(&self, obs: &[f32], action: &[f32]) -> Evaluation {
        let (mean, pi_inputs) = self.pi.forward_cached(obs);
        let (value, vf_inputs) = self.vf.forward_cached(obs);
        Evaluation {
            log_prob: self.log_prob(&mean, action),
            value: value[0],
            action: action.to_vec(),
            mean,
            pi_inputs,
            vf_inputs,
        }
    }

    /// Accumulate into `grads` the gradient of a loss whose partial
    /// derivatives with respect to this sample's log-probability and value
    /// are `d_log_prob` and `d_value`.
    pub fn backward(&self, eval: &Evaluation, d_log_prob: f32, d_value: f32, grads: &mut [Vec<f32>]) {
        let n_pi = 2 * self.pi.layers.len();
        let n_vf = 2 * self.vf.layers.len();
        let (pi_grads, rest) = grads.split_at_mut(n_pi);
        let (vf_grads, log_std_grads) = rest.split_at_mut(n_vf);

        if d_log_prob != 0.0 {
            let mut grad_mean = Vec::with_capacity(self.act_dim());
            for (i, ls) in self.log_std.iter().enumerate() {
                let var = (2.0 * ls).exp();
                let diff = eval.action[i] - eval.mean[i];
                grad_mean.push(d_log_prob * diff / var);
                log_std_grads[0][i] += d_log_prob * (diff * diff / var - 1.0);
            }
            self.pi.backward(&eval.pi_inputs, &grad_mean, pi_grads);
        }
        if d_value != 0.0 {
            self.vf.backward(&eval.vf_inputs, &[d_value], vf_grads);
        }
    }

    /// Parameter tensors: policy layers, value layers, then `log_std`.
    #[must_use]
    pub fn params(&self) -> Vec<&[f32]> {
        let mut params = self.pi.params();
        params.extend(self.vf.params());
        params.push(&self.log_std);
        params
    }

    pub fn params_mut(&mut self) -> Vec<&mut [f32]> {
        let mut params = self.pi.params_mut();
        params.extend(self.vf.params_mut());
        params.push(&mut self.log_std);
        params
    }

    /// Zeroed gradient buffers matching [`GaussianPolicy::params`].
    #[must_use]
    pub fn zero_grads(&self) -> Vec<Vec<f32>> {
        self.params().iter().map(|p| vec![0.0; p.len()]).collect()
    }

    /// Index of the `log_std` gradient buffer.
    #[must_use]
    pub fn log_std_index(&self) -> usize {
        2 * (self.pi.layers.len() + self.vf.layers.len())
    }
}
