use serde::{Deserialize, Serialize};

/// Adam with bias correction. Moment buffers are part of the serialized
/// state so an interrupted run continues with the same effective step size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: u32,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    #[must_use]
    pub fn new(params: &[&[f32]], lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-5,
            t: 0,
            m: params.iter().map(|p| vec![0.0; p.len()]).collect(),
            v: params.iter().map(|p| vec![0.0; p.len()]).collect(),
        }
    }

    #[must_use]
    pub fn learning_rate(&self) -> f32 {
        self.lr
    }

    pub fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }

    /// Number of updates applied so far.
    #[must_use]
    pub fn steps(&self) -> u32 {
        self.t
    }

    /// Whether the moment buffers have the shapes of `params`.
    #[must_use]
    pub fn is_compatible(&self, params: &[&[f32]]) -> bool {
        self.m.len() == params.len()
            && self.v.len() == params.len()
            && self
                .m
                .iter()
                .zip(&self.v)
                .zip(params)
                .all(|((m, v), p)| m.len() == p.len() && v.len() == p.len())
    }

    pub fn step(&mut self, params: &mut [&mut [f32]], grads: &[Vec<f32>]) {
        debug_assert_eq!(params.len(), self.m.len());
        self.t += 1;
        let t = self.t as i32;
        let lr_t = self.lr * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));

        for (i, (p, grad)) in params.iter_mut().zip(grads).enumerate() {
            for j in 0..p.len() {
                self.m[i][j] = self.beta1 * self.m[i][j] + (1.0 - self.beta1) * grad[j];
                self.v[i][j] = self.beta2 * self.v[i][j] + (1.0 - self.beta2) * grad[j].powi(2);
                p[j] -= lr_t * self.m[i][j] / (self.v[i][j].sqrt() + self.eps);
            }
        }
    }
}

/// Rescale `grads` in place so their global L2 norm is at most `max_norm`.
/// Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut [Vec<f32>], max_norm: f32) -> f32 {
    let norm = grads
        .iter()
        .flatten()
        .map(|g| g * g)
        .sum::<f32>()
        .sqrt();
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        grads.iter_mut().flatten().for_each(|g| *g *= scale);
    }
    norm
}
