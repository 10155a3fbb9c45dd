use serde::{Deserialize, Serialize};

/// Running per-dimension mean and (population) variance.
///
/// Batches are merged with the parallel form of Welford's update, so memory
/// and cost per update are independent of how many samples were seen.
/// Accumulators are `f64`: the count grows without bound over long runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunningMeanStd {
    mean: Vec<f64>,
    var: Vec<f64>,
    count: u64,
}

impl RunningMeanStd {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            var: vec![1.0; dim],
            count: 0,
        }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Number of samples merged so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    #[must_use]
    pub fn var(&self) -> &[f64] {
        &self.var
    }

    /// Merge a batch of samples, one row per sample.
    pub fn update(&mut self, batch: &[Vec<f32>]) {
        if batch.is_empty() {
            return;
        }
        let n = batch.len() as f64;
        let mut mean = vec![0.0; self.dim()];
        for row in batch {
            debug_assert_eq!(row.len(), self.dim());
            for (m, x) in mean.iter_mut().zip(row) {
                *m += f64::from(*x) / n;
            }
        }
        let mut var = vec![0.0; self.dim()];
        for row in batch {
            for ((v, m), x) in var.iter_mut().zip(&mean).zip(row) {
                *v += (f64::from(*x) - m).powi(2) / n;
            }
        }
        self.update_from_moments(&mean, &var, batch.len() as u64);
    }

    /// Merge summary statistics of a batch of `count` samples.
    pub fn update_from_moments(&mut self, batch_mean: &[f64], batch_var: &[f64], count: u64) {
        if count == 0 {
            return;
        }
        if self.count == 0 {
            self.mean = batch_mean.to_vec();
            self.var = batch_var.to_vec();
            self.count = count;
            return;
        }
        let (na, nb) = (self.count as f64, count as f64);
        let total = na + nb;
        for i in 0..self.dim() {
            let delta = batch_mean[i] - self.mean[i];
            let m2 = self.var[i] * na + batch_var[i] * nb + delta * delta * na * nb / total;
            self.mean[i] += delta * nb / total;
            self.var[i] = m2 / total;
        }
        self.count += count;
    }

    /// `(x - mean) / sqrt(var + eps)`, clipped to `[-clip, clip]`.
    #[must_use]
    pub fn normalize(&self, x: &[f32], clip: f32, eps: f64) -> Vec<f32> {
        x.iter()
            .zip(self.mean.iter().zip(&self.var))
            .map(|(v, (m, var))| {
                let z = (f64::from(*v) - m) / (var + eps).sqrt();
                (z as f32).clamp(-clip, clip)
            })
            .collect()
    }
}
