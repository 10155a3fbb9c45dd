/// On-policy experience for one PPO iteration.
///
/// Samples are stored step-major: sample `t * n_envs + e` is environment `e`
/// at rollout step `t`.
pub struct RolloutBuffer {
    n_envs: usize,
    pub obs: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    /// `true` if the episode ended with this step.
    pub dones: Vec<bool>,
    pub values: Vec<f32>,
    pub log_probs: Vec<f32>,
    pub advantages: Vec<f32>,
    pub returns: Vec<f32>,
}

impl RolloutBuffer {
    #[must_use]
    pub fn new(n_envs: usize) -> Self {
        Self {
            n_envs,
            obs: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            dones: Vec::new(),
            values: Vec::new(),
            log_probs: Vec::new(),
            advantages: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.obs.clear();
        self.actions.clear();
        self.rewards.clear();
        self.dones.clear();
        self.values.clear();
        self.log_probs.clear();
        self.advantages.clear();
        self.returns.clear();
    }

    /// Number of samples (steps times environments).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Number of batched steps stored.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.len() / self.n_envs
    }

    /// Append one batched step.
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        obs: Vec<Vec<f32>>,
        actions: Vec<Vec<f32>>,
        rewards: &[f32],
        dones: &[bool],
        values: &[f32],
        log_probs: &[f32],
    ) {
        debug_assert_eq!(rewards.len(), self.n_envs);
        self.obs.extend(obs);
        self.actions.extend(actions);
        self.rewards.extend_from_slice(rewards);
        self.dones.extend_from_slice(dones);
        self.values.extend_from_slice(values);
        self.log_probs.extend_from_slice(log_probs);
    }

    /// Generalized advantage estimation.
    ///
    /// `last_values` are the critic's estimates for the observations that
    /// follow the final stored step. A `done` step does not bootstrap from
    /// the next sample, which already belongs to a new episode.
    pub fn compute_returns_and_advantages(&mut self, last_values: &[f32], gamma: f32, lambda: f32) {
        let n = self.n_envs;
        let steps = self.steps();
        self.advantages = vec![0.0; self.len()];
        self.returns = vec![0.0; self.len()];
        let mut last_advantage = vec![0.0; n];

        for t in (0..steps).rev() {
            for e in 0..n {
                let i = t * n + e;
                let next_value = if t == steps - 1 {
                    last_values[e]
                } else {
                    self.values[i + n]
                };
                let next_non_terminal = if self.dones[i] { 0.0 } else { 1.0 };
                let delta = self.rewards[i] + gamma * next_value * next_non_terminal - self.values[i];
                last_advantage[e] = delta + gamma * lambda * next_non_terminal * last_advantage[e];
                self.advantages[i] = last_advantage[e];
                self.returns[i] = last_advantage[e] + self.values[i];
            }
        }
    }
}
