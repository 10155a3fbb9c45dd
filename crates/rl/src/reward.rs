use serde::{Deserialize, Serialize};

/// Weights of the shaped reaching reward
///
/// `r = -w_dist * d - w_action * |a|^2 + success_bonus * [success]`
///
/// They are part of the session configuration and are stored with it, so a
/// run keeps the same learning signal from start to resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub w_dist: f32,
    pub w_action: f32,
    pub success_bonus: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            w_dist: 1.0,
            w_action: 0.05,
            success_bonus: 1.0,
        }
    }
}

impl RewardConfig {
    /// Dense reward for a step that ended `distance` away from the goal
    /// after applying `action`. The bonus is paid only when the task counted
    /// the step as a success.
    #[must_use]
    pub fn shaped(&self, distance: f32, action: &[f32], success: bool) -> f32 {
        let effort: f32 = action.iter().map(|a| a * a).sum();
        -self.w_dist * distance - self.w_action * effort + self.sparse(success)
    }

    /// Success-only reward.
    #[must_use]
    pub fn sparse(&self, success: bool) -> f32 {
        if success {
            self.success_bonus
        } else {
            0.0
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if [self.w_dist, self.w_action, self.success_bonus]
            .iter()
            .any(|w| !(w.is_finite() && *w >= 0.0))
        {
            return Err(format!("reward weights must be finite and non-negative: {self:?}"));
        }
        Ok(())
    }
}
