use crate::error::ConfigurationError;
use physics::Vec3;
use serde::{Deserialize, Serialize};

/// Target the end-effector has to reach.
///
/// Immutable once built; a task replaces its goal wholesale between episodes.
/// Validation happens on construction and on deserialization, so every
/// `GoalSpec` in the program holds finite coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGoal")]
pub struct GoalSpec {
    target_position: Vec3,
    #[serde(skip_serializing_if = "Option::is_none")]
    tolerance: Option<f32>,
}

#[derive(Deserialize)]
struct RawGoal {
    target_position: Vec<f32>,
    #[serde(default)]
    tolerance: Option<f32>,
}

impl TryFrom<RawGoal> for GoalSpec {
    type Error = ConfigurationError;

    fn try_from(raw: RawGoal) -> Result<Self, Self::Error> {
        let goal = Self::from_slice(&raw.target_position)?;
        match raw.tolerance {
            Some(t) => goal.with_tolerance(t),
            None => Ok(goal),
        }
    }
}

impl Default for GoalSpec {
    fn default() -> Self {
        Self {
            target_position: Vec3::new(0.3, 0.0, 0.0),
            tolerance: None,
        }
    }
}

impl GoalSpec {
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MalformedGoal`] for non-finite coordinates.
    pub fn new(target: [f32; 3]) -> Result<Self, ConfigurationError> {
        if let Some(i) = target.iter().position(|v| !v.is_finite()) {
            return Err(ConfigurationError::MalformedGoal(format!(
                "coordinate {i} is {}",
                target[i]
            )));
        }
        Ok(Self {
            target_position: Vec3::new(target[0], target[1], target[2]),
            tolerance: None,
        })
    }

    /// Build from a loosely typed vector, e.g. a CLI argument list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MalformedGoal`] unless `values` holds
    /// exactly three finite numbers.
    pub fn from_slice(values: &[f32]) -> Result<Self, ConfigurationError> {
        let target: [f32; 3] = values.try_into().map_err(|_| {
            ConfigurationError::MalformedGoal(format!(
                "expected 3 coordinates, got {}",
                values.len()
            ))
        })?;
        Self::new(target)
    }

    /// Override the task's success tolerance for this goal.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MalformedGoal`] unless `tolerance` is
    /// finite and positive.
    pub fn with_tolerance(self, tolerance: f32) -> Result<Self, ConfigurationError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigurationError::MalformedGoal(format!(
                "tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(Self {
            tolerance: Some(tolerance),
            ..self
        })
    }

    #[must_use]
    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    #[must_use]
    pub fn tolerance(&self) -> Option<f32> {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_arity_and_nan() {
        assert!(GoalSpec::from_slice(&[0.1, 0.2]).is_err());
        assert!(GoalSpec::from_slice(&[0.1, 0.2, 0.3, 0.4]).is_err());
        assert!(GoalSpec::new([0.1, f32::NAN, 0.0]).is_err());
        assert!(GoalSpec::default().with_tolerance(0.0).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let goal: GoalSpec =
            serde_json::from_str(r#"{"target_position": [0.3, 0.0, 0.1], "tolerance": 0.05}"#)
                .unwrap();
        assert_eq!(goal.target_position(), Vec3::new(0.3, 0.0, 0.1));
        assert_eq!(goal.tolerance(), Some(0.05));

        assert!(serde_json::from_str::<GoalSpec>(r#"{"target_position": [0.3, 0.0]}"#).is_err());
    }

    #[test]
    fn serializes_without_default_tolerance() {
        let json = serde_json::to_string(&GoalSpec::default()).unwrap();
        assert_eq!(json, r#"{"target_position":[0.3,0.0,0.0]}"#);
    }
}
