use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhysicsError {
    #[error("unknown robot model `{0}`")]
    UnknownRobot(String),
    #[error("invalid robot description: {0}")]
    InvalidRobot(String),
    #[error("failed to parse robot description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid simulator configuration: {0}")]
    InvalidConfig(String),
    #[error("action has {got} components, expected {expected}")]
    ActionDim { expected: usize, got: usize },
    #[error("simulation diverged: {0}")]
    Diverged(String),
}
