use thiserror::Error;

/// Errors raised while loading or validating a [`crate::SimulationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("malformed configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A per-agent buffer does not line up with the live population.
    #[error("buffer holds {actual} transforms but the store has {expected} agents")]
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
