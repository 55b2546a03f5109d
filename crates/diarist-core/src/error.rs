use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiaristError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Model service error: {0}")]
    Service(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DiaristError {
    /// Returns `true` when the model backend could not be reached or answered
    /// with a failure, i.e. the error came from the model collaborator.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Service(_))
    }
}

pub type Result<T> = std::result::Result<T, DiaristError>;
