use registration_core::contract::ValidationError;
use registration_core::model::ModelResponseError;
use thiserror::Error;

/// Failure talking to a managed service, or a missing setting for one.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} must be configured")]
    Misconfigured(&'static str),

    #[error("DynamoDB error: {0}")]
    Store(String),

    #[error("SQS error: {0}")]
    Queue(String),

    #[error("SNS error: {0}")]
    Topic(String),

    #[error("Bedrock error: {0}")]
    Model(String),
}

impl From<ModelResponseError> for ServiceError {
    fn from(error: ModelResponseError) -> Self {
        ServiceError::Model(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HandlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation(ValidationError::new(message))
    }
}
