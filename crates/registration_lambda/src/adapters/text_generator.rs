use registration_core::model::TextGenerationRequest;

use crate::error::ServiceError;

pub trait TextGenerator {
    /// Runs the request against the hosted model and returns the decoded text.
    fn generate(&self, request: &TextGenerationRequest) -> Result<String, ServiceError>;
}
