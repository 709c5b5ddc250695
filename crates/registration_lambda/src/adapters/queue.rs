use crate::error::ServiceError;

pub trait RegistrationQueue {
    fn enqueue(&self, message_body: &str) -> Result<(), ServiceError>;

    fn check_configured(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
