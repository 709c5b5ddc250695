use registration_core::contract::RegistrationRecord;

use crate::error::ServiceError;

/// Result of attaching generated content to a stored registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentWrite {
    Written,
    /// The record already carried a body; it was left untouched.
    AlreadyPresent,
}

/// How far the welcome email for a registration has progressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// No body stored yet.
    Pending,
    /// A body is stored but its publish was never recorded.
    Generated(String),
    Dispatched,
}

pub trait RegistrationStore {
    /// Writes the record keyed by email, replacing any previous item.
    fn put_registration(&self, record: &RegistrationRecord) -> Result<(), ServiceError>;

    /// Strongly consistent read of the generated body and dispatch marker.
    fn delivery_state(&self, email: &str) -> Result<DeliveryState, ServiceError>;

    /// Sets the generated body unless one is already present.
    fn save_email_body(&self, email: &str, body: &str) -> Result<ContentWrite, ServiceError>;

    fn mark_dispatched(&self, email: &str, dispatched_at: &str) -> Result<(), ServiceError>;

    fn check_configured(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
