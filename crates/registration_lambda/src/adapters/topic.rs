use std::collections::HashMap;

use registration_core::subscription::SubscriptionPage;

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub message: String,
    pub recipient: String,
}

pub trait NotificationTopic {
    fn publish(&self, notification: &Notification) -> Result<(), ServiceError>;

    /// Subscribes an email endpoint; returns the subscription ARN when the
    /// service reports one.
    fn subscribe_email(&self, email: &str) -> Result<Option<String>, ServiceError>;

    fn list_subscriptions(&self, next_token: Option<&str>)
        -> Result<SubscriptionPage, ServiceError>;

    fn subscription_attributes(
        &self,
        subscription_arn: &str,
    ) -> Result<HashMap<String, String>, ServiceError>;

    fn check_configured(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
