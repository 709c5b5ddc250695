use crate::adapters::topic::{Notification, NotificationTopic};
use crate::error::ServiceError;

/// Hands the generated email to the topic. Delivery and addressing are left
/// to the pub/sub service.
pub fn dispatch_welcome_email(
    topic: &dyn NotificationTopic,
    subject: &str,
    recipient: &str,
    body: &str,
) -> Result<(), ServiceError> {
    topic.publish(&Notification {
        subject: subject.to_string(),
        message: body.to_string(),
        recipient: recipient.to_string(),
    })?;

    tracing::info!(
        component = "dispatcher",
        event = "notification_published",
        recipient = %recipient,
        body_chars = body.chars().count()
    );
    Ok(())
}
