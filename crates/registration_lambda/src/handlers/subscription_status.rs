use registration_core::subscription::is_confirmed_for;
use serde::{Deserialize, Serialize};

use crate::adapters::topic::NotificationTopic;
use crate::error::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionStatusResponse {
    pub subscription_confirmed: bool,
}

/// Scans every subscription of the topic for a confirmed one whose endpoint
/// is `email`. Linear in the number of subscribers.
pub fn subscription_confirmed(
    email: &str,
    topic: &dyn NotificationTopic,
) -> Result<bool, ServiceError> {
    let mut next_token: Option<String> = None;
    let mut inspected = 0usize;

    loop {
        let page = topic.list_subscriptions(next_token.as_deref())?;

        for subscription in &page.subscriptions {
            if subscription.is_pending_placeholder() {
                continue;
            }
            inspected += 1;

            let attributes = topic.subscription_attributes(&subscription.subscription_arn)?;
            if is_confirmed_for(&attributes, email) {
                tracing::info!(
                    component = "subscription_status",
                    event = "subscription_confirmed",
                    email = %email,
                    subscription_arn = %subscription.subscription_arn,
                    inspected
                );
                return Ok(true);
            }
        }

        match page.next_token {
            Some(token) if !token.is_empty() && Some(&token) != next_token.as_ref() => {
                next_token = Some(token);
            }
            _ => break,
        }
    }

    tracing::info!(
        component = "subscription_status",
        event = "subscription_not_confirmed",
        email = %email,
        inspected
    );
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryTopic;

    #[test]
    fn confirmed_subscription_for_email_is_reported() {
        let topic = MemoryTopic::new();
        topic.add_subscription("ada@example.com", false);

        assert!(subscription_confirmed("ada@example.com", &topic).expect("scan should succeed"));
    }

    #[test]
    fn pending_subscription_is_not_confirmed() {
        let topic = MemoryTopic::new();
        topic.add_subscription("ada@example.com", true);

        assert!(!subscription_confirmed("ada@example.com", &topic).expect("scan should succeed"));
        assert!(topic.attribute_reads().is_empty());
    }

    #[test]
    fn other_subscribers_do_not_count() {
        let topic = MemoryTopic::new();
        topic.add_subscription("grace@example.com", false);

        assert!(!subscription_confirmed("ada@example.com", &topic).expect("scan should succeed"));
        assert_eq!(topic.attribute_reads().len(), 1);
    }

    #[test]
    fn follows_pagination_to_later_pages() {
        let topic = MemoryTopic::new().with_page_size(2);
        for index in 0..5 {
            topic.add_subscription(&format!("user{index}@example.com"), false);
        }
        let target = topic.add_subscription("ada@example.com", false);

        assert!(subscription_confirmed("ada@example.com", &topic).expect("scan should succeed"));
        let reads = topic.attribute_reads();
        assert_eq!(reads.len(), 6);
        assert_eq!(reads.last(), Some(&target));
    }

    #[test]
    fn stops_at_first_match() {
        let topic = MemoryTopic::new();
        let first = topic.add_subscription("ada@example.com", false);
        topic.add_subscription("grace@example.com", false);

        assert!(subscription_confirmed("ada@example.com", &topic).expect("scan should succeed"));
        assert_eq!(topic.attribute_reads(), vec![first]);
    }

    #[test]
    fn topic_misconfiguration_propagates() {
        let topic = MemoryTopic::unconfigured();
        let error =
            subscription_confirmed("ada@example.com", &topic).expect_err("scan should fail");
        assert!(matches!(error, ServiceError::Misconfigured("TOPIC_ARN")));
    }
}
