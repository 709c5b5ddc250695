//! In-memory adapters for tests. They record every call so assertions can
//! inspect side effects without any AWS access.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use registration_core::contract::RegistrationRecord;
use registration_core::model::TextGenerationRequest;
use registration_core::subscription::{
    SubscriptionPage, SubscriptionSummary, ENDPOINT_ATTRIBUTE, PENDING_CONFIRMATION_ATTRIBUTE,
    PENDING_SUBSCRIPTION_ARN,
};

use crate::adapters::queue::RegistrationQueue;
use crate::adapters::store::{ContentWrite, DeliveryState, RegistrationStore};
use crate::adapters::text_generator::TextGenerator;
use crate::adapters::topic::{Notification, NotificationTopic};
use crate::config::{QUEUE_URL_VAR, TABLE_NAME_VAR, TOPIC_ARN_VAR};
use crate::error::ServiceError;

#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, RegistrationRecord>>,
    put_count: Mutex<usize>,
    configured: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            put_count: Mutex::new(0),
            configured: true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    pub fn record(&self, email: &str) -> Option<RegistrationRecord> {
        self.records
            .lock()
            .expect("poisoned mutex")
            .get(email)
            .cloned()
    }

    pub fn records(&self) -> Vec<RegistrationRecord> {
        self.records
            .lock()
            .expect("poisoned mutex")
            .values()
            .cloned()
            .collect()
    }

    pub fn put_count(&self) -> usize {
        *self.put_count.lock().expect("poisoned mutex")
    }
}

impl RegistrationStore for MemoryStore {
    fn put_registration(&self, record: &RegistrationRecord) -> Result<(), ServiceError> {
        self.check_configured()?;
        self.records
            .lock()
            .expect("poisoned mutex")
            .insert(record.email.clone(), record.clone());
        *self.put_count.lock().expect("poisoned mutex") += 1;
        Ok(())
    }

    fn delivery_state(&self, email: &str) -> Result<DeliveryState, ServiceError> {
        self.check_configured()?;
        let records = self.records.lock().expect("poisoned mutex");
        let Some(record) = records.get(email) else {
            return Ok(DeliveryState::Pending);
        };
        Ok(match (&record.email_body, &record.dispatched_at) {
            (_, Some(_)) => DeliveryState::Dispatched,
            (Some(body), None) => DeliveryState::Generated(body.clone()),
            (None, None) => DeliveryState::Pending,
        })
    }

    fn save_email_body(&self, email: &str, body: &str) -> Result<ContentWrite, ServiceError> {
        self.check_configured()?;
        let mut records = self.records.lock().expect("poisoned mutex");
        // An update against a missing key creates the item, as DynamoDB does.
        let record = records
            .entry(email.to_string())
            .or_insert_with(|| RegistrationRecord {
                email: email.to_string(),
                profile_text: String::new(),
                created_at: String::new(),
                email_body: None,
                dispatched_at: None,
            });

        if record.email_body.is_some() {
            return Ok(ContentWrite::AlreadyPresent);
        }
        record.email_body = Some(body.to_string());
        Ok(ContentWrite::Written)
    }

    fn mark_dispatched(&self, email: &str, dispatched_at: &str) -> Result<(), ServiceError> {
        self.check_configured()?;
        let mut records = self.records.lock().expect("poisoned mutex");
        match records.get_mut(email) {
            Some(record) => {
                record.dispatched_at = Some(dispatched_at.to_string());
                Ok(())
            }
            None => Err(ServiceError::Store(format!("no registration for {email}"))),
        }
    }

    fn check_configured(&self) -> Result<(), ServiceError> {
        if self.configured {
            Ok(())
        } else {
            Err(ServiceError::Misconfigured(TABLE_NAME_VAR))
        }
    }
}

#[derive(Debug)]
pub struct MemoryQueue {
    messages: Mutex<Vec<String>>,
    configured: bool,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            configured: true,
        }
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("poisoned mutex").clone()
    }
}

impl RegistrationQueue for MemoryQueue {
    fn enqueue(&self, message_body: &str) -> Result<(), ServiceError> {
        self.check_configured()?;
        self.messages
            .lock()
            .expect("poisoned mutex")
            .push(message_body.to_string());
        Ok(())
    }

    fn check_configured(&self) -> Result<(), ServiceError> {
        if self.configured {
            Ok(())
        } else {
            Err(ServiceError::Misconfigured(QUEUE_URL_VAR))
        }
    }
}

/// Model stand-in that answers every prompt with a fixed greeting, or fails
/// for prompts containing a configured marker.
#[derive(Debug, Default)]
pub struct CannedModel {
    reply: String,
    failing_marker: Option<String>,
    requests: Mutex<Vec<TextGenerationRequest>>,
}

impl CannedModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    pub fn failing_when_prompt_contains(mut self, marker: impl Into<String>) -> Self {
        self.failing_marker = Some(marker.into());
        self
    }

    pub fn requests(&self) -> Vec<TextGenerationRequest> {
        self.requests.lock().expect("poisoned mutex").clone()
    }
}

impl TextGenerator for CannedModel {
    fn generate(&self, request: &TextGenerationRequest) -> Result<String, ServiceError> {
        self.requests
            .lock()
            .expect("poisoned mutex")
            .push(request.clone());

        if let Some(marker) = &self.failing_marker {
            if request.input_text.contains(marker.as_str()) {
                return Err(ServiceError::Model("ThrottlingException".to_string()));
            }
        }
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Clone)]
struct MemorySubscription {
    arn: String,
    endpoint: String,
    pending: bool,
    filter_policy: Option<String>,
}

#[derive(Debug)]
pub struct MemoryTopic {
    subscriptions: Mutex<Vec<MemorySubscription>>,
    published: Mutex<Vec<Notification>>,
    attribute_reads: Mutex<Vec<String>>,
    publish_failures: Mutex<usize>,
    page_size: usize,
    configured: bool,
}

impl Default for MemoryTopic {
    fn default() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            attribute_reads: Mutex::new(Vec::new()),
            publish_failures: Mutex::new(0),
            page_size: 100,
            configured: true,
        }
    }
}

impl MemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    /// Rejects the next `count` publishes as SNS would during an outage.
    pub fn failing_next_publishes(self, count: usize) -> Self {
        *self.publish_failures.lock().expect("poisoned mutex") = count;
        self
    }

    /// Adds an existing subscription and returns its ARN.
    pub fn add_subscription(&self, endpoint: &str, pending: bool) -> String {
        let mut subscriptions = self.subscriptions.lock().expect("poisoned mutex");
        let arn = format!("arn:aws:sns:us-east-1:000000000000:welcome:{}", subscriptions.len());
        subscriptions.push(MemorySubscription {
            arn: arn.clone(),
            endpoint: endpoint.to_string(),
            pending,
            filter_policy: None,
        });
        arn
    }

    /// Marks every subscription of `endpoint` as confirmed.
    pub fn confirm(&self, endpoint: &str) {
        for subscription in self
            .subscriptions
            .lock()
            .expect("poisoned mutex")
            .iter_mut()
            .filter(|subscription| subscription.endpoint == endpoint)
        {
            subscription.pending = false;
        }
    }

    pub fn filter_policy(&self, endpoint: &str) -> Option<String> {
        self.subscriptions
            .lock()
            .expect("poisoned mutex")
            .iter()
            .find(|subscription| subscription.endpoint == endpoint)
            .and_then(|subscription| subscription.filter_policy.clone())
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().expect("poisoned mutex").clone()
    }

    pub fn attribute_reads(&self) -> Vec<String> {
        self.attribute_reads.lock().expect("poisoned mutex").clone()
    }
}

impl NotificationTopic for MemoryTopic {
    fn publish(&self, notification: &Notification) -> Result<(), ServiceError> {
        self.check_configured()?;
        let mut failures = self.publish_failures.lock().expect("poisoned mutex");
        if *failures > 0 {
            *failures -= 1;
            return Err(ServiceError::Topic("InternalError".to_string()));
        }
        drop(failures);
        self.published
            .lock()
            .expect("poisoned mutex")
            .push(notification.clone());
        Ok(())
    }

    fn subscribe_email(&self, email: &str) -> Result<Option<String>, ServiceError> {
        self.check_configured()?;
        let arn = self.add_subscription(email, true);
        let mut subscriptions = self.subscriptions.lock().expect("poisoned mutex");
        if let Some(subscription) = subscriptions.iter_mut().find(|item| item.arn == arn) {
            subscription.filter_policy =
                Some(registration_core::subscription::recipient_filter_policy(email));
        }
        Ok(Some(arn))
    }

    fn list_subscriptions(
        &self,
        next_token: Option<&str>,
    ) -> Result<SubscriptionPage, ServiceError> {
        self.check_configured()?;
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ServiceError::Topic(format!("invalid next token '{token}'")))?,
            None => 0,
        };

        let subscriptions = self.subscriptions.lock().expect("poisoned mutex");
        let end = (start + self.page_size).min(subscriptions.len());
        let page = subscriptions
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|subscription| SubscriptionSummary {
                subscription_arn: if subscription.pending {
                    PENDING_SUBSCRIPTION_ARN.to_string()
                } else {
                    subscription.arn.clone()
                },
                endpoint: Some(subscription.endpoint.clone()),
            })
            .collect();

        Ok(SubscriptionPage {
            subscriptions: page,
            next_token: (end < subscriptions.len()).then(|| end.to_string()),
        })
    }

    fn subscription_attributes(
        &self,
        subscription_arn: &str,
    ) -> Result<HashMap<String, String>, ServiceError> {
        self.check_configured()?;
        self.attribute_reads
            .lock()
            .expect("poisoned mutex")
            .push(subscription_arn.to_string());

        let subscriptions = self.subscriptions.lock().expect("poisoned mutex");
        let subscription = subscriptions
            .iter()
            .find(|subscription| subscription.arn == subscription_arn)
            .ok_or_else(|| ServiceError::Topic(format!("NotFound: {subscription_arn}")))?;

        Ok(HashMap::from([
            (ENDPOINT_ATTRIBUTE.to_string(), subscription.endpoint.clone()),
            (
                PENDING_CONFIRMATION_ATTRIBUTE.to_string(),
                subscription.pending.to_string(),
            ),
            ("Protocol".to_string(), "email".to_string()),
            ("SubscriptionArn".to_string(), subscription.arn.clone()),
        ]))
    }

    fn check_configured(&self) -> Result<(), ServiceError> {
        if self.configured {
            Ok(())
        } else {
            Err(ServiceError::Misconfigured(TOPIC_ARN_VAR))
        }
    }
}
