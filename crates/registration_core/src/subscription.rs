use std::collections::HashMap;

use serde_json::json;

pub const ENDPOINT_ATTRIBUTE: &str = "Endpoint";
pub const PENDING_CONFIRMATION_ATTRIBUTE: &str = "PendingConfirmation";
pub const FILTER_POLICY_ATTRIBUTE: &str = "FilterPolicy";
pub const EMAIL_PROTOCOL: &str = "email";

/// Message attribute the dispatcher stamps on every notification and the
/// per-subscriber filter policy matches on.
pub const RECIPIENT_MESSAGE_ATTRIBUTE: &str = "recipient";

/// SNS reports this literal in place of an ARN while a subscription awaits
/// confirmation.
pub const PENDING_SUBSCRIPTION_ARN: &str = "PendingConfirmation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub subscription_arn: String,
    pub endpoint: Option<String>,
}

impl SubscriptionSummary {
    pub fn is_pending_placeholder(&self) -> bool {
        self.subscription_arn == PENDING_SUBSCRIPTION_ARN
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPage {
    pub subscriptions: Vec<SubscriptionSummary>,
    pub next_token: Option<String>,
}

/// True when the attributes describe a confirmed subscription for `email`.
pub fn is_confirmed_for(attributes: &HashMap<String, String>, email: &str) -> bool {
    let endpoint_matches = attributes
        .get(ENDPOINT_ATTRIBUTE)
        .map(|endpoint| endpoint == email)
        .unwrap_or(false);
    let confirmed = attributes
        .get(PENDING_CONFIRMATION_ATTRIBUTE)
        .map(|pending| pending == "false")
        .unwrap_or(false);

    endpoint_matches && confirmed
}

/// Filter policy restricting a subscriber to notifications addressed to it.
pub fn recipient_filter_policy(email: &str) -> String {
    json!({ RECIPIENT_MESSAGE_ATTRIBUTE: [email] }).to_string()
}
