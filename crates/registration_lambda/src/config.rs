use registration_core::model::DEFAULT_MODEL_ID;

use crate::error::ServiceError;

pub const TABLE_NAME_VAR: &str = "TABLE_NAME";
pub const QUEUE_URL_VAR: &str = "QUEUE_URL";
pub const TOPIC_ARN_VAR: &str = "TOPIC_ARN";
pub const MODEL_ID_VAR: &str = "MODEL_ID";
pub const EMAIL_SUBJECT_VAR: &str = "EMAIL_SUBJECT";

pub const DEFAULT_EMAIL_SUBJECT: &str = "Welcome to AWS re:Invent Builder's Session SVS 209";

/// Deployment settings read from the function environment at cold start.
///
/// Every function in the stack shares this struct; each one only requires
/// the settings its handlers touch, so resource names stay optional here and
/// are checked on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub table_name: Option<String>,
    pub queue_url: Option<String>,
    pub topic_arn: Option<String>,
    pub model_id: String,
    pub email_subject: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            table_name: non_blank(TABLE_NAME_VAR),
            queue_url: non_blank(QUEUE_URL_VAR),
            topic_arn: non_blank(TOPIC_ARN_VAR),
            model_id: non_blank(MODEL_ID_VAR).unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            email_subject: non_blank(EMAIL_SUBJECT_VAR)
                .unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string()),
        }
    }

    pub fn table_name(&self) -> Result<&str, ServiceError> {
        required(self.table_name.as_deref(), TABLE_NAME_VAR)
    }

    pub fn queue_url(&self) -> Result<&str, ServiceError> {
        required(self.queue_url.as_deref(), QUEUE_URL_VAR)
    }

    pub fn topic_arn(&self) -> Result<&str, ServiceError> {
        required(self.topic_arn.as_deref(), TOPIC_ARN_VAR)
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ServiceError> {
    value.ok_or(ServiceError::Misconfigured(name))
}
