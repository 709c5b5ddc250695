use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const EMAIL_ATTRIBUTE: &str = "email";
pub const PROFILE_TEXT_ATTRIBUTE: &str = "profile_text";
pub const CREATED_AT_ATTRIBUTE: &str = "created_at";
pub const EMAIL_BODY_ATTRIBUTE: &str = "email_body";
pub const DISPATCHED_AT_ATTRIBUTE: &str = "dispatched_at";

/// Registration payload as submitted by the browser client and forwarded
/// through the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    pub user_attributes: UserAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Identity-provider attributes this crate does not interpret
    /// (`family_name`, `sub`, `email_verified`, ...). Carried through untouched.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// A registration whose required fields have been checked and trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub profile_text: String,
    payload: RegistrationRequest,
}

impl Registration {
    /// The normalized payload, suitable for echoing back or enqueueing.
    pub fn payload(&self) -> &RegistrationRequest {
        &self.payload
    }

    pub fn queue_message_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.payload)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub email: String,
    pub profile_text: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    /// Set once the welcome email built from `email_body` has been published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<String>,
}

impl RegistrationRecord {
    pub fn new(registration: &Registration, created_at: impl Into<String>) -> Self {
        Self {
            email: registration.email.clone(),
            profile_text: registration.profile_text.clone(),
            created_at: created_at.into(),
            email_body: None,
            dispatched_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn validate_registration(
    request: RegistrationRequest,
) -> Result<Registration, ValidationError> {
    let email = required_text(request.user_attributes.email.as_deref(), "userAttributes.email")?;
    if !is_plausible_email(&email) {
        return Err(ValidationError::new(format!(
            "userAttributes.email '{email}' is not a valid email address"
        )));
    }

    let name = required_text(
        request.user_attributes.given_name.as_deref(),
        "userAttributes.given_name",
    )?;
    let profile_text = required_text(request.message.as_deref(), "message")?;

    let payload = RegistrationRequest {
        user_attributes: UserAttributes {
            email: Some(email.clone()),
            given_name: Some(name.clone()),
            other: request.user_attributes.other,
        },
        message: Some(profile_text.clone()),
    };

    Ok(Registration {
        email,
        name,
        profile_text,
        payload,
    })
}

/// Decodes and validates a JSON registration, e.g. a queue message body.
pub fn parse_registration(body: &str) -> Result<Registration, ValidationError> {
    let request: RegistrationRequest = serde_json::from_str(body)
        .map_err(|error| ValidationError::new(format!("Malformed registration: {error}")))?;
    validate_registration(request)
}

fn required_text(value: Option<&str>, field: &str) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        Some(_) => Err(ValidationError::new(format!("{field} cannot be empty"))),
        None => Err(ValidationError::new(format!("{field} is required"))),
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
}
