use std::time::Instant;

use registration_core::contract::parse_registration;
use registration_core::model::{TextGenerationConfig, TextGenerationRequest};
use registration_core::prompt::{build_welcome_prompt, SESSION_DATA};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::store::{ContentWrite, DeliveryState, RegistrationStore};
use crate::adapters::text_generator::TextGenerator;
use crate::adapters::topic::NotificationTopic;
use crate::config::ServiceConfig;
use crate::error::{HandlerError, ServiceError};
use crate::handlers::dispatch::dispatch_welcome_email;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub session_data: String,
    pub generation: TextGenerationConfig,
    pub email_subject: String,
}

impl GeneratorConfig {
    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self {
            session_data: SESSION_DATA.to_string(),
            generation: TextGenerationConfig::default(),
            email_subject: config.email_subject.clone(),
        }
    }
}

/// Partial batch response understood by the SQS event source mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqsBatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRecord {
    pub message_id: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Dispatched,
    /// A stored body whose earlier publish failed was sent again.
    Redispatched,
    /// A previous delivery already stored and sent the email.
    AlreadyDispatched,
    /// A concurrent delivery stored its body first and owns the publish.
    AlreadyGenerated,
}

/// Processes every record of an SQS event independently. Failed records are
/// reported by message id so only they are redelivered.
pub fn handle_sqs_batch(
    event: &Value,
    processed_at: &str,
    config: &GeneratorConfig,
    store: &dyn RegistrationStore,
    model: &dyn TextGenerator,
    topic: &dyn NotificationTopic,
) -> Result<SqsBatchResponse, HandlerError> {
    let records = decode_sqs_records(event)?;
    let started_at = Instant::now();
    let mut response = SqsBatchResponse::default();

    for record in &records {
        let outcome = match &record.body {
            Some(body) => process_record(body, processed_at, config, store, model, topic),
            None => Err(HandlerError::validation("SQS record body must be a string")),
        };

        match outcome {
            Ok(outcome) => tracing::info!(
                component = "generator",
                event = "record_processed",
                message_id = %record.message_id,
                outcome = ?outcome
            ),
            Err(error) => {
                tracing::error!(
                    component = "generator",
                    event = "record_failed",
                    message_id = %record.message_id,
                    error = %error
                );
                response.batch_item_failures.push(BatchItemFailure {
                    item_identifier: record.message_id.clone(),
                });
            }
        }
    }

    let duration_ms = started_at.elapsed().as_millis() as u64;
    tracing::info!(
        component = "generator",
        event = "batch_completed",
        records = records.len(),
        failed = response.batch_item_failures.len(),
        duration_ms
    );
    Ok(response)
}

/// Generates, stores and publishes the welcome email for one queued
/// registration. Safe to run again for the same message: a stored body is
/// never regenerated, and a body whose publish was not recorded is re-sent.
pub fn process_record(
    body: &str,
    processed_at: &str,
    config: &GeneratorConfig,
    store: &dyn RegistrationStore,
    model: &dyn TextGenerator,
    topic: &dyn NotificationTopic,
) -> Result<RecordOutcome, HandlerError> {
    let registration = parse_registration(body)?;

    match store.delivery_state(&registration.email)? {
        DeliveryState::Pending => {}
        DeliveryState::Dispatched => {
            tracing::warn!(
                component = "generator",
                event = "email_already_dispatched",
                email = %registration.email
            );
            return Ok(RecordOutcome::AlreadyDispatched);
        }
        DeliveryState::Generated(email_body) => {
            tracing::warn!(
                component = "generator",
                event = "redispatching_stored_body",
                email = %registration.email
            );
            publish_and_record(
                &registration.email,
                &email_body,
                processed_at,
                config,
                store,
                topic,
            )?;
            return Ok(RecordOutcome::Redispatched);
        }
    }

    let prompt = build_welcome_prompt(
        &registration.name,
        &registration.profile_text,
        &config.session_data,
    );
    tracing::debug!(component = "generator", event = "prompt_built", prompt = %prompt);

    let request = TextGenerationRequest::new(prompt, config.generation.clone());
    let email_body = model.generate(&request)?.trim().to_string();
    if email_body.is_empty() {
        return Err(ServiceError::Model("model returned empty text".to_string()).into());
    }

    match store.save_email_body(&registration.email, &email_body)? {
        ContentWrite::Written => {
            publish_and_record(
                &registration.email,
                &email_body,
                processed_at,
                config,
                store,
                topic,
            )?;
            Ok(RecordOutcome::Dispatched)
        }
        ContentWrite::AlreadyPresent => {
            tracing::warn!(
                component = "generator",
                event = "email_body_already_present",
                email = %registration.email
            );
            Ok(RecordOutcome::AlreadyGenerated)
        }
    }
}

fn publish_and_record(
    email: &str,
    email_body: &str,
    dispatched_at: &str,
    config: &GeneratorConfig,
    store: &dyn RegistrationStore,
    topic: &dyn NotificationTopic,
) -> Result<(), HandlerError> {
    dispatch_welcome_email(topic, &config.email_subject, email, email_body)?;
    // If this write fails the record is redelivered and the email sent again.
    store.mark_dispatched(email, dispatched_at)?;
    Ok(())
}

pub fn decode_sqs_records(event: &Value) -> Result<Vec<QueuedRecord>, HandlerError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| HandlerError::validation("SQS event must include Records array"))?;

    records
        .iter()
        .map(|record| {
            let message_id = record
                .get("messageId")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::validation("SQS record messageId must be a string"))?;
            Ok(QueuedRecord {
                message_id: message_id.to_string(),
                body: record.get("body").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapters::memory::{CannedModel, MemoryStore, MemoryTopic};
    use registration_core::contract::RegistrationRecord;

    const PROCESSED_AT: &str = "2026-10-18T09:05:00+00:00";

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            session_data: "SVS 212 | Java on AWS Lambda with SnapStart".to_string(),
            generation: TextGenerationConfig::default(),
            email_subject: "Welcome".to_string(),
        }
    }

    fn registration_body(email: &str, name: &str, profile: &str) -> String {
        json!({
            "userAttributes": {"email": email, "given_name": name},
            "message": profile
        })
        .to_string()
    }

    fn sqs_record(message_id: &str, body: &str) -> Value {
        json!({
            "messageId": message_id,
            "eventSource": "aws:sqs",
            "body": body
        })
    }

    fn seeded_store(emails: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for email in emails {
            store
                .put_registration(&RegistrationRecord {
                    email: email.to_string(),
                    profile_text: "serverless, Java".to_string(),
                    created_at: "2026-10-18T09:00:00+00:00".to_string(),
                    email_body: None,
                    dispatched_at: None,
                })
                .expect("seed should succeed");
        }
        store
    }

    #[test]
    fn generates_and_stores_body_without_touching_profile() {
        let store = seeded_store(&["ada@example.com"]);
        let model = CannedModel::new("  Dear Ada, welcome to re:Invent!\n");
        let topic = MemoryTopic::new();

        let outcome = process_record(
            &registration_body("ada@example.com", "Ada", "serverless, Java"),
            PROCESSED_AT,
            &config(),
            &store,
            &model,
            &topic,
        )
        .expect("record should succeed");

        assert_eq!(outcome, RecordOutcome::Dispatched);
        let record = store.record("ada@example.com").expect("record should exist");
        assert_eq!(record.email, "ada@example.com");
        assert_eq!(record.profile_text, "serverless, Java");
        assert_eq!(
            record.email_body.as_deref(),
            Some("Dear Ada, welcome to re:Invent!")
        );
        assert_eq!(record.dispatched_at.as_deref(), Some(PROCESSED_AT));

        let published = topic.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].recipient, "ada@example.com");
        assert_eq!(published[0].message, "Dear Ada, welcome to re:Invent!");
    }

    #[test]
    fn prompt_carries_name_interests_and_sessions() {
        let store = seeded_store(&["ada@example.com"]);
        let model = CannedModel::new("Dear Ada");
        let topic = MemoryTopic::new();

        process_record(
            &registration_body("ada@example.com", "Ada", "serverless, Java"),
            PROCESSED_AT,
            &config(),
            &store,
            &model,
            &topic,
        )
        .expect("record should succeed");

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].input_text;
        assert!(prompt.contains("customer named Ada"));
        assert!(prompt.contains("interests: serverless, Java"));
        assert!(prompt.contains("SVS 212 | Java on AWS Lambda with SnapStart"));
        assert_eq!(requests[0].text_generation_config.max_token_count, 4096);
    }

    #[test]
    fn isolates_failing_record_in_batch() {
        let store = seeded_store(&["ada@example.com", "mallory@example.com", "grace@example.com"]);
        let model = CannedModel::new("Welcome!").failing_when_prompt_contains("Mallory");
        let topic = MemoryTopic::new();
        let event = json!({
            "Records": [
                sqs_record("m-1", &registration_body("ada@example.com", "Ada", "Java")),
                sqs_record("m-2", &registration_body("mallory@example.com", "Mallory", "Go")),
                sqs_record("m-3", &registration_body("grace@example.com", "Grace", "COBOL")),
            ]
        });

        let response =
            handle_sqs_batch(&event, PROCESSED_AT, &config(), &store, &model, &topic)
                .expect("batch should be handled");

        assert_eq!(
            response.batch_item_failures,
            vec![BatchItemFailure {
                item_identifier: "m-2".to_string()
            }]
        );
        assert_eq!(topic.published().len(), 2);
        assert!(store
            .record("mallory@example.com")
            .expect("record should exist")
            .email_body
            .is_none());
        assert!(store
            .record("grace@example.com")
            .expect("record should exist")
            .email_body
            .is_some());
    }

    #[test]
    fn malformed_body_fails_only_its_record() {
        let store = seeded_store(&["ada@example.com"]);
        let model = CannedModel::new("Welcome!");
        let topic = MemoryTopic::new();
        let event = json!({
            "Records": [
                sqs_record("bad", "{\"userAttributes\": {}}"),
                {"messageId": "numeric", "body": 42},
                sqs_record("good", &registration_body("ada@example.com", "Ada", "Java")),
            ]
        });

        let response =
            handle_sqs_batch(&event, PROCESSED_AT, &config(), &store, &model, &topic)
                .expect("batch should be handled");

        let failed: Vec<&str> = response
            .batch_item_failures
            .iter()
            .map(|failure| failure.item_identifier.as_str())
            .collect();
        assert_eq!(failed, vec!["bad", "numeric"]);
        assert_eq!(topic.published().len(), 1);
    }

    #[test]
    fn redelivered_message_does_not_send_twice() {
        let store = seeded_store(&["ada@example.com"]);
        let first_model = CannedModel::new("First draft");
        let second_model = CannedModel::new("Second draft");
        let topic = MemoryTopic::new();
        let body = registration_body("ada@example.com", "Ada", "Java");

        process_record(&body, PROCESSED_AT, &config(), &store, &first_model, &topic)
            .expect("first delivery should succeed");
        let outcome =
            process_record(&body, PROCESSED_AT, &config(), &store, &second_model, &topic)
                .expect("redelivery should succeed");

        assert_eq!(outcome, RecordOutcome::AlreadyDispatched);
        assert!(second_model.requests().is_empty());
        assert_eq!(
            store
                .record("ada@example.com")
                .expect("record should exist")
                .email_body
                .as_deref(),
            Some("First draft")
        );
        assert_eq!(topic.published().len(), 1);
    }

    #[test]
    fn failed_publish_is_retried_on_redelivery() {
        let store = seeded_store(&["ada@example.com"]);
        let model = CannedModel::new("Dear Ada");
        let topic = MemoryTopic::new().failing_next_publishes(1);
        let event = json!({
            "Records": [sqs_record("m-1", &registration_body("ada@example.com", "Ada", "Java"))]
        });

        let first = handle_sqs_batch(&event, PROCESSED_AT, &config(), &store, &model, &topic)
            .expect("batch should be handled");
        assert_eq!(
            first.batch_item_failures,
            vec![BatchItemFailure {
                item_identifier: "m-1".to_string()
            }]
        );
        assert!(topic.published().is_empty());

        let redelivery =
            handle_sqs_batch(&event, "2026-10-18T09:06:00+00:00", &config(), &store, &model, &topic)
                .expect("batch should be handled");
        assert!(redelivery.batch_item_failures.is_empty());

        let published = topic.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message, "Dear Ada");
        assert_eq!(model.requests().len(), 1);
        let record = store.record("ada@example.com").expect("record should exist");
        assert_eq!(record.dispatched_at.as_deref(), Some("2026-10-18T09:06:00+00:00"));

        let third = handle_sqs_batch(&event, PROCESSED_AT, &config(), &store, &model, &topic)
            .expect("batch should be handled");
        assert!(third.batch_item_failures.is_empty());
        assert_eq!(topic.published().len(), 1);
    }

    #[test]
    fn stored_body_is_resent_without_calling_the_model() {
        let store = seeded_store(&["ada@example.com"]);
        store
            .save_email_body("ada@example.com", "Stored draft")
            .expect("body should save");
        let model = CannedModel::new("Fresh draft");
        let topic = MemoryTopic::new();

        let outcome = process_record(
            &registration_body("ada@example.com", "Ada", "Java"),
            PROCESSED_AT,
            &config(),
            &store,
            &model,
            &topic,
        )
        .expect("record should succeed");

        assert_eq!(outcome, RecordOutcome::Redispatched);
        assert!(model.requests().is_empty());
        assert_eq!(topic.published()[0].message, "Stored draft");
    }

    #[test]
    fn blank_generation_is_a_failure() {
        let store = seeded_store(&["ada@example.com"]);
        let model = CannedModel::new("   ");
        let topic = MemoryTopic::new();

        let error = process_record(
            &registration_body("ada@example.com", "Ada", "Java"),
            PROCESSED_AT,
            &config(),
            &store,
            &model,
            &topic,
        )
        .expect_err("blank output should fail");

        assert!(error.to_string().contains("empty text"));
        assert!(topic.published().is_empty());
    }

    #[test]
    fn rejects_event_without_records() {
        let error = decode_sqs_records(&json!({"detail": {}})).expect_err("event should fail");
        assert!(error
            .to_string()
            .contains("SQS event must include Records array"));
    }

    #[test]
    fn rejects_record_without_message_id() {
        let error = decode_sqs_records(&json!({"Records": [{"body": "{}"}]}))
            .expect_err("record should fail");
        assert!(error.to_string().contains("messageId must be a string"));
    }

    #[test]
    fn batch_response_uses_sqs_field_names() {
        let response = SqsBatchResponse {
            batch_item_failures: vec![BatchItemFailure {
                item_identifier: "m-1".to_string(),
            }],
        };

        assert_eq!(
            serde_json::to_value(response).expect("response should serialize"),
            json!({"batchItemFailures": [{"itemIdentifier": "m-1"}]})
        );
    }
}
