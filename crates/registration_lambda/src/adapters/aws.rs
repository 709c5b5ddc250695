use std::collections::HashMap;
use std::future::Future;

use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_sns::types::MessageAttributeValue;
use registration_core::contract::{
    RegistrationRecord, CREATED_AT_ATTRIBUTE, DISPATCHED_AT_ATTRIBUTE, EMAIL_ATTRIBUTE,
    EMAIL_BODY_ATTRIBUTE, PROFILE_TEXT_ATTRIBUTE,
};
use registration_core::model::{decode_output_text, TextGenerationRequest, MODEL_CONTENT_TYPE};
use registration_core::subscription::{
    recipient_filter_policy, SubscriptionPage, SubscriptionSummary, EMAIL_PROTOCOL,
    FILTER_POLICY_ATTRIBUTE, RECIPIENT_MESSAGE_ATTRIBUTE,
};

use crate::adapters::queue::RegistrationQueue;
use crate::adapters::store::{ContentWrite, DeliveryState, RegistrationStore};
use crate::adapters::text_generator::TextGenerator;
use crate::adapters::topic::{Notification, NotificationTopic};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::handlers::Services;

/// SDK clients for every managed service the pipeline touches, built once
/// per process and shared across invocations.
#[derive(Clone)]
pub struct AwsServices {
    config: ServiceConfig,
    dynamodb: aws_sdk_dynamodb::Client,
    sqs: aws_sdk_sqs::Client,
    sns: aws_sdk_sns::Client,
    bedrock: aws_sdk_bedrockruntime::Client,
}

impl AwsServices {
    pub async fn load(config: ServiceConfig) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            config,
            dynamodb: aws_sdk_dynamodb::Client::new(&aws_config),
            sqs: aws_sdk_sqs::Client::new(&aws_config),
            sns: aws_sdk_sns::Client::new(&aws_config),
            bedrock: aws_sdk_bedrockruntime::Client::new(&aws_config),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            store: self,
            queue: self,
            model: self,
            topic: self,
        }
    }
}

impl RegistrationStore for AwsServices {
    fn put_registration(&self, record: &RegistrationRecord) -> Result<(), ServiceError> {
        let table_name = self.config.table_name()?;
        let request = self
            .dynamodb
            .put_item()
            .table_name(table_name)
            .item(EMAIL_ATTRIBUTE, AttributeValue::S(record.email.clone()))
            .item(
                PROFILE_TEXT_ATTRIBUTE,
                AttributeValue::S(record.profile_text.clone()),
            )
            .item(
                CREATED_AT_ATTRIBUTE,
                AttributeValue::S(record.created_at.clone()),
            );
        let request = match &record.email_body {
            Some(body) => request.item(EMAIL_BODY_ATTRIBUTE, AttributeValue::S(body.clone())),
            None => request,
        };
        let request = match &record.dispatched_at {
            Some(at) => request.item(DISPATCHED_AT_ATTRIBUTE, AttributeValue::S(at.clone())),
            None => request,
        };

        block_on(request.send()).map(|_| ()).map_err(|error| {
            ServiceError::Store(format!(
                "failed to put registration: {}",
                aws_sdk_dynamodb::error::DisplayErrorContext(&error)
            ))
        })
    }

    fn delivery_state(&self, email: &str) -> Result<DeliveryState, ServiceError> {
        let table_name = self.config.table_name()?;
        let projection = format!("{EMAIL_BODY_ATTRIBUTE}, {DISPATCHED_AT_ATTRIBUTE}");
        let output = block_on(
            self.dynamodb
                .get_item()
                .table_name(table_name)
                .key(EMAIL_ATTRIBUTE, AttributeValue::S(email.to_string()))
                .consistent_read(true)
                .projection_expression(projection)
                .send(),
        )
        .map_err(|error| {
            ServiceError::Store(format!(
                "failed to read delivery state: {}",
                aws_sdk_dynamodb::error::DisplayErrorContext(&error)
            ))
        })?;

        let Some(item) = output.item() else {
            return Ok(DeliveryState::Pending);
        };
        let text = |name: &str| item.get(name).and_then(|value| value.as_s().ok());
        Ok(match (text(EMAIL_BODY_ATTRIBUTE), text(DISPATCHED_AT_ATTRIBUTE)) {
            (_, Some(_)) => DeliveryState::Dispatched,
            (Some(body), None) => DeliveryState::Generated(body.clone()),
            (None, None) => DeliveryState::Pending,
        })
    }

    fn save_email_body(&self, email: &str, body: &str) -> Result<ContentWrite, ServiceError> {
        let table_name = self.config.table_name()?;
        let result = block_on(
            self.dynamodb
                .update_item()
                .table_name(table_name)
                .key(EMAIL_ATTRIBUTE, AttributeValue::S(email.to_string()))
                .update_expression(format!("SET {EMAIL_BODY_ATTRIBUTE} = :email_body"))
                .condition_expression(format!("attribute_not_exists({EMAIL_BODY_ATTRIBUTE})"))
                .expression_attribute_values(":email_body", AttributeValue::S(body.to_string()))
                .send(),
        );

        match result {
            Ok(_) => Ok(ContentWrite::Written),
            Err(error) => match error.as_service_error() {
                Some(UpdateItemError::ConditionalCheckFailedException(_)) => {
                    Ok(ContentWrite::AlreadyPresent)
                }
                _ => Err(ServiceError::Store(format!(
                    "failed to save email body: {}",
                    aws_sdk_dynamodb::error::DisplayErrorContext(&error)
                ))),
            },
        }
    }

    fn mark_dispatched(&self, email: &str, dispatched_at: &str) -> Result<(), ServiceError> {
        let table_name = self.config.table_name()?;
        block_on(
            self.dynamodb
                .update_item()
                .table_name(table_name)
                .key(EMAIL_ATTRIBUTE, AttributeValue::S(email.to_string()))
                .update_expression(format!("SET {DISPATCHED_AT_ATTRIBUTE} = :dispatched_at"))
                .condition_expression(format!("attribute_exists({EMAIL_ATTRIBUTE})"))
                .expression_attribute_values(
                    ":dispatched_at",
                    AttributeValue::S(dispatched_at.to_string()),
                )
                .send(),
        )
        .map(|_| ())
        .map_err(|error| {
            ServiceError::Store(format!(
                "failed to record dispatch: {}",
                aws_sdk_dynamodb::error::DisplayErrorContext(&error)
            ))
        })
    }

    fn check_configured(&self) -> Result<(), ServiceError> {
        self.config.table_name().map(|_| ())
    }
}

impl RegistrationQueue for AwsServices {
    fn enqueue(&self, message_body: &str) -> Result<(), ServiceError> {
        let queue_url = self.config.queue_url()?;
        block_on(
            self.sqs
                .send_message()
                .queue_url(queue_url)
                .message_body(message_body)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| {
            ServiceError::Queue(format!(
                "failed to enqueue registration: {}",
                aws_sdk_sqs::error::DisplayErrorContext(&error)
            ))
        })
    }

    fn check_configured(&self) -> Result<(), ServiceError> {
        self.config.queue_url().map(|_| ())
    }
}

impl TextGenerator for AwsServices {
    fn generate(&self, request: &TextGenerationRequest) -> Result<String, ServiceError> {
        let body = request
            .to_body()
            .map_err(|error| ServiceError::Model(format!("failed to encode request: {error}")))?;
        let output = block_on(
            self.bedrock
                .invoke_model()
                .model_id(&self.config.model_id)
                .content_type(MODEL_CONTENT_TYPE)
                .accept(MODEL_CONTENT_TYPE)
                .body(Blob::new(body))
                .send(),
        )
        .map_err(|error| {
            ServiceError::Model(format!(
                "failed to invoke {}: {}",
                self.config.model_id,
                aws_sdk_bedrockruntime::error::DisplayErrorContext(&error)
            ))
        })?;

        Ok(decode_output_text(output.body().as_ref())?)
    }
}

impl NotificationTopic for AwsServices {
    fn publish(&self, notification: &Notification) -> Result<(), ServiceError> {
        let topic_arn = self.config.topic_arn()?;
        let recipient = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(&notification.recipient)
            .build()
            .map_err(|error| ServiceError::Topic(format!("invalid message attribute: {error}")))?;

        block_on(
            self.sns
                .publish()
                .topic_arn(topic_arn)
                .subject(&notification.subject)
                .message(&notification.message)
                .message_attributes(RECIPIENT_MESSAGE_ATTRIBUTE, recipient)
                .send(),
        )
        .map(|_| ())
        .map_err(|error| {
            ServiceError::Topic(format!(
                "failed to publish notification: {}",
                aws_sdk_sns::error::DisplayErrorContext(&error)
            ))
        })
    }

    fn subscribe_email(&self, email: &str) -> Result<Option<String>, ServiceError> {
        let topic_arn = self.config.topic_arn()?;
        let output = block_on(
            self.sns
                .subscribe()
                .topic_arn(topic_arn)
                .protocol(EMAIL_PROTOCOL)
                .endpoint(email)
                .return_subscription_arn(true)
                .attributes(FILTER_POLICY_ATTRIBUTE, recipient_filter_policy(email))
                .send(),
        )
        .map_err(|error| {
            ServiceError::Topic(format!(
                "failed to subscribe endpoint: {}",
                aws_sdk_sns::error::DisplayErrorContext(&error)
            ))
        })?;

        Ok(output.subscription_arn().map(str::to_string))
    }

    fn list_subscriptions(
        &self,
        next_token: Option<&str>,
    ) -> Result<SubscriptionPage, ServiceError> {
        let topic_arn = self.config.topic_arn()?;
        let output = block_on(
            self.sns
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(next_token.map(str::to_string))
                .send(),
        )
        .map_err(|error| {
            ServiceError::Topic(format!(
                "failed to list subscriptions: {}",
                aws_sdk_sns::error::DisplayErrorContext(&error)
            ))
        })?;

        let subscriptions = output
            .subscriptions()
            .iter()
            .filter_map(|subscription| {
                subscription
                    .subscription_arn()
                    .map(|arn| SubscriptionSummary {
                        subscription_arn: arn.to_string(),
                        endpoint: subscription.endpoint().map(str::to_string),
                    })
            })
            .collect();

        Ok(SubscriptionPage {
            subscriptions,
            next_token: output.next_token().map(str::to_string),
        })
    }

    fn subscription_attributes(
        &self,
        subscription_arn: &str,
    ) -> Result<HashMap<String, String>, ServiceError> {
        let output = block_on(
            self.sns
                .get_subscription_attributes()
                .subscription_arn(subscription_arn)
                .send(),
        )
        .map_err(|error| {
            ServiceError::Topic(format!(
                "failed to read attributes of {subscription_arn}: {}",
                aws_sdk_sns::error::DisplayErrorContext(&error)
            ))
        })?;

        Ok(output.attributes().cloned().unwrap_or_default())
    }

    fn check_configured(&self) -> Result<(), ServiceError> {
        self.config.topic_arn().map(|_| ())
    }
}

/// Drives an SDK future to completion from a synchronous adapter method.
/// Requires the multi-threaded Tokio runtime.
fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
