use registration_lambda::adapters::memory::{CannedModel, MemoryQueue, MemoryStore, MemoryTopic};
use registration_lambda::config::ServiceConfig;
use registration_lambda::handlers::generator::GeneratorConfig;
use registration_lambda::handlers::runtime::handle_event;
use registration_lambda::handlers::Services;
use serde_json::{json, Value};

const EMAIL: &str = "ada@example.com";

struct Stack {
    store: MemoryStore,
    queue: MemoryQueue,
    model: CannedModel,
    topic: MemoryTopic,
    generator: GeneratorConfig,
}

impl Stack {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            queue: MemoryQueue::new(),
            model: CannedModel::new("  Dear Ada, SVS 212 is the session for you.  "),
            topic: MemoryTopic::new(),
            generator: GeneratorConfig::from_service_config(&ServiceConfig::default()),
        }
    }

    fn invoke(&self, event: Value) -> Value {
        let services = Services {
            store: &self.store,
            queue: &self.queue,
            model: &self.model,
            topic: &self.topic,
        };
        handle_event(event, &services, &self.generator, "2026-10-18T09:00:00+00:00")
            .expect("event should be handled")
    }

    fn drain_queue(&self, first_id: usize) -> Value {
        let records: Vec<Value> = self
            .queue
            .messages()
            .into_iter()
            .enumerate()
            .map(|(index, body)| {
                json!({
                    "messageId": format!("msg-{}", first_id + index),
                    "eventSource": "aws:sqs",
                    "body": body
                })
            })
            .collect();
        self.invoke(json!({ "Records": records }))
    }

    fn subscription_status(&self) -> Value {
        let response = self.invoke(json!({
            "path": "/subscription_confirmed",
            "httpMethod": "GET",
            "queryStringParameters": {"id": EMAIL}
        }));
        assert_eq!(response["statusCode"], 200);
        serde_json::from_str(response["body"].as_str().expect("body should be a string"))
            .expect("body should be json")
    }
}

fn sign_up_confirmation() -> Value {
    json!({
        "version": "1",
        "triggerSource": "PostConfirmation_ConfirmSignUp",
        "userName": "ada",
        "request": {"userAttributes": {"email": EMAIL, "email_verified": "true"}},
        "response": {}
    })
}

#[test]
fn registration_is_generated_delivered_and_confirmed() {
    let stack = Stack::new();

    let confirmation = stack.invoke(sign_up_confirmation());
    assert_eq!(confirmation, sign_up_confirmation());
    assert_eq!(stack.subscription_status(), json!({"subscription_confirmed": false}));

    let registered = stack.invoke(json!({
        "path": "/register",
        "httpMethod": "POST",
        "body": json!({
            "userAttributes": {"email": EMAIL, "given_name": "Ada"},
            "message": "serverless, Java, observability"
        })
        .to_string()
    }));
    assert_eq!(registered["statusCode"], 200);
    assert_eq!(stack.queue.messages().len(), 1);

    let batch = stack.drain_queue(1);
    assert_eq!(batch, json!({"batchItemFailures": []}));

    let record = stack.store.record(EMAIL).expect("record should exist");
    assert_eq!(record.profile_text, "serverless, Java, observability");
    assert_eq!(
        record.email_body.as_deref(),
        Some("Dear Ada, SVS 212 is the session for you.")
    );

    let published = stack.topic.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].recipient, EMAIL);
    assert_eq!(published[0].message, "Dear Ada, SVS 212 is the session for you.");
    assert_eq!(
        published[0].subject,
        "Welcome to AWS re:Invent Builder's Session SVS 209"
    );

    let prompt = &stack.model.requests()[0].input_text;
    assert!(prompt.contains("Ada"));
    assert!(prompt.contains("serverless, Java, observability"));

    stack.topic.confirm(EMAIL);
    assert_eq!(stack.subscription_status(), json!({"subscription_confirmed": true}));
}

#[test]
fn redelivered_message_does_not_send_a_second_email() {
    let stack = Stack::new();
    stack.invoke(json!({
        "path": "/register",
        "httpMethod": "POST",
        "body": json!({
            "userAttributes": {"email": EMAIL, "given_name": "Ada"},
            "message": "Rust"
        })
        .to_string()
    }));

    assert_eq!(stack.drain_queue(1), json!({"batchItemFailures": []}));
    assert_eq!(stack.drain_queue(2), json!({"batchItemFailures": []}));

    assert_eq!(stack.topic.published().len(), 1);
    assert_eq!(stack.model.requests().len(), 1);
}

#[test]
fn welcome_email_survives_a_failed_publish() {
    let stack = Stack {
        topic: MemoryTopic::new().failing_next_publishes(1),
        ..Stack::new()
    };
    stack.invoke(json!({
        "path": "/register",
        "httpMethod": "POST",
        "body": json!({
            "userAttributes": {"email": EMAIL, "given_name": "Ada"},
            "message": "Rust"
        })
        .to_string()
    }));

    assert_eq!(
        stack.drain_queue(1),
        json!({"batchItemFailures": [{"itemIdentifier": "msg-1"}]})
    );
    assert!(stack.topic.published().is_empty());

    assert_eq!(stack.drain_queue(1), json!({"batchItemFailures": []}));
    assert_eq!(stack.topic.published().len(), 1);
    assert!(stack
        .store
        .record(EMAIL)
        .expect("record should exist")
        .dispatched_at
        .is_some());
}

#[test]
fn rejected_registration_never_reaches_the_queue() {
    let stack = Stack::new();

    let response = stack.invoke(json!({
        "path": "/register",
        "httpMethod": "POST",
        "body": json!({"userAttributes": {"email": EMAIL}, "message": "   "}).to_string()
    }));

    assert_eq!(response["statusCode"], 400);
    assert!(stack.queue.messages().is_empty());
    assert!(stack.store.records().is_empty());
}
