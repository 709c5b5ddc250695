use chrono::Utc;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use registration_lambda::adapters::aws::AwsServices;
use registration_lambda::config::ServiceConfig;
use registration_lambda::handlers::api::route_api_event;
use serde_json::Value;

async fn handle_request(event: LambdaEvent<Value>, aws: &AwsServices) -> Result<Value, Error> {
    let received_at = Utc::now().to_rfc3339();
    let response = route_api_event(event.payload, &aws.services(), &received_at)?;
    serde_json::to_value(response)
        .map_err(|error| Error::from(format!("failed to serialize api response: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let aws = AwsServices::load(ServiceConfig::from_env()).await;
    let aws = &aws;
    run(service_fn(move |event| async move { handle_request(event, aws).await })).await
}
