use chrono::Utc;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use registration_lambda::adapters::aws::AwsServices;
use registration_lambda::config::ServiceConfig;
use registration_lambda::handlers::generator::{handle_sqs_batch, GeneratorConfig};
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    aws: &AwsServices,
    config: &GeneratorConfig,
) -> Result<Value, Error> {
    let processed_at = Utc::now().to_rfc3339();
    let response = handle_sqs_batch(&event.payload, &processed_at, config, aws, aws, aws)?;
    serde_json::to_value(response)
        .map_err(|error| Error::from(format!("failed to serialize batch response: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let aws = AwsServices::load(ServiceConfig::from_env()).await;
    let config = GeneratorConfig::from_service_config(aws.config());
    let (aws, config) = (&aws, &config);
    run(service_fn(move |event| async move {
        handle_request(event, aws, config).await
    }))
    .await
}
