use chrono::Utc;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use registration_lambda::adapters::aws::AwsServices;
use registration_lambda::config::ServiceConfig;
use registration_lambda::handlers::generator::GeneratorConfig;
use registration_lambda::handlers::runtime::handle_event;
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    aws: &AwsServices,
    generator: &GeneratorConfig,
) -> Result<Value, Error> {
    let received_at = Utc::now().to_rfc3339();
    Ok(handle_event(
        event.payload,
        &aws.services(),
        generator,
        &received_at,
    )?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let aws = AwsServices::load(ServiceConfig::from_env()).await;
    let generator = GeneratorConfig::from_service_config(aws.config());
    let (aws, generator) = (&aws, &generator);
    run(service_fn(move |event| async move {
        handle_request(event, aws, generator).await
    }))
    .await
}
