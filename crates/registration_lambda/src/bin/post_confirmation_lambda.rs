use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use registration_lambda::adapters::aws::AwsServices;
use registration_lambda::config::ServiceConfig;
use registration_lambda::handlers::post_confirmation::handle_post_confirmation;
use serde_json::Value;

async fn handle_request(event: LambdaEvent<Value>, aws: &AwsServices) -> Result<Value, Error> {
    Ok(handle_post_confirmation(event.payload, aws)?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let aws = AwsServices::load(ServiceConfig::from_env()).await;
    let aws = &aws;
    run(service_fn(move |event| async move { handle_request(event, aws).await })).await
}
