//! AWS-oriented adapters and handlers for the registration pipeline.
//!
//! This crate owns runtime integration details (Lambda handlers, the HTTP
//! router, queue batch processing, and the DynamoDB/SQS/SNS/Bedrock adapters)
//! on top of the domain primitives in `registration_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
