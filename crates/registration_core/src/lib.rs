//! Shared registration domain primitives.
//!
//! This crate owns the registration contract, prompt construction, the model
//! wire format, and the subscription confirmation rules. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.

pub mod contract;
pub mod model;
pub mod prompt;
pub mod subscription;
