pub mod aws;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod queue;
pub mod store;
pub mod text_generator;
pub mod topic;
