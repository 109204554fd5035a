pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod sandbox;
pub mod store;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
