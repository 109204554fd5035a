//! loadpilot-cli library. Modules are exposed for integration tests.

pub mod commands;
pub mod http;
