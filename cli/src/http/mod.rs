//! HTTP surface over the pipeline facade.

pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use models::*;
pub use server::*;
pub use state::*;
