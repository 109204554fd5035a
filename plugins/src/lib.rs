pub mod factory;
pub mod maintenance;
pub mod model;
pub mod runtime;
pub mod store;
