//! Fixtures for integration tests. Fakes live in `loadpilot_core::testing`.

pub const LOGIN_RESULTS: &str = include_str!("../fixtures/login_50.jtl");
