//! Shared test utilities for integration tests.

pub mod server;

pub use server::TestServer;
