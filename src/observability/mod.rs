//! # Observability Infrastructure
//!
//! Structured logging for the smoke-test runner and the webhook receiver.

pub mod logging;

pub use logging::init_logging;
