//! # Error Handling
//!
//! Crate-wide error type for devprobe. Every client library a probe talks to
//! has a dedicated variant so failures keep their source chain.

pub mod types;

pub use types::{Error, Result};
