//! # ledger-completion
//!
//! HTTP client for the locally hosted completion service's three opaque
//! endpoints (vision completion, text completion, embedding), plus a
//! deterministic stub used by integration tests.

pub mod client;
pub mod error;
pub mod stub;

pub use client::{CompletionClient, HttpCompletionClient, EMBEDDING_TIMEOUT, TEXT_TIMEOUT, VISION_TIMEOUT};
pub use error::CompletionError;
pub use stub::StubCompletionClient;
