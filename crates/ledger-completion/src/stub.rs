//! A deterministic in-process stand-in for the completion service, used in
//! integration tests so they never make network calls (the completion
//! service itself is out of scope per §1).

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::CompletionClient;
use crate::error::CompletionError;

/// Always returns canned text and a deterministic embedding derived from a
/// simple hash of the input, so semantically similar fixtures (sharing
/// words) land closer together than dissimilar ones.
pub struct StubCompletionClient {
    pub canned_text: String,
    pub healthy: bool,
    pub calls: Mutex<Vec<String>>,
}

impl Default for StubCompletionClient {
    fn default() -> Self {
        Self {
            canned_text: "Totals computed from the ledger.".to_string(),
            healthy: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubCompletionClient {
    /// A healthy stub that returns `text` verbatim from every completion call.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            canned_text: text.into(),
            ..Default::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Default::default()
        }
    }
}

/// A coarse bag-of-words embedding: each of the 384 dimensions accumulates a
/// hash of one token, then the vector is used as-is (the caller normalizes).
/// This is intentionally simple — it exists only so cosine similarity in
/// tests behaves sensibly for shared-vocabulary fixtures, not to model real
/// semantics.
pub fn deterministic_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dims];
    for token in text.to_lowercase().split_whitespace() {
        let mut hash: u64 = 1469598103934665603;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let bucket = (hash as usize) % dims;
        vector[bucket] += 1.0;
    }
    vector
}

#[async_trait]
impl CompletionClient for StubCompletionClient {
    async fn vision_complete(
        &self,
        _prompt: &str,
        _image: &[u8],
        _mime: &str,
    ) -> Result<String, CompletionError> {
        self.calls.lock().await.push("vision_complete".to_string());
        if !self.healthy {
            return Err(CompletionError::Unavailable("stub is unhealthy".to_string()));
        }
        Ok(self.canned_text.clone())
    }

    async fn text_complete(
        &self,
        _system_prompt: &str,
        _context: &str,
    ) -> Result<String, CompletionError> {
        self.calls.lock().await.push("text_complete".to_string());
        if !self.healthy {
            return Err(CompletionError::Unavailable("stub is unhealthy".to_string()));
        }
        Ok(self.canned_text.clone())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CompletionError> {
        self.calls.lock().await.push(format!("embed:{text}"));
        if !self.healthy {
            return Err(CompletionError::Unavailable("stub is unhealthy".to_string()));
        }
        Ok(deterministic_embedding(text, 384))
    }

    async fn health(&self) -> bool {
        self.healthy
    }
}
