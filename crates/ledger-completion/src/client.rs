//! The completion service is treated as an opaque local HTTP endpoint with
//! three operations: vision completion, text completion, and embedding.
//! Concurrency is bounded by a semaphore (§5, default 4 in-flight calls).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::CompletionError;

/// Vision completion: 120s, per §5.
pub const VISION_TIMEOUT: Duration = Duration::from_secs(120);
/// Text completion: 60s, per §5.
pub const TEXT_TIMEOUT: Duration = Duration::from_secs(60);
/// Embedding: 10s, per §5.
pub const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(10);

/// Capability set implemented by both the real HTTP client and test stubs.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Ask the vision model to describe `image` (already base64-free raw bytes).
    async fn vision_complete(
        &self,
        prompt: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String, CompletionError>;

    /// Ask the text model to produce prose given a system prompt and a
    /// serialized context block. Never asked to compute new numbers.
    async fn text_complete(
        &self,
        system_prompt: &str,
        context: &str,
    ) -> Result<String, CompletionError>;

    /// Produce a 384-dimensional embedding for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CompletionError>;

    /// Best-effort liveness probe used by `GET /api/health`.
    async fn health(&self) -> bool;
}

#[derive(Serialize)]
struct VisionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    image_base64: String,
    mime: &'a str,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    model: &'a str,
    system_prompt: &'a str,
    context: &'a str,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// `reqwest`-backed implementation that talks to the real completion
/// service over HTTP.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    vision_model: String,
    text_model: String,
    in_flight: Arc<Semaphore>,
}

impl HttpCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        vision_model: impl Into<String>,
        text_model: impl Into<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            vision_model: vision_model.into(),
            text_model: text_model.into(),
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// POST `body` to `path`, retrying once on a connection-level failure
    /// (never on a 4xx status, never on a timeout), per §7.
    async fn post_with_retry<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<reqwest::Response, CompletionError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .expect("semaphore is never closed");

        let url = format!("{}{}", self.base_url, path);
        match self.http.post(&url).json(body).timeout(timeout).send().await {
            Ok(resp) => Ok(resp),
            Err(err) if err.is_timeout() => Err(CompletionError::Timeout),
            Err(err) if err.status().is_some() => Err(err.into()),
            Err(first_err) => {
                warn!(error = %first_err, "completion service call failed, retrying once");
                self.http
                    .post(&url)
                    .json(body)
                    .timeout(timeout)
                    .send()
                    .await
                    .map_err(CompletionError::from)
            }
        }
    }

    async fn parse_completion(
        resp: reqwest::Response,
    ) -> Result<String, CompletionError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream { status, body });
        }
        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn vision_complete(
        &self,
        prompt: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String, CompletionError> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let req = VisionRequest {
            model: &self.vision_model,
            prompt,
            image_base64: STANDARD.encode(image),
            mime,
        };
        let resp = self
            .post_with_retry("/v1/vision/complete", &req, VISION_TIMEOUT)
            .await?;
        Self::parse_completion(resp).await
    }

    async fn text_complete(
        &self,
        system_prompt: &str,
        context: &str,
    ) -> Result<String, CompletionError> {
        let req = TextRequest {
            model: &self.text_model,
            system_prompt,
            context,
        };
        let resp = self
            .post_with_retry("/v1/text/complete", &req, TEXT_TIMEOUT)
            .await?;
        Self::parse_completion(resp).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CompletionError> {
        let req = EmbedRequest { input: text };
        let resp = self
            .post_with_retry("/v1/embeddings", &req, EMBEDDING_TIMEOUT)
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream { status, body });
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        Ok(parsed.embedding)
    }

    async fn health(&self) -> bool {
        let url = format!("{}/v1/health", self.base_url);
        self.http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
