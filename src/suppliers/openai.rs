//! Embeddings from an OpenAI-compatible `/embeddings` endpoint.

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::supplier::EmbeddingSupplier;
use crate::{Error, Result, UpstreamError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: Option<usize>,
    pub timeout: Duration,
    pub max_retries: usize,
    pub batch_size: usize,
}

impl OpenAiConfig {
    /// Defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            dimensions: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Read the API key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::config("missing OpenAI api key (OPENAI_API_KEY)"))?;
        Ok(Self::new(api_key))
    }
}

/// Blocking embeddings client. Inputs larger than `batch_size` are split across requests and
/// reassembled in order.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::config("missing OpenAI api key"));
        }
        if config.model.trim().is_empty() {
            return Err(Error::config("missing OpenAI model name"));
        }
        if config.batch_size == 0 {
            return Err(Error::config("batch size must be at least 1"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| Error::config("invalid OpenAI api key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| Error::msg(format!("failed to build OpenAI HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model,
            dimensions: config.dimensions,
            max_retries: config.max_retries.max(1),
            batch_size: config.batch_size,
        })
    }

    /// Send one batch (at most `batch_size` inputs), retrying transient failures.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            encoding_format: "float",
            dimensions: self.dimensions,
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().map_err(|err| {
                            UpstreamError::Failed(format!(
                                "failed to parse OpenAI embedding response: {err}"
                            ))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(UpstreamError::LengthMismatch {
                                expected: inputs.len(),
                                actual: parsed.data.len(),
                            }
                            .into());
                        }
                        return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "retrying OpenAI embeddings request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(UpstreamError::Failed(format!(
                        "OpenAI embeddings request failed ({status}): {body}"
                    ))
                    .into());
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "retrying OpenAI embeddings request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(UpstreamError::Failed(format!(
                        "OpenAI embeddings request failed: {err}"
                    ))
                    .into());
                }
            }
        }
    }
}

impl EmbeddingSupplier for OpenAiEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch)?);
        }
        debug!(inputs = texts.len(), model = %self.model, "fetched embeddings");
        Ok(out)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
