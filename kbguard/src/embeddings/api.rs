use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use super::Embedder;
use crate::config::EmbeddingsConfig;
use crate::error::{KbError, Result};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl From<&EmbeddingsConfig> for ApiConfig {
    fn from(config: &EmbeddingsConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    config: ApiConfig,
    dimensions: usize,
    batch_size: usize,
}

impl EmbeddingApiClient {
    pub fn new(config: ApiConfig, dimensions: usize, batch_size: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        Self::new(ApiConfig::from(config), config.dimensions, config.batch_size)
    }

    /// Embed one request worth of texts, retrying rate limits and server
    /// errors with exponential backoff.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.to_vec(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref api_key) = self.config.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| KbError::Embedding(format!("Invalid API key header: {e}")))?,
            );
        }

        let url = format!("{}/embeddings", self.config.base_url);

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = 2_u64.saturating_pow(attempt - 1);
                let delay = Duration::from_millis(100_u64.saturating_mul(backoff));
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body: EmbeddingResponse = resp.json().await.map_err(|e| {
                            KbError::Embedding(format!("Failed to parse response: {e}"))
                        })?;
                        let mut data = body.data;
                        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
                        return Ok(data.into_iter().map(|d| d.embedding).collect());
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());
                        last_error = Some(KbError::ApiRateLimit { retry_after });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(KbError::ApiAuth(body));
                    }

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_error = Some(KbError::Embedding(format!(
                            "Server error {status}: {body}"
                        )));
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(KbError::Embedding(format!(
                        "API error {status}: {body}"
                    )));
                }
                Err(e) => {
                    last_error = Some(KbError::Embedding(format!("Request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| KbError::Embedding("Unknown error".to_string())))
    }

    pub async fn detect_dimensions(&self) -> Result<usize> {
        let embeddings = self.embed_batch(&["test"]).await?;
        embeddings
            .first()
            .map(|e| e.len())
            .ok_or_else(|| KbError::Embedding("No embedding returned".to_string()))
    }
}

#[async_trait]
impl Embedder for EmbeddingApiClient {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(KbError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            for vector in &vectors {
                if vector.len() != self.dimensions {
                    return Err(KbError::Embedding(format!(
                        "Embedding has {} dimensions, configured {}",
                        vector.len(),
                        self.dimensions
                    )));
                }
            }
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
