//! OpenAI-compatible embeddings client.
//!
//! Calls `{base_url}/embeddings` with a bearer key. The client carries a
//! request timeout; an expired request fails with `Error::Timeout` rather than
//! hanging. No retries.

use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedder::EmbedderBackend;
use docsage_core::{EmbeddingConfig, Error, Result};

const PROVIDER: &str = "openai";

pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key is not configured".into()))?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::embedding(PROVIDER, format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(format!(
                "embedding request exceeded {}s",
                self.timeout.as_secs()
            ))
        } else {
            Error::embedding(PROVIDER, format!("request failed: {}", e))
        }
    }
}

#[async_trait]
impl EmbedderBackend for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(PROVIDER, "API returned no embeddings"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch_size = texts.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "embedding API error");
            return Err(Error::embedding(
                PROVIDER,
                format!("API returned {}: {}", status, detail),
            ));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(PROVIDER, format!("failed to parse response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(Error::embedding(
                PROVIDER,
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }
        parsed.data.sort_by_key(|d| d.index);

        parsed
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimension {
                    return Err(Error::DimensionMismatch {
                        expected: self.dimension,
                        actual: d.embedding.len(),
                    });
                }
                Ok(Array1::from_vec(d.embedding))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> String {
        format!("{}:{}", PROVIDER, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Serve a fake `/v1/embeddings` that answers with `dim`-sized vectors
    /// (deliberately in reverse index order).
    async fn mock_server(dim: usize) -> String {
        let app = Router::new().route(
            "/v1/embeddings",
            post(move |Json(body): Json<Value>| async move {
                let inputs = body["input"].as_array().cloned().unwrap_or_default();
                let data: Vec<Value> = inputs
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, _)| json!({"index": i, "embedding": vec![i as f32; dim]}))
                    .collect();
                Json(json!({ "data": data }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn config(base_url: String, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url,
            dimension,
            api_key: Some("sk-test".into()),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let cfg = EmbeddingConfig::default();
        assert!(matches!(
            OpenAiEmbedder::from_config(&cfg),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_restores_input_order() {
        let base = mock_server(4).await;
        let embedder = OpenAiEmbedder::from_config(&config(base, 4)).unwrap();
        let out = embedder.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][0], 0.0);
        assert_eq!(out[2][0], 2.0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_detected() {
        let base = mock_server(3).await;
        let embedder = OpenAiEmbedder::from_config(&config(base, 8)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 8,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_provider_error() {
        let embedder =
            OpenAiEmbedder::from_config(&config("http://127.0.0.1:9/v1".into(), 4)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::EmbeddingProvider { .. } | Error::Timeout(_)
        ));
    }
}
