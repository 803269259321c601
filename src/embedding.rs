//! Embedding client and vector utilities.
//!
//! Calls a local Ollama instance's `/api/embed` endpoint to turn review
//! chunks and queries into fixed-dimension float vectors.
//!
//! Also provides the helpers the flat index file format is built on:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode little-endian bytes back into a `Vec<f32>`
//! - [`l2_distance`] — squared Euclidean distance for nearest-neighbor ranking
//!
//! # Retry Strategy
//!
//! Transient failures use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Client for the Ollama embeddings endpoint.
///
/// Holds the model name, expected dimensionality, and a preconfigured HTTP
/// client. Construct once and pass explicitly wherever embeddings are needed.
pub struct EmbeddingClient {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: config.url.clone(),
            max_retries: config.max_retries,
            http,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Embed a batch of texts, returning one vector per input in order.
    ///
    /// Every returned vector is checked against the configured
    /// dimensionality; a mismatch is an error rather than a silently
    /// corrupted index.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let embeddings = parse_embed_response(&json)?;
                        self.check_dims(&embeddings, texts.len())?;
                        return Ok(embeddings);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Embedding API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Embedding API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Embedding connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_texts(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    fn check_dims(&self, embeddings: &[Vec<f32>], expected_count: usize) -> Result<()> {
        if embeddings.len() != expected_count {
            bail!(
                "Embedding API returned {} vectors for {} inputs",
                embeddings.len(),
                expected_count
            );
        }
        for vec in embeddings {
            if vec.len() != self.dims {
                bail!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dims,
                    vec.len()
                );
            }
        }
        Ok(())
    }
}

/// Parse the Ollama embed response JSON (`{"embeddings": [[f32, ...], ...]}`).
fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embed response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid embed response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// Encode a float vector as little-endian f32 bytes.
///
/// Each `f32` becomes 4 bytes, producing a blob of `vec.len() × 4` bytes.
/// This is the packed format of the persisted index file.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Squared Euclidean (L2) distance between two vectors.
///
/// Smaller means nearer. Returns `f32::INFINITY` for vectors of different
/// lengths so that a corrupt entry can never rank first.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_l2_identical_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(l2_distance(&v, &v), 0.0);
    }

    #[test]
    fn test_l2_ordering() {
        let origin = vec![0.0, 0.0];
        let near = vec![1.0, 0.0];
        let far = vec![3.0, 4.0];
        assert!(l2_distance(&origin, &near) < l2_distance(&origin, &far));
        assert_eq!(l2_distance(&origin, &far), 25.0);
    }

    #[test]
    fn test_l2_length_mismatch_is_infinite() {
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0]), f32::INFINITY);
    }

    #[test]
    fn test_parse_embed_response() {
        let json = serde_json::json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.5, -0.25], [1.0, 2.0]]
        });
        let parsed = parse_embed_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![0.5, -0.25], vec![1.0, 2.0]]);
    }

    #[test]
    fn test_parse_embed_response_missing_field() {
        let json = serde_json::json!({"model": "nomic-embed-text"});
        assert!(parse_embed_response(&json).is_err());
    }
}
