use std::time::Duration;

use async_trait::async_trait;
use covermatch_core::config::SentenceEncoderConfig;
use covermatch_core::{Embedding, EncodeError, TextEncoder};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, endpoint, post_json, SAMPLE_TEXT};

const ENCODER_NAME: &str = "sentence";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Pretrained sentence-embedding model served over HTTP
/// (`POST {base_url}/api/embed`, Ollama-compatible). One request per batch.
#[derive(Debug)]
pub struct SentenceEncoder {
    client: Client,
    url: String,
    model: String,
    dimension: usize,
}

impl SentenceEncoder {
    /// Connects and embeds a sample text to learn the output dimension.
    /// Fails if the service is unreachable or returns an empty vector.
    pub async fn connect(
        config: &SentenceEncoderConfig,
        timeout: Duration,
    ) -> Result<Self, EncodeError> {
        let client = build_client(ENCODER_NAME, timeout)?;
        let url = endpoint(&config.base_url, "api/embed");

        let sample = request(&client, &url, &config.model, &[SAMPLE_TEXT.to_string()])
            .await
            .map_err(|error| unavailable(error.to_string()))?;
        let dimension = match sample.as_slice() {
            [single] if !single.is_empty() => single.len(),
            _ => return Err(unavailable("sample request returned no usable embedding".to_string())),
        };

        debug!(
            event_name = "encoder.sentence.connected",
            url = %url,
            model = %config.model,
            dimension,
            "sentence encoder ready"
        );
        Ok(Self { client, url, model: config.model.clone(), dimension })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Vectors are passed through as produced; a width other than the connect-time
    /// one is scored by the similarity mismatch band downstream.
    fn embedding(&self, values: Vec<f32>) -> Embedding {
        if values.len() != self.dimension {
            debug!(
                event_name = "encoder.sentence.dimension_drift",
                expected = self.dimension,
                actual = values.len(),
                "sentence encoder returned an unexpected width"
            );
        }
        Embedding::new(values)
    }
}

fn unavailable(message: String) -> EncodeError {
    EncodeError::Unavailable { encoder: ENCODER_NAME.to_string(), message }
}

async fn request(
    client: &Client,
    url: &str,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, EncodeError> {
    let response: EmbedResponse =
        post_json(client, url, &EmbedRequest { model, input: texts }, None).await?;
    if response.embeddings.len() != texts.len() {
        return Err(EncodeError::BatchSizeMismatch {
            expected: texts.len(),
            actual: response.embeddings.len(),
        });
    }
    Ok(response.embeddings)
}

#[async_trait]
impl TextEncoder for SentenceEncoder {
    fn name(&self) -> &'static str {
        ENCODER_NAME
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    async fn encode(&self, text: &str) -> Result<Embedding, EncodeError> {
        let mut embeddings = self.encode_batch(&[text.to_string()]).await?;
        embeddings.pop().ok_or(EncodeError::BatchSizeMismatch { expected: 1, actual: 0 })
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EncodeError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EncodeError::EmptyInput);
        }

        let embeddings = request(&self.client, &self.url, &self.model, texts).await?;
        Ok(embeddings.into_iter().map(|values| self.embedding(values)).collect())
    }
}
