use std::time::Duration;

use async_trait::async_trait;
use covermatch_core::config::MeanPoolingEncoderConfig;
use covermatch_core::{Embedding, EncodeError, TextEncoder};
use reqwest::Client;
use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::http::{build_client, endpoint, post_json, SAMPLE_TEXT};

const ENCODER_NAME: &str = "mean_pooling";

#[derive(Serialize)]
struct EmbedAllRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

/// Per-token hidden states, one matrix per input.
type TokenStates = Vec<Vec<Vec<f32>>>;

/// General transformer model whose per-token hidden states are fetched from
/// a text-embeddings-inference style service (`POST {base_url}/embed_all`)
/// and averaged locally into one vector per text.
#[derive(Debug)]
pub struct MeanPoolingEncoder {
    client: Client,
    url: String,
    model: String,
    api_key: Option<SecretString>,
    dimension: usize,
}

impl MeanPoolingEncoder {
    pub async fn connect(
        config: &MeanPoolingEncoderConfig,
        timeout: Duration,
    ) -> Result<Self, EncodeError> {
        let client = build_client(ENCODER_NAME, timeout)?;
        let url = endpoint(&config.base_url, "embed_all");
        let api_key = config.api_key.clone();

        let sample = request(&client, &url, api_key.as_ref(), &[SAMPLE_TEXT.to_string()])
            .await
            .and_then(|mut states| match states.pop() {
                Some(tokens) => mean_pool(&tokens),
                None => Err(EncodeError::BatchSizeMismatch { expected: 1, actual: 0 }),
            })
            .map_err(|error| EncodeError::Unavailable {
                encoder: ENCODER_NAME.to_string(),
                message: error.to_string(),
            })?;
        let dimension = sample.dimension();

        debug!(
            event_name = "encoder.mean_pooling.connected",
            url = %url,
            model = %config.model,
            dimension,
            "mean-pooling encoder ready"
        );
        Ok(Self { client, url, model: config.model.clone(), api_key, dimension })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

async fn request(
    client: &Client,
    url: &str,
    api_key: Option<&SecretString>,
    texts: &[String],
) -> Result<TokenStates, EncodeError> {
    let states: TokenStates =
        post_json(client, url, &EmbedAllRequest { inputs: texts, truncate: true }, api_key).await?;
    if states.len() != texts.len() {
        return Err(EncodeError::BatchSizeMismatch { expected: texts.len(), actual: states.len() });
    }
    Ok(states)
}

/// Averages token vectors component-wise. Every token must have the same
/// width and at least one token must be present.
pub fn mean_pool(tokens: &[Vec<f32>]) -> Result<Embedding, EncodeError> {
    let Some(first) = tokens.first() else {
        return Err(EncodeError::InvalidResponse("no token states to pool".to_string()));
    };
    let width = first.len();
    if width == 0 {
        return Err(EncodeError::InvalidResponse("token states are empty".to_string()));
    }

    let mut sums = vec![0.0f64; width];
    for token in tokens {
        if token.len() != width {
            return Err(EncodeError::InvalidResponse(format!(
                "token width {} differs from {width}",
                token.len()
            )));
        }
        for (sum, value) in sums.iter_mut().zip(token) {
            *sum += f64::from(*value);
        }
    }

    let count = tokens.len() as f64;
    Ok(Embedding::new(sums.into_iter().map(|sum| (sum / count) as f32).collect()))
}

#[async_trait]
impl TextEncoder for MeanPoolingEncoder {
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

        let states = request(&self.client, &self.url, self.api_key.as_ref(), texts).await?;
        states
            .iter()
            .map(|tokens| {
                let embedding = mean_pool(tokens)?;
                if embedding.dimension() != self.dimension {
                    debug!(
                        event_name = "encoder.mean_pooling.dimension_drift",
                        expected = self.dimension,
                        actual = embedding.dimension(),
                        "pooled vector has an unexpected width"
                    );
                }
                Ok(embedding)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::mean_pool;
    use covermatch_core::EncodeError;

    #[test]
    fn averages_token_vectors() {
        let pooled = mean_pool(&[vec![1.0, 2.0], vec![3.0, 6.0]]).expect("pooled");
        assert_eq!(pooled.values, vec![2.0, 4.0]);
    }

    #[test]
    fn rejects_empty_and_ragged_states() {
        assert!(matches!(mean_pool(&[]), Err(EncodeError::InvalidResponse(_))));
        assert!(matches!(mean_pool(&[vec![]]), Err(EncodeError::InvalidResponse(_))));
        assert!(matches!(
            mean_pool(&[vec![1.0, 2.0], vec![1.0]]),
            Err(EncodeError::InvalidResponse(_))
        ));
    }
}
