//! Text encoding capability shared by every embedding strategy.

mod keyword;

pub use keyword::{KeywordEncoder, KEYWORD_CATEGORIES, KEYWORD_DIMENSION};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EncodeError;

/// Fixed-length vector produced by a [`TextEncoder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|value| f64::from(*value).powi(2)).sum::<f64>().sqrt()
    }
}

/// Strategy names as they appear in configuration and selection reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderStrategy {
    /// Try sentence, then mean pooling, then keyword.
    Auto,
    Sentence,
    MeanPooling,
    Keyword,
}

impl EncoderStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Sentence => "sentence",
            Self::MeanPooling => "mean_pooling",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for EncoderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncoderStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "sentence" => Ok(Self::Sentence),
            "mean_pooling" => Ok(Self::MeanPooling),
            "keyword" => Ok(Self::Keyword),
            other => Err(format!(
                "unsupported encoder strategy `{other}` (expected auto|sentence|mean_pooling|keyword)"
            )),
        }
    }
}

/// Turns profile or product text into an [`Embedding`].
///
/// Implementations are immutable after construction and shared across
/// requests behind an `Arc`, so `encode` must not mutate encoder state.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Stable identifier, also used to key cached embeddings.
    fn name(&self) -> &'static str;

    /// Output dimensionality when known up front.
    fn dimension(&self) -> Option<usize>;

    async fn encode(&self, text: &str) -> Result<Embedding, EncodeError>;

    /// Encodes `texts` preserving input order. Network-backed encoders
    /// override this to send one request per batch.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EncodeError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.encode(text).await?);
        }
        Ok(embeddings)
    }
}
