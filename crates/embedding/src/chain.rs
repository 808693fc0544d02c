use std::sync::Arc;
use std::time::Duration;

use covermatch_core::config::EncoderConfig;
use covermatch_core::{EncodeError, EncoderStrategy, KeywordEncoder, TextEncoder};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::mean_pooling::MeanPoolingEncoder;
use crate::sentence::SentenceEncoder;

/// One entry per candidate tried while building the encoder.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncoderAttempt {
    pub strategy: EncoderStrategy,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncoderSelection {
    pub selected: EncoderStrategy,
    pub encoder_name: String,
    pub dimension: Option<usize>,
    pub attempts: Vec<EncoderAttempt>,
}

impl EncoderSelection {
    /// True when a candidate ahead of the selected one failed.
    pub fn degraded(&self) -> bool {
        self.attempts.iter().any(|attempt| !attempt.succeeded)
    }
}

#[derive(Debug, Error)]
pub enum EncoderInitError {
    #[error("encoder strategy `{strategy}` failed: {source}")]
    Strategy {
        strategy: EncoderStrategy,
        #[source]
        source: EncodeError,
    },
    #[error("no encoder could be initialized ({})", summarize(attempts))]
    Exhausted { attempts: Vec<EncoderAttempt> },
}

fn summarize(attempts: &[EncoderAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| match &attempt.error {
            Some(error) => format!("{}: {error}", attempt.strategy),
            None => attempt.strategy.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ordered candidates for a configured strategy. The keyword encoder closes
/// the chain when fallback is allowed or when it was asked for directly.
pub fn candidate_strategies(strategy: EncoderStrategy, allow_fallback: bool) -> Vec<EncoderStrategy> {
    let mut candidates = match strategy {
        EncoderStrategy::Auto => vec![EncoderStrategy::Sentence, EncoderStrategy::MeanPooling],
        EncoderStrategy::Sentence => vec![EncoderStrategy::Sentence],
        EncoderStrategy::MeanPooling => vec![EncoderStrategy::MeanPooling],
        EncoderStrategy::Keyword => Vec::new(),
    };
    if allow_fallback || strategy == EncoderStrategy::Keyword {
        candidates.push(EncoderStrategy::Keyword);
    }
    candidates
}

async fn connect(
    strategy: EncoderStrategy,
    config: &EncoderConfig,
    timeout: Duration,
) -> Result<Arc<dyn TextEncoder>, EncoderInitError> {
    let encoder: Arc<dyn TextEncoder> = match strategy {
        EncoderStrategy::Sentence => Arc::new(
            SentenceEncoder::connect(&config.sentence, timeout)
                .await
                .map_err(|source| EncoderInitError::Strategy { strategy, source })?,
        ),
        EncoderStrategy::MeanPooling => Arc::new(
            MeanPoolingEncoder::connect(&config.mean_pooling, timeout)
                .await
                .map_err(|source| EncoderInitError::Strategy { strategy, source })?,
        ),
        EncoderStrategy::Keyword => Arc::new(KeywordEncoder::new()),
        EncoderStrategy::Auto => {
            return Err(EncoderInitError::Strategy {
                strategy,
                source: EncodeError::Unavailable {
                    encoder: strategy.to_string(),
                    message: "`auto` is a chain, not a concrete encoder".to_string(),
                },
            })
        }
    };
    Ok(encoder)
}

/// Tries each candidate in order and returns the first encoder that answers
/// its startup sample request, plus a report of every attempt.
pub async fn build_encoder(
    config: &EncoderConfig,
) -> Result<(Arc<dyn TextEncoder>, EncoderSelection), EncoderInitError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let mut attempts = Vec::new();

    for strategy in candidate_strategies(config.strategy, config.allow_fallback) {
        match connect(strategy, config, timeout).await {
            Ok(encoder) => {
                attempts.push(EncoderAttempt { strategy, succeeded: true, error: None });
                let selection = EncoderSelection {
                    selected: strategy,
                    encoder_name: encoder.name().to_string(),
                    dimension: encoder.dimension(),
                    attempts,
                };

                if selection.degraded() {
                    warn!(
                        event_name = "encoder.degraded",
                        requested = %config.strategy,
                        selected = %strategy,
                        "preferred encoders unavailable, running degraded"
                    );
                }
                info!(
                    event_name = "encoder.strategy.selected",
                    selected = %strategy,
                    dimension = ?selection.dimension,
                    attempts = selection.attempts.len(),
                    "encoder selected"
                );
                return Ok((encoder, selection));
            }
            Err(error) => {
                warn!(
                    event_name = "encoder.strategy.failed",
                    strategy = %strategy,
                    error = %error,
                    "encoder strategy failed"
                );
                attempts.push(EncoderAttempt {
                    strategy,
                    succeeded: false,
                    error: Some(error.to_string()),
                });
            }
        }
    }

    Err(EncoderInitError::Exhausted { attempts })
}
