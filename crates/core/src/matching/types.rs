//! Request and report types for the matching engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::domain::product::ProductId;
use crate::domain::recommendation::Recommendation;
use crate::errors::ProcessingError;
use crate::pricing::PriceBoundPolicy;
use crate::reasons::DEFAULT_AFFORDABILITY_RATIO;
use crate::similarity::DEFAULT_MISMATCH_BAND;

/// Per-request knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Maximum number of recommendations to return
    pub top_n: usize,
    /// Prefer one product per category before filling by score
    pub diversity: bool,
}

impl SelectionOptions {
    pub fn new() -> Self {
        Self { top_n: super::DEFAULT_TOP_N, diversity: false }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_diversity(mut self, diversity: bool) -> Self {
        self.diversity = diversity;
        self
    }
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide engine settings, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub min_score: f64,
    pub fallback_count: usize,
    pub fallback_min_results: usize,
    pub mismatch_band: (f64, f64),
    pub cache_product_embeddings: bool,
    pub request_timeout: Duration,
    pub price_policy: PriceBoundPolicy,
    pub affordability_ratio: f64,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_score: config.matching.min_score,
            fallback_count: config.matching.fallback_count,
            fallback_min_results: config.matching.fallback_min_results,
            mismatch_band: config.matching.mismatch_band,
            cache_product_embeddings: config.matching.cache_product_embeddings,
            request_timeout: Duration::from_secs(config.matching.request_timeout_secs),
            price_policy: config.pricing.policy(),
            affordability_ratio: config.pricing.affordability_ratio,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_score: super::DEFAULT_MIN_SCORE,
            fallback_count: super::DEFAULT_FALLBACK_COUNT,
            fallback_min_results: super::DEFAULT_FALLBACK_MIN_RESULTS,
            mismatch_band: DEFAULT_MISMATCH_BAND,
            cache_product_embeddings: true,
            request_timeout: Duration::from_secs(super::DEFAULT_REQUEST_TIMEOUT_SECS),
            price_policy: PriceBoundPolicy::DeclaredRange,
            affordability_ratio: DEFAULT_AFFORDABILITY_RATIO,
        }
    }
}

/// A catalog entry that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedProduct {
    pub product_id: ProductId,
    /// `invalid_record` or `encoding`
    pub error_class: String,
    pub message: String,
}

impl SkippedProduct {
    pub fn new(product_id: ProductId, error: &ProcessingError) -> Self {
        Self { product_id, error_class: error.class().to_string(), message: error.to_string() }
    }
}

/// Outcome of one selection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub recommendations: Vec<Recommendation>,
    pub fallback_used: bool,
    pub skipped: Vec<SkippedProduct>,
    /// Name of the encoder that produced the embeddings
    pub encoder: String,
    pub catalog_version: Option<String>,
    pub candidates_scored: usize,
}

impl SelectionReport {
    pub fn empty(encoder: impl Into<String>, catalog_version: Option<String>) -> Self {
        Self {
            recommendations: Vec::new(),
            fallback_used: false,
            skipped: Vec::new(),
            encoder: encoder.into(),
            catalog_version,
            candidates_scored: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{EngineSettings, SelectionOptions};
    use crate::config::{AppConfig, BoundPolicyKind};
    use crate::pricing::PriceBoundPolicy;

    #[test]
    fn options_builder_overrides_defaults() {
        let options = SelectionOptions::new().with_top_n(2).with_diversity(true);
        assert_eq!(options.top_n, 2);
        assert!(options.diversity);
        assert_eq!(SelectionOptions::default().top_n, 5);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.matching.min_score = 0.45;
        config.matching.request_timeout_secs = 5;
        config.pricing.bound_policy = BoundPolicyKind::BaseMultiple;

        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.min_score, 0.45);
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.price_policy, PriceBoundPolicy::BaseMultiple { lower: 0.7, upper: 2.0 });
    }

    #[test]
    fn default_settings_match_default_config() {
        assert_eq!(EngineSettings::default(), EngineSettings::from_config(&AppConfig::default()));
    }
}
