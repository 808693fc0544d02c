use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoding::Embedding;

/// Score returned when a vector has no direction to compare.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Band used for products whose embedding cannot be compared with the profile.
pub const DEFAULT_MISMATCH_BAND: (f64, f64) = (0.5, 0.8);

const NORM_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    /// Cosine similarity mapped onto [0, 1].
    Exact,
    /// Dimensions differed; score was drawn from the mismatch band.
    DimensionMismatch,
    /// A zero-norm vector or non-finite result; neutral score.
    Neutral,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOutcome {
    pub score: f64,
    pub kind: SimilarityKind,
}

#[derive(Clone, Debug)]
pub struct SimilarityScorer {
    mismatch_band: (f64, f64),
}

impl SimilarityScorer {
    pub fn new() -> Self {
        Self { mismatch_band: DEFAULT_MISMATCH_BAND }
    }

    /// `band` is reordered if given backwards and clamped into [0, 1].
    pub fn with_mismatch_band(band: (f64, f64)) -> Self {
        let low = band.0.min(band.1).clamp(0.0, 1.0);
        let high = band.0.max(band.1).clamp(0.0, 1.0);
        Self { mismatch_band: (low, high) }
    }

    pub fn mismatch_band(&self) -> (f64, f64) {
        self.mismatch_band
    }

    pub fn score(&self, user: &Embedding, product: &Embedding) -> SimilarityOutcome {
        if user.dimension() != product.dimension() {
            let (low, high) = self.mismatch_band;
            let score = if high > low { rand::thread_rng().gen_range(low..=high) } else { low };
            debug!(
                event_name = "engine.similarity.dimension_mismatch",
                user_dimension = user.dimension(),
                product_dimension = product.dimension(),
                score,
                "embedding dimensions differ; using banded score"
            );
            return SimilarityOutcome { score, kind: SimilarityKind::DimensionMismatch };
        }

        match cosine_similarity(&user.values, &product.values) {
            Some(cosine) => SimilarityOutcome {
                score: ((cosine + 1.0) / 2.0).clamp(0.0, 1.0),
                kind: SimilarityKind::Exact,
            },
            None => SimilarityOutcome { score: NEUTRAL_SCORE, kind: SimilarityKind::Neutral },
        }
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity in [-1, 1], or `None` when either vector has zero norm
/// or the arithmetic is not finite. Slices must have equal length.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f64> {
    let mut dot = 0.0f64;
    let mut left_norm = 0.0f64;
    let mut right_norm = 0.0f64;

    for (a, b) in left.iter().zip(right.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if !denominator.is_finite() || denominator < NORM_EPSILON {
        return None;
    }

    let cosine = dot / denominator;
    cosine.is_finite().then(|| cosine.clamp(-1.0, 1.0))
}
