//! Profile-to-product matching
//!
//! Scores every catalog product against a user profile, keeps the ones above
//! the similarity threshold, tops the list up with heuristic fallbacks when
//! too few qualify, and returns a ranked, optionally category-diverse slice.

mod cache;
mod engine;
mod selection;
mod types;

pub use cache::EmbeddingCache;
pub use engine::RecommendationEngine;
pub use selection::{diversify, fallback_candidates, rank};
pub use types::*;

/// Similarity a product must exceed to be recommended on its own merit.
pub const DEFAULT_MIN_SCORE: f64 = 0.3;

/// Maximum recommendations to return
pub const DEFAULT_TOP_N: usize = 5;

/// Maximum fallback recommendations synthesized per request
pub const DEFAULT_FALLBACK_COUNT: usize = 3;

/// Fallback runs when fewer than this many products clear the threshold.
pub const DEFAULT_FALLBACK_MIN_RESULTS: usize = 1;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const VEHICLE_FALLBACK_SCORE: f64 = 0.8;
pub const HEALTH_FALLBACK_SCORE: f64 = 0.75;

/// Generic fallbacks score `GENERIC_FALLBACK_START - GENERIC_FALLBACK_STEP * i`.
pub const GENERIC_FALLBACK_START: f64 = 0.7;
pub const GENERIC_FALLBACK_STEP: f64 = 0.1;
