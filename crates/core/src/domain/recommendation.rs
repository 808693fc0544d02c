use serde::{Deserialize, Serialize};

use super::product::{Product, ProductId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Score is a real embedding similarity that cleared the threshold.
    Similarity,
    /// Score is synthetic, assigned by the fallback heuristic.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub product_name: String,
    pub provider: String,
    pub category: String,
    pub description: String,
    pub estimated_price: f64,
    pub match_score: f64,
    pub recommendation_reason: String,
    pub features: Vec<String>,
    pub suitable_for: Vec<String>,
    pub risks_covered: Vec<String>,
    pub source: MatchSource,
}

impl Recommendation {
    pub fn from_product(
        product: &Product,
        match_score: f64,
        estimated_price: f64,
        recommendation_reason: String,
        source: MatchSource,
    ) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            provider: product.provider.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            estimated_price,
            match_score: match_score.clamp(0.0, 1.0),
            recommendation_reason,
            features: product.features.clone(),
            suitable_for: product.suitable_for.clone(),
            risks_covered: product.risks_covered.clone(),
            source,
        }
    }
}
