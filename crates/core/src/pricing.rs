use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::product::{CoverageLine, Product};
use crate::domain::profile::{TravelFrequency, UserProfile};

pub const DEFAULT_BASE_MULTIPLE_LOWER: f64 = 0.7;
pub const DEFAULT_BASE_MULTIPLE_UPPER: f64 = 2.0;

/// Range an estimate is clamped into. Pick one per deployment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PriceBoundPolicy {
    /// `[price_floor, price_ceiling]` as declared by the product.
    DeclaredRange,
    /// `[lower * base, upper * base]` around the midpoint base price.
    BaseMultiple { lower: f64, upper: f64 },
}

impl PriceBoundPolicy {
    pub fn bounds(&self, product: &Product, base: f64) -> (f64, f64) {
        match self {
            Self::DeclaredRange => (product.price_floor, product.price_ceiling),
            Self::BaseMultiple { lower, upper } => (base * lower, base * upper),
        }
    }
}

impl Default for PriceBoundPolicy {
    fn default() -> Self {
        Self::DeclaredRange
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingFactor {
    pub stage: String,
    pub multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub amount: f64,
    pub base: f64,
    pub bounds: (f64, f64),
    /// Set when the estimate fell back to the unclamped base price.
    pub degraded: bool,
    pub factors: Vec<PricingFactor>,
}

pub trait PriceEstimator: Send + Sync {
    fn estimate(&self, profile: &UserProfile, product: &Product) -> PriceQuote;
}

/// Multiplicative age/income/risk model around the product's midpoint price.
#[derive(Clone, Debug, Default)]
pub struct HeuristicPriceEstimator {
    policy: PriceBoundPolicy,
}

impl HeuristicPriceEstimator {
    pub fn new(policy: PriceBoundPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PriceBoundPolicy {
        self.policy
    }
}

impl PriceEstimator for HeuristicPriceEstimator {
    fn estimate(&self, profile: &UserProfile, product: &Product) -> PriceQuote {
        let base = product.price_midpoint();
        let line = product.coverage_line();

        let factors = vec![
            PricingFactor { stage: "age".to_string(), multiplier: age_factor(profile.age) },
            PricingFactor { stage: "income".to_string(), multiplier: income_factor(profile.income) },
            PricingFactor { stage: "risk".to_string(), multiplier: risk_factor(profile, line) },
        ];
        let raw = factors.iter().fold(base, |price, factor| price * factor.multiplier);
        let (lower, upper) = self.policy.bounds(product, base);

        let well_formed = base.is_finite()
            && raw.is_finite()
            && lower.is_finite()
            && upper.is_finite()
            && lower <= upper;
        if !well_formed {
            warn!(
                event_name = "engine.pricing.degraded",
                product_id = %product.id,
                base,
                raw,
                lower,
                upper,
                "price estimate could not be bounded; returning base price"
            );
            return PriceQuote { amount: base, base, bounds: (lower, upper), degraded: true, factors };
        }

        PriceQuote {
            amount: raw.clamp(lower, upper),
            base,
            bounds: (lower, upper),
            degraded: false,
            factors,
        }
    }
}

/// Surcharge for the youngest and oldest applicants; neutral between 25 and 50.
pub fn age_factor(age: u32) -> f64 {
    if age < 25 {
        1.3
    } else if age > 65 {
        1.4
    } else if age > 50 {
        1.2
    } else {
        1.0
    }
}

pub fn income_factor(income: f64) -> f64 {
    if income > 100_000.0 {
        0.9
    } else if income > 50_000.0 {
        0.95
    } else {
        1.0
    }
}

pub fn risk_factor(profile: &UserProfile, line: CoverageLine) -> f64 {
    let mut factor = 1.0;

    if profile.has_medical_conditions && line == CoverageLine::Health {
        factor *= 1.3;
    }
    if profile.has_children {
        factor *= 1.1;
    }
    if line == CoverageLine::Travel {
        match profile.travel_frequency {
            TravelFrequency::VeryOften => factor *= 1.4,
            TravelFrequency::Often => factor *= 1.2,
            TravelFrequency::Rarely | TravelFrequency::Occasional => {}
        }
    }

    factor
}
