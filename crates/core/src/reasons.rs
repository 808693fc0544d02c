//! Natural-language justification attached to each recommendation.

use crate::domain::product::{CoverageLine, Product};
use crate::domain::profile::UserProfile;

/// Share of annual income a product's price range must bracket for the
/// affordability clause.
pub const DEFAULT_AFFORDABILITY_RATIO: f64 = 0.05;

const LEAD_IN: &str = "Recommended because ";

/// Produces the `recommendation_reason` text. Alternate implementations
/// (for example model-generated text) plug in behind the same interface.
pub trait ReasonGenerator: Send + Sync {
    fn generate(&self, profile: &UserProfile, product: &Product, score: f64) -> String;
}

/// Deterministic rule table keyed by coverage line and profile attributes.
#[derive(Clone, Debug)]
pub struct RuleBasedReasons {
    affordability_ratio: f64,
}

impl RuleBasedReasons {
    pub fn new() -> Self {
        Self { affordability_ratio: DEFAULT_AFFORDABILITY_RATIO }
    }

    pub fn with_affordability_ratio(affordability_ratio: f64) -> Self {
        Self { affordability_ratio }
    }

    pub fn clauses(&self, profile: &UserProfile, product: &Product) -> Vec<&'static str> {
        let mut clauses = Vec::new();

        match product.coverage_line() {
            CoverageLine::Health if profile.has_medical_conditions => clauses.push(
                "given your medical conditions, this health insurance policy provides optimal coverage",
            ),
            CoverageLine::Auto if profile.has_vehicle => {
                clauses.push("as a vehicle owner, this policy gives you the protection you need")
            }
            CoverageLine::Property if profile.has_home => {
                clauses.push("as a property owner, this policy protects your home and belongings")
            }
            CoverageLine::Life if profile.has_children || profile.is_married() => {
                clauses.push("this policy provides financial protection for your family")
            }
            CoverageLine::Travel if profile.travel_frequency.is_frequent() => clauses.push(
                "given how often you travel, this travel insurance policy keeps you protected on every trip",
            ),
            _ => {}
        }

        let budget = profile.income * self.affordability_ratio;
        if product.price_floor <= budget && budget <= product.price_ceiling {
            clauses.push("the cost of this policy matches your income level");
        }

        clauses
    }
}

impl Default for RuleBasedReasons {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasonGenerator for RuleBasedReasons {
    fn generate(&self, profile: &UserProfile, product: &Product, score: f64) -> String {
        let clauses = self.clauses(profile, product);
        let body = if clauses.is_empty() {
            format!("this policy has a high match rating ({score:.2}) for your profile")
        } else {
            clauses.join(" and ")
        };
        format!("{LEAD_IN}{body}.")
    }
}
