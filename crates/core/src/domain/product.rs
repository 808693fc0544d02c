use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// An insurance product as published by the catalog. The engine never
/// mutates products.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub provider: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub suitable_for: Vec<String>,
    #[serde(default)]
    pub risks_covered: Vec<String>,
    #[serde(alias = "min_price")]
    pub price_floor: f64,
    #[serde(alias = "max_price")]
    pub price_ceiling: f64,
}

impl Product {
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidProduct {
            product_id: self.id.0.clone(),
            reason,
        };

        if self.id.0.trim().is_empty() {
            return Err(invalid("product id must not be empty".to_string()));
        }
        if !self.price_floor.is_finite() || !self.price_ceiling.is_finite() {
            return Err(invalid("price bounds must be finite".to_string()));
        }
        if self.price_floor < 0.0 {
            return Err(invalid(format!("price_floor must be non-negative, got {}", self.price_floor)));
        }
        if self.price_floor > self.price_ceiling {
            return Err(invalid(format!(
                "price_floor {} exceeds price_ceiling {}",
                self.price_floor, self.price_ceiling
            )));
        }
        Ok(())
    }

    pub fn coverage_line(&self) -> CoverageLine {
        CoverageLine::from_category(&self.category)
    }

    pub fn price_midpoint(&self) -> f64 {
        (self.price_floor + self.price_ceiling) / 2.0
    }
}

/// Normalized insurance line a free-form catalog category maps onto. Rule
/// matching in pricing, reasons and fallback selection keys off this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageLine {
    Health,
    Auto,
    Property,
    Life,
    Travel,
    Other,
}

impl CoverageLine {
    pub fn from_category(category: &str) -> Self {
        let normalized = category.trim().to_lowercase();
        let has_word = |word: &str| {
            normalized
                .split(|ch: char| !ch.is_alphanumeric())
                .any(|token| token == word)
        };

        if normalized.contains("health")
            || normalized.contains("medical")
            || normalized.contains("медицин")
            || normalized.contains("здоровь")
        {
            Self::Health
        } else if has_word("auto")
            || has_word("car")
            || has_word("motor")
            || normalized.contains("vehicle")
            || normalized.contains("авто")
        {
            Self::Auto
        } else if normalized.contains("property")
            || normalized.contains("real estate")
            || has_word("home")
            || has_word("house")
            || normalized.contains("homeowner")
            || normalized.contains("недвижим")
            || normalized.contains("имуществ")
        {
            Self::Property
        } else if has_word("life") || normalized.contains("жизн") {
            Self::Life
        } else if normalized.contains("travel") || normalized.contains("путешеств") {
            Self::Travel
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Auto => "auto",
            Self::Property => "property",
            Self::Life => "life",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }
}
