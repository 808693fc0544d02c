use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelFrequency {
    Rarely,
    Occasional,
    Often,
    VeryOften,
}

impl TravelFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rarely => "rarely",
            Self::Occasional => "occasional",
            Self::Often => "often",
            Self::VeryOften => "very_often",
        }
    }

    /// `often` and `very_often` count as frequent travel.
    pub fn is_frequent(&self) -> bool {
        matches!(self, Self::Often | Self::VeryOften)
    }
}

impl fmt::Display for TravelFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelFrequency {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "rarely" => Ok(Self::Rarely),
            "occasional" => Ok(Self::Occasional),
            "often" => Ok(Self::Often),
            "very_often" => Ok(Self::VeryOften),
            other => Err(DomainError::InvalidProfile(format!(
                "unsupported travel frequency `{other}` (expected rarely|occasional|often|very_often)"
            ))),
        }
    }
}

/// Applicant data the engine matches against the catalog. Immutable for the
/// duration of one recommendation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub gender: String,
    pub occupation: String,
    pub income: f64,
    pub marital_status: String,
    pub has_children: bool,
    pub has_vehicle: bool,
    pub has_home: bool,
    pub has_medical_conditions: bool,
    pub travel_frequency: TravelFrequency,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.income.is_finite() || self.income < 0.0 {
            return Err(DomainError::InvalidProfile(format!(
                "income must be a finite non-negative number, got {}",
                self.income
            )));
        }
        Ok(())
    }

    pub fn is_married(&self) -> bool {
        self.marital_status.trim().eq_ignore_ascii_case("married")
    }
}
