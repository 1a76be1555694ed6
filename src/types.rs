use std::fmt;

use serde::{Deserialize, Serialize};

/// Location identifier, e.g. `"NOVO HORIZONTE/SP"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        LocationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a location relates to the business: royalty-paying client or
/// seedling supplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocationRole {
    #[default]
    Client,
    Supplier,
}

/// Natural hazard types, serialized as ThinkHazard mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HazardType {
    #[serde(rename = "FL")]
    Flood,
    #[serde(rename = "DR")]
    Drought,
    #[serde(rename = "WF")]
    Wildfire,
    #[serde(rename = "LS")]
    Landslide,
    #[serde(rename = "EQ")]
    Earthquake,
    #[serde(rename = "CY")]
    Cyclone,
    #[serde(rename = "UF")]
    UrbanFlood,
    #[serde(rename = "CF")]
    CoastalFlood,
    #[serde(rename = "TS")]
    Tsunami,
    #[serde(rename = "VO")]
    Volcano,
    #[serde(rename = "EH")]
    ExtremeHeat,
}

impl HazardType {
    pub const ALL: [HazardType; 11] = [
        HazardType::Flood,
        HazardType::Drought,
        HazardType::Wildfire,
        HazardType::Landslide,
        HazardType::Earthquake,
        HazardType::Cyclone,
        HazardType::UrbanFlood,
        HazardType::CoastalFlood,
        HazardType::Tsunami,
        HazardType::Volcano,
        HazardType::ExtremeHeat,
    ];
}

/// Hazard severity level. Ordered: `VeryLow < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HazardLevel {
    #[serde(rename = "VLO")]
    VeryLow,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MED")]
    Medium,
    #[serde(rename = "HIG")]
    High,
}

/// Banded view of a 0–5 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    VeryLow,
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 4] =
        [RiskCategory::VeryLow, RiskCategory::Low, RiskCategory::Medium, RiskCategory::High];

    /// Band `score / max_score`: ≥ 0.7 High, ≥ 0.4 Medium, ≥ 0.15 Low.
    pub fn from_score(score: f64, max_score: f64) -> Self {
        if max_score <= 0.0 {
            return RiskCategory::VeryLow;
        }
        let normalized = score / max_score;
        if normalized >= 0.7 {
            RiskCategory::High
        } else if normalized >= 0.4 {
            RiskCategory::Medium
        } else if normalized >= 0.15 {
            RiskCategory::Low
        } else {
            RiskCategory::VeryLow
        }
    }
}

/// Label for a data-completeness percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub const HIGH_THRESHOLD: f64 = 80.0;
    pub const MEDIUM_THRESHOLD: f64 = 50.0;

    pub fn from_percent(percent: f64) -> Self {
        if percent >= Self::HIGH_THRESHOLD {
            ConfidenceLevel::High
        } else if percent >= Self::MEDIUM_THRESHOLD {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}
