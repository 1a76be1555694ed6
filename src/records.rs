//! Boundary records: what the data-collection layer hands the core, and what
//! the core hands the presentation/export layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::scoring::Contribution;
use crate::simulation::SimulationResult;
use crate::types::{ConfidenceLevel, HazardLevel, HazardType, LocationId, LocationRole, RiskCategory};

/// One climatology snapshot (baseline or projected period).
///
/// `None` is the explicit "absent" marker; `Some(0.0)` is a real measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateReadings {
    /// Mean near-surface air temperature (°C).
    pub tas: Option<f64>,
    /// Mean daily maximum temperature (°C).
    pub tasmax: Option<f64>,
    /// Precipitation (mm).
    pub pr: Option<f64>,
}

/// Supplementary agricultural indicators, already expressed in the units their
/// thresholds use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgriculturalIndicators {
    /// Consecutive dry days (days).
    pub cdd: Option<f64>,
    /// Increase in days/year above the extreme-heat threshold.
    pub extreme_heat_days: Option<f64>,
    /// Growing-degree-days change (%).
    pub gdd: Option<f64>,
    /// Surface solar radiation change (%).
    pub solar_radiation: Option<f64>,
}

impl AgriculturalIndicators {
    pub fn is_empty(&self) -> bool {
        self.cdd.is_none()
            && self.extreme_heat_days.is_none()
            && self.gdd.is_none()
            && self.solar_radiation.is_none()
    }
}

/// Hazard type → severity level. Hazards not listed are absent, not unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HazardProfile(pub BTreeMap<HazardType, HazardLevel>);

impl HazardProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hazard: HazardType, level: HazardLevel) -> Self {
        self.0.insert(hazard, level);
        self
    }

    pub fn level(&self, hazard: HazardType) -> Option<HazardLevel> {
        self.0.get(&hazard).copied()
    }

    pub fn contains(&self, hazard: HazardType) -> bool {
        self.0.contains_key(&hazard)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HazardType, HazardLevel)> + '_ {
        self.0.iter().map(|(h, l)| (*h, *l))
    }
}

/// A location's share of total business value, in percent of portfolio.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessImpact(f64);

impl BusinessImpact {
    pub fn new(percent: f64) -> Result<Self> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(RiskError::invalid(format!(
                "impact_percent must lie in [0, 100], got {percent}"
            )));
        }
        Ok(BusinessImpact(percent))
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// Share of the portfolio as a fraction in [0, 1].
    pub fn fraction(self) -> f64 {
        self.0 / 100.0
    }
}

/// Per-location input contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub location_id: LocationId,
    pub state: String,
    #[serde(default)]
    pub role: LocationRole,
    pub baseline: ClimateReadings,
    pub future: ClimateReadings,
    #[serde(default)]
    pub hazards: HazardProfile,
    #[serde(default)]
    pub optional_indicators: AgriculturalIndicators,
    pub impact_percent: f64,
}

/// Top-level input file: `{"locations": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub locations: Vec<LocationRecord>,
}

/// Per-location output contract.
#[derive(Debug, Clone, Serialize)]
pub struct LocationReport {
    pub location_id: LocationId,
    pub state: String,
    pub role: LocationRole,
    pub impact_percent: f64,
    pub climate_likelihood: f64,
    pub hazard_severity: f64,
    pub relevance_weighted_hazard: f64,
    pub aggregate_risk: f64,
    /// `aggregate_risk × impact_percent`.
    pub weighted_risk: f64,
    pub risk_category: RiskCategory,
    pub confidence_percent: f64,
    pub confidence_level_label: ConfidenceLevel,
    pub contributions: Vec<Contribution>,
    pub hazard_scores: BTreeMap<HazardType, f64>,
    pub simulation: SimulationResult,
}
