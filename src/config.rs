use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::records::{AgriculturalIndicators, ClimateReadings, HazardProfile, LocationRecord};
use crate::types::{HazardLevel, HazardType, LocationId, LocationRole};

/// Two-tier cutoff: values strictly above `high` earn the high points,
/// values strictly above `low` earn the low points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub high: f64,
    pub low: f64,
}

impl Tier {
    pub const fn new(high: f64, low: f64) -> Self {
        Tier { high, low }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.high.is_finite() || !self.low.is_finite() || self.high < self.low {
            return Err(RiskError::invalid(format!(
                "{name}: tier requires finite high >= low, got high={} low={}",
                self.high, self.low
            )));
        }
        Ok(())
    }
}

/// Points awarded by a [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPoints {
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateThresholds {
    /// Mean temperature change (°C).
    pub temp_change: Tier,
    /// Max temperature change (°C).
    pub temp_max_change: Tier,
    /// |precipitation change| (%).
    pub precipitation_change: Tier,
    /// Consecutive dry days (days).
    pub consecutive_dry_days: Tier,
    /// Extreme-heat-day increase (days/year).
    pub extreme_heat_days: Tier,
    /// |growing-degree-days change| (%).
    pub growing_degree_days_change: Tier,
    /// |solar radiation change| (%).
    pub solar_radiation_change: Tier,
}

impl Default for ClimateThresholds {
    fn default() -> Self {
        ClimateThresholds {
            temp_change: Tier::new(2.5, 1.5),
            temp_max_change: Tier::new(3.5, 2.0),
            precipitation_change: Tier::new(20.0, 10.0),
            consecutive_dry_days: Tier::new(30.0, 20.0),
            extreme_heat_days: Tier::new(50.0, 30.0),
            growing_degree_days_change: Tier::new(15.0, 10.0),
            solar_radiation_change: Tier::new(10.0, 5.0),
        }
    }
}

impl ClimateThresholds {
    fn validate(&self) -> Result<()> {
        self.temp_change.validate("temp_change")?;
        self.temp_max_change.validate("temp_max_change")?;
        self.precipitation_change.validate("precipitation_change")?;
        self.consecutive_dry_days.validate("consecutive_dry_days")?;
        self.extreme_heat_days.validate("extreme_heat_days")?;
        self.growing_degree_days_change.validate("growing_degree_days_change")?;
        self.solar_radiation_change.validate("solar_radiation_change")
    }
}

/// Points per hazard severity level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardPoints {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub very_low: f64,
}

impl Default for HazardPoints {
    fn default() -> Self {
        HazardPoints { high: 3.0, medium: 2.0, low: 1.0, very_low: 0.5 }
    }
}

impl HazardPoints {
    pub fn points(&self, level: HazardLevel) -> f64 {
        match level {
            HazardLevel::High => self.high,
            HazardLevel::Medium => self.medium,
            HazardLevel::Low => self.low,
            HazardLevel::VeryLow => self.very_low,
        }
    }

    fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.very_low
            && self.very_low <= self.low
            && self.low <= self.medium
            && self.medium <= self.high
            && self.high.is_finite();
        if !ordered {
            return Err(RiskError::invalid(
                "hazard points must be finite, non-negative and ordered very_low <= low <= medium <= high",
            ));
        }
        Ok(())
    }
}

/// Blend of climate and hazard sub-scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub climate: f64,
    pub hazard: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights { climate: 0.6, hazard: 0.4 }
    }
}

impl RiskWeights {
    pub const SUM_TOLERANCE: f64 = 1e-9;

    pub fn validate(&self) -> Result<()> {
        if !(self.climate >= 0.0 && self.hazard >= 0.0) {
            return Err(RiskError::invalid(format!(
                "risk weights must be non-negative, got climate={} hazard={}",
                self.climate, self.hazard
            )));
        }
        let sum = self.climate + self.hazard;
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(RiskError::invalid(format!("risk weights must sum to 1.0, got {sum}")));
        }
        Ok(())
    }
}

/// Points each data source contributes toward a 100% confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub temperature: f64,
    pub precipitation: f64,
    pub max_temperature: f64,
    pub flood_hazard: f64,
    pub drought_hazard: f64,
    pub consecutive_dry_days: f64,
    pub extreme_heat_days: f64,
    pub wildfire_hazard: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        // Core climate 50, hazard 20, supplementary 30.
        ConfidenceWeights {
            temperature: 20.0,
            precipitation: 20.0,
            max_temperature: 10.0,
            flood_hazard: 10.0,
            drought_hazard: 10.0,
            consecutive_dry_days: 15.0,
            extreme_heat_days: 10.0,
            wildfire_hazard: 5.0,
        }
    }
}

impl ConfidenceWeights {
    fn validate(&self) -> Result<()> {
        let all = [
            self.temperature,
            self.precipitation,
            self.max_temperature,
            self.flood_hazard,
            self.drought_hazard,
            self.consecutive_dry_days,
            self.extreme_heat_days,
            self.wildfire_hazard,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RiskError::invalid("confidence weights must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Relevance of each hazard type to sugarcane production.
pub fn default_hazard_weights() -> BTreeMap<HazardType, f64> {
    BTreeMap::from([
        (HazardType::Flood, 0.30),
        (HazardType::Drought, 0.30),
        (HazardType::Wildfire, 0.20),
        (HazardType::Landslide, 0.10),
        (HazardType::Earthquake, 0.05),
        (HazardType::Cyclone, 0.05),
        (HazardType::UrbanFlood, 0.15),
        (HazardType::CoastalFlood, 0.10),
        (HazardType::Tsunami, 0.02),
        (HazardType::Volcano, 0.02),
        (HazardType::ExtremeHeat, 0.25),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: ClimateThresholds,
    /// Points for temperature, max temperature and precipitation.
    pub core_points: TierPoints,
    /// Points for the optional agricultural indicators.
    pub supplementary_points: TierPoints,
    pub hazard_points: HazardPoints,
    pub hazard_weights: BTreeMap<HazardType, f64>,
    /// Hazard point total that maps to a severity of 5 (five simultaneous
    /// high-severity hazards under the default points).
    pub max_hazard_total: f64,
    pub risk_weights: RiskWeights,
    pub confidence_weights: ConfidenceWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            thresholds: ClimateThresholds::default(),
            core_points: TierPoints { high: 2.0, low: 1.0 },
            supplementary_points: TierPoints { high: 1.0, low: 0.5 },
            hazard_points: HazardPoints::default(),
            hazard_weights: default_hazard_weights(),
            max_hazard_total: Self::DEFAULT_MAX_HAZARD_TOTAL,
            risk_weights: RiskWeights::default(),
            confidence_weights: ConfidenceWeights::default(),
        }
    }
}

impl ScoringConfig {
    pub const DEFAULT_MAX_HAZARD_TOTAL: f64 = 15.0;

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        for (name, p) in [("core_points", self.core_points), ("supplementary_points", self.supplementary_points)] {
            if !(p.high.is_finite() && p.low >= 0.0 && p.high >= p.low) {
                return Err(RiskError::invalid(format!(
                    "{name} must satisfy 0 <= low <= high, got high={} low={}",
                    p.high, p.low
                )));
            }
        }
        self.hazard_points.validate()?;
        if !(self.max_hazard_total.is_finite() && self.max_hazard_total > 0.0) {
            return Err(RiskError::invalid(format!(
                "max_hazard_total must be positive, got {}",
                self.max_hazard_total
            )));
        }
        if self.hazard_weights.values().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RiskError::invalid("hazard weights must be finite and non-negative"));
        }
        self.risk_weights.validate()?;
        self.confidence_weights.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub n_simulations: usize,
    /// Standard deviation of the yield-loss draw (percentage points).
    pub std_dev_pct: f64,
    /// Mean yield loss at an aggregate risk of 5 (percent).
    pub max_mean_loss_pct: f64,
    /// VaR confidence levels in percent, e.g. `[90, 95, 99]`.
    pub var_levels: Vec<f64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            n_simulations: 10_000,
            std_dev_pct: 15.0,
            max_mean_loss_pct: 50.0,
            var_levels: vec![90.0, 95.0, 99.0],
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_simulations == 0 {
            return Err(RiskError::invalid("n_simulations must be a positive integer"));
        }
        if !(self.std_dev_pct.is_finite() && self.std_dev_pct >= 0.0) {
            return Err(RiskError::invalid(format!(
                "std_dev_pct must be >= 0, got {}",
                self.std_dev_pct
            )));
        }
        if !(0.0..=100.0).contains(&self.max_mean_loss_pct) {
            return Err(RiskError::invalid(format!(
                "max_mean_loss_pct must lie in [0, 100], got {}",
                self.max_mean_loss_pct
            )));
        }
        if let Some(bad) = self.var_levels.iter().find(|l| !(0.0..=100.0).contains(*l)) {
            return Err(RiskError::invalid(format!("VaR level must lie in [0, 100], got {bad}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub scoring: ScoringConfig,
    pub monte_carlo: MonteCarloConfig,
    pub seed: u64,
    /// Uniform cross-location correlation for the joint-draw portfolio path.
    /// `None` skips it.
    pub correlation: Option<f64>,
    /// Impact multiplier for the sensitivity analysis. `None` skips it.
    pub stress_factor: Option<f64>,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            scoring: ScoringConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            seed: 42,
            correlation: None,
            stress_factor: Some(1.5),
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.monte_carlo.validate()?;
        if let Some(rho) = self.correlation
            && !(-1.0..=1.0).contains(&rho)
        {
            return Err(RiskError::invalid(format!("correlation must lie in [-1, 1], got {rho}")));
        }
        if let Some(f) = self.stress_factor
            && !(f.is_finite() && f >= 0.0)
        {
            return Err(RiskError::invalid(format!("stress_factor must be >= 0, got {f}")));
        }
        Ok(())
    }
}

/// Built-in demo portfolio: sugarcane royalty clients and seedling suppliers.
/// Climate and hazard values are PLACEHOLDER figures standing in for the
/// CCKP / ThinkHazard / NASA POWER collectors.
pub fn canonical_portfolio() -> Vec<LocationRecord> {
    use HazardLevel::*;
    use HazardType::*;

    let readings = |tas: f64, tasmax: f64, pr: f64| ClimateReadings {
        tas: Some(tas),
        tasmax: Some(tasmax),
        pr: Some(pr),
    };
    let record = |id: &str, role: LocationRole, impact: f64, base: ClimateReadings, fut: ClimateReadings, hazards: HazardProfile, ind: AgriculturalIndicators| {
        let state = id.rsplit('/').next().unwrap_or_default().to_string();
        LocationRecord {
            location_id: LocationId::new(id),
            state,
            role,
            baseline: base,
            future: fut,
            hazards,
            optional_indicators: ind,
            impact_percent: impact,
        }
    };
    let no_indicators = AgriculturalIndicators::default();

    vec![
        // ── Clients (royalty share of total business, %) ────────────────────
        record(
            "NOVO HORIZONTE/SP", LocationRole::Client, 7.0,
            readings(24.0, 30.0, 1500.0), readings(26.5, 33.5, 1350.0),
            HazardProfile::new().with(Flood, Medium).with(Drought, High).with(Wildfire, Medium),
            AgriculturalIndicators { cdd: Some(34.0), extreme_heat_days: Some(41.0), gdd: Some(12.0), solar_radiation: Some(3.0) },
        ),
        record(
            "ITAPURA/SP", LocationRole::Client, 8.0,
            readings(24.0, 30.0, 1500.0), readings(26.8, 34.1, 1180.0),
            HazardProfile::new().with(Flood, Low).with(Drought, High).with(Wildfire, High),
            AgriculturalIndicators { cdd: Some(38.0), extreme_heat_days: Some(55.0), gdd: None, solar_radiation: None },
        ),
        record(
            "MINEIROS/GO", LocationRole::Client, 8.0,
            readings(23.1, 29.4, 1650.0), readings(25.7, 32.9, 1420.0),
            HazardProfile::new().with(Flood, Medium).with(Drought, Medium).with(Wildfire, High),
            AgriculturalIndicators { cdd: Some(42.0), extreme_heat_days: Some(36.0), gdd: Some(16.0), solar_radiation: Some(6.0) },
        ),
        record(
            "QUIRINÓPOLIS/GO", LocationRole::Client, 6.0,
            readings(23.1, 29.4, 1650.0), readings(25.4, 32.0, 1530.0),
            HazardProfile::new().with(Flood, Low).with(Drought, Medium),
            no_indicators,
        ),
        record(
            "COLORADO/PR", LocationRole::Client, 4.5,
            readings(20.8, 27.0, 1600.0), readings(22.6, 29.3, 1710.0),
            HazardProfile::new().with(Flood, High).with(Landslide, Low),
            AgriculturalIndicators { cdd: Some(18.0), extreme_heat_days: None, gdd: None, solar_radiation: None },
        ),
        record(
            "CAARAPÓ/MS", LocationRole::Client, 3.5,
            readings(23.5, 29.8, 1450.0), readings(25.9, 33.0, 1300.0),
            HazardProfile::new().with(Flood, Medium).with(Drought, Medium).with(Wildfire, Medium),
            no_indicators,
        ),
        record(
            "CORURIPE/AL", LocationRole::Client, 1.0,
            readings(25.2, 29.9, 1350.0), readings(27.0, 31.6, 1150.0),
            HazardProfile::new().with(Flood, Medium).with(CoastalFlood, Low).with(Drought, Low),
            no_indicators,
        ),
        // ── Suppliers (equal share of seedling supply) ──────────────────────
        record(
            "PIRACICABA/SP", LocationRole::Supplier, 100.0 / 6.0 / 4.0,
            readings(24.0, 30.0, 1500.0), readings(25.9, 32.4, 1440.0),
            HazardProfile::new().with(Flood, Medium).with(UrbanFlood, Medium),
            no_indicators,
        ),
        record(
            "SANTA RITA/PB", LocationRole::Supplier, 100.0 / 6.0 / 4.0,
            readings(25.6, 30.2, 1200.0), readings(27.3, 32.1, 940.0),
            HazardProfile::new().with(Drought, High).with(CoastalFlood, Medium),
            AgriculturalIndicators { cdd: Some(51.0), extreme_heat_days: Some(62.0), gdd: None, solar_radiation: Some(11.0) },
        ),
    ]
}
