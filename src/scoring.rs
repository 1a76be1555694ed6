//! Risk scorer: climate/hazard observations → bounded 0–5 scores plus a
//! data-completeness percentage. Pure functions, no randomness.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{ConfidenceWeights, RiskWeights, ScoringConfig, Tier, TierPoints};
use crate::error::{Result, RiskError};
use crate::records::{AgriculturalIndicators, BusinessImpact, ClimateReadings, HazardProfile, LocationRecord};
use crate::types::{ConfidenceLevel, HazardType, LocationId, LocationRole, RiskCategory};

/// Upper bound of every 0–5 score.
pub const MAX_SCORE: f64 = 5.0;
/// Upper bound of the confidence percentage.
pub const MAX_CONFIDENCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClimateIndicator {
    TemperatureChange,
    MaxTemperatureChange,
    PrecipitationChange,
    ConsecutiveDryDays,
    ExtremeHeatDays,
    GrowingDegreeDaysChange,
    SolarRadiationChange,
}

/// One evaluated indicator: the measured value and the points it earned.
/// For percent-change indicators `value` keeps its sign; the tier is applied
/// to its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub indicator: ClimateIndicator,
    pub value: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateAssessment {
    /// Clamped to `[0, MAX_SCORE]`.
    pub likelihood: f64,
    pub contributions: Vec<Contribution>,
}

impl ClimateAssessment {
    /// Contributions that earned points.
    pub fn fired(&self) -> impl Iterator<Item = &Contribution> {
        self.contributions.iter().filter(|c| c.points > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardAssessment {
    /// Clamped to `[0, MAX_SCORE]`.
    pub severity: f64,
    pub total_points: f64,
    pub scores: BTreeMap<HazardType, f64>,
}

/// Two-tier threshold primitive shared by every scored variable.
///
/// Comparisons are strict: a value exactly on a threshold earns the lower
/// tier.
pub fn tiered_score(
    value: f64,
    high_threshold: f64,
    low_threshold: f64,
    high_points: f64,
    low_points: f64,
) -> f64 {
    if value > high_threshold {
        high_points
    } else if value > low_threshold {
        low_points
    } else {
        0.0
    }
}

fn tier_points(value: f64, tier: Tier, points: TierPoints) -> f64 {
    tiered_score(value, tier.high, tier.low, points.high, points.low)
}

fn required(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RiskError::missing(field)),
    }
}

fn optional(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Score projected climate change against the baseline.
///
/// Temperature, max temperature and precipitation are required in both
/// periods; a zero precipitation baseline leaves the percent change undefined
/// and is reported as missing. Agricultural indicators contribute only when
/// present.
pub fn score_climate(
    baseline: &ClimateReadings,
    future: &ClimateReadings,
    indicators: &AgriculturalIndicators,
    config: &ScoringConfig,
) -> Result<ClimateAssessment> {
    let base_tas = required(baseline.tas, "baseline.tas")?;
    let fut_tas = required(future.tas, "future.tas")?;
    let base_tasmax = required(baseline.tasmax, "baseline.tasmax")?;
    let fut_tasmax = required(future.tasmax, "future.tasmax")?;
    let base_pr = required(baseline.pr, "baseline.pr")?;
    let fut_pr = required(future.pr, "future.pr")?;
    if base_pr == 0.0 {
        return Err(RiskError::missing("baseline.pr (zero baseline, percent change undefined)"));
    }

    let th = &config.thresholds;
    let core = config.core_points;
    let supp = config.supplementary_points;

    let temp_change = fut_tas - base_tas;
    let tasmax_change = fut_tasmax - base_tasmax;
    let precip_change_pct = (fut_pr - base_pr) / base_pr * 100.0;

    let mut contributions = vec![
        Contribution {
            indicator: ClimateIndicator::TemperatureChange,
            value: temp_change,
            points: tier_points(temp_change, th.temp_change, core),
        },
        Contribution {
            indicator: ClimateIndicator::MaxTemperatureChange,
            value: tasmax_change,
            points: tier_points(tasmax_change, th.temp_max_change, core),
        },
        Contribution {
            indicator: ClimateIndicator::PrecipitationChange,
            value: precip_change_pct,
            points: tier_points(precip_change_pct.abs(), th.precipitation_change, core),
        },
    ];

    let supplementary = [
        (ClimateIndicator::ConsecutiveDryDays, optional(indicators.cdd), th.consecutive_dry_days, false),
        (ClimateIndicator::ExtremeHeatDays, optional(indicators.extreme_heat_days), th.extreme_heat_days, false),
        (ClimateIndicator::GrowingDegreeDaysChange, optional(indicators.gdd), th.growing_degree_days_change, true),
        (ClimateIndicator::SolarRadiationChange, optional(indicators.solar_radiation), th.solar_radiation_change, true),
    ];
    for (indicator, value, tier, magnitude) in supplementary {
        if let Some(v) = value {
            let scored = if magnitude { v.abs() } else { v };
            contributions.push(Contribution { indicator, value: v, points: tier_points(scored, tier, supp) });
        }
    }

    let total: f64 = contributions.iter().map(|c| c.points).sum();
    Ok(ClimateAssessment { likelihood: total.clamp(0.0, MAX_SCORE), contributions })
}

/// Sum severity points over present hazards and normalise to 0–5 against
/// `config.max_hazard_total`.
pub fn score_hazards(profile: &HazardProfile, config: &ScoringConfig) -> HazardAssessment {
    let scores: BTreeMap<HazardType, f64> = profile
        .iter()
        .map(|(hazard, level)| (hazard, config.hazard_points.points(level)))
        .collect();
    let total_points: f64 = scores.values().sum();
    let severity = (total_points / config.max_hazard_total * MAX_SCORE).clamp(0.0, MAX_SCORE);
    HazardAssessment { severity, total_points, scores }
}

/// Hazard severity weighted by each hazard's relevance, normalised against
/// every weighted hazard at the high level.
pub fn relevance_weighted_severity(profile: &HazardProfile, config: &ScoringConfig) -> f64 {
    let weight_of = |h: HazardType| config.hazard_weights.get(&h).copied().unwrap_or(0.0);
    let ceiling = config.hazard_points.high * config.hazard_weights.values().sum::<f64>();
    if ceiling <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = profile
        .iter()
        .map(|(h, level)| config.hazard_points.points(level) * weight_of(h))
        .sum();
    (weighted / ceiling * MAX_SCORE).clamp(0.0, MAX_SCORE)
}

/// Weighted blend of the two sub-scores. Rejects weights that do not sum to 1.
pub fn aggregate_risk(climate_likelihood: f64, hazard_severity: f64, weights: &RiskWeights) -> Result<f64> {
    weights.validate()?;
    let blended = weights.climate * climate_likelihood + weights.hazard * hazard_severity;
    Ok(blended.clamp(0.0, MAX_SCORE))
}

/// Which data sources delivered usable fields for a location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourcePresence {
    pub temperature: bool,
    pub precipitation: bool,
    pub max_temperature: bool,
    pub flood_hazard: bool,
    pub drought_hazard: bool,
    pub consecutive_dry_days: bool,
    pub extreme_heat_days: bool,
    pub wildfire_hazard: bool,
}

impl SourcePresence {
    pub fn of(record: &LocationRecord) -> Self {
        let pair = |b: Option<f64>, f: Option<f64>| optional(b).is_some() && optional(f).is_some();
        SourcePresence {
            temperature: pair(record.baseline.tas, record.future.tas),
            precipitation: pair(record.baseline.pr, record.future.pr),
            max_temperature: pair(record.baseline.tasmax, record.future.tasmax),
            flood_hazard: record.hazards.contains(HazardType::Flood),
            drought_hazard: record.hazards.contains(HazardType::Drought),
            consecutive_dry_days: optional(record.optional_indicators.cdd).is_some(),
            extreme_heat_days: optional(record.optional_indicators.extreme_heat_days).is_some(),
            wildfire_hazard: record.hazards.contains(HazardType::Wildfire),
        }
    }
}

/// Data-completeness percentage: the sum of the weights of present sources,
/// clamped to `[0, 100]`.
pub fn confidence(sources: &SourcePresence, weights: &ConfidenceWeights) -> f64 {
    let parts = [
        (sources.temperature, weights.temperature),
        (sources.precipitation, weights.precipitation),
        (sources.max_temperature, weights.max_temperature),
        (sources.flood_hazard, weights.flood_hazard),
        (sources.drought_hazard, weights.drought_hazard),
        (sources.consecutive_dry_days, weights.consecutive_dry_days),
        (sources.extreme_heat_days, weights.extreme_heat_days),
        (sources.wildfire_hazard, weights.wildfire_hazard),
    ];
    let total: f64 = parts.iter().filter(|(present, _)| *present).map(|(_, w)| w).sum();
    total.clamp(0.0, MAX_CONFIDENCE)
}

/// Composite score for one location. Every field is clamped to its range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskScore {
    pub climate_likelihood: f64,
    pub hazard_severity: f64,
    pub aggregate_risk: f64,
    pub confidence_percent: f64,
}

impl RiskScore {
    pub fn new(climate_likelihood: f64, hazard_severity: f64, aggregate_risk: f64, confidence_percent: f64) -> Self {
        RiskScore {
            climate_likelihood: climate_likelihood.clamp(0.0, MAX_SCORE),
            hazard_severity: hazard_severity.clamp(0.0, MAX_SCORE),
            aggregate_risk: aggregate_risk.clamp(0.0, MAX_SCORE),
            confidence_percent: confidence_percent.clamp(0.0, MAX_CONFIDENCE),
        }
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_percent(self.confidence_percent)
    }

    pub fn category(&self) -> RiskCategory {
        RiskCategory::from_score(self.aggregate_risk, MAX_SCORE)
    }
}

/// Everything the scorer derives for a location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationScore {
    pub location_id: LocationId,
    pub state: String,
    pub role: LocationRole,
    pub impact: BusinessImpact,
    pub score: RiskScore,
    pub climate: ClimateAssessment,
    pub hazards: HazardAssessment,
    pub relevance_weighted_hazard: f64,
}

impl LocationScore {
    /// `aggregate_risk × impact_percent`.
    pub fn weighted_risk(&self) -> f64 {
        self.score.aggregate_risk * self.impact.percent()
    }
}

/// Score one input record end to end.
pub fn score_location(record: &LocationRecord, config: &ScoringConfig) -> Result<LocationScore> {
    let impact = BusinessImpact::new(record.impact_percent)?;
    let climate = score_climate(&record.baseline, &record.future, &record.optional_indicators, config)?;
    let hazards = score_hazards(&record.hazards, config);
    let aggregate = aggregate_risk(climate.likelihood, hazards.severity, &config.risk_weights)?;
    let confidence_percent = confidence(&SourcePresence::of(record), &config.confidence_weights);

    Ok(LocationScore {
        location_id: record.location_id.clone(),
        state: record.state.clone(),
        role: record.role,
        impact,
        score: RiskScore::new(climate.likelihood, hazards.severity, aggregate, confidence_percent),
        relevance_weighted_hazard: relevance_weighted_severity(&record.hazards, config),
        climate,
        hazards,
    })
}
