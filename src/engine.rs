use std::cmp::Ordering;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::correlation::CorrelationMatrix;
use crate::error::{Result, RiskError};
use crate::portfolio::{
    LocationExposure, LocationSimulation, PortfolioSummary, aggregate_portfolio, aggregate_portfolio_correlated,
};
use crate::records::{BusinessImpact, LocationRecord, LocationReport};
use crate::scoring::{LocationScore, score_location};
use crate::simulation::{SimulationResult, StressOutcome, simulate_location, stress_impact};
use crate::types::{LocationId, LocationRole};

/// RNG stream reserved for the joint-draw portfolio path. Per-location
/// streams are the location's input index.
const CORRELATED_STREAM: u64 = u64::MAX;

/// A location dropped from the run because required data was missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedLocation {
    pub location_id: LocationId,
    pub reason: String,
}

/// Effect of stressing the top client's business impact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityReport {
    pub location_id: LocationId,
    pub factor: f64,
    pub baseline_impact_percent: f64,
    pub stressed_impact_percent: f64,
    pub baseline_weighted_risk: f64,
    pub stressed_weighted_risk: f64,
    /// 1-based ranks by weighted risk.
    pub baseline_rank: usize,
    pub stressed_rank: usize,
    /// Highest weighted-risk location after stressing.
    pub stressed_top: LocationId,
    /// True when the full weighted-risk order differs after stressing, not
    /// only the top position. Compare `stressed_top` with `location_id` for
    /// the narrower question.
    pub ranking_changed: bool,
    /// Weighted-loss comparison on the location's simulated distribution.
    pub loss: Option<StressOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Sorted by weighted risk, descending.
    pub locations: Vec<LocationReport>,
    pub excluded: Vec<ExcludedLocation>,
    pub portfolio: PortfolioSummary,
    pub correlated: Option<PortfolioSummary>,
    pub sensitivity: Option<SensitivityReport>,
}

/// Weighted-risk ordering: descending, ties broken by id.
fn by_weighted_risk(a: (&LocationId, f64), b: (&LocationId, f64)) -> Ordering {
    b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0))
}

/// Stress the highest-weighted-risk client's impact by `factor` (capped at
/// 100%) and re-rank. `None` when there are no clients.
pub fn sensitivity_analysis(scores: &[LocationScore], factor: f64) -> Result<Option<SensitivityReport>> {
    if !(factor.is_finite() && factor >= 0.0) {
        return Err(RiskError::invalid(format!("stress factor must be >= 0, got {factor}")));
    }
    let rank = |weights: &[f64]| -> Vec<usize> {
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            by_weighted_risk((&scores[a].location_id, weights[a]), (&scores[b].location_id, weights[b]))
        });
        order
    };

    let baseline: Vec<f64> = scores.iter().map(LocationScore::weighted_risk).collect();
    let baseline_order = rank(&baseline);
    let Some(target) = baseline_order.iter().copied().find(|&i| scores[i].role == LocationRole::Client) else {
        return Ok(None);
    };

    let top = &scores[target];
    let stressed_impact = BusinessImpact::new((top.impact.percent() * factor).min(100.0))?;
    let mut stressed = baseline.clone();
    stressed[target] = top.score.aggregate_risk * stressed_impact.percent();
    let stressed_order = rank(&stressed);

    let position = |order: &[usize]| order.iter().position(|&i| i == target).map_or(0, |p| p + 1);
    Ok(Some(SensitivityReport {
        location_id: top.location_id.clone(),
        factor,
        baseline_impact_percent: top.impact.percent(),
        stressed_impact_percent: stressed_impact.percent(),
        baseline_weighted_risk: baseline[target],
        stressed_weighted_risk: stressed[target],
        baseline_rank: position(&baseline_order),
        stressed_rank: position(&stressed_order),
        stressed_top: scores[stressed_order[0]].location_id.clone(),
        ranking_changed: baseline_order != stressed_order,
        loss: None,
    }))
}

enum Outcome {
    Scored(Box<(LocationScore, SimulationResult)>),
    Excluded(ExcludedLocation),
}

/// Validated configuration plus the score → simulate → aggregate pipeline.
pub struct RiskEngine {
    config: AnalysisConfig,
}

impl RiskEngine {
    /// Fails with `InvalidConfiguration` before anything runs.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(RiskEngine { config })
    }

    /// Per-location RNG: one ChaCha stream per input position, so results do
    /// not depend on thread scheduling.
    fn location_rng(&self, index: usize) -> ChaCha20Rng {
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);
        rng.set_stream(index as u64);
        rng
    }

    fn process(&self, index: usize, record: &LocationRecord) -> Result<Outcome> {
        let score = match score_location(record, &self.config.scoring) {
            Ok(score) => score,
            Err(RiskError::MissingData { field }) => {
                return Ok(Outcome::Excluded(ExcludedLocation {
                    location_id: record.location_id.clone(),
                    reason: format!("missing required data: {field}"),
                }));
            }
            Err(e) => return Err(e),
        };
        let mut rng = self.location_rng(index);
        let result = simulate_location(score.score.aggregate_risk, &self.config.monte_carlo, &mut rng)?;
        debug!(
            location = %score.location_id,
            aggregate_risk = score.score.aggregate_risk,
            mean_loss = result.mean_loss,
            var_95 = result.var_95,
            "simulated location"
        );
        Ok(Outcome::Scored(Box::new((score, result))))
    }

    /// Score, simulate and aggregate every record.
    ///
    /// Locations with missing required data are excluded and reported; any
    /// other error aborts the run.
    pub fn run(&self, records: &[LocationRecord]) -> Result<AnalysisReport> {
        let mc = &self.config.monte_carlo;
        info!(
            locations = records.len(),
            seed = self.config.seed,
            n_simulations = mc.n_simulations,
            parallel = self.config.parallel,
            "starting analysis"
        );

        let outcomes: Vec<Outcome> = if self.config.parallel {
            records.par_iter().enumerate().map(|(i, r)| self.process(i, r)).collect::<Result<_>>()?
        } else {
            records.iter().enumerate().map(|(i, r)| self.process(i, r)).collect::<Result<_>>()?
        };

        let mut scored = Vec::with_capacity(outcomes.len());
        let mut excluded = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Scored(pair) => scored.push(*pair),
                Outcome::Excluded(ex) => {
                    warn!(location = %ex.location_id, reason = %ex.reason, "location excluded");
                    excluded.push(ex);
                }
            }
        }
        scored.sort_by(|(a, _), (b, _)| by_weighted_risk((&a.location_id, a.weighted_risk()), (&b.location_id, b.weighted_risk())));

        let scores: Vec<LocationScore> = scored.iter().map(|(s, _)| s.clone()).collect();
        let mut sensitivity = match self.config.stress_factor {
            Some(factor) => sensitivity_analysis(&scores, factor)?,
            None => None,
        };
        if let Some(report) = sensitivity.as_mut()
            && let Some((score, result)) = scored.iter().find(|(s, _)| s.location_id == report.location_id)
        {
            report.loss = Some(stress_impact(result, score.impact, report.factor)?);
        }

        let correlated = match self.config.correlation {
            Some(rho) => {
                let exposures: Vec<LocationExposure> = scores
                    .iter()
                    .map(|s| LocationExposure {
                        location_id: &s.location_id,
                        role: s.role,
                        aggregate_risk: s.score.aggregate_risk,
                        impact: s.impact,
                    })
                    .collect();
                let matrix = CorrelationMatrix::uniform(exposures.len(), rho)?;
                let mut rng = self.location_rng(0);
                rng.set_stream(CORRELATED_STREAM);
                Some(aggregate_portfolio_correlated(&exposures, &matrix, mc, &mut rng)?)
            }
            None => None,
        };

        let locations: Vec<LocationReport> = scored.into_iter().map(|(s, r)| report(s, r)).collect();
        let impacts: Vec<BusinessImpact> = scores.iter().map(|s| s.impact).collect();
        let inputs: Vec<LocationSimulation> = locations
            .iter()
            .map(|l| LocationSimulation { location_id: &l.location_id, role: l.role, result: &l.simulation })
            .collect();
        let portfolio = aggregate_portfolio(&inputs, &impacts, &mc.var_levels)?;

        info!(
            scored = locations.len(),
            excluded = excluded.len(),
            expected_loss = portfolio.expected_loss,
            var_95 = portfolio.var_95,
            "analysis complete"
        );
        Ok(AnalysisReport { locations, excluded, portfolio, correlated, sensitivity })
    }
}

fn report(score: LocationScore, simulation: SimulationResult) -> LocationReport {
    let weighted_risk = score.weighted_risk();
    LocationReport {
        location_id: score.location_id,
        state: score.state,
        role: score.role,
        impact_percent: score.impact.percent(),
        climate_likelihood: score.score.climate_likelihood,
        hazard_severity: score.score.hazard_severity,
        relevance_weighted_hazard: score.relevance_weighted_hazard,
        aggregate_risk: score.score.aggregate_risk,
        weighted_risk,
        risk_category: score.score.category(),
        confidence_percent: score.score.confidence_percent,
        confidence_level_label: score.score.confidence_level(),
        contributions: score.climate.contributions,
        hazard_scores: score.hazards.scores,
        simulation,
    }
}
