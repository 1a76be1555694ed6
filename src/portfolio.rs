//! Portfolio aggregation over per-location loss distributions.
//!
//! Two paths:
//! - [`aggregate_portfolio`]: impact-weighted sum of each location's marginal
//!   statistics. Independence-agnostic and conservative; the default.
//! - [`aggregate_portfolio_correlated`]: joint draws through a Cholesky
//!   factor, with portfolio percentiles read off the simulated portfolio loss
//!   vector.
//!
//! All portfolio figures are percent of total business value.

use std::cmp::Ordering;

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::Serialize;
use tracing::debug;

use crate::config::MonteCarloConfig;
use crate::correlation::CorrelationMatrix;
use crate::error::{Result, RiskError};
use crate::records::BusinessImpact;
use crate::scoring::MAX_SCORE;
use crate::simulation::{ES_LEVEL, LOSS_CEILING, LOSS_FLOOR, SimulationResult, VarPoint, mean_loss_pct};
use crate::stats;
use crate::types::{LocationId, LocationRole, RiskCategory};

/// Aggregate score at or above which a location counts as high risk.
pub const HIGH_RISK_SCORE: f64 = 4.0;
/// Number of locations listed in [`PortfolioSummary::top_risks`].
pub const TOP_RISKS: usize = 5;
/// Slack on the 100% total-impact ceiling for accumulated rounding.
const IMPACT_TOLERANCE: f64 = 1e-6;

/// A location's simulated distribution, as fed to [`aggregate_portfolio`].
#[derive(Debug, Clone, Copy)]
pub struct LocationSimulation<'a> {
    pub location_id: &'a LocationId,
    pub role: LocationRole,
    pub result: &'a SimulationResult,
}

/// A location's score and weight, as fed to [`aggregate_portfolio_correlated`].
#[derive(Debug, Clone, Copy)]
pub struct LocationExposure<'a> {
    pub location_id: &'a LocationId,
    pub role: LocationRole,
    pub aggregate_risk: f64,
    pub impact: BusinessImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggregationMethod {
    IndependentSum,
    Correlated,
}

/// One location's share of the portfolio figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationContribution {
    pub location_id: LocationId,
    pub role: LocationRole,
    pub aggregate_risk: f64,
    pub risk_category: RiskCategory,
    pub impact_percent: f64,
    /// Unweighted location VaR95 (percent of location yield).
    pub var_95: f64,
    pub weighted_mean_loss: f64,
    pub weighted_var_95: f64,
    pub weighted_expected_shortfall_95: f64,
    /// Fraction of the portfolio expected loss from this location.
    pub share_of_expected_loss: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub very_low: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl CategoryCounts {
    fn add(&mut self, category: RiskCategory) {
        match category {
            RiskCategory::VeryLow => self.very_low += 1,
            RiskCategory::Low => self.low += 1,
            RiskCategory::Medium => self.medium += 1,
            RiskCategory::High => self.high += 1,
        }
    }

    pub fn get(&self, category: RiskCategory) -> usize {
        match category {
            RiskCategory::VeryLow => self.very_low,
            RiskCategory::Low => self.low,
            RiskCategory::Medium => self.medium,
            RiskCategory::High => self.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub method: AggregationMethod,
    pub n_locations: usize,
    pub clients: usize,
    pub suppliers: usize,
    pub total_impact_percent: f64,
    /// Σ mean_loss × impact / 100.
    pub expected_loss: f64,
    pub var_90: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub expected_shortfall_95: f64,
    /// Portfolio VaR at the configured levels.
    pub value_at_risk: Vec<VarPoint>,
    /// Σ (impact / 100)². Zero for an empty portfolio.
    pub herfindahl: f64,
    /// `1 − herfindahl`; zero for an empty portfolio.
    pub diversification_score: f64,
    /// Locations with `aggregate_risk >= 4`.
    pub high_risk_count: usize,
    pub category_counts: CategoryCounts,
    pub max_location_var_95: f64,
    pub mean_location_var_95: f64,
    pub breakdown: Vec<LocationContribution>,
    /// Largest weighted VaR95 contributions, descending.
    pub top_risks: Vec<LocationContribution>,
}

impl PortfolioSummary {
    /// Portfolio VaR at a configured level, if it was computed.
    pub fn var_at(&self, confidence: f64) -> Option<f64> {
        self.value_at_risk.iter().find(|v| v.confidence == confidence).map(|v| v.value)
    }
}

/// Concentration of business value: `Σ (impact / 100)²`.
pub fn herfindahl(impacts: &[BusinessImpact]) -> f64 {
    impacts.iter().map(|i| i.fraction().powi(2)).sum()
}

/// Shares are of one portfolio, so together they cannot exceed 100%.
fn check_total_impact(impacts: &[BusinessImpact]) -> Result<()> {
    let total: f64 = impacts.iter().map(|i| i.percent()).sum();
    if total > 100.0 + IMPACT_TOLERANCE {
        return Err(RiskError::invalid(format!("business impacts sum to {total:.4}%, more than 100%")));
    }
    Ok(())
}

fn clamp_loss(x: f64) -> f64 {
    x.clamp(LOSS_FLOOR, LOSS_CEILING)
}

fn contribution(
    location_id: &LocationId,
    role: LocationRole,
    result: &SimulationResult,
    impact: BusinessImpact,
) -> LocationContribution {
    let weighted = result.weighted(impact);
    LocationContribution {
        location_id: location_id.clone(),
        role,
        aggregate_risk: result.aggregate_risk,
        risk_category: RiskCategory::from_score(result.aggregate_risk, MAX_SCORE),
        impact_percent: impact.percent(),
        var_95: result.var_95,
        weighted_mean_loss: weighted.mean_loss,
        weighted_var_95: weighted.var_95,
        weighted_expected_shortfall_95: weighted.expected_shortfall_95,
        share_of_expected_loss: 0.0,
    }
}

/// Portfolio VaR/ES figures produced by one of the two aggregation paths.
struct TailFigures {
    var_90: f64,
    var_95: f64,
    var_99: f64,
    expected_shortfall_95: f64,
    value_at_risk: Vec<VarPoint>,
}

/// Fill in everything both paths share: counts, concentration, shares and
/// the top-risk ranking.
fn summarize(
    method: AggregationMethod,
    mut breakdown: Vec<LocationContribution>,
    impacts: &[BusinessImpact],
    expected_loss: f64,
    tail: TailFigures,
) -> PortfolioSummary {
    let n = breakdown.len();
    let mut category_counts = CategoryCounts::default();
    for c in &breakdown {
        category_counts.add(c.risk_category);
    }
    if expected_loss > 0.0 {
        for c in breakdown.iter_mut() {
            c.share_of_expected_loss = c.weighted_mean_loss / expected_loss;
        }
    }

    let mut top_risks = breakdown.clone();
    top_risks.sort_by(|a, b| {
        b.weighted_var_95
            .partial_cmp(&a.weighted_var_95)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.location_id.cmp(&b.location_id))
    });
    top_risks.truncate(TOP_RISKS);

    let h = herfindahl(impacts);
    let location_vars: Vec<f64> = breakdown.iter().map(|c| c.var_95).collect();

    PortfolioSummary {
        method,
        n_locations: n,
        clients: breakdown.iter().filter(|c| c.role == LocationRole::Client).count(),
        suppliers: breakdown.iter().filter(|c| c.role == LocationRole::Supplier).count(),
        total_impact_percent: impacts.iter().map(|i| i.percent()).sum(),
        expected_loss: clamp_loss(expected_loss),
        var_90: tail.var_90,
        var_95: tail.var_95,
        var_99: tail.var_99,
        expected_shortfall_95: tail.expected_shortfall_95,
        value_at_risk: tail.value_at_risk,
        herfindahl: h,
        diversification_score: if n == 0 { 0.0 } else { 1.0 - h },
        high_risk_count: breakdown.iter().filter(|c| c.aggregate_risk >= HIGH_RISK_SCORE).count(),
        category_counts,
        max_location_var_95: location_vars.iter().copied().fold(0.0, f64::max),
        mean_location_var_95: stats::mean(&location_vars),
        breakdown,
        top_risks,
    }
}

fn weighted_sum(
    results: &[LocationSimulation<'_>],
    impacts: &[BusinessImpact],
    stat: &dyn Fn(&SimulationResult) -> f64,
) -> f64 {
    clamp_loss(results.iter().zip(impacts).map(|(r, i)| stat(r.result) * i.fraction()).sum())
}

/// Independent-sum aggregation: every portfolio statistic is the
/// impact-weighted sum of the per-location statistic.
///
/// An empty portfolio yields all-zero metrics. `results` and `impacts` must
/// be the same length and the impacts must total at most 100%.
pub fn aggregate_portfolio(
    results: &[LocationSimulation<'_>],
    impacts: &[BusinessImpact],
    var_levels: &[f64],
) -> Result<PortfolioSummary> {
    if results.len() != impacts.len() {
        return Err(RiskError::invalid(format!(
            "{} location results but {} business impacts",
            results.len(),
            impacts.len()
        )));
    }
    if let Some(bad) = var_levels.iter().find(|l| !(0.0..=100.0).contains(*l)) {
        return Err(RiskError::invalid(format!("VaR level must lie in [0, 100], got {bad}")));
    }
    check_total_impact(impacts)?;

    let sum = |stat: &dyn Fn(&SimulationResult) -> f64| weighted_sum(results, impacts, stat);
    let expected_loss = sum(&|r: &SimulationResult| r.mean_loss);
    let tail = TailFigures {
        var_90: sum(&|r: &SimulationResult| r.value_at_risk(90.0)),
        var_95: sum(&|r: &SimulationResult| r.value_at_risk(ES_LEVEL)),
        var_99: sum(&|r: &SimulationResult| r.value_at_risk(99.0)),
        expected_shortfall_95: sum(&|r: &SimulationResult| r.expected_shortfall_95),
        value_at_risk: var_levels
            .iter()
            .map(|&c| VarPoint { confidence: c, value: sum(&|r: &SimulationResult| r.value_at_risk(c)) })
            .collect(),
    };
    let breakdown = results
        .iter()
        .zip(impacts)
        .map(|(r, &i)| contribution(r.location_id, r.role, r.result, i))
        .collect();

    debug!(locations = results.len(), expected_loss, var_95 = tail.var_95, "independent-sum aggregation");
    Ok(summarize(AggregationMethod::IndependentSum, breakdown, impacts, expected_loss, tail))
}

/// Correlated aggregation: `n_simulations` joint draws of all locations'
/// yield losses, correlated through `correlation`, summed into one
/// portfolio loss per draw.
///
/// Each location's marginal is the same clamped Normal that
/// [`crate::simulation::simulate_location`] draws from; only the dependence
/// between locations differs. Portfolio VaR and ES are read directly off
/// the portfolio loss vector.
pub fn aggregate_portfolio_correlated<R: Rng + ?Sized>(
    exposures: &[LocationExposure<'_>],
    correlation: &CorrelationMatrix,
    params: &MonteCarloConfig,
    rng: &mut R,
) -> Result<PortfolioSummary> {
    params.validate()?;
    let n = exposures.len();
    if correlation.dim() != n {
        return Err(RiskError::invalid(format!(
            "correlation matrix is {0}x{0} but the portfolio has {n} locations",
            correlation.dim()
        )));
    }
    if let Some(e) = exposures.iter().find(|e| !e.aggregate_risk.is_finite()) {
        return Err(RiskError::invalid(format!("{}: aggregate_risk must be finite", e.location_id)));
    }
    let impacts: Vec<BusinessImpact> = exposures.iter().map(|e| e.impact).collect();
    check_total_impact(&impacts)?;
    let factor = correlation.cholesky()?;

    let risks: Vec<f64> = exposures.iter().map(|e| e.aggregate_risk.clamp(0.0, MAX_SCORE)).collect();
    let means: Vec<f64> = risks.iter().map(|&r| mean_loss_pct(r, params.max_mean_loss_pct)).collect();
    let weights: Vec<f64> = exposures.iter().map(|e| e.impact.fraction()).collect();

    let n_sims = params.n_simulations;
    let mut columns: Vec<Vec<f64>> = (0..n).map(|_| Vec::with_capacity(n_sims)).collect();
    let mut portfolio = Vec::with_capacity(n_sims);
    let (mut z, mut x) = (vec![0.0; n], vec![0.0; n]);

    for _ in 0..n_sims {
        factor.sample_into(rng, &mut z, &mut x);
        let mut total = 0.0;
        for i in 0..n {
            let loss = clamp_loss(means[i] + params.std_dev_pct * x[i]);
            columns[i].push(loss);
            total += loss * weights[i];
        }
        portfolio.push(total);
    }

    let breakdown = exposures
        .iter()
        .zip(columns)
        .enumerate()
        .map(|(i, (e, col))| {
            let marginal = SimulationResult::from_samples(risks[i], means[i], col, &params.var_levels);
            contribution(e.location_id, e.role, &marginal, e.impact)
        })
        .collect();

    let (expected_loss, tail) = if n == 0 {
        (0.0, TailFigures {
            var_90: 0.0,
            var_95: 0.0,
            var_99: 0.0,
            expected_shortfall_95: 0.0,
            value_at_risk: params.var_levels.iter().map(|&c| VarPoint { confidence: c, value: 0.0 }).collect(),
        })
    } else {
        let sorted = stats::sorted(&portfolio);
        let var = |c: f64| clamp_loss(stats::percentile(&sorted, c));
        let var_95 = var(ES_LEVEL);
        (stats::mean(&portfolio), TailFigures {
            var_90: var(90.0),
            var_95,
            var_99: var(99.0),
            expected_shortfall_95: clamp_loss(stats::tail_mean(&sorted, var_95)),
            value_at_risk: params.var_levels.iter().map(|&c| VarPoint { confidence: c, value: var(c) }).collect(),
        })
    };

    debug!(locations = n, expected_loss, var_95 = tail.var_95, "correlated aggregation");
    Ok(summarize(AggregationMethod::Correlated, breakdown, &impacts, expected_loss, tail))
}

/// Random business-impact allocation over `n` locations: a Dirichlet(1, …, 1)
/// draw (normalised Gamma(1, 1) variates) scaled to percentages summing to 100.
pub fn randomize_impacts<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<Vec<f64>> {
    let gamma = Gamma::new(1.0, 1.0).map_err(|e| RiskError::invalid(format!("gamma(1, 1): {e}")))?;
    let draws: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();
    let total: f64 = draws.iter().sum();
    if total <= 0.0 {
        return Ok(vec![100.0 / n as f64; n]);
    }
    Ok(draws.into_iter().map(|d| (d / total * 100.0).min(100.0)).collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::simulation::simulate_location;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn params(n: usize) -> MonteCarloConfig {
        MonteCarloConfig { n_simulations: n, ..Default::default() }
    }

    fn impact(p: f64) -> BusinessImpact {
        BusinessImpact::new(p).unwrap()
    }

    fn ids(n: usize) -> Vec<LocationId> {
        (0..n).map(|i| LocationId::new(format!("LOC{i}/SP"))).collect()
    }

    fn simulate(risks: &[f64], n: usize) -> Vec<SimulationResult> {
        let mut rng = rng();
        risks.iter().map(|&r| simulate_location(r, &params(n), &mut rng).unwrap()).collect()
    }

    fn inputs<'a>(ids: &'a [LocationId], results: &'a [SimulationResult]) -> Vec<LocationSimulation<'a>> {
        ids.iter()
            .zip(results)
            .map(|(location_id, result)| LocationSimulation { location_id, role: LocationRole::Client, result })
            .collect()
    }

    #[test]
    fn empty_portfolio_is_all_zero() {
        let s = aggregate_portfolio(&[], &[], &[90.0, 95.0, 99.0]).unwrap();
        assert_eq!(s.n_locations, 0);
        assert_eq!(s.expected_loss, 0.0);
        assert_eq!((s.var_90, s.var_95, s.var_99, s.expected_shortfall_95), (0.0, 0.0, 0.0, 0.0));
        assert!(s.value_at_risk.iter().all(|v| v.value == 0.0));
        assert_eq!(s.herfindahl, 0.0);
        assert_eq!(s.diversification_score, 0.0);
        assert_eq!(s.category_counts, CategoryCounts::default());
        assert!(s.breakdown.is_empty() && s.top_risks.is_empty());
    }

    #[test]
    fn length_mismatch_rejected() {
        let ids = ids(1);
        let results = simulate(&[3.0], 100);
        let err = aggregate_portfolio(&inputs(&ids, &results), &[], &[95.0]).unwrap_err();
        assert!(matches!(err, RiskError::InvalidConfiguration(_)));
    }

    #[test]
    fn expected_loss_and_var_are_impact_weighted_sums() {
        let ids = ids(3);
        let results = simulate(&[4.0, 2.0, 1.0], 2_000);
        let impacts = [impact(50.0), impact(30.0), impact(20.0)];
        let s = aggregate_portfolio(&inputs(&ids, &results), &impacts, &[95.0]).unwrap();

        let el: f64 = results.iter().zip(&impacts).map(|(r, i)| r.mean_loss * i.fraction()).sum();
        let var: f64 = results.iter().zip(&impacts).map(|(r, i)| r.var_95 * i.fraction()).sum();
        assert!((s.expected_loss - el).abs() < 1e-9, "expected loss {} vs {el}", s.expected_loss);
        assert!((s.var_95 - var).abs() < 1e-9);
        assert_eq!(s.var_at(95.0), Some(s.var_95));
        assert!((s.herfindahl - 0.38).abs() < 1e-12);
        assert!((s.diversification_score - 0.62).abs() < 1e-12);
        assert_eq!(s.method, AggregationMethod::IndependentSum);

        let shares: f64 = s.breakdown.iter().map(|c| c.share_of_expected_loss).sum();
        assert!((shares - 1.0).abs() < 1e-9);
    }

    #[test]
    fn impacts_over_hundred_percent_rejected() {
        let ids = ids(3);
        let results = simulate(&[5.0, 5.0, 5.0], 200);
        let impacts = [impact(100.0); 3];
        let err = aggregate_portfolio(&inputs(&ids, &results), &impacts, &[95.0]).unwrap_err();
        assert!(matches!(err, RiskError::InvalidConfiguration(_)));

        let exposures: Vec<LocationExposure> = ids
            .iter()
            .map(|location_id| LocationExposure {
                location_id,
                role: LocationRole::Client,
                aggregate_risk: 5.0,
                impact: impact(100.0),
            })
            .collect();
        let err = aggregate_portfolio_correlated(&exposures, &CorrelationMatrix::identity(3), &params(200), &mut rng())
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidConfiguration(_)));
    }

    #[test]
    fn full_portfolio_expected_loss_matches_breakdown() {
        let ids = ids(3);
        let results = simulate(&[5.0, 5.0, 5.0], 2_000);
        // Thirds that round to a total a hair above 100.
        let impacts = [impact(100.0 / 3.0 + 1e-9); 3];
        let s = aggregate_portfolio(&inputs(&ids, &results), &impacts, &[95.0]).unwrap();
        let from_breakdown: f64 = s.breakdown.iter().map(|c| c.weighted_mean_loss).sum();
        assert!((s.expected_loss - from_breakdown).abs() < 1e-6, "{} vs {from_breakdown}", s.expected_loss);
        assert!(s.herfindahl <= 1.0);
    }

    #[test]
    fn counts_and_top_risks() {
        let ids = ids(7);
        let results = simulate(&[4.5, 4.0, 3.0, 2.0, 1.0, 0.5, 0.1], 500);
        let impacts: Vec<BusinessImpact> = (0..7).map(|_| impact(10.0)).collect();
        let s = aggregate_portfolio(&inputs(&ids, &results), &impacts, &[]).unwrap();

        assert_eq!(s.high_risk_count, 2);
        // normalised: 0.9 0.8 | 0.6 0.4 | 0.2 | 0.1 0.02
        assert_eq!(s.category_counts.get(RiskCategory::High), 2);
        assert_eq!(s.category_counts.get(RiskCategory::Medium), 2);
        assert_eq!(s.category_counts.get(RiskCategory::Low), 1);
        assert_eq!(s.category_counts.get(RiskCategory::VeryLow), 2);
        assert_eq!((s.clients, s.suppliers), (7, 0));
        assert_eq!(s.top_risks.len(), TOP_RISKS);
        for w in s.top_risks.windows(2) {
            assert!(w[0].weighted_var_95 >= w[1].weighted_var_95);
        }
        assert_eq!(s.top_risks[0].location_id, ids[0]);
        assert_eq!(s.max_location_var_95, results[0].var_95);
    }

    #[test]
    fn correlated_with_identity_matches_independent_expected_loss() {
        let ids = ids(3);
        let risks = [4.0, 2.5, 1.0];
        let exposures: Vec<LocationExposure> = ids
            .iter()
            .zip(risks)
            .map(|(location_id, aggregate_risk)| LocationExposure {
                location_id,
                role: LocationRole::Client,
                aggregate_risk,
                impact: impact(30.0),
            })
            .collect();
        let s = aggregate_portfolio_correlated(&exposures, &CorrelationMatrix::identity(3), &params(20_000), &mut rng())
            .unwrap();

        let results = simulate(&risks, 20_000);
        let impacts = [impact(30.0); 3];
        let independent = aggregate_portfolio(&inputs(&ids, &results), &impacts, &[]).unwrap();
        // Same clamped marginals, so only sampling noise separates the two.
        assert!(
            (s.expected_loss - independent.expected_loss).abs() < 0.3,
            "correlated {:.3} vs independent {:.3}",
            s.expected_loss,
            independent.expected_loss
        );
        assert!(independent.var_95 >= s.var_95, "summed marginal VaR bounds the joint VaR under independence");
        assert_eq!(s.method, AggregationMethod::Correlated);
        assert!(s.var_90 <= s.var_95 && s.var_95 <= s.var_99);
        assert!(s.expected_shortfall_95 >= s.var_95);
    }

    /// Positive correlation removes diversification: the joint VaR95 rises
    /// toward the independent-sum figure.
    #[test]
    fn correlation_raises_portfolio_var() {
        let ids = ids(4);
        let exposures: Vec<LocationExposure> = ids
            .iter()
            .map(|location_id| LocationExposure {
                location_id,
                role: LocationRole::Client,
                aggregate_risk: 2.5,
                impact: impact(25.0),
            })
            .collect();
        let run = |rho: f64| {
            let m = CorrelationMatrix::uniform(4, rho).unwrap();
            aggregate_portfolio_correlated(&exposures, &m, &params(10_000), &mut rng()).unwrap()
        };
        let (indep, perfect) = (run(0.0), run(1.0));
        assert!(perfect.var_95 > indep.var_95 + 3.0, "ρ=1 VaR {:.2} vs ρ=0 VaR {:.2}", perfect.var_95, indep.var_95);
        assert!((perfect.expected_loss - indep.expected_loss).abs() < 0.5);
    }

    #[test]
    fn correlated_path_validates_dimensions() {
        let ids = ids(2);
        let exposures: Vec<LocationExposure> = ids
            .iter()
            .map(|location_id| LocationExposure {
                location_id,
                role: LocationRole::Supplier,
                aggregate_risk: 3.0,
                impact: impact(10.0),
            })
            .collect();
        let m = CorrelationMatrix::identity(3);
        assert!(aggregate_portfolio_correlated(&exposures, &m, &params(100), &mut rng()).is_err());
        let empty = aggregate_portfolio_correlated(&[], &CorrelationMatrix::identity(0), &params(100), &mut rng()).unwrap();
        assert_eq!(empty.expected_loss, 0.0);
        assert_eq!(empty.herfindahl, 0.0);
    }

    #[test]
    fn randomized_impacts_sum_to_hundred() {
        let shares = randomize_impacts(7, &mut rng()).unwrap();
        assert_eq!(shares.len(), 7);
        assert!((shares.iter().sum::<f64>() - 100.0).abs() < 1e-9);
        assert!(shares.iter().all(|&s| (0.0..=100.0).contains(&s)));
        assert!(randomize_impacts(0, &mut rng()).unwrap().is_empty());
    }

    proptest! {
        /// With shares summing to 100 across k locations, H ∈ [1/k, 1].
        #[test]
        fn herfindahl_bounds(raw in prop::collection::vec(0.01..1.0f64, 1..30)) {
            let total: f64 = raw.iter().sum();
            let impacts: Vec<BusinessImpact> =
                raw.iter().map(|r| BusinessImpact::new((r / total * 100.0).min(100.0)).unwrap()).collect();
            let k = impacts.len() as f64;
            let h = herfindahl(&impacts);
            prop_assert!(h >= 1.0 / k - 1e-12, "H = {} below 1/k = {}", h, 1.0 / k);
            prop_assert!(h <= 1.0 + 1e-12);
        }

        #[test]
        fn equal_shares_hit_the_minimum(k in 1usize..40) {
            let impacts: Vec<BusinessImpact> = (0..k).map(|_| BusinessImpact::new(100.0 / k as f64).unwrap()).collect();
            prop_assert!((herfindahl(&impacts) - 1.0 / k as f64).abs() < 1e-12);
        }

        /// Any spread between shares lifts H strictly above 1/k.
        #[test]
        fn unequal_shares_exceed_the_minimum(raw in prop::collection::vec(0.01..1.0f64, 2..30)) {
            let hi = raw.iter().copied().fold(f64::MIN, f64::max);
            let lo = raw.iter().copied().fold(f64::MAX, f64::min);
            prop_assume!(hi - lo > 0.01);
            let total: f64 = raw.iter().sum();
            let impacts: Vec<BusinessImpact> =
                raw.iter().map(|r| BusinessImpact::new((r / total * 100.0).min(100.0)).unwrap()).collect();
            let k = impacts.len() as f64;
            let h = herfindahl(&impacts);
            prop_assert!(h > 1.0 / k + 1e-12, "H = {} not above 1/k = {}", h, 1.0 / k);
        }
    }
}
