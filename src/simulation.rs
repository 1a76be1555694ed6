//! Per-location Monte Carlo: aggregate risk score → yield-loss distribution.
//!
//! Each draw comes from `Normal(mean, std_dev)` where the mean scales linearly
//! with the aggregate score, then is clamped to `[0, 100]`. The resulting
//! empirical distribution is a truncated Normal; every statistic here is
//! computed on the clamped samples.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use crate::config::MonteCarloConfig;
use crate::error::{Result, RiskError};
use crate::records::BusinessImpact;
use crate::scoring::MAX_SCORE;
use crate::stats;

/// Loss cannot be negative.
pub const LOSS_FLOOR: f64 = 0.0;
/// Loss cannot exceed total value.
pub const LOSS_CEILING: f64 = 100.0;
/// Confidence level of the reported Expected Shortfall.
pub const ES_LEVEL: f64 = 95.0;

fn clamp_loss(x: f64) -> f64 {
    x.clamp(LOSS_FLOOR, LOSS_CEILING)
}

/// A VaR estimate at one confidence level (percent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarPoint {
    pub confidence: f64,
    pub value: f64,
}

/// One point of a loss-exceedance curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExceedancePoint {
    pub loss: f64,
    pub probability: f64,
}

/// Output of [`simulate_location`]. Immutable once built; the sample vector
/// is kept for re-analysis but never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub aggregate_risk: f64,
    /// Mean of the underlying Normal before clamping.
    pub target_mean_loss: f64,
    pub n_simulations: usize,
    pub mean_loss: f64,
    pub median_loss: f64,
    pub std_dev: f64,
    pub min_loss: f64,
    pub max_loss: f64,
    pub var_90: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub expected_shortfall_95: f64,
    /// VaR at the configured levels.
    pub value_at_risk: Vec<VarPoint>,
    #[serde(skip)]
    samples: Vec<f64>,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl SimulationResult {
    /// Build summary statistics from a sample vector. Samples are clamped to
    /// `[0, 100]` on the way in.
    pub fn from_samples(aggregate_risk: f64, target_mean_loss: f64, samples: Vec<f64>, var_levels: &[f64]) -> Self {
        let samples: Vec<f64> = samples.into_iter().map(clamp_loss).collect();
        let sorted = stats::sorted(&samples);
        let var = |level: f64| clamp_loss(stats::percentile(&sorted, level));
        let var_95 = var(ES_LEVEL);

        SimulationResult {
            aggregate_risk,
            target_mean_loss,
            n_simulations: samples.len(),
            mean_loss: clamp_loss(stats::mean(&samples)),
            median_loss: var(50.0),
            std_dev: stats::std_dev(&samples),
            min_loss: sorted.first().copied().unwrap_or(0.0),
            max_loss: sorted.last().copied().unwrap_or(0.0),
            var_90: var(90.0),
            var_95,
            var_99: var(99.0),
            expected_shortfall_95: clamp_loss(stats::tail_mean(&sorted, var_95)),
            value_at_risk: var_levels.iter().map(|&c| VarPoint { confidence: c, value: var(c) }).collect(),
            samples,
            sorted,
        }
    }

    /// Clamped samples in draw order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// `VaR(c)`: the `c`-th percentile of the clamped samples.
    pub fn value_at_risk(&self, confidence: f64) -> f64 {
        clamp_loss(stats::percentile(&self.sorted, confidence))
    }

    /// Mean of samples strictly above `VaR(c)`; equals `VaR(c)` when the tail
    /// is empty.
    pub fn expected_shortfall(&self, confidence: f64) -> f64 {
        clamp_loss(stats::tail_mean(&self.sorted, self.value_at_risk(confidence)))
    }

    /// Sorted loss levels with their exceedance probability `1 − rank/n`,
    /// thinned to at most `max_points` (the largest loss is always kept).
    pub fn exceedance_curve(&self, max_points: usize) -> Vec<ExceedancePoint> {
        let n = self.sorted.len();
        if n == 0 || max_points == 0 {
            return Vec::new();
        }
        let step = n.div_ceil(max_points).max(1);
        let point = |i: usize| ExceedancePoint {
            loss: self.sorted[i],
            probability: 1.0 - (i + 1) as f64 / n as f64,
        };
        let mut curve: Vec<ExceedancePoint> = (step - 1..n).step_by(step).map(point).collect();
        // n not a multiple of step: the tail point was skipped, and there is room for it
        if n % step != 0 {
            curve.push(point(n - 1));
        }
        curve
    }

    /// Loss view as a share of the whole portfolio: every figure scaled by
    /// `impact / 100`.
    pub fn weighted(&self, impact: BusinessImpact) -> WeightedLoss {
        let f = impact.fraction();
        WeightedLoss {
            impact_percent: impact.percent(),
            mean_loss: self.mean_loss * f,
            var_95: self.var_95 * f,
            var_99: self.var_99 * f,
            expected_shortfall_95: self.expected_shortfall_95 * f,
        }
    }
}

/// Location losses expressed as percent of total business value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedLoss {
    pub impact_percent: f64,
    pub mean_loss: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub expected_shortfall_95: f64,
}

/// Mean yield loss implied by an aggregate score: `risk / 5 × max_mean`.
pub fn mean_loss_pct(aggregate_risk: f64, max_mean_loss_pct: f64) -> f64 {
    aggregate_risk / MAX_SCORE * max_mean_loss_pct
}

/// Draw `params.n_simulations` clamped yield-loss samples for one location.
///
/// `rng` is the only source of randomness: the same generator state yields
/// bit-identical samples.
pub fn simulate_location<R: Rng + ?Sized>(
    aggregate_risk: f64,
    params: &MonteCarloConfig,
    rng: &mut R,
) -> Result<SimulationResult> {
    params.validate()?;
    if !aggregate_risk.is_finite() {
        return Err(RiskError::invalid(format!("aggregate_risk must be finite, got {aggregate_risk}")));
    }
    let risk = aggregate_risk.clamp(0.0, MAX_SCORE);
    let mean = mean_loss_pct(risk, params.max_mean_loss_pct);
    let normal = Normal::new(mean, params.std_dev_pct)
        .map_err(|e| RiskError::invalid(format!("normal({mean}, {}): {e}", params.std_dev_pct)))?;

    let samples: Vec<f64> = (0..params.n_simulations).map(|_| clamp_loss(normal.sample(rng))).collect();
    Ok(SimulationResult::from_samples(risk, mean, samples, &params.var_levels))
}

/// Baseline vs. stressed portfolio-share losses for one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StressOutcome {
    pub factor: f64,
    pub baseline: WeightedLoss,
    pub stressed: WeightedLoss,
}

/// Re-weight a location's losses with its impact multiplied by `factor`
/// (capped at 100%). The yield-loss samples are reused, so the comparison is
/// free of sampling noise.
pub fn stress_impact(result: &SimulationResult, impact: BusinessImpact, factor: f64) -> Result<StressOutcome> {
    if !(factor.is_finite() && factor >= 0.0) {
        return Err(RiskError::invalid(format!("stress factor must be >= 0, got {factor}")));
    }
    let stressed_impact = BusinessImpact::new((impact.percent() * factor).min(100.0))?;
    Ok(StressOutcome {
        factor,
        baseline: result.weighted(impact),
        stressed: result.weighted(stressed_impact),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn params(n: usize, sd: f64) -> MonteCarloConfig {
        MonteCarloConfig { n_simulations: n, std_dev_pct: sd, ..Default::default() }
    }

    /// Score 5 → mean 50%; with sd 15 both clamps sit > 3σ away, so the
    /// sample mean must land within ±2 of 50 for 10k draws.
    #[test]
    fn max_score_centres_on_fifty() {
        let r = simulate_location(5.0, &MonteCarloConfig::default(), &mut rng()).unwrap();
        assert_eq!(r.n_simulations, 10_000);
        assert_eq!(r.target_mean_loss, 50.0);
        assert!((r.mean_loss - 50.0).abs() <= 2.0, "mean {:.3} outside 50 ± 2", r.mean_loss);
        assert!(r.var_99 <= 100.0);
        assert!((r.std_dev - 15.0).abs() < 1.0, "std dev {:.3} far from 15", r.std_dev);
    }

    #[test]
    fn same_seed_gives_bit_identical_samples() {
        let a = simulate_location(3.2, &params(2_000, 15.0), &mut rng()).unwrap();
        let b = simulate_location(3.2, &params(2_000, 15.0), &mut rng()).unwrap();
        let bits = |r: &SimulationResult| r.samples().iter().map(|x| x.to_bits()).collect::<Vec<u64>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn different_seeds_differ() {
        let a = simulate_location(3.2, &params(100, 15.0), &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let b = simulate_location(3.2, &params(100, 15.0), &mut ChaCha20Rng::seed_from_u64(2)).unwrap();
        assert_ne!(a.samples(), b.samples());
    }

    #[test]
    fn var_levels_are_ordered_and_es_dominates() {
        let r = simulate_location(2.5, &MonteCarloConfig::default(), &mut rng()).unwrap();
        assert!(r.var_90 <= r.var_95 && r.var_95 <= r.var_99);
        assert!(r.expected_shortfall_95 >= r.var_95);
        let configured: Vec<f64> = r.value_at_risk.iter().map(|v| v.confidence).collect();
        assert_eq!(configured, vec![90.0, 95.0, 99.0]);
        assert_eq!(r.value_at_risk[1].value, r.var_95);
        assert_eq!(r.expected_shortfall(ES_LEVEL), r.expected_shortfall_95);
    }

    /// Score 0 with a wide spread: about half the draws fall below zero and
    /// must be clamped to exactly 0.
    #[test]
    fn negative_draws_clamp_to_zero() {
        let r = simulate_location(0.0, &params(5_000, 30.0), &mut rng()).unwrap();
        let zeros = r.samples().iter().filter(|&&s| s == 0.0).count();
        assert!(zeros > 2_000, "expected ~half the draws clamped, got {zeros}");
        assert_eq!(r.min_loss, 0.0);
        assert!(r.median_loss < 1.0, "median {:.3} should sit on the clamp boundary", r.median_loss);
        assert!(r.mean_loss > 0.0, "clamping shifts the empirical mean above the target");
    }

    #[test]
    fn zero_variance_is_degenerate_not_an_error() {
        let r = simulate_location(2.0, &params(1_000, 0.0), &mut rng()).unwrap();
        assert!(r.samples().iter().all(|&s| s == 20.0));
        assert_eq!(r.std_dev, 0.0);
        assert_eq!(r.var_99, 20.0);
        assert_eq!(r.expected_shortfall_95, r.var_95, "empty tail falls back to VaR");
    }

    #[test]
    fn all_samples_at_ceiling() {
        let p = MonteCarloConfig { n_simulations: 500, std_dev_pct: 0.0, max_mean_loss_pct: 100.0, ..Default::default() };
        let r = simulate_location(5.0, &p, &mut rng()).unwrap();
        assert_eq!(r.mean_loss, 100.0);
        assert_eq!(r.var_99, 100.0);
        assert_eq!(r.expected_shortfall_95, 100.0);
    }

    #[test]
    fn out_of_range_score_is_clamped() {
        let r = simulate_location(9.0, &params(10, 0.0), &mut rng()).unwrap();
        assert_eq!(r.aggregate_risk, 5.0);
        assert_eq!(r.target_mean_loss, 50.0);
    }

    #[test]
    fn invalid_parameters_fail_before_sampling() {
        assert!(matches!(
            simulate_location(3.0, &params(0, 15.0), &mut rng()),
            Err(RiskError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            simulate_location(3.0, &params(100, -1.0), &mut rng()),
            Err(RiskError::InvalidConfiguration(_))
        ));
        assert!(simulate_location(f64::NAN, &params(100, 15.0), &mut rng()).is_err());
    }

    #[test]
    fn exceedance_curve_is_monotone_and_ends_at_max() {
        let r = simulate_location(3.0, &params(1_000, 15.0), &mut rng()).unwrap();
        let curve = r.exceedance_curve(50);
        assert!(!curve.is_empty() && curve.len() <= 50);
        for w in curve.windows(2) {
            assert!(w[0].loss <= w[1].loss);
            assert!(w[0].probability >= w[1].probability);
        }
        let last = curve.last().unwrap();
        assert_eq!(last.loss, r.max_loss);
        assert_eq!(last.probability, 0.0);
        assert!(r.exceedance_curve(0).is_empty());
    }

    #[test]
    fn weighted_view_scales_by_impact() {
        let r = simulate_location(4.0, &params(1_000, 10.0), &mut rng()).unwrap();
        let w = r.weighted(BusinessImpact::new(12.0).unwrap());
        assert!((w.mean_loss - r.mean_loss * 0.12).abs() < 1e-12);
        assert!((w.var_99 - r.var_99 * 0.12).abs() < 1e-12);
    }

    #[test]
    fn stress_caps_impact_at_hundred() {
        let r = simulate_location(4.0, &params(1_000, 10.0), &mut rng()).unwrap();
        let s = stress_impact(&r, BusinessImpact::new(80.0).unwrap(), 1.5).unwrap();
        assert_eq!(s.stressed.impact_percent, 100.0);
        assert!(s.stressed.mean_loss > s.baseline.mean_loss);
        assert!(stress_impact(&r, BusinessImpact::new(10.0).unwrap(), -1.0).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn statistics_never_leave_unit_range(
            risk in 0.0..5.0f64,
            sd in 0.0..80.0f64,
            seed in any::<u64>(),
        ) {
            let r = simulate_location(risk, &params(400, sd), &mut ChaCha20Rng::seed_from_u64(seed)).unwrap();
            prop_assert!(r.samples().iter().all(|s| (LOSS_FLOOR..=LOSS_CEILING).contains(s)));
            for v in [r.mean_loss, r.median_loss, r.min_loss, r.max_loss, r.var_90, r.var_95, r.var_99, r.expected_shortfall_95] {
                prop_assert!((LOSS_FLOOR..=LOSS_CEILING).contains(&v), "statistic {} out of range", v);
            }
            prop_assert!(r.var_90 <= r.var_95 && r.var_95 <= r.var_99);
            prop_assert!(r.expected_shortfall_95 >= r.var_95);
        }

        #[test]
        fn expected_shortfall_equals_var_only_without_tail(
            samples in prop::collection::vec(0.0..100.0f64, 1..200),
        ) {
            let r = SimulationResult::from_samples(0.0, 0.0, samples, &[95.0]);
            let tail = r.samples().iter().filter(|&&s| s > r.var_95).count();
            if tail == 0 {
                prop_assert_eq!(r.expected_shortfall_95, r.var_95);
            } else {
                prop_assert!(r.expected_shortfall_95 > r.var_95);
            }
        }
    }
}
