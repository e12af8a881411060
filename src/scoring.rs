use std::time::Duration;

use indexmap::IndexMap;
use rand::Rng;

use crate::catalog::{self, CRITERIA, SPEED_CRITERION};

/// Jitter applied when the target has no live credential.
pub const DEMO_SPREAD: f64 = 5.0;
/// Jitter applied when a live credential is present.
pub const LIVE_SPREAD: f64 = 3.0;

/// Criterion id to score in 0..=100, in catalog order.
pub type CriterionScores = IndexMap<String, u32>;

/// `baseline` plus uniform noise in `[-spread, spread]`, rounded and clamped to 0..=100.
/// Non-finite spreads add no noise.
pub fn jittered_score<R: Rng + ?Sized>(rng: &mut R, baseline: f64, spread: f64) -> u32 {
    let spread = if spread.is_finite() { spread.abs() } else { 0.0 };
    // Scaling a unit sample keeps huge spreads from overflowing the range width.
    let noise = if spread > 0.0 {
        rng.gen_range(-1.0..=1.0) * spread
    } else {
        0.0
    };

    // f64::max/min discard NaN, so a NaN baseline lands on 0.
    (baseline + noise).round().max(0.0).min(100.0) as u32
}

/// Weighted average of `scores` over the criteria in `weights`, rounded to one decimal.
/// Missing scores count as 0; a zero weight sum divides by 1.
pub fn weighted_composite(scores: &CriterionScores, weights: &IndexMap<String, f64>) -> f64 {
    let total: f64 = weights.values().sum();
    let total = if total == 0.0 { 1.0 } else { total };

    let weighted: f64 = weights
        .iter()
        .map(|(criterion, weight)| f64::from(scores.get(criterion).copied().unwrap_or(0)) * weight)
        .sum();

    (weighted / total * 10.0).round() / 10.0
}

/// Speed score derived from measured live latency.
pub fn speed_score_from_latency<R: Rng + ?Sized>(rng: &mut R, latency: Duration) -> u32 {
    let millis = latency.as_millis();
    let (baseline, spread) = if millis < 1_000 {
        (95.0, 3.0)
    } else if millis < 3_000 {
        (85.0, 5.0)
    } else if millis < 8_000 {
        (70.0, 5.0)
    } else {
        (55.0, 5.0)
    };
    jittered_score(rng, baseline, spread)
}

/// Jittered copy of the agent's baseline row. Unknown agents use the flat default row.
pub fn simulate_scores<R: Rng + ?Sized>(rng: &mut R, agent_name: &str, demo: bool) -> CriterionScores {
    let spread = if demo { DEMO_SPREAD } else { LIVE_SPREAD };
    CRITERIA
        .iter()
        .zip(catalog::baseline(agent_name).iter())
        .map(|(criterion, baseline)| {
            (
                criterion.id.to_string(),
                jittered_score(rng, f64::from(*baseline), spread),
            )
        })
        .collect()
}

/// Replaces the speed entry with a latency-derived score.
pub fn apply_live_latency<R: Rng + ?Sized>(rng: &mut R, scores: &mut CriterionScores, latency: Duration) {
    scores.insert(SPEED_CRITERION.to_string(), speed_score_from_latency(rng, latency));
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn scores(pairs: &[(&str, u32)]) -> CriterionScores {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn weights(pairs: &[(&str, f64)]) -> IndexMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn composite_is_weighted_average() {
        let s = scores(&[("accuracy", 90), ("speed", 60)]);
        let w = weights(&[("accuracy", 3.0), ("speed", 1.0)]);
        assert_eq!(weighted_composite(&s, &w), 82.5);
    }

    #[test]
    fn composite_rounds_to_one_decimal_and_defaults_missing_scores() {
        let s = scores(&[("accuracy", 91)]);
        let w = weights(&[("accuracy", 1.0), ("safety", 2.0)]);
        // 91 / 3 = 30.333..
        assert_eq!(weighted_composite(&s, &w), 30.3);
    }

    #[test]
    fn zero_spread_is_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(jittered_score(&mut rng, 87.4, 0.0), 87);
        assert_eq!(jittered_score(&mut rng, 150.0, 0.0), 100);
        assert_eq!(jittered_score(&mut rng, -3.0, 0.0), 0);
        assert_eq!(jittered_score(&mut rng, f64::NAN, 2.0), 0);
    }

    #[test]
    fn latency_bands() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let fast = speed_score_from_latency(&mut rng, Duration::from_millis(500));
            assert!((92..=98).contains(&fast), "{fast}");
            let medium = speed_score_from_latency(&mut rng, Duration::from_millis(2_000));
            assert!((80..=90).contains(&medium), "{medium}");
            let slow = speed_score_from_latency(&mut rng, Duration::from_millis(5_000));
            assert!((65..=75).contains(&slow), "{slow}");
            let crawl = speed_score_from_latency(&mut rng, Duration::from_secs(20));
            assert!((50..=60).contains(&crawl), "{crawl}");
        }
    }

    #[test]
    fn simulated_scores_stay_near_baseline() {
        let mut rng = StdRng::seed_from_u64(99);
        let simulated = simulate_scores(&mut rng, "OpenAI – o1", true);
        let ids: Vec<_> = simulated.keys().map(String::as_str).collect();
        assert_eq!(ids, CRITERIA.iter().map(|c| c.id).collect::<Vec<_>>());
        let speed = simulated["speed"];
        assert!((55..=65).contains(&speed), "{speed}");

        let live = simulate_scores(&mut rng, "Custom Agent", false);
        assert!(live.values().all(|score| (72..=78).contains(score)));
    }

    #[test]
    fn live_latency_overrides_speed_only() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut simulated = simulate_scores(&mut rng, "Microsoft – Copilot", false);
        let accuracy = simulated["accuracy"];
        apply_live_latency(&mut rng, &mut simulated, Duration::from_millis(12_000));
        assert!(simulated["speed"] <= 60);
        assert_eq!(simulated["accuracy"], accuracy);
        assert_eq!(simulated.len(), CRITERIA.len());
    }

    proptest! {
        #[test]
        fn jitter_always_within_bounds(
            baseline in prop::num::f64::ANY,
            spread in prop::num::f64::ANY,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let score = jittered_score(&mut rng, baseline, spread);
            prop_assert!(score <= 100);
        }

        #[test]
        fn zero_weight_sum_yields_zero(
            values in prop::collection::vec(0u32..=100, 8),
        ) {
            let s: CriterionScores = CRITERIA.iter().zip(values).map(|(c, v)| (c.id.to_string(), v)).collect();
            let w: IndexMap<String, f64> = CRITERIA.iter().map(|c| (c.id.to_string(), 0.0)).collect();
            prop_assert_eq!(weighted_composite(&s, &w), 0.0);
        }

        #[test]
        fn composite_invariant_under_uniform_scaling(
            values in prop::collection::vec(0u32..=100, 8),
            raw_weights in prop::collection::vec(0u32..=100, 8),
            exponent in 1i32..=6,
        ) {
            let s: CriterionScores = CRITERIA.iter().zip(values).map(|(c, v)| (c.id.to_string(), v)).collect();
            let w: IndexMap<String, f64> = CRITERIA
                .iter()
                .zip(raw_weights.iter())
                .map(|(c, v)| (c.id.to_string(), f64::from(*v)))
                .collect();
            let factor = 2f64.powi(exponent);
            let scaled: IndexMap<String, f64> = w.iter().map(|(k, v)| (k.clone(), v * factor)).collect();
            prop_assert_eq!(weighted_composite(&s, &w), weighted_composite(&s, &scaled));
        }

        #[test]
        fn composite_within_score_range(
            values in prop::collection::vec(0u32..=100, 8),
            raw_weights in prop::collection::vec(1u32..=100, 8),
        ) {
            let s: CriterionScores = CRITERIA.iter().zip(values).map(|(c, v)| (c.id.to_string(), v)).collect();
            let w: IndexMap<String, f64> = CRITERIA
                .iter()
                .zip(raw_weights)
                .map(|(c, v)| (c.id.to_string(), f64::from(v)))
                .collect();
            let composite = weighted_composite(&s, &w);
            prop_assert!((0.0..=100.0).contains(&composite));
        }
    }
}
