//! Dynamic sampling-rate planner
//!
//! Decides whether facet queries run in reduced-cost sampled mode. Below
//! [`SAMPLE_START_COUNT`] no sampling happens and results are exact; above
//! it the planner computes a scan target with log-e growth from the
//! threshold, floored at the population itself, and derives the rate as
//! `clamp(target / population, 0, 1)`.

use crate::vocab::SAMPLE_START_COUNT;
use serde::Serialize;

/// Sampling decision for one request.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingPlan {
    pub enabled: bool,
    /// Fraction of rows to scan, in (0, 1]. `None` means full scan.
    pub sample_rate: Option<f64>,
    /// Divisor applied to sampled counts when estimating unsampled
    /// frequencies; 1 when not sampling.
    pub frequency_sample_rate: f64,
}

impl SamplingPlan {
    /// Plan sampling for a population of `count` rows.
    pub fn for_population(count: u64) -> Self {
        let enabled = count > SAMPLE_START_COUNT;
        let population = count as f64;

        let dynamic_rate = if count == 0 {
            0.0
        } else {
            Self::target_sample(count) / population
        };

        let sample_rate = enabled.then(|| dynamic_rate.clamp(0.0, 1.0));
        let frequency_sample_rate = sample_rate.filter(|rate| *rate > 0.0).unwrap_or(1.0);

        Self {
            enabled,
            sample_rate,
            frequency_sample_rate,
        }
    }

    /// Rows the sampled scan should cover in expectation.
    ///
    /// log-e growth starting at the threshold, never fewer than the
    /// population itself. Only meaningful for `count > 0`.
    fn target_sample(count: u64) -> f64 {
        let start = SAMPLE_START_COUNT as f64;
        let population = count as f64;
        (start * (population.ln() - (start.ln() - 1.0))).max(population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sampling_at_or_below_threshold() {
        for count in [0, 1, 100, SAMPLE_START_COUNT - 1, SAMPLE_START_COUNT] {
            let plan = SamplingPlan::for_population(count);
            assert!(!plan.enabled, "count={count}");
            assert_eq!(plan.sample_rate, None, "count={count}");
            assert_eq!(plan.frequency_sample_rate, 1.0, "count={count}");
        }
    }

    #[test]
    fn sampling_enabled_above_threshold_with_rate_in_unit_interval() {
        for count in [50_001u64, 100_000, 1_000_000, 100_000_000] {
            let plan = SamplingPlan::for_population(count);
            assert!(plan.enabled, "count={count}");
            let rate = plan.sample_rate.expect("rate must be set when enabled");
            assert!(rate > 0.0 && rate <= 1.0, "count={count} rate={rate}");
            assert_eq!(plan.frequency_sample_rate, rate);
        }
    }

    #[test]
    fn scan_target_is_non_decreasing_in_population() {
        let mut last_target = 0.0f64;
        for count in [50_001u64, 60_000, 100_000, 500_000, 5_000_000, 50_000_000] {
            let target = SamplingPlan::target_sample(count);
            assert!(
                target >= last_target,
                "target shrank at count={count}: {last_target} -> {target}"
            );
            last_target = target;
        }
    }

    #[test]
    fn target_is_floored_at_the_population() {
        for count in [60_000u64, 100_000, 10_000_000] {
            assert!(SamplingPlan::target_sample(count) >= count as f64);
        }
    }
}
