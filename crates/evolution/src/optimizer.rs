//! Metric optimizer - moves metrics toward their targets.

use crate::ScoreBreakdown;
use optiloop_core::{
    Component, CycleError, Direction, Metric, MetricSpec, OptimizationAction, Result,
    MAX_LEARNING_RATE, MIN_LEARNING_RATE,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Iterations after which the diminishing-returns factor reaches zero.
const DIMINISHING_HORIZON: f64 = 100.0;

/// Changes smaller than this between the last two values count as slow progress.
const SLOW_PROGRESS_DELTA: f64 = 0.01;

/// Learning-rate growth on slow progress.
const RATE_GROWTH: f64 = 1.1;

/// Learning-rate decay on good progress.
const RATE_DECAY: f64 = 0.95;

/// Result of one optimizer pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    /// One action per metric, in name order
    pub actions: Vec<OptimizationAction>,
    /// Scores after the update
    pub scores: ScoreBreakdown,
}

impl Optimization {
    /// Composite score after the update.
    pub fn score(&self) -> f64 {
        self.scores.composite
    }
}

/// Applies corrective adjustments to a set of metrics.
pub struct MetricOptimizer;

impl MetricOptimizer {
    /// Create a new optimizer.
    pub fn new() -> Self {
        Self
    }

    /// Update every metric once and score the result.
    ///
    /// `iteration` is the zero-based tick index; later ticks move less.
    pub fn optimize(&self, metrics: &mut BTreeMap<String, Metric>, iteration: u64) -> Result<Optimization> {
        let mut actions = Vec::with_capacity(metrics.len());
        for metric in metrics.values_mut() {
            actions.push(self.step(metric, iteration)?);
        }

        let scores = ScoreBreakdown::of(metrics);
        if !scores.composite.is_finite() {
            return Err(CycleError::component(Component::Optimizer, "composite score is not finite"));
        }

        Ok(Optimization { actions, scores })
    }

    /// Move one metric and adapt its learning rate.
    fn step(&self, metric: &mut Metric, iteration: u64) -> Result<OptimizationAction> {
        let previous = metric.current_value;
        let target = metric.target_value;

        let naive = match metric.constraint.direction {
            Direction::Maximize => previous + metric.learning_rate * (target - previous),
            Direction::Minimize => previous - metric.learning_rate * (previous - target),
        };
        if !naive.is_finite() {
            return Err(CycleError::component(
                Component::Optimizer,
                format!("metric '{}' produced a non-finite step", metric.name),
            ));
        }

        let clamped = metric.constraint.clamp(naive);
        let progress = diminishing_factor(iteration);
        let new = metric.constraint.clamp(previous + (clamped - previous) * progress);

        metric.current_value = new;
        metric.history.push(new);
        adapt_learning_rate(metric);

        debug!(
            metric = %metric.name,
            previous,
            new,
            learning_rate = metric.learning_rate,
            "metric updated"
        );

        Ok(OptimizationAction {
            metric_name: metric.name.clone(),
            previous,
            new,
            target,
            improvement_ratio: improvement_ratio(previous, new, metric.constraint.direction),
            direction: metric.constraint.direction,
        })
    }
}

impl Default for MetricOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// `max(0, 1 - iteration/100)`.
fn diminishing_factor(iteration: u64) -> f64 {
    (1.0 - iteration as f64 / DIMINISHING_HORIZON).max(0.0)
}

/// Slow progress takes bigger steps, good progress fine-tunes.
fn adapt_learning_rate(metric: &mut Metric) {
    let tail = metric.history.tail(2);
    let slow = metric.history.len() >= 3
        && matches!(tail.as_slice(), [a, b] if (b - a).abs() < SLOW_PROGRESS_DELTA);

    metric.learning_rate = if slow {
        (metric.learning_rate * RATE_GROWTH).min(MAX_LEARNING_RATE)
    } else {
        (metric.learning_rate * RATE_DECAY).max(MIN_LEARNING_RATE)
    };
}

fn improvement_ratio(previous: f64, new: f64, direction: Direction) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    let toward = match direction {
        Direction::Maximize => new - previous,
        Direction::Minimize => previous - new,
    };
    toward / previous.abs()
}

/// Starting value for a metric spec.
///
/// Uses the given initial value when present. Otherwise maximize metrics start
/// at 40–60% of target and minimize metrics at 150–250% of target.
pub fn seed_initial_value<R: Rng + ?Sized>(spec: &MetricSpec, rng: &mut R) -> f64 {
    if let Some(initial) = spec.initial {
        return initial;
    }
    let factor = match spec.direction {
        Direction::Maximize => rng.gen_range(0.4..=0.6),
        Direction::Minimize => rng.gen_range(1.5..=2.5),
    };
    spec.target * factor
}

/// Create the metric set for a new cycle.
pub fn build_metrics<R: Rng + ?Sized>(
    specs: &BTreeMap<String, MetricSpec>,
    rng: &mut R,
    history_capacity: usize,
) -> Result<BTreeMap<String, Metric>> {
    if specs.is_empty() {
        return Err(CycleError::InvalidConfig("at least one metric is required".into()));
    }

    let mut metrics = BTreeMap::new();
    for (name, spec) in specs {
        spec.validate(name)?;
        if !(MIN_LEARNING_RATE..=MAX_LEARNING_RATE).contains(&spec.learning_rate) {
            warn!(
                metric = %name,
                learning_rate = spec.learning_rate,
                "learning rate outside admissible range, clamping"
            );
        }
        let initial = seed_initial_value(spec, rng);
        metrics.insert(name.clone(), Metric::new(name.clone(), spec, initial, history_capacity)?);
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn single(name: &str, spec: MetricSpec) -> BTreeMap<String, Metric> {
        let mut rng = StdRng::seed_from_u64(1);
        let mut specs = BTreeMap::new();
        specs.insert(name.to_string(), spec);
        build_metrics(&specs, &mut rng, 100).unwrap()
    }

    #[test]
    fn test_first_step_moves_toward_target() {
        let spec = MetricSpec::maximize(0.95, 0.5, 1.0)
            .with_initial(0.5)
            .with_learning_rate(0.1);
        let mut metrics = single("eff", spec);

        let result = MetricOptimizer::new().optimize(&mut metrics, 0).unwrap();
        let action = &result.actions[0];
        assert!(action.new > 0.5);
        assert!(action.new < 0.95);
        assert!((action.new - 0.545).abs() < 1e-12);
        assert!(action.improvement_ratio > 0.0);
    }

    #[test]
    fn test_minimize_moves_down() {
        let spec = MetricSpec::minimize(100.0, 0.0, 1000.0).with_initial(200.0);
        let mut metrics = single("cost", spec);

        let result = MetricOptimizer::new().optimize(&mut metrics, 0).unwrap();
        let action = &result.actions[0];
        assert!((action.new - 190.0).abs() < 1e-9);
        assert!(action.improvement_ratio > 0.0);
        assert!(result.score() > 0.5);
    }

    #[test]
    fn test_diminishing_returns() {
        let spec = MetricSpec::maximize(100.0, 0.0, 200.0).with_initial(50.0);

        let mut early = single("rev", spec.clone());
        let early_step = MetricOptimizer::new().optimize(&mut early, 0).unwrap().actions[0].new - 50.0;

        let mut late = single("rev", spec.clone());
        let late_step = MetricOptimizer::new().optimize(&mut late, 80).unwrap().actions[0].new - 50.0;
        assert!(late_step < early_step);
        assert!((late_step - early_step * 0.2).abs() < 1e-9);

        let mut frozen = single("rev", spec);
        let frozen_step = MetricOptimizer::new().optimize(&mut frozen, 150).unwrap().actions[0].new;
        assert_eq!(frozen_step, 50.0);
    }

    #[test]
    fn test_learning_rate_grows_on_slow_progress() {
        let spec = MetricSpec::maximize(100.0, 0.0, 200.0)
            .with_initial(100.0)
            .with_learning_rate(0.2);
        let mut metrics = single("rev", spec);
        let optimizer = MetricOptimizer::new();

        // At target: first step has only two history points, so it decays.
        optimizer.optimize(&mut metrics, 0).unwrap();
        assert!((metrics["rev"].learning_rate - 0.19).abs() < 1e-12);

        // Now three points with no movement: slow progress, rate grows.
        optimizer.optimize(&mut metrics, 1).unwrap();
        assert!((metrics["rev"].learning_rate - 0.209).abs() < 1e-12);
    }

    #[test]
    fn test_learning_rate_decays_on_good_progress() {
        let spec = MetricSpec::maximize(100.0, 0.0, 200.0)
            .with_initial(10.0)
            .with_learning_rate(0.05);
        let mut metrics = single("rev", spec);
        let optimizer = MetricOptimizer::new();
        for i in 0..5 {
            optimizer.optimize(&mut metrics, i).unwrap();
        }
        assert_eq!(metrics["rev"].learning_rate, MIN_LEARNING_RATE);
    }

    #[test]
    fn test_seed_initial_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let up = seed_initial_value(&MetricSpec::maximize(100.0, 0.0, 200.0), &mut rng);
            assert!((40.0..=60.0).contains(&up));
            let down = seed_initial_value(&MetricSpec::minimize(100.0, 0.0, 1000.0), &mut rng);
            assert!((150.0..=250.0).contains(&down));
        }
        let given = seed_initial_value(&MetricSpec::maximize(100.0, 0.0, 200.0).with_initial(7.0), &mut rng);
        assert_eq!(given, 7.0);
    }

    #[test]
    fn test_build_metrics_rejects_empty_and_invalid() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            build_metrics(&BTreeMap::new(), &mut rng, 10),
            Err(CycleError::InvalidConfig(_))
        ));

        let mut specs = BTreeMap::new();
        specs.insert("bad".to_string(), MetricSpec::maximize(1.0, 2.0, 1.0));
        assert!(matches!(
            build_metrics(&specs, &mut rng, 10),
            Err(CycleError::InvalidConstraint { .. })
        ));
    }

    fn spec_strategy() -> impl Strategy<Value = MetricSpec> {
        (-100.0f64..100.0, 0.1f64..100.0, 0.0f64..1.0, 0.0f64..1.0, 0.05f64..0.5, any::<bool>()).prop_map(
            |(min, width, t, i, lr, minimize)| {
                let max = min + width;
                let spec = if minimize {
                    MetricSpec::minimize(min + width * t, min, max)
                } else {
                    MetricSpec::maximize(min + width * t, min, max)
                };
                spec.with_initial(min + width * i).with_learning_rate(lr)
            },
        )
    }

    proptest! {
        #[test]
        fn prop_bounds_and_learning_rate_hold(spec in spec_strategy(), ticks in 1u64..120) {
            let mut metrics = single("m", spec);
            let optimizer = MetricOptimizer::new();
            for i in 0..ticks {
                let result = optimizer.optimize(&mut metrics, i).unwrap();
                let m = &metrics["m"];
                prop_assert!(m.constraint.contains(m.current_value));
                prop_assert!(m.learning_rate >= MIN_LEARNING_RATE && m.learning_rate <= MAX_LEARNING_RATE);
                prop_assert!(result.score() >= 0.0 && result.score() <= 1.0);
            }
        }

        #[test]
        fn prop_composite_score_never_drops(
            specs in prop::collection::vec(spec_strategy(), 1..4),
            ticks in 1u64..120,
        ) {
            let specs: BTreeMap<String, MetricSpec> = specs
                .into_iter()
                .enumerate()
                .map(|(i, spec)| (format!("m{}", i), spec))
                .collect();
            let mut rng = StdRng::seed_from_u64(1);
            let mut metrics = build_metrics(&specs, &mut rng, 100).unwrap();
            let optimizer = MetricOptimizer::new();

            let mut previous = crate::composite_score(&metrics);
            for i in 0..ticks {
                let score = optimizer.optimize(&mut metrics, i).unwrap().score();
                prop_assert!(score >= previous - 1e-12, "tick {}: {} after {}", i, score, previous);
                previous = score;
            }
        }
    }
}
