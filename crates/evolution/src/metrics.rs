//! Scoring of metrics against their targets.

use optiloop_core::{Direction, Metric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-metric scores and their unweighted mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Score of each metric in [0, 1]
    pub per_metric: BTreeMap<String, f64>,
    /// Mean of the per-metric scores
    pub composite: f64,
}

impl ScoreBreakdown {
    /// Score every metric in the map.
    pub fn of(metrics: &BTreeMap<String, Metric>) -> Self {
        let per_metric: BTreeMap<_, _> = metrics
            .iter()
            .map(|(name, m)| (name.clone(), metric_score(m)))
            .collect();
        let composite = if per_metric.is_empty() {
            0.0
        } else {
            per_metric.values().sum::<f64>() / per_metric.len() as f64
        };
        Self { per_metric, composite }
    }
}

/// How close a metric is to its target, in [0, 1].
///
/// A zero target counts as met. A zero current value scores 0 when
/// maximizing and 1 when minimizing instead of dividing by zero.
pub fn metric_score(metric: &Metric) -> f64 {
    let current = metric.current_value;
    let target = metric.target_value;
    if target == 0.0 {
        return 1.0;
    }
    let raw = match metric.constraint.direction {
        Direction::Maximize => {
            if current == 0.0 {
                return 0.0;
            }
            current / target
        }
        Direction::Minimize => {
            if current == 0.0 {
                return 1.0;
            }
            target / current
        }
    };
    raw.clamp(0.0, 1.0)
}

/// Unweighted mean score of all metrics, 0 for an empty set.
pub fn composite_score(metrics: &BTreeMap<String, Metric>) -> f64 {
    ScoreBreakdown::of(metrics).composite
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiloop_core::MetricSpec;

    fn metric(spec: MetricSpec, value: f64) -> Metric {
        Metric::new("m", &spec, value, 10).unwrap()
    }

    #[test]
    fn test_maximize_score() {
        let m = metric(MetricSpec::maximize(100.0, 0.0, 200.0), 50.0);
        assert!((metric_score(&m) - 0.5).abs() < 1e-12);

        let over = metric(MetricSpec::maximize(100.0, 0.0, 200.0), 150.0);
        assert_eq!(metric_score(&over), 1.0);
    }

    #[test]
    fn test_minimize_score() {
        let m = metric(MetricSpec::minimize(100.0, 0.0, 1000.0), 200.0);
        assert!((metric_score(&m) - 0.5).abs() < 1e-12);

        let under = metric(MetricSpec::minimize(100.0, 0.0, 1000.0), 80.0);
        assert_eq!(metric_score(&under), 1.0);
    }

    #[test]
    fn test_division_guards() {
        let zero_max = metric(MetricSpec::maximize(10.0, 0.0, 20.0), 0.0);
        assert_eq!(metric_score(&zero_max), 0.0);

        let zero_min = metric(MetricSpec::minimize(10.0, 0.0, 20.0), 0.0);
        assert_eq!(metric_score(&zero_min), 1.0);

        let zero_target = metric(MetricSpec::maximize(0.0, -5.0, 5.0), 3.0);
        assert_eq!(metric_score(&zero_target), 1.0);
    }

    #[test]
    fn test_composite_is_mean() {
        let mut metrics = BTreeMap::new();
        metrics.insert("a".to_string(), metric(MetricSpec::maximize(100.0, 0.0, 200.0), 50.0));
        metrics.insert("b".to_string(), metric(MetricSpec::maximize(100.0, 0.0, 200.0), 100.0));
        assert!((composite_score(&metrics) - 0.75).abs() < 1e-12);
        assert_eq!(composite_score(&BTreeMap::new()), 0.0);
    }
}
