//! Analyzes predictions and generates insights.

use optiloop_core::Metric;
use optiloop_progress::Prediction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What an insight is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsightKind {
    /// A metric is still short of its target
    LaggingMetric {
        /// Metric name
        metric: String,
        /// Relative distance to target in [0, 1]
        gap: f64,
        /// Whether the metric has stopped moving
        settled: bool,
    },
    /// The composite score has plateaued
    Plateau,
}

/// An insight from analyzing the loop's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// What the insight is about
    pub kind: InsightKind,
    /// Summary of what was observed
    pub summary: String,
}

/// Analyzes the optimizer's progress.
pub struct Analyzer {
    min_gap: f64,
}

impl Analyzer {
    /// Create a new analyzer that ignores gaps at or below `min_gap`.
    pub fn new(min_gap: f64) -> Self {
        Self { min_gap }
    }

    /// Analyze a prediction against the current metrics.
    pub fn analyze(&self, prediction: &Prediction, metrics: &BTreeMap<String, Metric>) -> Vec<Insight> {
        let mut insights = Vec::new();

        for (name, metric) in metrics {
            let gap = metric.gap_ratio();
            if gap <= self.min_gap {
                continue;
            }
            let settled = prediction.per_metric_converging.get(name).copied().unwrap_or(false);
            let summary = if settled {
                format!("'{}' has settled {:.0}% short of target", name, gap * 100.0)
            } else {
                format!("'{}' is {:.0}% short of target", name, gap * 100.0)
            };
            insights.push(Insight {
                kind: InsightKind::LaggingMetric {
                    metric: name.clone(),
                    gap,
                    settled,
                },
                summary,
            });
        }

        if prediction.stagnating {
            insights.push(Insight {
                kind: InsightKind::Plateau,
                summary: format!(
                    "score has plateaued, {} ticks estimated to target",
                    prediction.iterations_remaining
                ),
            });
        }

        insights
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiloop_core::MetricSpec;

    fn prediction(stagnating: bool, converging: &[(&str, bool)]) -> Prediction {
        Prediction {
            iterations_remaining: 12,
            confidence: 0.3,
            velocity: 0.01,
            stagnating,
            early_stop_recommended: stagnating,
            per_metric_converging: converging.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
        }
    }

    fn metrics() -> BTreeMap<String, Metric> {
        let mut metrics = BTreeMap::new();
        let eff = MetricSpec::maximize(1.0, 0.0, 1.0);
        metrics.insert("eff".to_string(), Metric::new("eff", &eff, 0.5, 10).unwrap());
        let cost = MetricSpec::minimize(100.0, 0.0, 500.0);
        metrics.insert("cost".to_string(), Metric::new("cost", &cost, 100.0, 10).unwrap());
        metrics
    }

    #[test]
    fn test_lagging_metrics_only() {
        let insights = Analyzer::default().analyze(&prediction(false, &[("eff", true)]), &metrics());
        assert_eq!(insights.len(), 1);
        match &insights[0].kind {
            InsightKind::LaggingMetric { metric, gap, settled } => {
                assert_eq!(metric, "eff");
                assert!((gap - 0.5).abs() < 1e-12);
                assert!(*settled);
            }
            other => panic!("unexpected insight {:?}", other),
        }
        assert!(insights[0].summary.contains("settled"));
    }

    #[test]
    fn test_plateau_insight() {
        let insights = Analyzer::default().analyze(&prediction(true, &[]), &metrics());
        assert!(insights.iter().any(|i| i.kind == InsightKind::Plateau));
    }
}
