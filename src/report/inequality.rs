use std::cmp::Ordering;

use serde::Serialize;
use serde_json::json;

use super::decile::weighted_rank_groups;
use super::figure::{CUSTOM_HOVER, Figure, hover_data, reduction_color};
use super::format::percent;
use super::frame::ImpactFrame;
use super::poverty::poverty_rates;

pub fn gini(values: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    let total_weight: f64 = weights.iter().sum();
    let total_income: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    if total_weight <= 0.0 || total_income == 0.0 {
        return 0.0;
    }

    let mut lorenz_before = 0.0;
    let mut area = 0.0;
    for idx in order {
        let lorenz_after = lorenz_before + values[idx] * weights[idx] / total_income;
        area += weights[idx] / total_weight * (lorenz_before + lorenz_after);
        lorenz_before = lorenz_after;
    }
    1.0 - area
}

pub fn top_share(values: &[f64], weights: &[f64], groups: u32) -> f64 {
    let total: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    if total == 0.0 {
        return 0.0;
    }
    let ranks = weighted_rank_groups(values, weights, groups);
    let top: f64 = values
        .iter()
        .zip(weights)
        .zip(&ranks)
        .filter(|(_, rank)| **rank == groups)
        .map(|((v, w), _)| v * w)
        .sum();
    top / total
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InequalityImpact {
    pub metric: &'static str,
    pub baseline: f64,
    pub reform: f64,
}

impl InequalityImpact {
    pub fn change(&self) -> f64 {
        if self.baseline != 0.0 {
            self.reform / self.baseline - 1.0
        } else {
            0.0
        }
    }
}

pub fn inequality_impacts(frame: &ImpactFrame) -> Vec<InequalityImpact> {
    let baseline = frame.equivalised_baseline();
    let reform = frame.equivalised_reform();
    let weights = &frame.weight;
    vec![
        InequalityImpact {
            metric: "Gini index",
            baseline: gini(&baseline, weights),
            reform: gini(&reform, weights),
        },
        InequalityImpact {
            metric: "Top 10% share",
            baseline: top_share(&baseline, weights, 10),
            reform: top_share(&reform, weights, 10),
        },
        InequalityImpact {
            metric: "Top 1% share",
            baseline: top_share(&baseline, weights, 100),
            reform: top_share(&reform, weights, 100),
        },
    ]
}

pub fn inequality_chart(frame: &ImpactFrame) -> Figure {
    let impacts = inequality_impacts(frame);
    let changes: Vec<f64> = impacts.iter().map(InequalityImpact::change).collect();
    let labels: Vec<String> = impacts
        .iter()
        .map(|impact| {
            let change = impact.change();
            let movement = if change > 0.0 {
                format!("rises by {}", percent(change, 1))
            } else if change < 0.0 {
                format!("falls by {}", percent(-change, 1))
            } else {
                "does not change".to_string()
            };
            format!(
                "<b>The {} {movement}</b><br>from {:.3} to {:.3}",
                impact.metric.to_lowercase(),
                impact.baseline,
                impact.reform
            )
        })
        .collect();

    Figure::new(
        vec![json!({
            "type": "bar",
            "x": impacts.iter().map(|impact| impact.metric).collect::<Vec<_>>(),
            "y": changes,
            "marker": {"color": changes.iter().map(|c| reduction_color(*c)).collect::<Vec<_>>()},
            "customdata": hover_data(&labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": "Inequality impact"},
            "xaxis": {"title": {"text": "Metric"}},
            "yaxis": {"title": {"text": "Relative change"}, "tickformat": ".1%"},
            "showlegend": false,
        }),
    )
    .with_zero_line()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineMetrics {
    pub poverty_rate_change: f64,
    pub gini_change: f64,
}

pub fn headline_metrics(frame: &ImpactFrame) -> HeadlineMetrics {
    let (baseline_poverty, reform_poverty) = poverty_rates(frame, |_| true);
    let poverty_rate_change = if baseline_poverty > 0.0 {
        reform_poverty / baseline_poverty - 1.0
    } else {
        0.0
    };
    let baseline_gini = gini(&frame.baseline_income, &frame.weight);
    let reform_gini = gini(&frame.reform_income, &frame.weight);
    let gini_change = if baseline_gini > 0.0 {
        reform_gini / baseline_gini - 1.0
    } else {
        0.0
    };
    HeadlineMetrics {
        poverty_rate_change,
        gini_change,
    }
}

#[cfg(test)]
mod tests {
    use super::super::frame::fixtures::{frame, person};
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "actual={actual} expected={expected} tol={tol}"
        );
    }

    #[test]
    fn gini_of_equal_incomes_is_zero() {
        assert_close(gini(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]), 0.0, 1e-12);
    }

    #[test]
    fn gini_matches_mean_absolute_difference() {
        assert_close(gini(&[0.0, 1.0], &[1.0, 1.0]), 0.5, 1e-12);
        // Pairwise |x_i - x_j| over 2 * n^2 * mean for 1, 2, 3: 8 / 36.
        assert_close(gini(&[3.0, 1.0, 2.0], &[1.0, 1.0, 1.0]), 8.0 / 36.0, 1e-12);
    }

    #[test]
    fn gini_treats_weights_as_replication() {
        let weighted = gini(&[1.0, 4.0], &[2.0, 1.0]);
        let replicated = gini(&[1.0, 1.0, 4.0], &[1.0, 1.0, 1.0]);
        assert_close(weighted, replicated, 1e-12);
    }

    #[test]
    fn top_share_picks_the_richest_group() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_close(top_share(&values, &[1.0; 10], 10), 10.0 / 55.0, 1e-12);
    }

    #[test]
    fn headline_metrics_compare_runs() {
        let mut first = person(30.0, 10_000.0, 20_000.0);
        first.baseline_poor = true;
        let frame = frame(&[first, person(30.0, 30_000.0, 20_000.0)]);
        let metrics = headline_metrics(&frame);
        assert_close(metrics.poverty_rate_change, -1.0, 1e-12);
        assert_close(metrics.gini_change, -1.0, 1e-12);
    }

    #[test]
    fn chart_lists_three_metrics() {
        let frame = frame(&[person(30.0, 10_000.0, 12_000.0), person(30.0, 50_000.0, 45_000.0)]);
        let figure = inequality_chart(&frame);
        assert_eq!(
            figure.data[0]["x"],
            json!(["Gini index", "Top 10% share", "Top 1% share"])
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_gini_is_a_fraction(incomes in proptest::collection::vec(0.0f64..1e6, 1..40)) {
            let weights = vec![1.0; incomes.len()];
            let g = gini(&incomes, &weights);
            prop_assert!((-1e-9..=1.0).contains(&g), "gini out of range: {g}");
        }
    }
}
