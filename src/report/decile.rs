use std::cmp::Ordering;

use serde_json::json;

use super::figure::{BLUE, CUSTOM_HOVER, Figure, gain_color, hover_data};
use super::format::{currency, ordinal, percent};
use super::frame::ImpactFrame;

pub fn weighted_rank_groups(values: &[f64], weights: &[f64], groups: u32) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    let total: f64 = weights.iter().sum();
    let mut ranks = vec![1; values.len()];
    if total <= 0.0 {
        return ranks;
    }
    let mut cumulative = 0.0;
    for idx in order {
        // Midpoint of the person's weight slice keeps boundaries stable.
        let midpoint = (cumulative + weights[idx] / 2.0) / total;
        cumulative += weights[idx];
        ranks[idx] = ((midpoint * f64::from(groups)).floor() as u32 + 1).min(groups);
    }
    ranks
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecileImpact {
    pub decile: u32,
    pub baseline_mean: f64,
    pub reform_mean: f64,
    pub average_gain: f64,
    pub relative_gain: f64,
}

pub fn decile_impacts(frame: &ImpactFrame) -> Vec<DecileImpact> {
    let ranks = weighted_rank_groups(&frame.equivalised_baseline(), &frame.weight, 10);
    (1..=10)
        .map(|decile| {
            let mut people = 0.0;
            let mut baseline = 0.0;
            let mut reform = 0.0;
            for person in (0..frame.len()).filter(|&p| ranks[p] == decile) {
                let weight = frame.weight[person];
                people += weight;
                baseline += weight * frame.baseline_income[person];
                reform += weight * frame.reform_income[person];
            }
            let mean = |total: f64| if people > 0.0 { total / people } else { 0.0 };
            let relative_gain = if baseline != 0.0 {
                (reform - baseline) / baseline
            } else {
                0.0
            };
            DecileImpact {
                decile,
                baseline_mean: mean(baseline),
                reform_mean: mean(reform),
                average_gain: mean(reform - baseline),
                relative_gain,
            }
        })
        .collect()
}

fn direction(change: f64) -> &'static str {
    if change > 0.0 {
        "rise"
    } else if change < 0.0 {
        "fall"
    } else {
        "remain"
    }
}

fn decile_label(impact: &DecileImpact, relative: bool) -> String {
    let change = if relative {
        percent(impact.relative_gain.abs(), 1)
    } else {
        currency(impact.average_gain.abs())
    };
    let verb = direction(impact.average_gain);
    let headline = if verb == "remain" {
        format!(
            "Household incomes in the {} decile <br>remain unchanged",
            ordinal(impact.decile)
        )
    } else {
        format!(
            "Household incomes in the {} decile <br>{verb} by an average of {change}",
            ordinal(impact.decile)
        )
    };
    format!(
        "<b>{headline}</b><br>from {} to {} per year",
        currency(impact.baseline_mean),
        currency(impact.reform_mean)
    )
}

pub fn decile_chart(frame: &ImpactFrame, relative: bool) -> Figure {
    let impacts = decile_impacts(frame);
    let values: Vec<f64> = impacts
        .iter()
        .map(|impact| {
            if relative {
                impact.relative_gain
            } else {
                impact.average_gain
            }
        })
        .collect();
    let labels: Vec<String> = impacts
        .iter()
        .map(|impact| decile_label(impact, relative))
        .collect();
    let (title, axis_title, tickformat) = if relative {
        ("Relative change to household income by decile", "Relative change", ".0%")
    } else {
        ("Average change to household income by decile", "Average change", "$,.0f")
    };

    Figure::new(
        vec![json!({
            "type": "bar",
            "x": impacts.iter().map(|impact| impact.decile).collect::<Vec<_>>(),
            "y": values,
            "marker": {"color": values.iter().map(|v| gain_color(*v)).collect::<Vec<_>>()},
            "customdata": hover_data(&labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": title},
            "xaxis": {"title": {"text": "Equivalised disposable income decile"}, "tickvals": (1..=10).collect::<Vec<u32>>()},
            "yaxis": {"title": {"text": axis_title}, "tickformat": tickformat},
            "showlegend": false,
        }),
    )
    .with_zero_line()
}

pub fn gain_by_age(frame: &ImpactFrame) -> Vec<(u32, f64)> {
    let mut totals: Vec<(f64, f64)> = Vec::new();
    for person in 0..frame.len() {
        let age = frame.age[person].max(0.0).floor() as usize;
        if totals.len() <= age {
            totals.resize(age + 1, (0.0, 0.0));
        }
        totals[age].0 += frame.weight[person] * frame.gain(person);
        totals[age].1 += frame.weight[person];
    }
    totals
        .into_iter()
        .enumerate()
        .filter(|(_, (_, weight))| *weight > 0.0)
        .map(|(age, (gain, weight))| (age as u32, gain / weight))
        .collect()
}

pub fn age_chart(frame: &ImpactFrame) -> Figure {
    let points = gain_by_age(frame);
    let labels: Vec<String> = points
        .iter()
        .map(|&(age, gain)| {
            let verb = direction(gain);
            if verb == "remain" {
                format!("<b>{age}-year olds</b> see no change in their household's net income on average.")
            } else {
                format!(
                    "<b>{age}-year olds</b> see their household's net income <br>{verb} by <b>{}</b> on average.",
                    currency(gain.abs())
                )
            }
        })
        .collect();

    Figure::new(
        vec![json!({
            "type": "scatter",
            "mode": "lines",
            "x": points.iter().map(|(age, _)| *age).collect::<Vec<_>>(),
            "y": points.iter().map(|(_, gain)| *gain).collect::<Vec<_>>(),
            "line": {"color": BLUE},
            "customdata": hover_data(&labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": "Average change to household net income by age"},
            "xaxis": {"title": {"text": "Age"}},
            "yaxis": {"title": {"text": "Average change"}, "tickformat": "$,.0f"},
            "showlegend": false,
        }),
    )
    .with_zero_line()
}

#[cfg(test)]
mod tests {
    use super::super::frame::fixtures::{frame, person};
    use super::*;

    #[test]
    fn rank_groups_split_equal_weights_evenly() {
        let values: Vec<f64> = (0..20).rev().map(f64::from).collect();
        let ranks = weighted_rank_groups(&values, &[1.0; 20], 10);
        assert_eq!(ranks[19], 1);
        assert_eq!(ranks[18], 1);
        assert_eq!(ranks[17], 2);
        assert_eq!(ranks[0], 10);
        for decile in 1..=10 {
            assert_eq!(ranks.iter().filter(|&&r| r == decile).count(), 2);
        }
    }

    #[test]
    fn rank_groups_respect_weights() {
        // The poorer person carries 90% of the weight.
        let ranks = weighted_rank_groups(&[1.0, 2.0], &[9.0, 1.0], 10);
        assert_eq!(ranks, vec![5, 10]);
    }

    #[test]
    fn decile_impacts_average_within_groups() {
        let people: Vec<_> = (0..10)
            .map(|i| {
                let income = 10_000.0 * f64::from(i + 1);
                person(40.0, income, income + 1_000.0)
            })
            .collect();
        let impacts = decile_impacts(&frame(&people));
        assert_eq!(impacts.len(), 10);
        assert_eq!(impacts[0].decile, 1);
        assert_eq!(impacts[0].baseline_mean, 10_000.0);
        assert_eq!(impacts[0].average_gain, 1_000.0);
        assert!((impacts[0].relative_gain - 0.1).abs() < 1e-12);
        assert!((impacts[9].relative_gain - 0.01).abs() < 1e-12);
    }

    #[test]
    fn decile_hover_text_names_direction_and_amounts() {
        let impact = DecileImpact {
            decile: 2,
            baseline_mean: 20_000.0,
            reform_mean: 19_000.0,
            average_gain: -1_000.0,
            relative_gain: -0.05,
        };
        assert_eq!(
            decile_label(&impact, true),
            "<b>Household incomes in the 2nd decile <br>fall by an average of 5.0%</b><br>from $20,000 to $19,000 per year"
        );
        assert_eq!(
            decile_label(&impact, false),
            "<b>Household incomes in the 2nd decile <br>fall by an average of $1,000</b><br>from $20,000 to $19,000 per year"
        );
    }

    #[test]
    fn gains_by_age_skip_empty_ages() {
        let frame = frame(&[
            person(3.0, 1_000.0, 1_500.0),
            person(3.9, 1_000.0, 2_500.0),
            person(40.0, 5_000.0, 4_000.0),
        ]);
        assert_eq!(gain_by_age(&frame), vec![(3, 1_000.0), (40, -1_000.0)]);
        let figure = age_chart(&frame);
        assert_eq!(figure.data[0]["x"], json!([3, 40]));
    }
}
