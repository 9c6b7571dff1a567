use serde_json::json;

use super::figure::{CUSTOM_HOVER, Figure, hover_data, reduction_color};
use super::format::percent;
use super::frame::ImpactFrame;

#[derive(Debug, Clone, PartialEq)]
pub struct PovertyImpact {
    pub group: &'static str,
    pub baseline_rate: f64,
    pub reform_rate: f64,
}

impl PovertyImpact {
    pub fn change(&self) -> f64 {
        if self.baseline_rate > 0.0 {
            self.reform_rate / self.baseline_rate - 1.0
        } else {
            0.0
        }
    }
}

pub fn poverty_rates<F>(frame: &ImpactFrame, member: F) -> (f64, f64)
where
    F: Fn(usize) -> bool,
{
    let mut people = 0.0;
    let mut baseline = 0.0;
    let mut reform = 0.0;
    for person in (0..frame.len()).filter(|&p| member(p)) {
        let weight = frame.weight[person];
        people += weight;
        if frame.baseline_poverty[person] {
            baseline += weight;
        }
        if frame.reform_poverty[person] {
            reform += weight;
        }
    }
    if people > 0.0 {
        (baseline / people, reform / people)
    } else {
        (0.0, 0.0)
    }
}

pub fn poverty_impacts(frame: &ImpactFrame) -> Vec<PovertyImpact> {
    let groups: [(&'static str, fn(f64) -> bool); 4] = [
        ("Child", |age| age < 18.0),
        ("Working-age", |age| (18.0..65.0).contains(&age)),
        ("Senior", |age| age >= 65.0),
        ("All", |_| true),
    ];
    groups
        .into_iter()
        .map(|(group, in_group)| {
            let (baseline_rate, reform_rate) = poverty_rates(frame, |p| in_group(frame.age[p]));
            PovertyImpact {
                group,
                baseline_rate,
                reform_rate,
            }
        })
        .collect()
}

fn poverty_label(impact: &PovertyImpact) -> String {
    let subject = match impact.group {
        "All" => "The poverty rate".to_string(),
        group => format!("The {} poverty rate", group.to_lowercase()),
    };
    let change = impact.change();
    let movement = if change > 0.0 {
        format!("rises by {}", percent(change, 1))
    } else if change < 0.0 {
        format!("falls by {}", percent(-change, 1))
    } else {
        "does not change".to_string()
    };
    format!(
        "<b>{subject} {movement}</b><br>from {} to {}",
        percent(impact.baseline_rate, 1),
        percent(impact.reform_rate, 1)
    )
}

pub fn poverty_chart(frame: &ImpactFrame) -> Figure {
    let impacts = poverty_impacts(frame);
    let changes: Vec<f64> = impacts.iter().map(PovertyImpact::change).collect();
    let labels: Vec<String> = impacts.iter().map(poverty_label).collect();

    Figure::new(
        vec![json!({
            "type": "bar",
            "x": impacts.iter().map(|impact| impact.group).collect::<Vec<_>>(),
            "y": changes,
            "marker": {"color": changes.iter().map(|c| reduction_color(*c)).collect::<Vec<_>>()},
            "customdata": hover_data(&labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": "Poverty impact by age group"},
            "xaxis": {"title": {"text": "Group"}},
            "yaxis": {"title": {"text": "Relative change in poverty rate"}, "tickformat": ".0%"},
            "showlegend": false,
        }),
    )
    .with_zero_line()
}
