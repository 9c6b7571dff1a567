use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::json;

use super::figure::{CUSTOM_HOVER, DARK_GREEN, Figure, GRAY, gain_color, hover_data};
use super::format::percent;
use super::frame::ImpactFrame;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateImpact {
    pub state: String,
    pub people: f64,
    pub baseline_income: f64,
    pub total_gain: f64,
    pub baseline_poor: f64,
    pub reform_poor: f64,
}

impl StateImpact {
    pub fn relative_gain(&self) -> f64 {
        if self.baseline_income != 0.0 {
            self.total_gain / self.baseline_income
        } else {
            0.0
        }
    }

    pub fn poverty_change(&self) -> f64 {
        if self.baseline_poor > 0.0 {
            self.reform_poor / self.baseline_poor - 1.0
        } else {
            0.0
        }
    }
}

pub fn state_impacts(frame: &ImpactFrame) -> Vec<StateImpact> {
    let mut states: BTreeMap<&str, StateImpact> = BTreeMap::new();
    for person in 0..frame.len() {
        let weight = frame.weight[person];
        let share = 1.0 / frame.unit_size[person].max(1.0);
        let entry = states
            .entry(frame.state[person].as_str())
            .or_insert_with(|| StateImpact {
                state: frame.state[person].clone(),
                ..StateImpact::default()
            });
        entry.people += weight;
        entry.baseline_income += weight * frame.baseline_income[person] * share;
        entry.total_gain += weight * frame.gain_share(person);
        if frame.baseline_poverty[person] {
            entry.baseline_poor += weight;
        }
        if frame.reform_poverty[person] {
            entry.reform_poor += weight;
        }
    }
    states.into_values().collect()
}

pub fn ranked_states(frame: &ImpactFrame, count: usize) -> Vec<StateImpact> {
    let mut states = state_impacts(frame);
    states.sort_by(|a, b| {
        a.total_gain
            .partial_cmp(&b.total_gain)
            .unwrap_or(Ordering::Equal)
    });
    if states.len() <= count * 2 {
        return states;
    }
    let winners = states.split_off(states.len() - count);
    states.truncate(count);
    states.extend(winners);
    states
}

pub fn state_ranking_chart(frame: &ImpactFrame) -> Figure {
    let states = ranked_states(frame, 5);
    let billions: Vec<f64> = states
        .iter()
        .map(|state| state.total_gain / 1e9)
        .collect();
    let labels: Vec<String> = states
        .iter()
        .zip(&billions)
        .map(|(state, bn)| {
            let verb = if *bn >= 0.0 { "gain" } else { "lose" };
            format!(
                "<b>People in {} {verb} ${:.1}bn</b> in total",
                state.state,
                bn.abs()
            )
        })
        .collect();

    Figure::new(
        vec![json!({
            "type": "bar",
            "orientation": "h",
            "x": billions,
            "y": states.iter().map(|state| state.state.as_str()).collect::<Vec<_>>(),
            "marker": {"color": billions.iter().map(|v| gain_color(*v)).collect::<Vec<_>>()},
            "customdata": hover_data(&labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": "States with the largest total gains and losses"},
            "xaxis": {"title": {"text": "Total change in net income ($bn)"}},
            "yaxis": {"title": {"text": "State"}, "type": "category"},
            "showlegend": false,
        }),
    )
}

fn choropleth(title: &str, states: &[StateImpact], values: Vec<f64>, labels: &[String]) -> Figure {
    Figure::new(
        vec![json!({
            "type": "choropleth",
            "locationmode": "USA-states",
            "locations": states.iter().map(|state| state.state.as_str()).collect::<Vec<_>>(),
            "z": values,
            "colorscale": [[0.0, GRAY], [1.0, DARK_GREEN]],
            "colorbar": {"tickformat": ".0%", "title": {"text": ""}},
            "customdata": hover_data(labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": title},
            "geo": {"scope": "usa"},
        }),
    )
}

pub fn state_gain_map(frame: &ImpactFrame) -> Figure {
    let states = state_impacts(frame);
    let values: Vec<f64> = states.iter().map(StateImpact::relative_gain).collect();
    let labels: Vec<String> = states
        .iter()
        .zip(&values)
        .map(|(state, change)| {
            let verb = if *change >= 0.0 { "gain" } else { "lose" };
            format!(
                "On average, people in {} {verb} {}",
                state.state,
                percent(change.abs(), 1)
            )
        })
        .collect();
    choropleth("Average change to net income by state", &states, values, &labels)
}

pub fn state_poverty_map(frame: &ImpactFrame) -> Figure {
    let states = state_impacts(frame);
    let changes: Vec<f64> = states.iter().map(StateImpact::poverty_change).collect();
    let labels: Vec<String> = states
        .iter()
        .zip(&changes)
        .map(|(state, change)| {
            if *change > 0.0 {
                format!("The poverty rate in {} rises by {}", state.state, percent(*change, 1))
            } else if *change < 0.0 {
                format!("The poverty rate in {} falls by {}", state.state, percent(-change, 1))
            } else {
                format!("The poverty rate in {} does not change", state.state)
            }
        })
        .collect();
    // Reductions are shaded as improvements.
    let values = changes.iter().map(|c| -c).collect();
    choropleth("Change to poverty rate by state", &states, values, &labels)
}

#[cfg(test)]
mod tests {
    use super::super::frame::fixtures::{Person, frame, person};
    use super::*;

    fn resident(state: &'static str, baseline: f64, reform: f64) -> Person {
        let mut p = person(40.0, baseline, reform);
        p.state = state;
        p
    }

    #[test]
    fn totals_count_each_unit_once() {
        let mut a = resident("CA", 20_000.0, 24_000.0);
        let mut b = resident("CA", 20_000.0, 24_000.0);
        a.unit_size = 2.0;
        b.unit_size = 2.0;
        let frame = frame(&[a, b, resident("TX", 10_000.0, 9_000.0)]);

        let states = state_impacts(&frame);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].state, "CA");
        assert_eq!(states[0].people, 2.0);
        assert_eq!(states[0].total_gain, 4_000.0);
        assert!((states[0].relative_gain() - 0.2).abs() < 1e-12);
        assert!((states[1].relative_gain() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn ranking_keeps_extremes_in_ascending_order() {
        let codes = ["AA", "BB", "CC", "DD", "EE", "FF", "GG", "HH", "II", "JJ", "KK", "LL"];
        let people: Vec<Person> = codes
            .iter()
            .enumerate()
            .map(|(i, &code)| resident(code, 10_000.0, 10_000.0 + 100.0 * (i as f64 - 6.0)))
            .collect();
        let ranked = ranked_states(&frame(&people), 5);
        let names: Vec<&str> = ranked.iter().map(|s| s.state.as_str()).collect();
        assert_eq!(
            names,
            vec!["AA", "BB", "CC", "DD", "EE", "HH", "II", "JJ", "KK", "LL"]
        );
    }

    #[test]
    fn few_states_are_all_ranked() {
        let frame = frame(&[resident("NY", 1.0, 2.0), resident("CA", 1.0, 0.5)]);
        let ranked = ranked_states(&frame, 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].state, "CA");
    }

    #[test]
    fn gain_map_describes_average_change() {
        let frame = frame(&[resident("WA", 10_000.0, 10_500.0)]);
        let figure = state_gain_map(&frame);
        assert_eq!(figure.data[0]["locations"], json!(["WA"]));
        assert_eq!(
            figure.data[0]["customdata"][0][0],
            "On average, people in WA gain 5.0%"
        );
        assert_eq!(figure.layout["geo"]["scope"], "usa");
    }

    #[test]
    fn poverty_map_inverts_changes() {
        let mut poor = resident("OH", 5_000.0, 8_000.0);
        poor.baseline_poor = true;
        let frame = frame(&[poor, resident("OH", 50_000.0, 50_000.0)]);
        let figure = state_poverty_map(&frame);
        assert_eq!(figure.data[0]["z"], json!([1.0]));
        assert_eq!(
            figure.data[0]["customdata"][0][0],
            "The poverty rate in OH falls by 100.0%"
        );
    }
}
