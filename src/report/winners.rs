use serde_json::{Value, json};

use super::figure::{
    CUSTOM_HOVER, DARK_GRAY, DARK_GREEN, Figure, GRAY, LIGHT_GRAY, LIGHT_GREEN, hover_data,
};
use super::format::percent;
use super::frame::ImpactFrame;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    GainMoreThan5,
    GainLessThan5,
    NoChange,
    LoseLessThan5,
    LoseMoreThan5,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::GainMoreThan5,
        Outcome::GainLessThan5,
        Outcome::NoChange,
        Outcome::LoseLessThan5,
        Outcome::LoseMoreThan5,
    ];

    pub fn classify(relative_gain: f64) -> Self {
        if relative_gain > 0.05 {
            Outcome::GainMoreThan5
        } else if relative_gain > 1e-3 {
            Outcome::GainLessThan5
        } else if relative_gain > -1e-3 {
            Outcome::NoChange
        } else if relative_gain > -0.05 {
            Outcome::LoseLessThan5
        } else {
            Outcome::LoseMoreThan5
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::GainMoreThan5 => "Gain more than 5%",
            Outcome::GainLessThan5 => "Gain less than 5%",
            Outcome::NoChange => "No change",
            Outcome::LoseLessThan5 => "Lose less than 5%",
            Outcome::LoseMoreThan5 => "Lose more than 5%",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Outcome::GainMoreThan5 => DARK_GREEN,
            Outcome::GainLessThan5 => LIGHT_GREEN,
            Outcome::NoChange => LIGHT_GRAY,
            Outcome::LoseLessThan5 => GRAY,
            Outcome::LoseMoreThan5 => DARK_GRAY,
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Outcome::GainMoreThan5 => "gain more than 5% of their income",
            Outcome::GainLessThan5 => "gain less than 5% of their income",
            Outcome::NoChange => "experience no change",
            Outcome::LoseLessThan5 => "lose less than 5% of their income",
            Outcome::LoseMoreThan5 => "lose more than 5% of their income",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeShares {
    pub group: String,
    pub shares: [f64; 5],
}

impl OutcomeShares {
    pub fn share(&self, outcome: Outcome) -> f64 {
        self.shares[outcome.index()]
    }
}

pub fn outcome_shares<F>(frame: &ImpactFrame, group: &str, member: F) -> OutcomeShares
where
    F: Fn(usize) -> bool,
{
    let mut weights = [0.0; 5];
    for person in (0..frame.len()).filter(|&p| member(p)) {
        weights[Outcome::classify(frame.relative_gain(person)).index()] += frame.weight[person];
    }
    let total: f64 = weights.iter().sum();
    let shares = if total > 0.0 {
        weights.map(|w| w / total)
    } else {
        [0.0; 5]
    };
    OutcomeShares {
        group: group.to_string(),
        shares,
    }
}

fn decade_groups() -> Vec<(f64, String)> {
    (0..9)
        .map(|decade| {
            let lower = decade * 10;
            let label = match decade {
                0 => "Under 10".to_string(),
                8 => "80 or over".to_string(),
                _ => format!("{lower}-{}", lower + 9),
            };
            (f64::from(lower), label)
        })
        .collect()
}

pub fn age_outcomes(frame: &ImpactFrame) -> Vec<OutcomeShares> {
    let mut rows: Vec<OutcomeShares> = decade_groups()
        .into_iter()
        .map(|(lower, label)| {
            let upper = if lower >= 80.0 { f64::INFINITY } else { lower + 10.0 };
            outcome_shares(frame, &label, |p| frame.age[p] >= lower && frame.age[p] < upper)
        })
        .collect();
    rows.push(outcome_shares(frame, "All", |_| true));
    rows
}

pub fn program_outcomes(frame: &ImpactFrame) -> Vec<OutcomeShares> {
    let mut rows: Vec<OutcomeShares> = frame
        .programs
        .iter()
        .map(|program| outcome_shares(frame, &program.label, |p| program.receives[p]))
        .collect();
    rows.push(outcome_shares(frame, "All", |_| true));
    rows
}

pub fn winners_chart(title: &str, axis_title: &str, rows: &[OutcomeShares], subject: &str) -> Figure {
    let groups: Vec<&str> = rows.iter().map(|row| row.group.as_str()).collect();
    let data: Vec<Value> = Outcome::ALL
        .iter()
        .map(|&outcome| {
            let labels: Vec<String> = rows
                .iter()
                .map(|row| {
                    let who = if row.group == "All" {
                        "all people".to_string()
                    } else {
                        format!("{subject} {}", row.group)
                    };
                    format!(
                        "<b>{}</b> of {who} {}",
                        percent(row.share(outcome), 0),
                        outcome.phrase()
                    )
                })
                .collect();
            json!({
                "type": "bar",
                "orientation": "h",
                "name": outcome.label(),
                "x": rows.iter().map(|row| row.share(outcome)).collect::<Vec<_>>(),
                "y": groups,
                "marker": {"color": outcome.color()},
                "customdata": hover_data(&labels),
                "hovertemplate": CUSTOM_HOVER,
            })
        })
        .collect();

    Figure::new(
        data,
        json!({
            "title": {"text": title},
            "barmode": "stack",
            "xaxis": {"title": {"text": "Population share"}, "tickformat": ".0%"},
            "yaxis": {"title": {"text": axis_title}, "type": "category"},
            "legend": {"traceorder": "normal", "title": {"text": "Change in income"}},
        }),
    )
}

pub fn age_winners_chart(frame: &ImpactFrame) -> Figure {
    winners_chart(
        "Winners and losers by age",
        "Age",
        &age_outcomes(frame),
        "people aged",
    )
}

pub fn program_winners_chart(frame: &ImpactFrame) -> Figure {
    winners_chart(
        "Winners and losers by program participation",
        "Program",
        &program_outcomes(frame),
        "people receiving",
    )
}

#[cfg(test)]
mod tests {
    use super::super::frame::fixtures::{frame, person};
    use super::*;

    #[test]
    fn classification_follows_band_edges() {
        assert_eq!(Outcome::classify(0.2), Outcome::GainMoreThan5);
        assert_eq!(Outcome::classify(0.05), Outcome::GainLessThan5);
        assert_eq!(Outcome::classify(0.001), Outcome::NoChange);
        assert_eq!(Outcome::classify(0.0), Outcome::NoChange);
        assert_eq!(Outcome::classify(-0.001), Outcome::LoseLessThan5);
        assert_eq!(Outcome::classify(-0.05), Outcome::LoseMoreThan5);
        assert_eq!(Outcome::classify(-0.5), Outcome::LoseMoreThan5);
    }

    #[test]
    fn shares_are_weighted_and_sum_to_one() {
        let mut heavy = person(40.0, 10_000.0, 12_000.0);
        heavy.weight = 3.0;
        let frame = frame(&[heavy, person(41.0, 10_000.0, 9_000.0)]);
        let all = outcome_shares(&frame, "All", |_| true);
        assert!((all.share(Outcome::GainMoreThan5) - 0.75).abs() < 1e-12);
        assert!((all.share(Outcome::LoseMoreThan5) - 0.25).abs() < 1e-12);
        assert!((all.shares.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn age_groups_are_decades_with_an_all_row() {
        let frame = frame(&[
            person(5.0, 1_000.0, 1_000.0),
            person(85.0, 1_000.0, 500.0),
            person(19.0, 1_000.0, 1_030.0),
        ]);
        let rows = age_outcomes(&frame);
        let names: Vec<&str> = rows.iter().map(|row| row.group.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Under 10", "10-19", "20-29", "30-39", "40-49", "50-59", "60-69", "70-79",
                "80 or over", "All"
            ]
        );
        assert_eq!(rows[0].share(Outcome::NoChange), 1.0);
        assert_eq!(rows[1].share(Outcome::GainLessThan5), 1.0);
        assert_eq!(rows[8].share(Outcome::LoseMoreThan5), 1.0);
        assert_eq!(rows[3].shares, [0.0; 5]);
    }

    #[test]
    fn program_rows_cover_recipients_only() {
        let mut recipient = person(30.0, 10_000.0, 8_000.0);
        recipient.snap = true;
        let frame = frame(&[recipient, person(30.0, 10_000.0, 11_000.0)]);
        let rows = program_outcomes(&frame);
        assert_eq!(rows[0].group, "SNAP");
        assert_eq!(rows[0].share(Outcome::LoseMoreThan5), 1.0);
        assert_eq!(rows[1].share(Outcome::GainMoreThan5), 0.5);
    }

    #[test]
    fn chart_has_one_trace_per_outcome() {
        let frame = frame(&[person(30.0, 10_000.0, 11_000.0)]);
        let figure = age_winners_chart(&frame);
        assert_eq!(figure.data.len(), 5);
        assert_eq!(figure.data[0]["name"], "Gain more than 5%");
        assert_eq!(figure.data[0]["marker"]["color"], DARK_GREEN);
        assert_eq!(figure.layout["barmode"], "stack");
        assert_eq!(
            figure.data[0]["customdata"][9][0],
            "<b>100%</b> of all people gain more than 5% of their income"
        );
    }
}
