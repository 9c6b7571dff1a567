mod budget;
mod decile;
mod figure;
mod format;
mod frame;
mod inequality;
mod poverty;
mod state;
mod winners;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Error;

pub use budget::{BudgetImpact, budget_chart, budget_impact};
pub use decile::{
    DecileImpact, age_chart, decile_chart, decile_impacts, gain_by_age, weighted_rank_groups,
};
pub use figure::Figure;
pub use format::{currency, ordinal, percent, thousands};
pub use frame::{ImpactFrame, PROGRAMS, ProgramRecipients, equivalise};
pub use inequality::{
    HeadlineMetrics, InequalityImpact, gini, headline_metrics, inequality_chart,
    inequality_impacts, top_share,
};
pub use poverty::{PovertyImpact, poverty_chart, poverty_impacts};
pub use state::{
    StateImpact, ranked_states, state_gain_map, state_impacts, state_poverty_map,
    state_ranking_chart,
};
pub use winners::{
    Outcome, OutcomeShares, age_outcomes, age_winners_chart, program_outcomes,
    program_winners_chart,
};

// The budget chart is present only when the exports carry unit taxes and benefits.
pub fn all_charts(frame: &ImpactFrame) -> Vec<(&'static str, Figure)> {
    let mut charts = vec![
        ("age_winners", age_winners_chart(frame)),
        ("program_winners", program_winners_chart(frame)),
        ("decile_relative", decile_chart(frame, true)),
        ("decile_absolute", decile_chart(frame, false)),
        ("age_impact", age_chart(frame)),
        ("poverty", poverty_chart(frame)),
        ("inequality", inequality_chart(frame)),
        ("state_ranking", state_ranking_chart(frame)),
        ("state_gain_map", state_gain_map(frame)),
        ("state_poverty_map", state_poverty_map(frame)),
    ];
    if let Some(budget) = &frame.budget {
        charts.push(("budget", budget_chart(budget)));
    }
    charts
}

pub fn write_report(dir: &Path, frame: &ImpactFrame) -> Result<Vec<String>, Error> {
    let report_err = |path: &Path, source| Error::Report {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(|source| report_err(dir, source))?;

    let mut written = Vec::new();
    for (name, figure) in all_charts(frame) {
        let file_name = format!("{name}.json");
        let path = dir.join(&file_name);
        let text = serde_json::to_string(&figure)?;
        fs::write(&path, text).map_err(|source| report_err(path.as_path(), source))?;
        written.push(file_name);
    }

    let metrics = headline_metrics(frame);
    let path = dir.join("metrics.json");
    fs::write(&path, serde_json::to_string_pretty(&metrics)?)
        .map_err(|source| report_err(path.as_path(), source))?;
    written.push("metrics.json".to_string());

    info!(
        dir = %dir.display(),
        files = written.len(),
        poverty_rate_change = metrics.poverty_rate_change,
        gini_change = metrics.gini_change,
        "wrote reform report"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::frame::fixtures::{frame, person};
    use super::*;

    #[test]
    fn report_writes_every_chart_and_metrics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut frame = frame(&[
            person(8.0, 20_000.0, 26_000.0),
            person(45.0, 60_000.0, 52_000.0),
            person(70.0, 18_000.0, 21_000.0),
        ]);
        frame.budget = Some(BudgetImpact {
            tax_revenue_change: 1_000_000.0,
            benefit_outlay_change: 1_200_000.0,
        });
        let written = write_report(dir.path(), &frame).expect("report");
        assert_eq!(written.len(), 12);
        assert!(written.contains(&"budget.json".to_string()));

        let budget = fs::read_to_string(dir.path().join("budget.json")).expect("budget chart");
        let value: serde_json::Value = serde_json::from_str(&budget).expect("valid json");
        assert_eq!(value["data"][0]["type"], "waterfall");

        let text = fs::read_to_string(dir.path().join("decile_relative.json")).expect("chart file");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["layout"]["plot_bgcolor"], "white");
        assert_eq!(value["data"][0]["type"], "bar");

        let metrics = fs::read_to_string(dir.path().join("metrics.json")).expect("metrics file");
        assert!(metrics.contains("giniChange"));
    }

    #[test]
    fn budget_chart_is_skipped_without_budget_variables() {
        let frame = frame(&[person(30.0, 20_000.0, 21_000.0)]);
        let names: Vec<&str> = all_charts(&frame).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names.len(), 10);
        assert!(!names.contains(&"budget"));
    }
}
