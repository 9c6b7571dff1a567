use serde_json::json;
use tracing::warn;

use super::figure::{CUSTOM_HOVER, DARK_GREEN, Figure, GRAY, gain_color, hover_data};
use super::format::currency;
use crate::error::SimulationError;
use crate::simulation::{Entity, Microsimulation};

const TAXES: &str = "spm_unit_taxes";
const BENEFITS: &str = "spm_unit_benefits";
const UNIT_WEIGHT: &str = "spm_unit_weight";

const TAX_LABEL: &str = "Tax revenues";
const BENEFIT_LABEL: &str = "Benefit outlays";
const NET_LABEL: &str = "Net impact";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BudgetImpact {
    pub tax_revenue_change: f64,
    pub benefit_outlay_change: f64,
}

impl BudgetImpact {
    // Positive is a surplus.
    pub fn net(&self) -> f64 {
        self.tax_revenue_change - self.benefit_outlay_change
    }
}

/// Weighted change in unit taxes and benefits between the runs. `None` when
/// either run lacks one of the variables.
pub fn budget_impact<B, R>(
    baseline: &B,
    reformed: &R,
) -> Result<Option<BudgetImpact>, SimulationError>
where
    B: Microsimulation + ?Sized,
    R: Microsimulation + ?Sized,
{
    let weight = match baseline.calc(UNIT_WEIGHT, Entity::SpmUnit) {
        Ok(weight) => weight,
        Err(SimulationError::MissingVariable(_)) => {
            warn!(variable = UNIT_WEIGHT, "unit weight not in baseline export, skipping budget");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let Some(tax_revenue_change) = weighted_change(baseline, reformed, TAXES, &weight)? else {
        return Ok(None);
    };
    let Some(benefit_outlay_change) = weighted_change(baseline, reformed, BENEFITS, &weight)?
    else {
        return Ok(None);
    };
    Ok(Some(BudgetImpact {
        tax_revenue_change,
        benefit_outlay_change,
    }))
}

fn weighted_change<B, R>(
    baseline: &B,
    reformed: &R,
    variable: &str,
    weight: &[f64],
) -> Result<Option<f64>, SimulationError>
where
    B: Microsimulation + ?Sized,
    R: Microsimulation + ?Sized,
{
    let (before, after) = match (
        baseline.calc(variable, Entity::SpmUnit),
        reformed.calc(variable, Entity::SpmUnit),
    ) {
        (Ok(before), Ok(after)) => (before, after),
        (Err(SimulationError::MissingVariable(_)), _)
        | (_, Err(SimulationError::MissingVariable(_))) => {
            warn!(variable, "budget variable not in both exports, skipping budget");
            return Ok(None);
        }
        (Err(err), _) | (_, Err(err)) => return Err(err),
    };
    for (what, actual) in [("baseline", before.len()), ("reformed", after.len())] {
        if actual != weight.len() {
            return Err(SimulationError::LengthMismatch {
                what: format!("{what} {variable}"),
                expected: weight.len(),
                actual,
            });
        }
    }
    Ok(Some(
        weight
            .iter()
            .zip(before.iter().zip(&after))
            .map(|(w, (before, after))| w * (after - before))
            .sum(),
    ))
}

fn budget_label(component: &str, amount: f64) -> String {
    let magnitude = currency(amount.abs());
    let net = component == NET_LABEL;
    if amount == 0.0 {
        if net {
            "Reform has no budgetary impact".to_string()
        } else {
            format!("{component} would not change")
        }
    } else if amount > 0.0 {
        if net {
            format!("Reform produces {magnitude} net surplus")
        } else {
            format!("{component} would rise by {magnitude}")
        }
    } else if net {
        format!("Reform produces {magnitude} net cost")
    } else {
        format!("{component} would fall by {magnitude}")
    }
}

pub fn budget_chart(impact: &BudgetImpact) -> Figure {
    let labels = vec![
        budget_label(TAX_LABEL, impact.tax_revenue_change),
        budget_label(BENEFIT_LABEL, impact.benefit_outlay_change),
        budget_label(NET_LABEL, impact.net()),
    ];

    Figure::new(
        vec![json!({
            "type": "waterfall",
            "x": [TAX_LABEL, BENEFIT_LABEL, NET_LABEL],
            "y": [impact.tax_revenue_change, -impact.benefit_outlay_change, impact.net()],
            "measure": ["relative", "relative", "total"],
            "increasing": {"marker": {"color": DARK_GREEN}},
            "decreasing": {"marker": {"color": GRAY}},
            "totals": {"marker": {"color": gain_color(impact.net())}},
            "connector": {"visible": false},
            "customdata": hover_data(&labels),
            "hovertemplate": CUSTOM_HOVER,
        })],
        json!({
            "title": {"text": "Budget breakdown"},
            "xaxis": {"title": {"text": null}},
            "yaxis": {"title": {"text": "Yearly amount"}, "tickprefix": "$"},
            "showlegend": false,
        }),
    )
    .with_zero_line()
}
