use std::io::Write;

use pfas_calc_core::{Estimate, Mechanism, Medium, Scenario};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::ExportError;
use crate::money::two_dp;

pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownRow {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Cost")]
    pub cost: Decimal,
}

/// Row shape when the Scenario column is requested.
#[derive(Serialize)]
struct ScenarioRow<'a> {
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Cost")]
    cost: Decimal,
    #[serde(rename = "Scenario")]
    scenario: &'a str,
}

/// Flat cost table: one row per medium × mechanism, then the grand total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownTable {
    rows: Vec<BreakdownRow>,
    scenario: Option<String>,
}

impl BreakdownTable {
    pub fn from_estimate(estimate: &Estimate) -> Self {
        let mut rows = Vec::with_capacity(5);
        for medium in [Medium::Water, Medium::Soil] {
            let outcome = estimate.medium(medium);
            for (mechanism, cost) in [
                (Mechanism::Removal, outcome.removal_cost),
                (Mechanism::Destruction, outcome.destruction_cost),
            ] {
                rows.push(BreakdownRow {
                    category: format!("{} {}", medium.label(), mechanism.label()),
                    cost,
                });
            }
        }
        rows.push(BreakdownRow {
            category: GRAND_TOTAL_LABEL.to_string(),
            cost: estimate.grand_total,
        });
        Self {
            rows,
            scenario: None,
        }
    }

    /// Adds a Scenario column carrying the scenario label on every row.
    pub fn with_scenario(mut self, scenario: &Scenario) -> Self {
        self.scenario = Some(scenario.label.to_string());
        self
    }

    pub fn rows(&self) -> &[BreakdownRow] {
        &self.rows
    }

    pub fn grand_total(&self) -> Decimal {
        self.rows
            .iter()
            .find(|row| row.category == GRAND_TOTAL_LABEL)
            .map_or(Decimal::ZERO, |row| row.cost)
    }

    /// Header comes from the row field names; costs carry two decimals.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), ExportError> {
        let mut wtr = csv::Writer::from_writer(out);
        for row in &self.rows {
            let cost = two_dp(row.cost);
            match &self.scenario {
                Some(scenario) => wtr.serialize(ScenarioRow {
                    category: &row.category,
                    cost,
                    scenario,
                })?,
                None => wtr.serialize(BreakdownRow {
                    category: row.category.clone(),
                    cost,
                })?,
            }
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
