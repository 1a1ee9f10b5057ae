use std::io::Write;

use pfas_calc_core::{ComplianceRow, ComplianceStatus, Estimate};
use serde::Serialize;

use crate::error::ExportError;

const HAZARD_INDEX_LABEL: &str = "Hazard Index";

/// Numbers are pre-rendered with `f64`'s shortest round-trip form, so `2.0`
/// is written as `2`.
#[derive(Serialize)]
struct ComplianceRecord<'a> {
    #[serde(rename = "Contaminant")]
    contaminant: &'a str,
    #[serde(rename = "Influent")]
    influent: String,
    #[serde(rename = "Residual")]
    residual: String,
    #[serde(rename = "Threshold")]
    threshold: String,
    #[serde(rename = "Ratio")]
    ratio: String,
    #[serde(rename = "Status")]
    status: &'a str,
}

impl<'a> From<&'a ComplianceRow> for ComplianceRecord<'a> {
    fn from(row: &'a ComplianceRow) -> Self {
        Self {
            contaminant: row.contaminant.code(),
            influent: row.influent.to_string(),
            residual: row.residual.to_string(),
            threshold: row.threshold.to_string(),
            ratio: row.ratio.to_string(),
            status: row.status.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceTable {
    rows: Vec<ComplianceRow>,
    hazard_index: f64,
}

impl ComplianceTable {
    pub fn from_estimate(estimate: &Estimate) -> Self {
        Self {
            rows: estimate.compliance.clone(),
            hazard_index: estimate.hazard_index,
        }
    }

    pub fn rows(&self) -> &[ComplianceRow] {
        &self.rows
    }

    /// Writes one row per contaminant followed by a hazard index row whose
    /// threshold is the aggregate limit of 1.
    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), ExportError> {
        let mut wtr = csv::Writer::from_writer(out);
        for row in &self.rows {
            wtr.serialize(ComplianceRecord::from(row))?;
        }
        wtr.serialize(ComplianceRecord {
            contaminant: HAZARD_INDEX_LABEL,
            influent: String::new(),
            residual: String::new(),
            threshold: 1.0_f64.to_string(),
            ratio: self.hazard_index.to_string(),
            status: ComplianceStatus::from_ratio(self.hazard_index).label(),
        })?;
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
