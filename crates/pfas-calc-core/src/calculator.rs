use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, TreatmentMethod};
use crate::error::CalcError;
use crate::scenario::CostIndex;
use crate::types::{ComplianceStatus, Contaminant, Mechanism, Medium, ReceptorType};

/// Site parameters collected by the caller for one estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInput {
    /// m³ of water to treat; zero skips the water medium.
    #[serde(default)]
    pub water_volume: Decimal,
    /// Tonnes of soil to treat; zero skips the soil medium.
    #[serde(default)]
    pub soil_mass: Decimal,
    /// µg/L per contaminant before treatment.
    #[serde(default)]
    pub influent_concentration: BTreeMap<Contaminant, f64>,
    pub receptor_type: ReceptorType,
    #[serde(default)]
    pub water_method: Option<String>,
    #[serde(default)]
    pub soil_method: Option<String>,
}

impl SiteInput {
    pub fn new(receptor_type: ReceptorType) -> Self {
        Self {
            water_volume: Decimal::ZERO,
            soil_mass: Decimal::ZERO,
            influent_concentration: BTreeMap::new(),
            receptor_type,
            water_method: None,
            soil_method: None,
        }
    }

    pub fn with_water(mut self, volume: Decimal, method: Option<&str>) -> Self {
        self.water_volume = volume;
        self.water_method = method.map(str::to_string);
        self
    }

    pub fn with_soil(mut self, mass: Decimal, method: Option<&str>) -> Self {
        self.soil_mass = mass;
        self.soil_method = method.map(str::to_string);
        self
    }

    pub fn with_influent(mut self, contaminant: Contaminant, concentration: f64) -> Self {
        self.influent_concentration.insert(contaminant, concentration);
        self
    }

    fn validate(&self) -> Result<(), CalcError> {
        if self.water_volume < Decimal::ZERO {
            return Err(CalcError::InvalidInput(format!(
                "water volume {} must not be negative",
                self.water_volume
            )));
        }
        if self.soil_mass < Decimal::ZERO {
            return Err(CalcError::InvalidInput(format!(
                "soil mass {} must not be negative",
                self.soil_mass
            )));
        }
        for (contaminant, value) in &self.influent_concentration {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(CalcError::InvalidInput(format!(
                    "{contaminant} concentration {value} must be a finite non-negative number"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediumOutcome {
    pub medium: Medium,
    pub method_id: Option<String>,
    pub mechanism: Option<Mechanism>,
    pub quantity: Decimal,
    /// Unit cost and efficiency actually applied; `None` when the medium was skipped.
    pub unit_cost: Option<Decimal>,
    pub efficiency: Option<f64>,
    pub removal_cost: Decimal,
    pub destruction_cost: Decimal,
    pub residuals: BTreeMap<Contaminant, f64>,
}

impl MediumOutcome {
    fn untreated(
        medium: Medium,
        quantity: Decimal,
        method: Option<&TreatmentMethod>,
        influent: &BTreeMap<Contaminant, f64>,
    ) -> Self {
        Self {
            medium,
            method_id: method.map(|m| m.id.clone()),
            mechanism: None,
            quantity,
            unit_cost: None,
            efficiency: None,
            removal_cost: Decimal::ZERO,
            destruction_cost: Decimal::ZERO,
            residuals: influent.clone(),
        }
    }

    pub fn applied(&self) -> bool {
        self.unit_cost.is_some()
    }

    pub fn total_cost(&self) -> Decimal {
        self.removal_cost + self.destruction_cost
    }

    pub fn residual(&self, contaminant: Contaminant) -> Option<f64> {
        self.residuals.get(&contaminant).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRow {
    pub contaminant: Contaminant,
    pub influent: f64,
    pub residual: f64,
    pub threshold: f64,
    pub ratio: f64,
    pub status: ComplianceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    SecondaryWaste,
    Readiness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub medium: Medium,
    pub method_id: String,
    pub kind: AdvisoryKind,
    pub message: String,
}

/// Outcome of one calculation. Aggregate hazard status and per-contaminant
/// statuses are reported side by side; no combined verdict is derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub cost_index: CostIndex,
    pub receptor_type: ReceptorType,
    pub water: MediumOutcome,
    pub soil: MediumOutcome,
    pub grand_total: Decimal,
    pub combined_residuals: BTreeMap<Contaminant, f64>,
    pub compliance: Vec<ComplianceRow>,
    pub hazard_index: f64,
    pub hazard_status: ComplianceStatus,
    pub advisories: Vec<Advisory>,
}

impl Estimate {
    pub fn medium(&self, medium: Medium) -> &MediumOutcome {
        match medium {
            Medium::Water => &self.water,
            Medium::Soil => &self.soil,
        }
    }

    /// False when no medium had both a method and a non-zero quantity.
    pub fn has_treatment(&self) -> bool {
        self.water.applied() || self.soil.applied()
    }

    pub fn total_removal(&self) -> Decimal {
        self.water.removal_cost + self.soil.removal_cost
    }

    pub fn total_destruction(&self) -> Decimal {
        self.water.destruction_cost + self.soil.destruction_cost
    }

    pub fn compliance_for(&self, contaminant: Contaminant) -> Option<&ComplianceRow> {
        self.compliance
            .iter()
            .find(|row| row.contaminant == contaminant)
    }

    pub fn exceedances(&self) -> impl Iterator<Item = &ComplianceRow> {
        self.compliance
            .iter()
            .filter(|row| row.status == ComplianceStatus::Exceeds)
    }

    pub fn all_contaminants_pass(&self) -> bool {
        self.exceedances().next().is_none()
    }
}

pub struct Calculator<'a> {
    catalog: &'a Catalog,
}

impl<'a> Calculator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn compute(&self, site: &SiteInput, index: CostIndex) -> Result<Estimate, CalcError> {
        site.validate()?;

        let water_method = site
            .water_method
            .as_deref()
            .map(|id| self.catalog.method(Medium::Water, id))
            .transpose()?;
        let soil_method = site
            .soil_method
            .as_deref()
            .map(|id| self.catalog.method(Medium::Soil, id))
            .transpose()?;

        let influent = &site.influent_concentration;
        let water = treat_medium(Medium::Water, site.water_volume, water_method, influent, index)?;
        let soil = treat_medium(Medium::Soil, site.soil_mass, soil_method, influent, index)?;

        // A contaminant counts as controlled if either medium's treatment reduces it.
        let combined_residuals = influent
            .iter()
            .map(|(contaminant, value)| {
                let w = water.residual(*contaminant).unwrap_or(*value);
                let s = soil.residual(*contaminant).unwrap_or(*value);
                (*contaminant, w.min(s))
            })
            .collect::<BTreeMap<_, _>>();

        let mut compliance = Vec::with_capacity(combined_residuals.len());
        let mut hazard_index = 0.0;
        for (contaminant, residual) in &combined_residuals {
            let threshold = self.catalog.threshold(site.receptor_type, *contaminant)?;
            let ratio = residual / threshold;
            hazard_index += ratio;
            compliance.push(ComplianceRow {
                contaminant: *contaminant,
                influent: influent.get(contaminant).copied().unwrap_or(*residual),
                residual: *residual,
                threshold,
                ratio,
                status: ComplianceStatus::from_ratio(ratio),
            });
        }

        let grand_total = water
            .total_cost()
            .checked_add(soil.total_cost())
            .ok_or_else(|| CalcError::InvalidInput("grand total overflows".to_string()))?;

        let advisories = [(water_method, &water), (soil_method, &soil)]
            .into_iter()
            .filter(|(_, outcome)| outcome.applied())
            .filter_map(|(method, _)| method)
            .flat_map(advisories_for)
            .collect();

        log::debug!(
            "estimate ({:?}): water={} soil={} total={} hazard_index={:.4}",
            index,
            water.total_cost(),
            soil.total_cost(),
            grand_total,
            hazard_index
        );

        Ok(Estimate {
            cost_index: index,
            receptor_type: site.receptor_type,
            water,
            soil,
            grand_total,
            combined_residuals,
            compliance,
            hazard_index,
            hazard_status: ComplianceStatus::from_ratio(hazard_index),
            advisories,
        })
    }
}

/// Runs the calculator over the built-in catalog.
pub fn compute_result(site: &SiteInput, index: CostIndex) -> Result<Estimate, CalcError> {
    Calculator::new(Catalog::builtin()?).compute(site, index)
}

fn treat_medium(
    medium: Medium,
    quantity: Decimal,
    method: Option<&TreatmentMethod>,
    influent: &BTreeMap<Contaminant, f64>,
    index: CostIndex,
) -> Result<MediumOutcome, CalcError> {
    let Some(method) = method.filter(|_| !quantity.is_zero()) else {
        return Ok(MediumOutcome::untreated(medium, quantity, method, influent));
    };

    let unit_cost = method.unit_cost(index);
    let total = unit_cost.checked_mul(quantity).ok_or_else(|| {
        CalcError::InvalidInput(format!(
            "{medium} cost overflows: {unit_cost} x {quantity}"
        ))
    })?;
    let (removal_cost, destruction_cost) = match method.mechanism {
        Mechanism::Removal => (total, Decimal::ZERO),
        Mechanism::Destruction => (Decimal::ZERO, total),
    };

    let efficiency = method.efficiency(index);
    let residuals = influent
        .iter()
        .map(|(contaminant, value)| {
            let residual = if method.applies_to(*contaminant) {
                value * (1.0 - efficiency)
            } else {
                *value
            };
            (*contaminant, residual)
        })
        .collect();

    Ok(MediumOutcome {
        medium,
        method_id: Some(method.id.clone()),
        mechanism: Some(method.mechanism),
        quantity,
        unit_cost: Some(unit_cost),
        efficiency: Some(efficiency),
        removal_cost,
        destruction_cost,
        residuals,
    })
}

fn advisories_for(method: &TreatmentMethod) -> Vec<Advisory> {
    let mut out = Vec::new();
    if let Some(waste) = &method.secondary_waste {
        out.push(Advisory {
            medium: method.medium,
            method_id: method.id.clone(),
            kind: AdvisoryKind::SecondaryWaste,
            message: format!("{} generates secondary waste: {waste}", method.name),
        });
    }
    if let Some(readiness) = &method.readiness {
        out.push(Advisory {
            medium: method.medium,
            method_id: method.id.clone(),
            kind: AdvisoryKind::Readiness,
            message: format!("{} ({}): {}", method.name, readiness.tag, readiness.note),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn gac_worst_case_matches_worked_example() {
        let site = SiteInput::new(ReceptorType::DrinkingWater)
            .with_water(Decimal::from(1_000_000), Some("gac"))
            .with_influent(Contaminant::Pfoa, 10.0);

        let out = compute_result(&site, CostIndex::High).expect("estimate");
        assert_eq!(out.water.removal_cost, Decimal::from(80_000));
        assert_eq!(out.water.destruction_cost, Decimal::ZERO);
        assert_eq!(out.grand_total, Decimal::from(80_000));

        let row = out.compliance_for(Contaminant::Pfoa).expect("pfoa row");
        assert!(close(row.residual, 1.0));
        assert!(close(row.threshold, 0.4));
        assert_eq!(row.status, ComplianceStatus::Exceeds);
        assert_eq!(out.hazard_status, ComplianceStatus::Exceeds);
    }

    #[test]
    fn thermal_desorption_best_case_is_pure_destruction() {
        let site = SiteInput::new(ReceptorType::DrinkingWater)
            .with_soil(Decimal::from(10_000), Some("thermal-desorption"))
            .with_influent(Contaminant::Pfos, 2.0);

        let out = compute_result(&site, CostIndex::Low).expect("estimate");
        assert_eq!(out.soil.destruction_cost, Decimal::from(1_000_000));
        assert_eq!(out.soil.removal_cost, Decimal::ZERO);
        assert_eq!(out.grand_total, Decimal::from(1_000_000));
        assert_eq!(out.total_destruction(), Decimal::from(1_000_000));
        assert_eq!(out.water.residual(Contaminant::Pfos), Some(2.0));
        assert!(!out.water.applied());
    }

    #[test]
    fn method_without_quantity_costs_nothing() {
        let site = SiteInput::new(ReceptorType::Environmental)
            .with_water(Decimal::ZERO, Some("scwo"))
            .with_influent(Contaminant::Pfos, 0.3);

        let out = compute_result(&site, CostIndex::High).expect("estimate");
        assert_eq!(out.grand_total, Decimal::ZERO);
        assert!(!out.has_treatment());
        assert_eq!(out.water.method_id.as_deref(), Some("scwo"));
        assert_eq!(out.combined_residuals.get(&Contaminant::Pfos), Some(&0.3));
        assert!(out.advisories.is_empty());
    }

    #[test]
    fn non_applicable_contaminants_pass_through() {
        let site = SiteInput::new(ReceptorType::DrinkingWater)
            .with_water(Decimal::from(100), Some("gac"))
            .with_influent(Contaminant::Pfbs, 0.8)
            .with_influent(Contaminant::Pfos, 1.0);

        let out = compute_result(&site, CostIndex::Low).expect("estimate");
        assert_eq!(out.water.residual(Contaminant::Pfbs), Some(0.8));
        assert!(close(out.water.residual(Contaminant::Pfos).unwrap_or(f64::NAN), 0.3));
    }

    #[test]
    fn combined_residual_takes_lower_medium() {
        let site = SiteInput::new(ReceptorType::DrinkingWater)
            .with_water(Decimal::from(1_000), Some("gac"))
            .with_soil(Decimal::from(50), Some("aop-eluate"))
            .with_influent(Contaminant::Pfoa, 4.0)
            .with_influent(Contaminant::Pfos, 4.0);

        let out = compute_result(&site, CostIndex::Low).expect("estimate");
        for (contaminant, combined) in &out.combined_residuals {
            let w = out.water.residual(*contaminant).unwrap_or(f64::NAN);
            let s = out.soil.residual(*contaminant).unwrap_or(f64::NAN);
            assert_eq!(*combined, w.min(s));
        }
        // AOP does not touch PFOS, GAC does.
        assert_eq!(out.soil.residual(Contaminant::Pfos), Some(4.0));
        assert!(close(out.combined_residuals[&Contaminant::Pfos], 1.2));
    }

    #[test]
    fn aggregate_can_fail_while_every_contaminant_passes() {
        let site = SiteInput::new(ReceptorType::DrinkingWater)
            .with_influent(Contaminant::Pfos, 0.06)
            .with_influent(Contaminant::Pfna, 0.06);

        let out = compute_result(&site, CostIndex::Low).expect("estimate");
        assert!(out.all_contaminants_pass());
        assert!(close(out.hazard_index, 1.2));
        assert_eq!(out.hazard_status, ComplianceStatus::Exceeds);
    }

    #[test]
    fn missing_threshold_fails_the_whole_call() {
        let site = SiteInput::new(ReceptorType::Environmental)
            .with_water(Decimal::from(10), Some("ion-exchange"))
            .with_influent(Contaminant::Pfos, 0.1)
            .with_influent(Contaminant::HfpoDa, 0.1);

        let err = compute_result(&site, CostIndex::High).unwrap_err();
        assert_eq!(
            err,
            CalcError::MissingThreshold {
                receptor: ReceptorType::Environmental,
                contaminant: Contaminant::HfpoDa,
            }
        );
    }

    #[test]
    fn rejects_negative_inputs_and_stale_ids() {
        let negative = SiteInput::new(ReceptorType::DrinkingWater)
            .with_soil(Decimal::from(-1), Some("thermal-desorption"));
        assert_eq!(
            compute_result(&negative, CostIndex::Low).unwrap_err().kind(),
            "invalid_input"
        );

        let bad_conc =
            SiteInput::new(ReceptorType::DrinkingWater).with_influent(Contaminant::Pfoa, -0.1);
        assert!(matches!(
            compute_result(&bad_conc, CostIndex::Low),
            Err(CalcError::InvalidInput(_))
        ));

        let stale = SiteInput::new(ReceptorType::DrinkingWater)
            .with_water(Decimal::ZERO, Some("retired-method"));
        assert!(matches!(
            compute_result(&stale, CostIndex::Low),
            Err(CalcError::NotFound { medium: Medium::Water, .. })
        ));

        let wrong_medium = SiteInput::new(ReceptorType::DrinkingWater)
            .with_soil(Decimal::from(5), Some("gac"));
        assert!(matches!(
            compute_result(&wrong_medium, CostIndex::Low),
            Err(CalcError::NotFound { medium: Medium::Soil, .. })
        ));
    }

    #[test]
    fn advisories_cover_waste_and_readiness() {
        let site = SiteInput::new(ReceptorType::DrinkingWater)
            .with_water(Decimal::from(10), Some("gac"))
            .with_soil(Decimal::from(10), Some("aop-eluate"));

        let out = compute_result(&site, CostIndex::Low).expect("estimate");
        let kinds = out
            .advisories
            .iter()
            .map(|a| (a.method_id.as_str(), a.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ("gac", AdvisoryKind::SecondaryWaste),
                ("aop-eluate", AdvisoryKind::Readiness),
            ]
        );
    }

    #[test]
    fn waste_advisory_tracks_catalog_waste_field() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        for method in catalog.methods(Medium::Soil) {
            let site = SiteInput::new(ReceptorType::Environmental)
                .with_soil(Decimal::from(1), Some(method.id.as_str()));
            let out = compute_result(&site, CostIndex::High).expect("estimate");
            let has_waste_advisory = out
                .advisories
                .iter()
                .any(|a| a.kind == AdvisoryKind::SecondaryWaste);
            assert_eq!(
                has_waste_advisory,
                method.secondary_waste.is_some(),
                "{}",
                method.id
            );
        }
    }
}
