use std::collections::HashMap;
use std::sync::OnceLock;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CalcError;
use crate::scenario::CostIndex;
use crate::types::{Contaminant, Mechanism, Medium, ReceptorType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechnologyReadiness {
    pub tag: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentMethod {
    pub id: String,
    pub name: String,
    pub medium: Medium,
    pub mechanism: Mechanism,
    /// £/m³ for water, £/tonne for soil.
    pub unit_cost_low: Decimal,
    pub unit_cost_high: Decimal,
    pub efficiency_low: f64,
    pub efficiency_high: f64,
    pub applicable_contaminants: Vec<Contaminant>,
    pub secondary_waste: Option<String>,
    pub readiness: Option<TechnologyReadiness>,
}

impl TreatmentMethod {
    pub fn unit_cost(&self, index: CostIndex) -> Decimal {
        index.pick_cost(self.unit_cost_low, self.unit_cost_high)
    }

    pub fn efficiency(&self, index: CostIndex) -> f64 {
        index.pick_efficiency(self.efficiency_low, self.efficiency_high)
    }

    pub fn applies_to(&self, contaminant: Contaminant) -> bool {
        self.applicable_contaminants.contains(&contaminant)
    }

    fn validate(&self) -> Result<(), CalcError> {
        if self.id.trim().is_empty() {
            return Err(CalcError::InvalidCatalog(format!(
                "method {:?} has an empty id",
                self.name
            )));
        }
        if self.unit_cost_low < Decimal::ZERO || self.unit_cost_low > self.unit_cost_high {
            return Err(CalcError::InvalidCatalog(format!(
                "method {}: unit cost range {}..{} is invalid",
                self.id, self.unit_cost_low, self.unit_cost_high
            )));
        }
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.efficiency_low)
            || !in_unit(self.efficiency_high)
            || self.efficiency_low > self.efficiency_high
        {
            return Err(CalcError::InvalidCatalog(format!(
                "method {}: efficiency range {}..{} is invalid",
                self.id, self.efficiency_low, self.efficiency_high
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContaminantThreshold {
    pub receptor: ReceptorType,
    pub contaminant: Contaminant,
    /// Maximum allowable concentration, µg/L.
    pub max_concentration: f64,
}

/// Immutable reference tables for treatment methods and thresholds.
#[derive(Debug, Clone)]
pub struct Catalog {
    water: Vec<TreatmentMethod>,
    soil: Vec<TreatmentMethod>,
    index: HashMap<String, (Medium, usize)>,
    thresholds: HashMap<(ReceptorType, Contaminant), f64>,
}

impl Catalog {
    pub fn new(
        methods: Vec<TreatmentMethod>,
        thresholds: Vec<ContaminantThreshold>,
    ) -> Result<Self, CalcError> {
        let mut water = Vec::new();
        let mut soil = Vec::new();
        let mut index = HashMap::new();

        for method in methods {
            method.validate()?;
            let slot = match method.medium {
                Medium::Water => &mut water,
                Medium::Soil => &mut soil,
            };
            if index
                .insert(method.id.clone(), (method.medium, slot.len()))
                .is_some()
            {
                return Err(CalcError::InvalidCatalog(format!(
                    "duplicate method id {}",
                    method.id
                )));
            }
            slot.push(method);
        }

        let mut table = HashMap::new();
        for threshold in thresholds {
            if !(threshold.max_concentration.is_finite() && threshold.max_concentration > 0.0) {
                return Err(CalcError::InvalidCatalog(format!(
                    "{} threshold for {} must be positive",
                    threshold.receptor.label(),
                    threshold.contaminant
                )));
            }
            if table
                .insert(
                    (threshold.receptor, threshold.contaminant),
                    threshold.max_concentration,
                )
                .is_some()
            {
                return Err(CalcError::InvalidCatalog(format!(
                    "duplicate {} threshold for {}",
                    threshold.receptor.label(),
                    threshold.contaminant
                )));
            }
        }

        Ok(Self {
            water,
            soil,
            index,
            thresholds: table,
        })
    }

    /// Built-in catalog, assembled once per process.
    pub fn builtin() -> Result<&'static Self, CalcError> {
        static BUILTIN: OnceLock<Result<Catalog, CalcError>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Self::new(builtin_methods(), builtin_thresholds()))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn methods(&self, medium: Medium) -> &[TreatmentMethod] {
        match medium {
            Medium::Water => &self.water,
            Medium::Soil => &self.soil,
        }
    }

    pub fn get(&self, id: &str) -> Option<&TreatmentMethod> {
        let (medium, pos) = self.index.get(id)?;
        self.methods(*medium).get(*pos)
    }

    /// Looks up a method of the given medium; an id belonging to the other
    /// medium is reported as not found.
    pub fn method(&self, medium: Medium, id: &str) -> Result<&TreatmentMethod, CalcError> {
        self.get(id)
            .filter(|method| method.medium == medium)
            .ok_or_else(|| CalcError::NotFound {
                medium,
                id: id.to_string(),
            })
    }

    pub fn threshold(
        &self,
        receptor: ReceptorType,
        contaminant: Contaminant,
    ) -> Result<f64, CalcError> {
        self.thresholds
            .get(&(receptor, contaminant))
            .copied()
            .ok_or(CalcError::MissingThreshold {
                receptor,
                contaminant,
            })
    }

    pub fn thresholds_for(&self, receptor: ReceptorType) -> Vec<ContaminantThreshold> {
        let mut out = self
            .thresholds
            .iter()
            .filter(|((r, _), _)| *r == receptor)
            .map(|((r, c), v)| ContaminantThreshold {
                receptor: *r,
                contaminant: *c,
                max_concentration: *v,
            })
            .collect::<Vec<_>>();
        out.sort_by_key(|t| t.contaminant);
        out
    }
}

struct MethodSpec {
    id: &'static str,
    name: &'static str,
    mechanism: Mechanism,
    cost: (Decimal, Decimal),
    efficiency: (f64, f64),
    applicable: &'static [Contaminant],
    waste: Option<&'static str>,
    readiness: Option<(&'static str, &'static str)>,
}

impl MethodSpec {
    fn build(self, medium: Medium) -> TreatmentMethod {
        TreatmentMethod {
            id: self.id.to_string(),
            name: self.name.to_string(),
            medium,
            mechanism: self.mechanism,
            unit_cost_low: self.cost.0,
            unit_cost_high: self.cost.1,
            efficiency_low: self.efficiency.0,
            efficiency_high: self.efficiency.1,
            applicable_contaminants: self.applicable.to_vec(),
            secondary_waste: self.waste.map(str::to_string),
            readiness: self.readiness.map(|(tag, note)| TechnologyReadiness {
                tag: tag.to_string(),
                note: note.to_string(),
            }),
        }
    }
}

const ALL: &[Contaminant] = &Contaminant::ALL;
const LONG_CHAIN: &[Contaminant] = &[
    Contaminant::Pfos,
    Contaminant::Pfoa,
    Contaminant::Pfhxs,
    Contaminant::Pfna,
];
const CARBOXYLATES: &[Contaminant] = &[Contaminant::Pfoa, Contaminant::Pfna, Contaminant::HfpoDa];
const OXIDISABLE: &[Contaminant] = &[
    Contaminant::Pfos,
    Contaminant::Pfoa,
    Contaminant::Pfhxs,
    Contaminant::Pfna,
    Contaminant::Pfbs,
];

const AOP_NOTE: &str = "Sulfonates resist hydroxyl-radical attack; field performance varies.";

fn gbp(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

fn builtin_methods() -> Vec<TreatmentMethod> {
    let water = [
        MethodSpec {
            id: "gac",
            name: "Granular Activated Carbon (GAC)",
            mechanism: Mechanism::Removal,
            cost: (gbp(2, 2), gbp(8, 2)),
            efficiency: (0.70, 0.90),
            applicable: LONG_CHAIN,
            waste: Some("spent activated carbon"),
            readiness: None,
        },
        MethodSpec {
            id: "ion-exchange",
            name: "Ion Exchange",
            mechanism: Mechanism::Removal,
            cost: (gbp(3, 2), gbp(8, 2)),
            efficiency: (0.85, 0.99),
            applicable: ALL,
            waste: Some("spent resin and regenerant brine"),
            readiness: None,
        },
        MethodSpec {
            id: "ro-nf",
            name: "RO / Nanofiltration",
            mechanism: Mechanism::Removal,
            cost: (gbp(5, 2), gbp(15, 2)),
            efficiency: (0.90, 0.99),
            applicable: ALL,
            waste: Some("membrane reject concentrate"),
            readiness: None,
        },
        MethodSpec {
            id: "foam-fractionation",
            name: "Foam Fractionation",
            mechanism: Mechanism::Removal,
            cost: (gbp(1, 2), gbp(5, 2)),
            efficiency: (0.60, 0.90),
            applicable: LONG_CHAIN,
            waste: Some("foamate concentrate"),
            readiness: None,
        },
        MethodSpec {
            id: "aop",
            name: "Advanced Oxidation (AOP)",
            mechanism: Mechanism::Destruction,
            cost: (gbp(10, 2), gbp(50, 2)),
            efficiency: (0.30, 0.70),
            applicable: CARBOXYLATES,
            waste: None,
            readiness: Some(("pilot", AOP_NOTE)),
        },
        MethodSpec {
            id: "scwo",
            name: "Supercritical Water Oxidation (SCWO)",
            mechanism: Mechanism::Destruction,
            cost: (gbp(20, 2), gbp(100, 2)),
            efficiency: (0.95, 0.999),
            applicable: ALL,
            waste: None,
            readiness: Some((
                "demonstration",
                "Proven on concentrates at pilot scale; full-scale costs are uncertain.",
            )),
        },
        MethodSpec {
            id: "pump-treat-capture",
            name: "Pump-and-Treat + Incineration (capture)",
            mechanism: Mechanism::Removal,
            cost: (gbp(10, 2), gbp(20, 2)),
            efficiency: (0.80, 0.95),
            applicable: ALL,
            waste: Some("loaded media sent for incineration"),
            readiness: None,
        },
        MethodSpec {
            id: "pump-treat-incineration",
            name: "Pump-and-Treat + Incineration (incineration)",
            mechanism: Mechanism::Destruction,
            cost: (gbp(10, 2), gbp(20, 2)),
            efficiency: (0.80, 0.95),
            applicable: ALL,
            waste: None,
            readiness: None,
        },
        MethodSpec {
            id: "electrochemical",
            name: "Electrochemical Oxidation",
            mechanism: Mechanism::Destruction,
            cost: (gbp(1, 3), gbp(1, 3)),
            efficiency: (0.50, 0.90),
            applicable: OXIDISABLE,
            waste: None,
            readiness: Some((
                "pilot",
                "Electrode fouling and short-chain by-products are still under evaluation.",
            )),
        },
    ];

    let soil = [
        MethodSpec {
            id: "excavate-landfill",
            name: "Excavate & Landfill",
            mechanism: Mechanism::Removal,
            cost: (gbp(50, 0), gbp(200, 0)),
            efficiency: (0.95, 0.99),
            applicable: ALL,
            waste: Some("excavated soil placed in landfill"),
            readiness: None,
        },
        MethodSpec {
            id: "excavate-incinerate",
            name: "Excavate & Incinerate",
            mechanism: Mechanism::Destruction,
            cost: (gbp(50, 0), gbp(200, 0)),
            efficiency: (0.95, 0.99),
            applicable: ALL,
            waste: None,
            readiness: None,
        },
        MethodSpec {
            id: "soil-washing",
            name: "Soil Washing",
            mechanism: Mechanism::Removal,
            cost: (gbp(8, 0), gbp(20, 0)),
            efficiency: (0.70, 0.90),
            applicable: LONG_CHAIN,
            waste: Some("washwater concentrate"),
            readiness: None,
        },
        MethodSpec {
            id: "soil-washing-scwo",
            name: "Soil Washing + SCWO/AOP",
            mechanism: Mechanism::Destruction,
            cost: (gbp(8, 0), gbp(20, 0)),
            efficiency: (0.70, 0.90),
            applicable: LONG_CHAIN,
            waste: None,
            readiness: Some((
                "pilot",
                "Eluate destruction step has limited field deployments.",
            )),
        },
        MethodSpec {
            id: "thermal-desorption",
            name: "Thermal Desorption",
            mechanism: Mechanism::Destruction,
            cost: (gbp(100, 0), gbp(500, 0)),
            efficiency: (0.90, 0.99),
            applicable: ALL,
            waste: None,
            readiness: None,
        },
        MethodSpec {
            id: "in-situ-stabilisation",
            name: "In-Situ Stabilisation",
            mechanism: Mechanism::Removal,
            cost: (gbp(20, 0), gbp(40, 0)),
            efficiency: (0.50, 0.90),
            applicable: ALL,
            waste: Some("immobilised PFAS left in place"),
            readiness: None,
        },
        MethodSpec {
            id: "aop-eluate",
            name: "AOP (ex-situ eluate)",
            mechanism: Mechanism::Destruction,
            cost: (gbp(10, 2), gbp(50, 2)),
            efficiency: (0.30, 0.70),
            applicable: CARBOXYLATES,
            waste: None,
            readiness: Some(("pilot", AOP_NOTE)),
        },
    ];

    water
        .into_iter()
        .map(|spec| spec.build(Medium::Water))
        .chain(soil.into_iter().map(|spec| spec.build(Medium::Soil)))
        .collect()
}

fn builtin_thresholds() -> Vec<ContaminantThreshold> {
    let drinking = [
        (Contaminant::Pfos, 0.1),
        (Contaminant::Pfoa, 0.4),
        (Contaminant::Pfhxs, 0.1),
        (Contaminant::Pfna, 0.1),
        (Contaminant::Pfbs, 1.0),
        (Contaminant::HfpoDa, 0.1),
    ];
    // No environmental quality standard is published for HFPO-DA.
    let environmental = [
        (Contaminant::Pfos, 0.65),
        (Contaminant::Pfoa, 1.0),
        (Contaminant::Pfhxs, 0.5),
        (Contaminant::Pfna, 0.5),
        (Contaminant::Pfbs, 5.0),
    ];

    let rows = |receptor: ReceptorType, table: &[(Contaminant, f64)]| {
        table
            .iter()
            .map(|&(contaminant, max_concentration)| ContaminantThreshold {
                receptor,
                contaminant,
                max_concentration,
            })
            .collect::<Vec<_>>()
    };
    let mut out = rows(ReceptorType::DrinkingWater, &drinking);
    out.extend(rows(ReceptorType::Environmental, &environmental));
    out
}
