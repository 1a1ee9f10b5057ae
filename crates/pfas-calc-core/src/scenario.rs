use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// Which bound of every method's cost and efficiency range a run uses.
///
/// `Low` picks the low unit cost together with the low efficiency, `High`
/// picks both high bounds. The same index drives cost and efficiency so the
/// two can never disagree within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostIndex {
    Low,
    High,
}

impl CostIndex {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }

    pub fn pick_cost(self, low: Decimal, high: Decimal) -> Decimal {
        match self {
            Self::Low => low,
            Self::High => high,
        }
    }

    pub fn pick_efficiency(self, low: f64, high: f64) -> f64 {
        match self {
            Self::Low => low,
            Self::High => high,
        }
    }
}

impl TryFrom<u8> for CostIndex {
    type Error = CalcError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::High),
            other => Err(CalcError::InvalidScenario(format!("cost index {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub id: &'static str,
    pub label: &'static str,
    pub cost_index: CostIndex,
}

static SCENARIOS: [Scenario; 5] = [
    Scenario {
        id: "best-case",
        label: "Best-case (lowest cost)",
        cost_index: CostIndex::Low,
    },
    Scenario {
        id: "optimistic",
        label: "Optimistic",
        cost_index: CostIndex::Low,
    },
    Scenario {
        id: "moderate",
        label: "Moderate",
        cost_index: CostIndex::Low,
    },
    Scenario {
        id: "worst-case",
        label: "Worst-case (highest cost)",
        cost_index: CostIndex::High,
    },
    Scenario {
        id: "conservative",
        label: "Conservative",
        cost_index: CostIndex::High,
    },
];

pub fn scenarios() -> &'static [Scenario] {
    &SCENARIOS
}

pub fn resolve_scenario(id: &str) -> Result<&'static Scenario, CalcError> {
    let wanted = id.trim();
    SCENARIOS
        .iter()
        .find(|scenario| scenario.id.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| CalcError::InvalidScenario(wanted.to_string()))
}

pub fn scenario_cost_index(id: &str) -> Result<CostIndex, CalcError> {
    resolve_scenario(id).map(|scenario| scenario.cost_index)
}
