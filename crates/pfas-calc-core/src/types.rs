use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// PFAS species tracked by the threshold tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Contaminant {
    #[serde(rename = "PFOS")]
    Pfos,
    #[serde(rename = "PFOA")]
    Pfoa,
    #[serde(rename = "PFHxS")]
    Pfhxs,
    #[serde(rename = "PFNA")]
    Pfna,
    #[serde(rename = "PFBS")]
    Pfbs,
    #[serde(rename = "HFPO-DA")]
    HfpoDa,
}

impl Contaminant {
    pub const ALL: [Self; 6] = [
        Self::Pfos,
        Self::Pfoa,
        Self::Pfhxs,
        Self::Pfna,
        Self::Pfbs,
        Self::HfpoDa,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Pfos => "PFOS",
            Self::Pfoa => "PFOA",
            Self::Pfhxs => "PFHxS",
            Self::Pfna => "PFNA",
            Self::Pfbs => "PFBS",
            Self::HfpoDa => "HFPO-DA",
        }
    }
}

impl fmt::Display for Contaminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Contaminant {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CalcError::InvalidInput(format!("unknown contaminant: {trimmed}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Medium {
    Water,
    Soil,
}

impl Medium {
    pub fn label(self) -> &'static str {
        match self {
            Self::Water => "Water",
            Self::Soil => "Soil",
        }
    }

    /// Unit the quantity of this medium is measured in.
    pub fn quantity_unit(self) -> &'static str {
        match self {
            Self::Water => "m³",
            Self::Soil => "t",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Removal moves contaminant mass elsewhere; destruction mineralises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    Removal,
    Destruction,
}

impl Mechanism {
    pub fn label(self) -> &'static str {
        match self {
            Self::Removal => "Removal",
            Self::Destruction => "Destruction",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceptorType {
    DrinkingWater,
    Environmental,
}

impl ReceptorType {
    pub fn label(self) -> &'static str {
        match self {
            Self::DrinkingWater => "Drinking water",
            Self::Environmental => "Environmental",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Pass,
    Exceeds,
}

impl ComplianceStatus {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 1.0 {
            Self::Pass
        } else {
            Self::Exceeds
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Exceeds => "Exceeds",
        }
    }
}
