use thiserror::Error;

use crate::types::{Contaminant, Medium, ReceptorType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("unknown scenario: {0}")]
    InvalidScenario(String),

    #[error("no {medium} treatment method with id {id:?}")]
    NotFound { medium: Medium, id: String },

    #[error("no {} threshold for {contaminant}", receptor.label())]
    MissingThreshold {
        receptor: ReceptorType,
        contaminant: Contaminant,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

impl CalcError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidScenario(_) => "invalid_scenario",
            Self::NotFound { .. } => "not_found",
            Self::MissingThreshold { .. } => "missing_threshold",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidCatalog(_) => "invalid_catalog",
        }
    }
}
