use super::types::ModelVersion;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("{program} cohorts per year must be between 0 and {max}, got {value}")]
    CohortCountOutOfRange {
        program: &'static str,
        value: u32,
        max: u32,
    },

    #[error("{field} must be a finite amount between 0 and {max}, got {value}")]
    AmountOutOfRange {
        field: &'static str,
        value: f64,
        max: f64,
    },

    #[error("{program} is not part of the {version} model")]
    UnsupportedProgram {
        program: &'static str,
        version: ModelVersion,
    },

    #[error("search range for {axis} is empty")]
    EmptySearchRange { axis: &'static str },

    #[error("budget table must contain at least one year")]
    EmptyBudgetTable,

    #[error("budget years must be consecutive, {previous} is followed by {year}")]
    NonConsecutiveBudgetYear { previous: u32, year: u32 },

    #[error("budget for {year} must be finite and >= 0, got {value}")]
    InvalidBudget { year: u32, value: f64 },
}
