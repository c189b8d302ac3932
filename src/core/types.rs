use std::fmt;

use serde::Serialize;

use super::error::ModelError;

/// Tolerance used for every feasibility and clawback comparison, in millions.
pub const EPSILON: f64 = 0.001;

pub const FIRST_YEAR: u32 = 2026;
pub const STARTING_ACCRUAL: f64 = 4.70;

pub const MAX_ACCELERATOR_COHORTS: u32 = 12;
pub const MAX_INCUBATOR_COHORTS: u32 = 30;
pub const MAX_CAPITAL: f64 = 2.0;
pub const MAX_UG_RESEARCH: f64 = 0.5;

const V1_BUDGETS: [f64; 7] = [0.0, 1.0, 3.0, 5.0, 5.0, 5.0, 5.0];
const V2_BUDGETS: [f64; 7] = [0.0, 1.0, 4.0, 5.0, 5.0, 5.0, 5.0];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    V1,
    V2,
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVersion::V1 => f.write_str("version 1"),
            ModelVersion::V2 => f.write_str("version 2"),
        }
    }
}

/// How a negative closing accrual is carried into the next year.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccrualPolicy {
    AllowNegative,
    FloorAtZero,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClawbackRule {
    /// Risk when allocated-unspent plus new allocations cannot match the budget tranche.
    BudgetMatch,
    /// As `BudgetMatch`, plus a shortfall test against the opening accrual in the first year.
    BudgetMatchWithOpeningCommitment,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub version: ModelVersion,
    pub accelerator_cohorts: u32,
    pub incubator_cohorts: u32,
    pub capital: f64,
    pub ug_research: f64,
}

impl Parameters {
    pub fn configure(
        version: ModelVersion,
        accelerator_cohorts: u32,
        incubator_cohorts: u32,
        capital: Option<f64>,
        ug_research: Option<f64>,
    ) -> Result<Self, ModelError> {
        if accelerator_cohorts > MAX_ACCELERATOR_COHORTS {
            return Err(ModelError::CohortCountOutOfRange {
                program: "accelerator",
                value: accelerator_cohorts,
                max: MAX_ACCELERATOR_COHORTS,
            });
        }
        if incubator_cohorts > MAX_INCUBATOR_COHORTS {
            return Err(ModelError::CohortCountOutOfRange {
                program: "incubator",
                value: incubator_cohorts,
                max: MAX_INCUBATOR_COHORTS,
            });
        }

        let defaults = Self::defaults(version);
        let capital = match capital {
            Some(v) => validate_amount("capital", v, MAX_CAPITAL)?,
            None => defaults.capital,
        };
        let ug_research = match (version, ug_research) {
            (ModelVersion::V1, Some(_)) => {
                return Err(ModelError::UnsupportedProgram {
                    program: "undergraduate research",
                    version,
                });
            }
            (ModelVersion::V2, Some(v)) => validate_amount("ug research", v, MAX_UG_RESEARCH)?,
            (_, None) => defaults.ug_research,
        };

        Ok(Self {
            version,
            accelerator_cohorts,
            incubator_cohorts,
            capital,
            ug_research,
        })
    }

    pub fn defaults(version: ModelVersion) -> Self {
        match version {
            ModelVersion::V1 => Self {
                version,
                accelerator_cohorts: 5,
                incubator_cohorts: 5,
                capital: 0.5,
                ug_research: 0.0,
            },
            ModelVersion::V2 => Self {
                version,
                accelerator_cohorts: 4,
                incubator_cohorts: 12,
                capital: 0.35,
                ug_research: 0.1,
            },
        }
    }

    pub fn with_counts(self, accelerator_cohorts: u32, incubator_cohorts: u32) -> Self {
        Self {
            accelerator_cohorts,
            incubator_cohorts,
            ..self
        }
    }
}

fn validate_amount(field: &'static str, value: f64, max: f64) -> Result<f64, ModelError> {
    if !value.is_finite() || !(0.0..=max).contains(&value) {
        return Err(ModelError::AmountOutOfRange { field, value, max });
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetYear {
    pub year: u32,
    pub budget: f64,
}

/// Fixed calendar, budget table and version-gated policies a timeline runs against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub years: Vec<BudgetYear>,
    pub starting_accrual: f64,
    pub starting_allocated_unspent: f64,
    pub accrual_policy: AccrualPolicy,
    pub clawback_rule: ClawbackRule,
}

impl Scenario {
    pub fn for_version(version: ModelVersion) -> Self {
        let (budgets, accrual_policy, clawback_rule) = match version {
            ModelVersion::V1 => (
                V1_BUDGETS,
                AccrualPolicy::AllowNegative,
                ClawbackRule::BudgetMatch,
            ),
            ModelVersion::V2 => (
                V2_BUDGETS,
                AccrualPolicy::FloorAtZero,
                ClawbackRule::BudgetMatchWithOpeningCommitment,
            ),
        };
        let years = (FIRST_YEAR..)
            .zip(budgets)
            .map(|(year, budget)| BudgetYear { year, budget })
            .collect();

        Self {
            years,
            starting_accrual: STARTING_ACCRUAL,
            starting_allocated_unspent: super::programs::SeedProgram::for_version(version)
                .total(),
            accrual_policy,
            clawback_rule,
        }
    }

    /// Replaces the budget table. Years must be consecutive and budgets non-negative.
    pub fn with_budgets(self, budgets: &[(u32, f64)]) -> Result<Self, ModelError> {
        if budgets.is_empty() {
            return Err(ModelError::EmptyBudgetTable);
        }
        for pair in budgets.windows(2) {
            let (previous, _) = pair[0];
            let (year, _) = pair[1];
            if previous.checked_add(1) != Some(year) {
                return Err(ModelError::NonConsecutiveBudgetYear { previous, year });
            }
        }
        if let Some(&(year, value)) = budgets
            .iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(ModelError::InvalidBudget { year, value });
        }

        Ok(Self {
            years: budgets
                .iter()
                .map(|&(year, budget)| BudgetYear { year, budget })
                .collect(),
            ..self
        })
    }

    pub fn first_year(&self) -> Option<u32> {
        self.years.first().map(|y| y.year)
    }

    /// Budget of the final year, used as the steady-state ceiling.
    pub fn steady_state_ceiling(&self) -> f64 {
        self.years.last().map(|y| y.budget).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendBreakdown {
    pub seed: f64,
    pub capital: f64,
    pub ug_research: f64,
    pub accelerator: f64,
    pub incubator: f64,
    pub startup: f64,
    pub central_allowance: f64,
}

impl SpendBreakdown {
    pub fn total(&self) -> f64 {
        self.seed
            + self.capital
            + self.ug_research
            + self.accelerator
            + self.incubator
            + self.startup
            + self.central_allowance
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCohorts {
    pub accelerator: u32,
    pub incubator: u32,
    pub startup: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub accrual_in: f64,
    pub budget: f64,
    pub available: f64,
    pub spend: SpendBreakdown,
    pub total_spend: f64,
    pub headroom: f64,
    pub allocated_unspent_in: f64,
    pub new_allocations: f64,
    pub accrual_out: f64,
    pub allocated_unspent_out: f64,
    pub feasible: bool,
    pub clawback_risk: bool,
    pub clawback_amount: f64,
    pub active_cohorts: ActiveCohorts,
    pub employees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    pub years: Vec<YearRecord>,
}

impl Timeline {
    pub fn all_feasible(&self) -> bool {
        self.years.iter().all(|r| r.feasible)
    }

    pub fn any_clawback(&self) -> bool {
        self.years.iter().any(|r| r.clawback_risk)
    }

    /// First year whose spend exceeds the available funds.
    pub fn binding_year(&self) -> Option<u32> {
        self.years.iter().find(|r| !r.feasible).map(|r| r.year)
    }

    pub fn terminal(&self) -> Option<&YearRecord> {
        self.years.last()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Status {
    Sustainable,
    ClawbackRisk,
    Infeasible { year: u32 },
    SteadyStateExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineAssessment {
    pub all_feasible: bool,
    pub no_clawback: bool,
    pub binding_year: Option<u32>,
    pub steady_state_spend: f64,
    pub steady_state_ceiling: f64,
    pub steady_state_ok: bool,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibleCombination {
    pub accelerator_cohorts: u32,
    pub incubator_cohorts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub feasible: Vec<FeasibleCombination>,
    pub pareto: Vec<FeasibleCombination>,
}
