mod engine;
mod error;
mod programs;
mod schedule;
mod solver;
mod types;

pub use engine::{Balances, assess_timeline, run_timeline, simulate, step};
pub use error::ModelError;
pub use programs::{CentralAllowance, ProgramSet, SeedProgram, UgResearch};
pub use schedule::{CohortProgram, CurvePoint};
pub use solver::{SearchConfig, is_feasible, pareto_frontier, run_feasibility_search, search};
pub use types::{
    AccrualPolicy, ActiveCohorts, BudgetYear, ClawbackRule, EPSILON, FeasibleCombination,
    MAX_ACCELERATOR_COHORTS, MAX_CAPITAL, MAX_INCUBATOR_COHORTS, MAX_UG_RESEARCH, ModelVersion,
    Parameters, Scenario, SearchResult, SpendBreakdown, Status, Timeline, TimelineAssessment,
    YearRecord,
};
