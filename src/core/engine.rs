use super::programs::ProgramSet;
use super::types::{
    AccrualPolicy, BudgetYear, ClawbackRule, EPSILON, Parameters, Scenario, Status, Timeline,
    TimelineAssessment, YearRecord,
};

/// Balances carried from one year into the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balances {
    pub accrual: f64,
    pub allocated_unspent: f64,
}

impl Balances {
    pub fn opening(scenario: &Scenario) -> Self {
        Self {
            accrual: scenario.starting_accrual,
            allocated_unspent: scenario.starting_allocated_unspent,
        }
    }

    fn carried_from(record: &YearRecord, policy: AccrualPolicy) -> Self {
        let accrual = match policy {
            AccrualPolicy::AllowNegative => record.accrual_out,
            AccrualPolicy::FloorAtZero => record.accrual_out.max(0.0),
        };
        Self {
            accrual,
            allocated_unspent: record.allocated_unspent_out,
        }
    }
}

pub fn run_timeline(params: &Parameters) -> Timeline {
    simulate(params, &Scenario::for_version(params.version))
}

/// Folds the year transition over every scenario year, one record per year in order.
pub fn simulate(params: &Parameters, scenario: &Scenario) -> Timeline {
    let programs = ProgramSet::for_scenario(params, scenario);
    let years = scenario
        .years
        .iter()
        .enumerate()
        .scan(Balances::opening(scenario), |balances, (idx, budget_year)| {
            let record = step(*balances, *budget_year, idx == 0, &programs, scenario);
            *balances = Balances::carried_from(&record, scenario.accrual_policy);
            Some(record)
        })
        .collect();
    Timeline { years }
}

/// One year of the recurrence. Infeasibility and clawback are recorded, never corrected.
pub fn step(
    opening: Balances,
    budget_year: BudgetYear,
    is_opening_year: bool,
    programs: &ProgramSet,
    scenario: &Scenario,
) -> YearRecord {
    let BudgetYear { year, budget } = budget_year;
    let spend = programs.spend(year);
    let total_spend = spend.total();
    let new_allocations = programs.total_new_allocation(year);

    let available = opening.accrual + budget;
    let feasible = total_spend <= available + EPSILON;
    let accrual_out = available - total_spend;
    let allocated_unspent_out = opening.allocated_unspent + new_allocations - total_spend;

    let budget_shortfall = opening.allocated_unspent + new_allocations < budget - EPSILON;
    let opening_shortfall = scenario.clawback_rule
        == ClawbackRule::BudgetMatchWithOpeningCommitment
        && is_opening_year
        && allocated_unspent_out + total_spend < scenario.starting_accrual - EPSILON;
    let clawback_amount = if budget_shortfall {
        (budget - opening.allocated_unspent - new_allocations).max(0.0)
    } else if opening_shortfall {
        (scenario.starting_accrual - allocated_unspent_out - total_spend).max(0.0)
    } else {
        0.0
    };

    YearRecord {
        year,
        accrual_in: opening.accrual,
        budget,
        available,
        spend,
        total_spend,
        headroom: available - total_spend,
        allocated_unspent_in: opening.allocated_unspent,
        new_allocations,
        accrual_out,
        allocated_unspent_out,
        feasible,
        clawback_risk: budget_shortfall || opening_shortfall,
        clawback_amount,
        active_cohorts: programs.active_cohorts(year),
        employees: programs.employees(year),
    }
}

pub fn assess_timeline(
    params: &Parameters,
    scenario: &Scenario,
    timeline: &Timeline,
) -> TimelineAssessment {
    let steady_state_spend = ProgramSet::from_parameters(params).steady_state_spend();
    let steady_state_ceiling = scenario.steady_state_ceiling();
    let steady_state_ok = steady_state_spend <= steady_state_ceiling + EPSILON;
    let all_feasible = timeline.all_feasible();
    let no_clawback = !timeline.any_clawback();
    let binding_year = timeline.binding_year();

    let status = if !steady_state_ok {
        Status::SteadyStateExceeded
    } else if let Some(year) = binding_year {
        Status::Infeasible { year }
    } else if no_clawback {
        Status::Sustainable
    } else {
        Status::ClawbackRisk
    };

    TimelineAssessment {
        all_feasible,
        no_clawback,
        binding_year,
        steady_state_spend,
        steady_state_ceiling,
        steady_state_ok,
        status,
    }
}
