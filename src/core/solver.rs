use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use tracing::debug;

use super::engine::simulate;
use super::error::ModelError;
use super::programs::ProgramSet;
use super::types::{
    EPSILON, FeasibleCombination, MAX_ACCELERATOR_COHORTS, MAX_INCUBATOR_COHORTS, Parameters,
    Scenario, SearchResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub accelerator_range: RangeInclusive<u32>,
    pub incubator_range: RangeInclusive<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            accelerator_range: 0..=MAX_ACCELERATOR_COHORTS,
            incubator_range: 0..=MAX_INCUBATOR_COHORTS,
        }
    }
}

/// Searches the default cohort-count grid for the version of `base`.
/// Capital and UG research are held at the values in `base`.
pub fn run_feasibility_search(base: &Parameters) -> SearchResult {
    let scenario = Scenario::for_version(base.version);
    enumerate(base, &scenario, &SearchConfig::default())
}

pub fn search(
    base: &Parameters,
    scenario: &Scenario,
    config: &SearchConfig,
) -> Result<SearchResult, ModelError> {
    validate_config(config)?;
    Ok(enumerate(base, scenario, config))
}

fn enumerate(base: &Parameters, scenario: &Scenario, config: &SearchConfig) -> SearchResult {
    let mut candidates = 0_u32;
    let mut feasible = Vec::new();
    for accelerator_cohorts in config.accelerator_range.clone() {
        for incubator_cohorts in config.incubator_range.clone() {
            candidates += 1;
            let params = base.with_counts(accelerator_cohorts, incubator_cohorts);
            if is_feasible(&params, scenario) {
                feasible.push(FeasibleCombination {
                    accelerator_cohorts,
                    incubator_cohorts,
                });
            }
        }
    }

    let pareto = pareto_frontier(&feasible);
    debug!(
        version = %base.version,
        candidates,
        feasible = feasible.len(),
        frontier = pareto.len(),
        "feasibility search complete"
    );

    SearchResult { feasible, pareto }
}

/// Feasible in every simulated year and within the steady-state ceiling.
pub fn is_feasible(params: &Parameters, scenario: &Scenario) -> bool {
    let steady = ProgramSet::from_parameters(params).steady_state_spend();
    if steady > scenario.steady_state_ceiling() + EPSILON {
        return false;
    }
    simulate(params, scenario).all_feasible()
}

/// Highest incubator count per accelerator count, ascending by accelerator count.
/// The first combination seen wins a tie.
pub fn pareto_frontier(combinations: &[FeasibleCombination]) -> Vec<FeasibleCombination> {
    let mut best: BTreeMap<u32, FeasibleCombination> = BTreeMap::new();
    for combo in combinations {
        best.entry(combo.accelerator_cohorts)
            .and_modify(|current| {
                if combo.incubator_cohorts > current.incubator_cohorts {
                    *current = *combo;
                }
            })
            .or_insert(*combo);
    }
    best.into_values().collect()
}

fn validate_config(config: &SearchConfig) -> Result<(), ModelError> {
    if config.accelerator_range.is_empty() {
        return Err(ModelError::EmptySearchRange {
            axis: "accelerator",
        });
    }
    if config.incubator_range.is_empty() {
        return Err(ModelError::EmptySearchRange { axis: "incubator" });
    }
    Ok(())
}
