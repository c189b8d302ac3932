use serde::Serialize;

use super::schedule::CohortProgram;
use super::types::{ActiveCohorts, FIRST_YEAR, ModelVersion, Parameters, Scenario, SpendBreakdown};

const ACCELERATOR_CURVE: [f64; 4] = [0.075, 0.15, 0.15, 0.075];
const ACCELERATOR_FIRST_COHORT: u32 = 2026;
const ACCELERATOR_STAFF_PER_AWARD: f64 = 1.5;

const INCUBATOR_CURVE: [f64; 3] = [0.05, 0.05, 0.05];
const INCUBATOR_FIRST_COHORT: u32 = 2027;
const INCUBATOR_STAFF_PER_AWARD: f64 = 0.5;

const STARTUP_AWARDS_PER_YEAR: f64 = 3.0;
const STARTUP_AWARD_RATE: f64 = 0.025;
const STARTUP_FIRST_COHORT: u32 = 2026;

const V1_SEED_ALLOCATED: f64 = 2.0;
const V1_SEED_ANNUAL: f64 = 1.0;
const V1_SEED_LAST_YEAR: u32 = 2027;

const V2_SEED_ALLOCATED: f64 = 1.12;
const V2_SEED_ADDITIONAL: f64 = 1.85;
const V2_SEED_MONTHS: f64 = 30.0;
const V2_SEED_MONTHS_BY_YEAR: [f64; 3] = [12.0, 12.0, 6.0];

/// Seed funding already committed before the first cohort: one award with a
/// fixed spend schedule from the first simulated year.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProgram {
    pub start_year: u32,
    pub allocated: f64,
    pub spend_by_year: Vec<f64>,
}

impl SeedProgram {
    pub fn for_version(version: ModelVersion) -> Self {
        match version {
            ModelVersion::V1 => {
                let years = (V1_SEED_LAST_YEAR + 1).saturating_sub(FIRST_YEAR) as usize;
                Self {
                    start_year: FIRST_YEAR,
                    allocated: V1_SEED_ALLOCATED,
                    spend_by_year: vec![V1_SEED_ANNUAL; years],
                }
            }
            ModelVersion::V2 => {
                let allocated = V2_SEED_ALLOCATED + V2_SEED_ADDITIONAL;
                let monthly = allocated / V2_SEED_MONTHS;
                Self {
                    start_year: FIRST_YEAR,
                    allocated,
                    spend_by_year: V2_SEED_MONTHS_BY_YEAR
                        .iter()
                        .map(|months| months * monthly)
                        .collect(),
                }
            }
        }
    }

    pub fn total(&self) -> f64 {
        self.allocated
    }

    pub fn spend(&self, year: u32) -> f64 {
        year.checked_sub(self.start_year)
            .and_then(|offset| self.spend_by_year.get(offset as usize))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Central staffing allowance billed per employee of active awards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralAllowance {
    pub regular_rate: f64,
    pub premium_rate: f64,
    pub employees_per_premium: f64,
}

impl Default for CentralAllowance {
    fn default() -> Self {
        Self {
            regular_rate: 0.008,
            premium_rate: 0.030,
            employees_per_premium: 10.0,
        }
    }
}

impl CentralAllowance {
    pub fn for_employees(&self, employees: f64) -> f64 {
        let employees = employees.max(0.0);
        let premium = (employees / self.employees_per_premium).floor();
        let regular = employees - premium;
        regular * self.regular_rate + premium * self.premium_rate
    }
}

/// Undergraduate research runs at a flat annual rate, half of it in the
/// opening year because the program starts mid-year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UgResearch {
    pub annual: f64,
    pub start_year: u32,
}

impl UgResearch {
    pub fn spend(&self, year: u32) -> f64 {
        if year < self.start_year {
            0.0
        } else if year == self.start_year {
            self.annual / 2.0
        } else {
            self.annual
        }
    }
}

/// Every spend category of a model version with the tunable counts applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSet {
    pub seed: SeedProgram,
    pub capital: f64,
    pub ug_research: Option<UgResearch>,
    pub accelerator: CohortProgram,
    pub incubator: CohortProgram,
    pub startup: Option<CohortProgram>,
    pub central_allowance: Option<CentralAllowance>,
}

impl ProgramSet {
    pub fn from_parameters(params: &Parameters) -> Self {
        let accelerator = CohortProgram::new(
            ACCELERATOR_FIRST_COHORT,
            params.accelerator_cohorts,
            &ACCELERATOR_CURVE,
        )
        .with_staff_per_award(ACCELERATOR_STAFF_PER_AWARD);
        let incubator = CohortProgram::new(
            INCUBATOR_FIRST_COHORT,
            params.incubator_cohorts,
            &INCUBATOR_CURVE,
        )
        .with_staff_per_award(INCUBATOR_STAFF_PER_AWARD);
        let seed = SeedProgram::for_version(params.version);

        match params.version {
            ModelVersion::V1 => Self {
                seed,
                capital: params.capital,
                ug_research: None,
                accelerator,
                incubator,
                startup: None,
                central_allowance: None,
            },
            ModelVersion::V2 => {
                let startup_rate = STARTUP_AWARDS_PER_YEAR * STARTUP_AWARD_RATE;
                Self {
                    seed,
                    capital: params.capital,
                    ug_research: Some(UgResearch {
                        annual: params.ug_research,
                        start_year: FIRST_YEAR,
                    }),
                    accelerator,
                    incubator,
                    startup: Some(CohortProgram::new(
                        STARTUP_FIRST_COHORT,
                        1,
                        &[startup_rate, startup_rate],
                    )),
                    central_allowance: Some(CentralAllowance::default()),
                }
            }
        }
    }

    /// As `from_parameters`, with the seed and UG research schedules starting in
    /// the scenario's first budget year.
    pub fn for_scenario(params: &Parameters, scenario: &Scenario) -> Self {
        let mut programs = Self::from_parameters(params);
        if let Some(first_year) = scenario.first_year() {
            programs.seed.start_year = first_year;
            if let Some(ug) = programs.ug_research.as_mut() {
                ug.start_year = first_year;
            }
        }
        programs
    }

    fn cohort_programs(&self) -> impl Iterator<Item = &CohortProgram> {
        [&self.accelerator, &self.incubator]
            .into_iter()
            .chain(self.startup.as_ref())
    }

    pub fn active_cohorts(&self, year: u32) -> ActiveCohorts {
        ActiveCohorts {
            accelerator: self.accelerator.active_cohorts(year),
            incubator: self.incubator.active_cohorts(year),
            startup: self
                .startup
                .as_ref()
                .map(|p| p.active_cohorts(year))
                .unwrap_or(0),
        }
    }

    pub fn employees(&self, year: u32) -> f64 {
        self.cohort_programs().map(|p| p.employees(year)).sum()
    }

    fn central_allowance(&self, employees: f64) -> f64 {
        self.central_allowance
            .map(|allowance| allowance.for_employees(employees))
            .unwrap_or(0.0)
    }

    fn ug_research_spend(&self, year: u32) -> f64 {
        self.ug_research.map(|ug| ug.spend(year)).unwrap_or(0.0)
    }

    pub fn spend(&self, year: u32) -> SpendBreakdown {
        SpendBreakdown {
            seed: self.seed.spend(year),
            capital: self.capital,
            ug_research: self.ug_research_spend(year),
            accelerator: self.accelerator.spend(year),
            incubator: self.incubator.spend(year),
            startup: self
                .startup
                .as_ref()
                .map(|p| p.spend(year))
                .unwrap_or(0.0),
            central_allowance: self.central_allowance(self.employees(year)),
        }
    }

    pub fn total_spend(&self, year: u32) -> f64 {
        self.spend(year).total()
    }

    /// New-cohort award values plus the categories allocated and spent in the same year.
    pub fn total_new_allocation(&self, year: u32) -> f64 {
        let cohorts: f64 = self.cohort_programs().map(|p| p.new_allocation(year)).sum();
        cohorts
            + self.capital
            + self.ug_research_spend(year)
            + self.central_allowance(self.employees(year))
    }

    /// Annual spend once every cohort program has reached its full overlap,
    /// derived from curve totals rather than simulation.
    pub fn steady_state_spend(&self) -> f64 {
        let cohorts: f64 = self.cohort_programs().map(|p| p.steady_state_spend()).sum();
        let employees: f64 = self
            .cohort_programs()
            .map(|p| p.steady_state_employees())
            .sum();
        let ug = self.ug_research.map(|ug| ug.annual).unwrap_or(0.0);
        self.capital + ug + cohorts + self.central_allowance(employees)
    }
}
