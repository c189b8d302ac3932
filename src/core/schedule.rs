use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePoint {
    pub years_since_start: u32,
    pub amount: f64,
}

/// A grant type issued as one batch of awards per year, each batch spending
/// down over the same multi-year curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortProgram {
    pub first_cohort_year: u32,
    pub cohorts_per_year: u32,
    pub spend_curve: Vec<CurvePoint>,
    pub staff_per_award: f64,
}

impl CohortProgram {
    /// Curve amounts must be non-negative.
    pub fn new(first_cohort_year: u32, cohorts_per_year: u32, amounts: &[f64]) -> Self {
        debug_assert!(
            amounts.iter().all(|&amount| amount >= 0.0),
            "curve amounts must be non-negative: {amounts:?}"
        );
        let spend_curve = (0_u32..)
            .zip(amounts)
            .map(|(years_since_start, &amount)| CurvePoint {
                years_since_start,
                amount,
            })
            .collect();
        Self {
            first_cohort_year,
            cohorts_per_year,
            spend_curve,
            staff_per_award: 0.0,
        }
    }

    pub fn with_staff_per_award(mut self, staff: f64) -> Self {
        debug_assert!(staff >= 0.0, "staff per award must be non-negative: {staff}");
        self.staff_per_award = staff;
        self
    }

    fn curve_amount(&self, years_since_start: u32) -> Option<f64> {
        self.spend_curve
            .iter()
            .find(|p| p.years_since_start == years_since_start)
            .map(|p| p.amount)
    }

    fn cohort_offsets(&self, year: u32) -> impl Iterator<Item = u32> + '_ {
        (self.first_cohort_year..=year).map(move |c| year - c)
    }

    /// Spend in `year` summed over every cohort issued so far.
    pub fn spend(&self, year: u32) -> f64 {
        let per_cohort_sum: f64 = self
            .cohort_offsets(year)
            .filter_map(|diff| self.curve_amount(diff))
            .sum();
        per_cohort_sum * self.cohorts_per_year as f64
    }

    /// Number of cohort years still drawing on their curve in `year`.
    pub fn active_cohorts(&self, year: u32) -> u32 {
        self.cohort_offsets(year)
            .filter(|&diff| self.curve_amount(diff).is_some())
            .count() as u32
    }

    pub fn value_per_cohort(&self) -> f64 {
        self.spend_curve.iter().map(|p| p.amount).sum()
    }

    /// Allocation made when the year's cohorts are awarded.
    pub fn new_allocation(&self, year: u32) -> f64 {
        if year < self.first_cohort_year {
            return 0.0;
        }
        self.cohorts_per_year as f64 * self.value_per_cohort()
    }

    /// Cohorts simultaneously active once issuance has run longer than one curve.
    pub fn steady_state_overlap(&self) -> u32 {
        self.spend_curve
            .iter()
            .map(|p| p.years_since_start + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn steady_state_spend(&self) -> f64 {
        self.cohorts_per_year as f64 * self.value_per_cohort()
    }

    pub fn employees(&self, year: u32) -> f64 {
        self.active_cohorts(year) as f64 * self.cohorts_per_year as f64 * self.staff_per_award
    }

    pub fn steady_state_employees(&self) -> f64 {
        self.steady_state_overlap() as f64 * self.cohorts_per_year as f64 * self.staff_per_award
    }
}
