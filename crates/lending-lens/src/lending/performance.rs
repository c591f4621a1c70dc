//! Repayment performance of funded loans, grouped by release month.
//!
//! Cohort rows come from the funded-requests export, which uses PascalCase
//! column names; both spellings deserialize.

use super::calendar::MonthKey;
use super::domain::HistoricalDecision;
use super::report::percentage_of;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (release month, decision) cohort of funded loans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundedCohort {
    #[serde(alias = "LoanReleasedYearMonth")]
    pub release_month: MonthKey,
    #[serde(alias = "MugaDecision")]
    pub decision: HistoricalDecision,
    #[serde(alias = "NbLoans", default)]
    pub loan_count: u64,
    #[serde(alias = "LoanPrincipalAmount")]
    pub principal: f64,
    #[serde(alias = "LoanTotalAmountDue", default)]
    pub total_due: f64,
    #[serde(alias = "RepaymentAmount3M", default)]
    pub repaid_3m: f64,
    #[serde(alias = "RepaymentAmount6M", default)]
    pub repaid_6m: f64,
    #[serde(alias = "RepaymentAmount12M", default)]
    pub repaid_12m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepaymentHorizon {
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl RepaymentHorizon {
    pub const fn months(self) -> u32 {
        match self {
            RepaymentHorizon::ThreeMonths => 3,
            RepaymentHorizon::SixMonths => 6,
            RepaymentHorizon::TwelveMonths => 12,
        }
    }

    /// A horizon is observable once the month's first day plus the horizon is
    /// no later than `today`.
    pub fn has_elapsed(self, month: MonthKey, today: NaiveDate) -> bool {
        month
            .first_day()
            .and_then(|first| first.checked_add_months(Months::new(self.months())))
            .map_or(false, |due| due <= today)
    }
}

/// Principal split and repayment rates (percent of total principal) for a month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPerformance {
    pub month: MonthKey,
    pub loan_count: u64,
    pub accepted_principal: f64,
    pub refused_principal: f64,
    pub total_principal: f64,
    pub total_due: f64,
    /// Amount due per funded loan; 0 for a month without loans.
    pub average_due: f64,
    pub repayment_rate_3m: Option<f64>,
    pub repayment_rate_6m: Option<f64>,
    pub repayment_rate_12m: Option<f64>,
}

#[derive(Debug, Default)]
struct PerformanceTally {
    loan_count: u64,
    accepted_principal: f64,
    refused_principal: f64,
    total_due: f64,
    repaid_3m: f64,
    repaid_6m: f64,
    repaid_12m: f64,
}

/// Folds cohorts into one row per release month, ascending.
pub fn summarize(cohorts: &[FundedCohort], today: NaiveDate) -> Vec<MonthlyPerformance> {
    let mut months: BTreeMap<MonthKey, PerformanceTally> = BTreeMap::new();

    for cohort in cohorts {
        let tally = months.entry(cohort.release_month).or_default();
        tally.loan_count += cohort.loan_count;
        match cohort.decision {
            HistoricalDecision::Accept => tally.accepted_principal += cohort.principal,
            HistoricalDecision::Refuse => tally.refused_principal += cohort.principal,
        }
        tally.total_due += cohort.total_due;
        tally.repaid_3m += cohort.repaid_3m;
        tally.repaid_6m += cohort.repaid_6m;
        tally.repaid_12m += cohort.repaid_12m;
    }

    months
        .into_iter()
        .map(|(month, tally)| {
            let total_principal = tally.accepted_principal + tally.refused_principal;
            let rate = |horizon: RepaymentHorizon, repaid: f64| {
                horizon
                    .has_elapsed(month, today)
                    .then(|| percentage_of(repaid, total_principal))
            };

            MonthlyPerformance {
                month,
                loan_count: tally.loan_count,
                accepted_principal: tally.accepted_principal,
                refused_principal: tally.refused_principal,
                total_principal,
                total_due: tally.total_due,
                average_due: if tally.loan_count > 0 {
                    tally.total_due / tally.loan_count as f64
                } else {
                    0.0
                },
                repayment_rate_3m: rate(RepaymentHorizon::ThreeMonths, tally.repaid_3m),
                repayment_rate_6m: rate(RepaymentHorizon::SixMonths, tally.repaid_6m),
                repayment_rate_12m: rate(RepaymentHorizon::TwelveMonths, tally.repaid_12m),
            }
        })
        .collect()
}
