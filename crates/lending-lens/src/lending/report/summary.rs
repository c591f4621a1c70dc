use super::super::calendar::MonthKey;
use super::super::domain::{Decision, DecisionedLoan};
use super::views::{MonthlyStatView, Trend};
use serde::Serialize;
use std::collections::BTreeMap;

/// Share of `part` in `whole` as a percentage; an empty denominator yields 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Amount-weighted counterpart of [`percentage`].
pub fn percentage_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Totals across every decided loan, unknown decisions included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverallSummary {
    pub total: usize,
    pub accepted: usize,
    pub refused: usize,
    pub unknown: usize,
    pub acceptance_rate: f64,
}

impl OverallSummary {
    /// Loans with an accept or refuse decision.
    pub fn decided(&self) -> usize {
        self.accepted + self.refused
    }

    pub fn refusal_rate(&self) -> f64 {
        percentage(self.refused, self.decided())
    }
}

/// Counts for one calendar month. `total == accepted + refused`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStat {
    pub month: MonthKey,
    pub total: usize,
    pub accepted: usize,
    pub refused: usize,
    pub acceptance_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionReport {
    pub overall: OverallSummary,
    pub monthly: Vec<MonthlyStat>,
}

impl DecisionReport {
    /// Monthly rows enriched with display labels and month-over-month trend.
    pub fn monthly_views(&self) -> Vec<MonthlyStatView> {
        let mut previous_rate = None;
        self.monthly
            .iter()
            .map(|stat| {
                let trend =
                    previous_rate.and_then(|previous| Trend::between(stat.acceptance_rate, previous));
                previous_rate = Some(stat.acceptance_rate);
                MonthlyStatView {
                    month: stat.month,
                    month_label: stat.month.label(),
                    total: stat.total,
                    accepted: stat.accepted,
                    refused: stat.refused,
                    acceptance_rate: stat.acceptance_rate,
                    trend,
                }
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MonthTally {
    accepted: usize,
    refused: usize,
}

/// Folds decided loans into overall and per-month statistics.
///
/// Unknown decisions only increment the overall `unknown` count; they never
/// open a month bucket. Months come out in ascending key order regardless of
/// input order.
pub fn aggregate<'a, I>(loans: I) -> DecisionReport
where
    I: IntoIterator<Item = DecisionedLoan<'a>>,
{
    let mut overall = OverallSummary::default();
    let mut months: BTreeMap<MonthKey, MonthTally> = BTreeMap::new();

    for loan in loans {
        overall.total += 1;
        match loan.decision {
            Decision::Unknown => overall.unknown += 1,
            Decision::Accept => {
                overall.accepted += 1;
                months
                    .entry(MonthKey::of(&loan.record.created_at))
                    .or_default()
                    .accepted += 1;
            }
            Decision::Refuse => {
                overall.refused += 1;
                months
                    .entry(MonthKey::of(&loan.record.created_at))
                    .or_default()
                    .refused += 1;
            }
        }
    }

    overall.acceptance_rate = percentage(overall.accepted, overall.decided());

    let monthly = months
        .into_iter()
        .map(|(month, tally)| {
            let total = tally.accepted + tally.refused;
            MonthlyStat {
                month,
                total,
                accepted: tally.accepted,
                refused: tally.refused,
                acceptance_rate: percentage(tally.accepted, total),
            }
        })
        .collect();

    DecisionReport { overall, monthly }
}
