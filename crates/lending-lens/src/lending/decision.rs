use super::domain::{Decision, DecisionedLoan, LoanRecord, Thresholds};

/// How decisions are produced for a batch of records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionMode {
    /// Replay the decision stored with each record.
    Historical,
    /// Recompute decisions with the refusal rule at the given thresholds.
    Simulation(Thresholds),
}

/// Simulation refusal rule: a score strictly above its threshold on either axis refuses.
pub fn refuses_above_either(record: &LoanRecord, thresholds: Thresholds) -> bool {
    record.default_score > thresholds.default_threshold
        || record.refusal_score > thresholds.refusal_threshold
}

/// Grid acceptance rule: both scores at or below their thresholds accepts.
///
/// For finite scores this agrees with `!refuses_above_either`; the sweep engine
/// depends on this function only.
pub fn accepts_within_both(record: &LoanRecord, thresholds: Thresholds) -> bool {
    record.default_score <= thresholds.default_threshold
        && record.refusal_score <= thresholds.refusal_threshold
}

pub fn simulate(record: &LoanRecord, thresholds: Thresholds) -> Decision {
    if refuses_above_either(record, thresholds) {
        Decision::Refuse
    } else {
        Decision::Accept
    }
}

pub fn historical(record: &LoanRecord) -> Decision {
    record
        .historical_decision
        .map(Decision::from)
        .unwrap_or(Decision::Unknown)
}

/// Stateless evaluator that applies a [`DecisionMode`] to records.
#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    mode: DecisionMode,
}

impl DecisionEngine {
    pub fn new(mode: DecisionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    pub fn decide(&self, record: &LoanRecord) -> Decision {
        match self.mode {
            DecisionMode::Historical => historical(record),
            DecisionMode::Simulation(thresholds) => simulate(record, thresholds),
        }
    }

    pub fn evaluate<'a>(&self, record: &'a LoanRecord) -> DecisionedLoan<'a> {
        DecisionedLoan {
            record,
            decision: self.decide(record),
        }
    }

    pub fn evaluate_all<'a, I>(&self, records: I) -> Vec<DecisionedLoan<'a>>
    where
        I: IntoIterator<Item = &'a LoanRecord>,
    {
        records
            .into_iter()
            .map(|record| self.evaluate(record))
            .collect()
    }
}
