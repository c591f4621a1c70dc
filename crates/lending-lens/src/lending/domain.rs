use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for loan events. Stores emit integers, CSV exports may not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanId(pub String);

impl std::fmt::Display for LoanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decision recorded by the production underwriting flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoricalDecision {
    Accept,
    Refuse,
}

impl HistoricalDecision {
    /// Maps the stored decision text. Anything other than accept/refuse is treated as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "accept" => Some(Self::Accept),
            "refuse" => Some(Self::Refuse),
            _ => None,
        }
    }
}

impl From<HistoricalDecision> for Decision {
    fn from(value: HistoricalDecision) -> Self {
        match value {
            HistoricalDecision::Accept => Decision::Accept,
            HistoricalDecision::Refuse => Decision::Refuse,
        }
    }
}

/// Outcome assigned to a loan under a given mode and threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Refuse,
    Unknown,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Refuse => "refuse",
            Decision::Unknown => "unknown",
        }
    }
}

/// Canonical loan event after normalization. Scores are always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub created_at: DateTime<Utc>,
    pub default_score: f64,
    pub refusal_score: f64,
    pub historical_decision: Option<HistoricalDecision>,
}

/// Pair of risk cut-offs applied by the simulation and grid rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub default_threshold: f64,
    pub refusal_threshold: f64,
}

impl Thresholds {
    /// Builds a pair clamped into `[0, 1]`; non-finite inputs collapse to zero.
    pub fn new(default_threshold: f64, refusal_threshold: f64) -> Self {
        Self {
            default_threshold: clamp_unit(default_threshold),
            refusal_threshold: clamp_unit(refusal_threshold),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            default_threshold: 0.7,
            refusal_threshold: 0.6,
        }
    }
}

/// Forces a score or threshold into `[0, 1]`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Which view the dashboard is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Historical,
    Simulation,
    ThresholdGrid,
}

impl DisplayMode {
    pub const fn label(self) -> &'static str {
        match self {
            DisplayMode::Historical => "historical",
            DisplayMode::Simulation => "simulation",
            DisplayMode::ThresholdGrid => "threshold_grid",
        }
    }
}

/// A record paired with the decision computed for it. Never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionedLoan<'a> {
    pub record: &'a LoanRecord,
    pub decision: Decision,
}
