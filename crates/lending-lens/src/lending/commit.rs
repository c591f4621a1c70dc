//! Capability gate for persisting threshold pairs.
//!
//! A [`ThresholdRepository`] only accepts writes accompanied by a
//! [`CommitPermit`], and the only way to obtain one is through
//! [`CommitAuthority::authorize`].

use super::domain::Thresholds;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    #[error("threshold commits are disabled")]
    Disabled,
    #[error("commit key rejected")]
    Rejected,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Proof that a caller passed the commit check.
#[derive(Debug)]
pub struct CommitPermit {
    _issued: (),
}

/// Holds the configured commit key; without one every request is refused.
#[derive(Clone, Default)]
pub struct CommitAuthority {
    key: Option<String>,
}

impl std::fmt::Debug for CommitAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitAuthority")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl CommitAuthority {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn authorize(&self, presented: &str) -> Result<CommitPermit, CommitError> {
        let Some(expected) = &self.key else {
            return Err(CommitError::Disabled);
        };
        if keys_match(expected.as_bytes(), presented.as_bytes()) {
            Ok(CommitPermit { _issued: () })
        } else {
            warn!("threshold commit refused");
            Err(CommitError::Rejected)
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(expected: &[u8], presented: &[u8]) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    expected
        .iter()
        .zip(presented)
        .fold(0u8, |diff, (left, right)| diff | (left ^ right))
        == 0
}

/// A threshold pair as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommittedThresholds {
    pub thresholds: Thresholds,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("threshold store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the production threshold pair.
pub trait ThresholdRepository: Send + Sync {
    fn current(&self) -> Result<Option<CommittedThresholds>, RepositoryError>;
    fn commit(
        &self,
        permit: &CommitPermit,
        thresholds: Thresholds,
    ) -> Result<CommittedThresholds, RepositoryError>;
}

/// Authorizes then writes; logs the committed pair.
pub fn commit_thresholds<R>(
    authority: &CommitAuthority,
    repository: &R,
    presented_key: &str,
    thresholds: Thresholds,
) -> Result<CommittedThresholds, CommitError>
where
    R: ThresholdRepository + ?Sized,
{
    let permit = authority.authorize(presented_key)?;
    let committed = repository.commit(&permit, thresholds)?;
    info!(
        default_threshold = committed.thresholds.default_threshold,
        refusal_threshold = committed.thresholds.refusal_threshold,
        "thresholds committed"
    );
    Ok(committed)
}
