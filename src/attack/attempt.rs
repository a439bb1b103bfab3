//! Attack attempt records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened when an artifact was replayed or an action performed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Forged token answered with 200
    Bypassed,
    /// Forged token answered with any other status
    Denied { status: u16 },
    /// No response; recorded and skipped
    TransportFailure { cause: String },
    /// Privileged action confirmed by the server
    ActionSucceeded,
    /// Privileged action refused, with the server's message when found
    ActionFailed { reason: String },
    /// Session is valid but lacks the role the action needs
    InsufficientPrivilege,
    /// Form page carried no recognizable anti-forgery value
    AntiForgeryTokenMissing,
    /// Neither success nor failure could be established
    Inconclusive,
    /// Nothing was attempted
    Skipped { reason: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Bypassed | AttemptOutcome::ActionSucceeded)
    }

    pub fn describe(&self) -> String {
        match self {
            AttemptOutcome::Bypassed => "bypassed (200)".to_string(),
            AttemptOutcome::Denied { status } => format!("denied ({})", status),
            AttemptOutcome::TransportFailure { cause } => format!("transport failure: {}", cause),
            AttemptOutcome::ActionSucceeded => "action succeeded".to_string(),
            AttemptOutcome::ActionFailed { reason } => format!("action failed: {}", reason),
            AttemptOutcome::InsufficientPrivilege => "insufficient privilege for action".to_string(),
            AttemptOutcome::AntiForgeryTokenMissing => "could not locate anti-forgery token".to_string(),
            AttemptOutcome::Inconclusive => "inconclusive".to_string(),
            AttemptOutcome::Skipped { reason } => format!("skipped: {}", reason),
        }
    }
}

/// One replay of an artifact against a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackAttempt {
    target_path: String,
    artifact: String,
    attack: String,
    outcome: AttemptOutcome,
    recorded_at: DateTime<Utc>,
}

impl AttackAttempt {
    pub fn new(target_path: &str, artifact: &str, attack: &str, outcome: AttemptOutcome) -> Self {
        Self {
            target_path: target_path.to_string(),
            artifact: artifact.to_string(),
            attack: attack.to_string(),
            outcome,
            recorded_at: Utc::now(),
        }
    }

    pub fn skipped(attack: &str, reason: &str) -> Self {
        Self::new(
            "",
            "",
            attack,
            AttemptOutcome::Skipped {
                reason: reason.to_string(),
            },
        )
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn attack(&self) -> &str {
        &self.attack
    }

    pub fn outcome(&self) -> &AttemptOutcome {
        &self.outcome
    }
}

/// Append-only log of attempts, in the order they were made
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog {
    attempts: Vec<AttackAttempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: AttackAttempt) {
        if attempt.outcome.is_success() {
            tracing::info!(
                path = %attempt.target_path,
                attack = %attempt.attack,
                "{}",
                attempt.outcome.describe()
            );
        } else {
            tracing::debug!(
                path = %attempt.target_path,
                attack = %attempt.attack,
                "{}",
                attempt.outcome.describe()
            );
        }
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[AttackAttempt] {
        &self.attempts
    }

    pub fn successes(&self) -> impl Iterator<Item = &AttackAttempt> {
        self.attempts.iter().filter(|a| a.outcome.is_success())
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn into_vec(self) -> Vec<AttackAttempt> {
        self.attempts
    }
}
