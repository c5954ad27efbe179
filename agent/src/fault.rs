//! Faults raised while deciding or tracking a match
//!
//! A fault's severity is fixed by its kind when it is raised. The recovery
//! policy reads it back, it never reclassifies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tactician_battle::TrackError;
use thiserror::Error;

/// Tier of a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Substitute an action or carry on with the match
    Recoverable,
    /// Forfeit this match
    MatchFatal,
    /// Stop the process
    ProcessFatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The chosen action is not among the legal ones
    IllegalAction,
    /// Local search finished after the decision deadline
    DeadlineExceeded,
    /// A turn marker arrived out of order
    TurnOrderViolation,
    /// Local state no longer matches what the server expects
    StateDesync,
    /// The server sent something the agent cannot act on
    ProtocolViolation,
    /// Forfeit explicitly requested
    ForcedForfeit,
    /// Any other error escaping a decision
    Unexpected,
    /// An internal invariant broke
    InvariantViolation,
}

impl FaultKind {
    pub fn severity(self) -> Severity {
        match self {
            FaultKind::IllegalAction
            | FaultKind::DeadlineExceeded
            | FaultKind::TurnOrderViolation => Severity::Recoverable,
            FaultKind::StateDesync
            | FaultKind::ProtocolViolation
            | FaultKind::ForcedForfeit
            | FaultKind::Unexpected => Severity::MatchFatal,
            FaultKind::InvariantViolation => Severity::ProcessFatal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::IllegalAction => "illegal_action",
            FaultKind::DeadlineExceeded => "deadline_exceeded",
            FaultKind::TurnOrderViolation => "turn_order_violation",
            FaultKind::StateDesync => "state_desync",
            FaultKind::ProtocolViolation => "protocol_violation",
            FaultKind::ForcedForfeit => "forced_forfeit",
            FaultKind::Unexpected => "unexpected",
            FaultKind::InvariantViolation => "invariant_violation",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FaultEvent {
    pub kind: FaultKind,
    severity: Severity,
    pub message: String,
    /// Attempted action, legal actions, match id, offending line, timings
    pub context: Value,
    pub timestamp: DateTime<Utc>,
}

impl FaultEvent {
    pub fn new(kind: FaultKind, message: impl Into<String>, context: Value) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            context,
            timestamp: Utc::now(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn match_id(&self) -> Option<&str> {
        self.context.get("match_id").and_then(Value::as_str)
    }

    /// A line the tracker dropped
    pub fn from_track_error(match_id: &str, error: &TrackError) -> Self {
        match error {
            TrackError::TurnRegression { current, received } => FaultEvent::new(
                FaultKind::TurnOrderViolation,
                error.to_string(),
                json!({
                    "match_id": match_id,
                    "current_turn": current,
                    "offending_line": format!("|turn|{}", received),
                }),
            ),
        }
    }

    /// Wrap an error that escaped a decision
    pub fn unexpected(match_id: &str, error: &anyhow::Error) -> Self {
        FaultEvent::new(
            FaultKind::Unexpected,
            format!("{:#}", error),
            json!({ "match_id": match_id }),
        )
    }
}
