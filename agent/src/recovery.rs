//! Recovery policy: what to do once a fault has been raised

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tactician_battle::{Action, BattleState};

use crate::audit::AuditSink;
use crate::fault::{FaultEvent, FaultKind, Severity};

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Send this action instead
    Substitute(Action),
    /// Carry on with the match
    Continue,
    /// Forfeit and release the match
    Forfeit,
    /// Stop the process
    Shutdown,
}

pub struct ErrorClassifier {
    audit: Arc<dyn AuditSink>,
    fault_count: AtomicU64,
}

impl ErrorClassifier {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            fault_count: AtomicU64::new(0),
        }
    }

    /// Faults handled since startup
    pub fn fault_count(&self) -> u64 {
        self.fault_count.load(Ordering::Relaxed)
    }

    /// Persist `fault`, then pick a recovery for it against the current state
    pub fn handle(&self, fault: &FaultEvent, state: &BattleState) -> RecoveryAction {
        let count = self.fault_count.fetch_add(1, Ordering::Relaxed) + 1;

        if let Err(e) = self.audit.record_fault(fault) {
            tracing::error!(kind = %fault.kind, error = %e, "Failed to persist fault");
        }

        match fault.severity() {
            Severity::Recoverable => self.recover(fault, state, count),
            Severity::MatchFatal => {
                tracing::error!(
                    match_id = %state.match_id,
                    kind = %fault.kind,
                    context = %fault.context,
                    fault_count = count,
                    "Forfeiting match: {}",
                    fault.message
                );
                RecoveryAction::Forfeit
            }
            Severity::ProcessFatal => {
                tracing::error!(
                    match_id = %state.match_id,
                    kind = %fault.kind,
                    context = %fault.context,
                    fault_count = count,
                    "Shutting down: {}",
                    fault.message
                );
                RecoveryAction::Shutdown
            }
        }
    }

    fn recover(&self, fault: &FaultEvent, state: &BattleState, count: u64) -> RecoveryAction {
        let legal = state.legal_actions();

        let substitute = match fault.kind {
            FaultKind::DeadlineExceeded => {
                let known = state
                    .me()
                    .and_then(|side| side.active())
                    .and_then(|active| active.known_moves.first())
                    .and_then(|id| {
                        legal
                            .moves
                            .iter()
                            .find(|a| matches!(a, Action::Move { id: legal_id, .. } if legal_id == id))
                    });
                known.or_else(|| legal.first()).cloned()
            }
            // Skip the refused choice unless nothing else is left
            FaultKind::IllegalAction => {
                let attempted = fault.context["attempted"].as_str();
                legal
                    .all()
                    .into_iter()
                    .find(|a| Some(a.label().as_str()) != attempted)
                    .or_else(|| legal.first().cloned())
            }
            _ => None,
        };

        match substitute {
            Some(action) => {
                tracing::warn!(
                    match_id = %state.match_id,
                    kind = %fault.kind,
                    substitute = %action,
                    fault_count = count,
                    "Substituting action: {}",
                    fault.message
                );
                RecoveryAction::Substitute(action)
            }
            None => {
                tracing::warn!(
                    match_id = %state.match_id,
                    kind = %fault.kind,
                    fault_count = count,
                    "Continuing after fault: {}",
                    fault.message
                );
                RecoveryAction::Continue
            }
        }
    }
}
