//! Turn decisions: local strategy raced against the advisory service
//!
//! The local strategy always runs, on a blocking worker. When an advisor is
//! attached it is consulted concurrently under its own timeout, and both
//! results are arbitrated once they settle. The local result is
//! authoritative; the advisory opinion is recorded for later analysis.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tactician_battle::{Action, BattleState};

use crate::advisory::{Advisor, AdvisoryRequest};
use crate::audit::{AuditSink, DecisionMode, DecisionRecord, Rationale};
use crate::fault::{FaultEvent, FaultKind};
use crate::strategy::{Proposal, SearchEngine, Strategy};

/// A resolved action and the record written for it
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub record: DecisionRecord,
}

pub struct Orchestrator {
    engine: Arc<dyn SearchEngine>,
    advisor: Option<Arc<dyn Advisor>>,
    audit: Arc<dyn AuditSink>,
    strategy: Strategy,
    deadline: Duration,
    advisory_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        audit: Arc<dyn AuditSink>,
        strategy: Strategy,
        deadline: Duration,
    ) -> Self {
        Self {
            engine,
            advisor: None,
            audit,
            strategy,
            deadline,
            advisory_timeout: Duration::ZERO,
        }
    }

    /// Consult `advisor` on every decision, giving up after `timeout`
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>, timeout: Duration) -> Self {
        self.advisor = Some(advisor);
        self.advisory_timeout = timeout;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn mode(&self) -> DecisionMode {
        if self.advisor.is_some() {
            DecisionMode::Hybrid
        } else {
            DecisionMode::Single
        }
    }

    /// Choose one action for the pending request in `state`
    ///
    /// During team preview both sides get placeholder actives first, so the
    /// strategies see a well-formed battle.
    pub async fn decide(&self, state: &BattleState) -> Result<Decision, FaultEvent> {
        let legal = state.legal_actions();
        if legal.is_empty() {
            return Err(FaultEvent::new(
                FaultKind::StateDesync,
                "Action required but no legal actions",
                json!({
                    "match_id": state.match_id,
                    "turn": state.turn,
                    "rqid": state.request.as_ref().and_then(|r| r.rqid),
                }),
            ));
        }

        let snapshot = if legal.team_preview {
            state.with_placeholder_actives()
        } else {
            state.clone()
        };
        let request = self
            .advisor
            .as_ref()
            .map(|_| AdvisoryRequest::from_state(&snapshot));

        let engine = self.engine.clone();
        let strategy = self.strategy;
        let budget = self.deadline;
        let search_legal = legal.clone();
        let search = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let result = strategy.propose(engine.as_ref(), &snapshot, &search_legal, budget);
            (result, started.elapsed())
        });

        let (search, (advisory, advisory_ms)) = tokio::join!(search, self.consult(request));

        let (proposal, elapsed) = match search {
            Ok((Ok(proposal), elapsed)) => (proposal, elapsed),
            Ok((Err(e), _)) => return Err(FaultEvent::unexpected(&state.match_id, &e)),
            Err(e) => {
                return Err(FaultEvent::unexpected(
                    &state.match_id,
                    &anyhow::Error::new(e).context("Strategy worker failed"),
                ));
            }
        };
        let search_ms = elapsed.as_millis() as u64;

        if elapsed > self.deadline {
            return Err(FaultEvent::new(
                FaultKind::DeadlineExceeded,
                format!("{} took {}ms", strategy, search_ms),
                json!({
                    "match_id": state.match_id,
                    "turn": state.turn,
                    "attempted": proposal.action,
                    "elapsed_ms": search_ms,
                    "limit_ms": self.deadline.as_millis() as u64,
                }),
            ));
        }

        let (chosen, rationale) = arbitrate(&proposal, advisory.as_ref(), self.advisor.is_some());

        let Some(action) = legal.resolve(&chosen) else {
            return Err(FaultEvent::new(
                FaultKind::IllegalAction,
                format!("'{}' is not a legal action", chosen),
                json!({
                    "match_id": state.match_id,
                    "turn": state.turn,
                    "attempted": chosen,
                    "legal": legal.labels(),
                }),
            ));
        };

        let record = DecisionRecord {
            timestamp_ms: Utc::now().timestamp_millis(),
            match_id: state.match_id.clone(),
            turn: state.turn,
            mode: self.mode(),
            strategy: strategy.name().to_string(),
            search_action: Some(proposal.action.clone()),
            search_confidence: proposal.confidence,
            advisory_action: advisory.as_ref().map(|p| p.action.clone()),
            advisory_confidence: advisory.as_ref().and_then(|p| p.confidence),
            chosen_action: action.label(),
            rationale,
            search_ms,
            advisory_ms,
            team_preview: legal.team_preview,
        };

        tracing::debug!(
            match_id = %record.match_id,
            turn = record.turn,
            action = %record.chosen_action,
            rationale = ?record.rationale,
            search_ms = search_ms,
            "Decision made"
        );

        if let Err(e) = self.audit.record_decision(&record) {
            tracing::warn!(match_id = %record.match_id, error = %e, "Failed to record decision");
        }

        Ok(Decision { action, record })
    }

    /// Record a turn answered by recovery instead of arbitration
    ///
    /// Whatever the fault context knows about the abandoned attempt is kept,
    /// so every answered turn has exactly one decision record.
    pub fn record_substitute(
        &self,
        state: &BattleState,
        action: &Action,
        fault: &FaultEvent,
    ) -> DecisionRecord {
        let record = DecisionRecord {
            timestamp_ms: Utc::now().timestamp_millis(),
            match_id: state.match_id.clone(),
            turn: state.turn,
            mode: self.mode(),
            strategy: self.strategy.name().to_string(),
            search_action: fault.context["attempted"].as_str().map(str::to_string),
            search_confidence: None,
            advisory_action: None,
            advisory_confidence: None,
            chosen_action: action.label(),
            rationale: Rationale::Substitute,
            search_ms: fault.context["elapsed_ms"].as_u64().unwrap_or(0),
            advisory_ms: None,
            team_preview: state.legal_actions().team_preview,
        };

        tracing::debug!(
            match_id = %record.match_id,
            turn = record.turn,
            action = %record.chosen_action,
            fault = %fault.kind,
            "Substitute recorded"
        );

        if let Err(e) = self.audit.record_decision(&record) {
            tracing::warn!(match_id = %record.match_id, error = %e, "Failed to record decision");
        }
        record
    }

    async fn consult(&self, request: Option<AdvisoryRequest>) -> (Option<Proposal>, Option<u64>) {
        let (Some(advisor), Some(request)) = (&self.advisor, request) else {
            return (None, None);
        };

        let started = Instant::now();
        let result = tokio::time::timeout(self.advisory_timeout, advisor.advise(&request)).await;
        let ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(proposal)) => (Some(proposal), Some(ms)),
            Ok(Err(e)) => {
                tracing::warn!(match_id = %request.match_id, error = %e, "Advisory failed");
                (None, Some(ms))
            }
            Err(_) => {
                tracing::warn!(
                    match_id = %request.match_id,
                    timeout_ms = self.advisory_timeout.as_millis() as u64,
                    "Advisory timed out"
                );
                (None, Some(ms))
            }
        }
    }
}

/// Settle search against advisory. Search always wins.
pub fn arbitrate(
    search: &Proposal,
    advisory: Option<&Proposal>,
    advisory_enabled: bool,
) -> (String, Rationale) {
    let rationale = match advisory {
        _ if !advisory_enabled => Rationale::SingleStrategy,
        None => Rationale::AdvisoryUnavailable,
        Some(advice) if advice.action.trim() == search.action.trim() => Rationale::Agreement,
        Some(_) => Rationale::Fallback,
    };
    (search.action.clone(), rationale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use anyhow::Result;
    use async_trait::async_trait;
    use tactician_battle::{Combatant, LegalActions};
    use tactician_protocol::parse_server_frame;

    struct FixedEngine {
        action: &'static str,
        delay: Duration,
    }

    impl SearchEngine for FixedEngine {
        fn search(&self, _: &BattleState, _: &LegalActions, _: Duration) -> Result<Proposal> {
            std::thread::sleep(self.delay);
            Ok(Proposal::new(self.action, Some(0.6)))
        }

        fn expected_damage(&self, _: &BattleState, _: &str, _: &Combatant, _: &Combatant) -> f64 {
            0.0
        }
    }

    struct StubAdvisor {
        reply: Option<Proposal>,
        delay: Duration,
    }

    #[async_trait]
    impl Advisor for StubAdvisor {
        async fn advise(&self, _: &AdvisoryRequest) -> Result<Proposal> {
            tokio::time::sleep(self.delay).await;
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("service unavailable"))
        }
    }

    fn state() -> BattleState {
        let raw = concat!(
            ">battle-gen9ou-1\n",
            "|player|p1|Me|1\n",
            "|switch|p1a: Zard|Charizard|100/100\n",
            "|turn|4\n",
            r#"|request|{"active":[{"moves":[{"move":"Flamethrower","id":"flamethrower","pp":15,"maxpp":24},{"move":"Ice Beam","id":"icebeam","pp":10,"maxpp":16}]}],"side":{"name":"Me","id":"p1","pokemon":[{"ident":"p1: Zard","details":"Charizard","condition":"100/100","active":true}]},"rqid":9}"#,
        );
        let mut battle = BattleState::new("battle-gen9ou-1", "Me");
        battle.apply_frame(&parse_server_frame(raw).unwrap());
        battle
    }

    fn orchestrator(
        action: &'static str,
        advisor: Option<StubAdvisor>,
    ) -> (Orchestrator, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let engine = Arc::new(FixedEngine {
            action,
            delay: Duration::ZERO,
        });
        let mut orch = Orchestrator::new(
            engine,
            audit.clone(),
            Strategy::LocalSearch,
            Duration::from_secs(5),
        );
        if let Some(advisor) = advisor {
            orch = orch.with_advisor(Arc::new(advisor), Duration::from_millis(50));
        }
        (orch, audit)
    }

    #[tokio::test]
    async fn test_agreement() {
        let advisor = StubAdvisor {
            reply: Some(Proposal::new(" flamethrower\n", Some(0.8))),
            delay: Duration::ZERO,
        };
        let (orch, audit) = orchestrator("flamethrower", Some(advisor));

        let decision = orch.decide(&state()).await.unwrap();
        assert_eq!(decision.record.chosen_action, "flamethrower");
        assert_eq!(decision.record.rationale, Rationale::Agreement);
        assert_eq!(decision.record.mode, DecisionMode::Hybrid);
        assert_eq!(audit.latest_decision().unwrap(), Some(decision.record));
    }

    #[tokio::test]
    async fn test_near_match_is_disagreement() {
        let advisor = StubAdvisor {
            reply: Some(Proposal::new("Flame Thrower", Some(0.8))),
            delay: Duration::ZERO,
        };
        let (orch, _) = orchestrator("flamethrower", Some(advisor));

        let record = orch.decide(&state()).await.unwrap().record;
        assert_eq!(record.chosen_action, "flamethrower");
        assert_eq!(record.rationale, Rationale::Fallback);
    }

    #[tokio::test]
    async fn test_disagreement_keeps_search() {
        let advisor = StubAdvisor {
            reply: Some(Proposal::new("icebeam", Some(0.9))),
            delay: Duration::ZERO,
        };
        let (orch, _) = orchestrator("flamethrower", Some(advisor));

        let record = orch.decide(&state()).await.unwrap().record;
        assert_eq!(record.chosen_action, "flamethrower");
        assert_eq!(record.rationale, Rationale::Fallback);
        assert_eq!(record.search_action.as_deref(), Some("flamethrower"));
        assert_eq!(record.advisory_action.as_deref(), Some("icebeam"));
        assert_eq!(record.advisory_confidence, Some(0.9));
    }

    #[tokio::test]
    async fn test_advisory_timeout() {
        let advisor = StubAdvisor {
            reply: Some(Proposal::new("icebeam", Some(0.9))),
            delay: Duration::from_millis(500),
        };
        let (orch, _) = orchestrator("flamethrower", Some(advisor));

        let record = orch.decide(&state()).await.unwrap().record;
        assert_eq!(record.chosen_action, "flamethrower");
        assert_eq!(record.rationale, Rationale::AdvisoryUnavailable);
        assert_eq!(record.advisory_action, None);
    }

    #[tokio::test]
    async fn test_advisory_error_is_unavailable() {
        let advisor = StubAdvisor {
            reply: None,
            delay: Duration::ZERO,
        };
        let (orch, _) = orchestrator("flamethrower", Some(advisor));

        let record = orch.decide(&state()).await.unwrap().record;
        assert_eq!(record.rationale, Rationale::AdvisoryUnavailable);
    }

    #[tokio::test]
    async fn test_single_strategy() {
        let (orch, _) = orchestrator("icebeam", None);

        let decision = orch.decide(&state()).await.unwrap();
        assert_eq!(decision.action.choice(), "move icebeam");
        assert_eq!(decision.record.rationale, Rationale::SingleStrategy);
        assert_eq!(decision.record.mode, DecisionMode::Single);
        assert_eq!(decision.record.advisory_ms, None);
    }

    #[tokio::test]
    async fn test_illegal_choice_faults() {
        let (orch, audit) = orchestrator("hyperbeam", None);

        let fault = orch.decide(&state()).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::IllegalAction);
        assert_eq!(fault.context["attempted"], "hyperbeam");
        assert!(audit.decisions().unwrap().is_empty());

        let substitute = Action::Move {
            slot: 1,
            id: "flamethrower".to_string(),
        };
        orch.record_substitute(&state(), &substitute, &fault);

        let records = audit.decisions().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rationale, Rationale::Substitute);
        assert_eq!(records[0].search_action.as_deref(), Some("hyperbeam"));
        assert_eq!(records[0].chosen_action, "flamethrower");
        assert_eq!(records[0].turn, 4);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let audit = Arc::new(MemoryAuditSink::new());
        let engine = Arc::new(FixedEngine {
            action: "flamethrower",
            delay: Duration::from_millis(80),
        });
        let orch = Orchestrator::new(
            engine,
            audit,
            Strategy::LocalSearch,
            Duration::from_millis(10),
        );

        let fault = orch.decide(&state()).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::DeadlineExceeded);
        assert_eq!(fault.context["limit_ms"], 10);
    }

    #[tokio::test]
    async fn test_no_legal_actions_is_desync() {
        let (orch, _) = orchestrator("flamethrower", None);
        let state = BattleState::new("battle-gen9ou-1", "Me");

        let fault = orch.decide(&state).await.unwrap_err();
        assert_eq!(fault.kind, FaultKind::StateDesync);
    }

    #[test]
    fn test_arbitrate_table() {
        let search = Proposal::new("flamethrower", None);
        let same = Proposal::new("flamethrower ", Some(0.8));
        let cased = Proposal::new("Flamethrower", Some(0.8));
        let other = Proposal::new("icebeam", Some(0.9));

        assert_eq!(
            arbitrate(&search, Some(&same), true),
            ("flamethrower".to_string(), Rationale::Agreement)
        );
        assert_eq!(
            arbitrate(&search, Some(&cased), true),
            ("flamethrower".to_string(), Rationale::Fallback)
        );
        assert_eq!(
            arbitrate(&search, Some(&other), true),
            ("flamethrower".to_string(), Rationale::Fallback)
        );
        assert_eq!(
            arbitrate(&search, None, true),
            ("flamethrower".to_string(), Rationale::AdvisoryUnavailable)
        );
        assert_eq!(
            arbitrate(&search, None, false),
            ("flamethrower".to_string(), Rationale::SingleStrategy)
        );
    }
}
