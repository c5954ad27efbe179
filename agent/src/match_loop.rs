//! One task per match: apply frames, decide, answer

use std::sync::Arc;

use serde_json::json;
use tactician_battle::{Action, ActionKind, BattleState, MatchOutcome};
use tactician_protocol::{ChoiceRejection, ServerFrame};
use tokio::sync::mpsc;

use crate::error::AgentError;
use crate::fault::{FaultEvent, FaultKind};
use crate::orchestrator::Orchestrator;
use crate::recovery::{ErrorClassifier, RecoveryAction};
use crate::registry::MatchRegistry;
use crate::transport::Outbox;

/// How a match loop stopped
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEnd {
    /// The server announced a result
    Finished(MatchOutcome),
    /// We forfeited after a match-fatal fault
    Forfeited,
    /// The frame stream or the outbound connection closed before the match ended
    Disconnected,
}

pub struct MatchLoop {
    state: BattleState,
    orchestrator: Arc<Orchestrator>,
    classifier: Arc<ErrorClassifier>,
    outbox: Outbox,
    registry: MatchRegistry,
    frames: mpsc::Receiver<ServerFrame>,
    /// Label of the last action we sent
    last_choice: Option<String>,
    /// Refusal waiting to be answered by the next action
    rejected: Option<ChoiceRejection>,
}

impl MatchLoop {
    pub fn new(
        state: BattleState,
        orchestrator: Arc<Orchestrator>,
        classifier: Arc<ErrorClassifier>,
        outbox: Outbox,
        registry: MatchRegistry,
        frames: mpsc::Receiver<ServerFrame>,
    ) -> Self {
        Self {
            state,
            orchestrator,
            classifier,
            outbox,
            registry,
            frames,
            last_choice: None,
            rejected: None,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.state.match_id
    }

    /// Drive the match until it ends, is forfeited, or the stream closes
    ///
    /// The registry slot is always released before returning.
    pub async fn run(mut self) -> Result<MatchEnd, AgentError> {
        tracing::info!(match_id = %self.state.match_id, "Match started");

        let result = self.play().await;
        self.registry.release(&self.state.match_id);

        match &result {
            Ok(end) => tracing::info!(match_id = %self.state.match_id, end = ?end, "Match loop finished"),
            Err(e) => tracing::error!(match_id = %self.state.match_id, error = %e, "Match loop failed"),
        }
        result
    }

    async fn play(&mut self) -> Result<MatchEnd, AgentError> {
        while let Some(frame) = self.frames.recv().await {
            let update = self.state.apply_frame(&frame);

            let mut faults: Vec<FaultEvent> = update
                .errors
                .iter()
                .map(|error| FaultEvent::from_track_error(&self.state.match_id, error))
                .collect();
            faults.extend(self.frame_faults(&frame));

            for fault in faults {
                match self.classifier.handle(&fault, &self.state) {
                    RecoveryAction::Forfeit => return Ok(self.forfeit().await),
                    RecoveryAction::Shutdown => return Err(AgentError::Fatal(Box::new(fault))),
                    RecoveryAction::Substitute(_) | RecoveryAction::Continue => {}
                }
            }

            if let Some(outcome) = update.ended {
                return Ok(self.finish(outcome).await);
            }

            if update.rejected.is_some() {
                self.rejected = update.rejected;
            }

            if let Some(kind) = update.action
                && let Some(end) = self.act(kind).await?
            {
                return Ok(end);
            }
        }

        tracing::warn!(match_id = %self.state.match_id, "Frame stream closed mid-match");
        Ok(MatchEnd::Disconnected)
    }

    /// Faults visible only at frame level: a request we could not read, or
    /// a side with more than one active combatant
    fn frame_faults(&self, frame: &ServerFrame) -> Vec<FaultEvent> {
        let mut faults = Vec::new();

        for (line, reason) in &frame.skipped {
            if line.starts_with("|request|") {
                faults.push(FaultEvent::new(
                    FaultKind::ProtocolViolation,
                    format!("Unreadable request: {}", reason),
                    json!({
                        "match_id": self.state.match_id,
                        "offending_line": line.chars().take(200).collect::<String>(),
                    }),
                ));
            }
        }

        for side in self.state.sides() {
            if side.active_count() > 1 {
                faults.push(FaultEvent::new(
                    FaultKind::InvariantViolation,
                    format!("{} has {} active combatants", side.player, side.active_count()),
                    json!({
                        "match_id": self.state.match_id,
                        "side": side.player,
                        "turn": self.state.turn,
                    }),
                ));
            }
        }

        faults
    }

    /// The server refused our last choice
    fn rejection_fault(&self, rejection: ChoiceRejection) -> FaultEvent {
        let legal = self.state.legal_actions();
        FaultEvent::new(
            FaultKind::IllegalAction,
            format!(
                "Server refused '{}' ({:?})",
                self.last_choice.as_deref().unwrap_or("-"),
                rejection
            ),
            json!({
                "match_id": self.state.match_id,
                "turn": self.state.turn,
                "rqid": self.state.request.as_ref().and_then(|r| r.rqid),
                "attempted": self.last_choice,
                "legal": legal.labels(),
            }),
        )
    }

    /// Answer the pending request. Returns an end state if the match had to stop.
    ///
    /// A refused choice is re-answered through recovery rather than a fresh decision.
    async fn act(&mut self, kind: ActionKind) -> Result<Option<MatchEnd>, AgentError> {
        let rqid = self.state.request.as_ref().and_then(|r| r.rqid);

        let decided = match self.rejected.take() {
            Some(rejection) => Err(self.rejection_fault(rejection)),
            None => self
                .orchestrator
                .decide(&self.state)
                .await
                .map(|decision| decision.action),
        };

        let action = match decided {
            Ok(action) => action,
            Err(fault) => match self.classifier.handle(&fault, &self.state) {
                RecoveryAction::Substitute(action) => {
                    self.orchestrator
                        .record_substitute(&self.state, &action, &fault);
                    action
                }
                RecoveryAction::Continue => return Ok(None),
                RecoveryAction::Forfeit => return Ok(Some(self.forfeit().await)),
                RecoveryAction::Shutdown => return Err(AgentError::Fatal(Box::new(fault))),
            },
        };

        let room = self.state.match_id.clone();
        let sent = match kind {
            ActionKind::TeamPreview => {
                let lead = match action {
                    Action::Switch { slot, .. } => slot,
                    Action::Move { .. } => 1,
                };
                let size = self
                    .state
                    .request
                    .as_ref()
                    .and_then(|r| r.side.as_ref())
                    .map(|side| side.pokemon.len())
                    .unwrap_or(0);
                self.outbox.team(&room, team_order(lead, size), rqid).await
            }
            ActionKind::ForceSwitch | ActionKind::Move => {
                self.outbox.choose(&room, action.choice(), rqid).await
            }
        };

        match sent {
            Ok(0) => {
                tracing::warn!(match_id = %room, action = %action, "Choice blocked by outbound guard");
            }
            Ok(_) => self.last_choice = Some(action.label()),
            Err(e) => {
                tracing::error!(match_id = %room, error = %e, "Failed to send choice");
                return Ok(Some(MatchEnd::Disconnected));
            }
        }
        Ok(None)
    }

    async fn forfeit(&mut self) -> MatchEnd {
        let room = self.state.match_id.clone();
        if let Err(e) = self.outbox.forfeit(&room).await {
            tracing::error!(match_id = %room, error = %e, "Failed to send forfeit");
            return MatchEnd::Disconnected;
        }

        self.registry.release(&room);
        if let Err(e) = self.outbox.leave(&room).await {
            tracing::warn!(match_id = %room, error = %e, "Failed to leave forfeited match");
        }
        MatchEnd::Forfeited
    }

    async fn finish(&mut self, outcome: MatchOutcome) -> MatchEnd {
        let room = self.state.match_id.clone();
        tracing::info!(
            match_id = %room,
            turn = self.state.turn,
            won = ?self.state.won(),
            "Match ended"
        );

        self.registry.release(&room);
        if let Err(e) = self.outbox.leave(&room).await {
            tracing::warn!(match_id = %room, error = %e, "Failed to leave finished match");
        }
        MatchEnd::Finished(outcome)
    }
}

/// Team preview order: `lead` first, then the remaining slots ascending
pub fn team_order(lead: usize, team_size: usize) -> String {
    if team_size == 0 {
        return String::new();
    }
    let lead = if (1..=team_size).contains(&lead) { lead } else { 1 };
    let mut order = lead.to_string();
    for slot in (1..=team_size).filter(|&slot| slot != lead) {
        order.push_str(&slot.to_string());
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditSink, MemoryAuditSink, Rationale};
    use crate::strategy::{FallbackEngine, Strategy};
    use crate::transport::ChannelTransport;
    use std::time::Duration;
    use tactician_protocol::{GuardHandle, GuardMode, parse_server_frame};

    const ROOM: &str = "battle-gen9ou-1";

    struct Harness {
        frames: mpsc::Sender<ServerFrame>,
        wire: mpsc::UnboundedReceiver<String>,
        audit: Arc<MemoryAuditSink>,
        registry: MatchRegistry,
        task: tokio::task::JoinHandle<Result<MatchEnd, AgentError>>,
    }

    fn start() -> Harness {
        let audit = Arc::new(MemoryAuditSink::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(FallbackEngine),
            audit.clone(),
            Strategy::LocalSearch,
            Duration::from_secs(5),
        ));
        let classifier = Arc::new(ErrorClassifier::new(audit.clone()));
        let (transport, wire) = ChannelTransport::channel();
        let outbox = Outbox::new(Arc::new(transport), GuardHandle::new(GuardMode::Strict));
        let registry = MatchRegistry::new(1);
        assert!(registry.try_admit(ROOM));

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(
            MatchLoop::new(
                BattleState::new(ROOM, "Me"),
                orchestrator,
                classifier,
                outbox,
                registry.clone(),
                rx,
            )
            .run(),
        );

        Harness {
            frames: tx,
            wire,
            audit,
            registry,
            task,
        }
    }

    fn frame(lines: &str) -> ServerFrame {
        parse_server_frame(&format!(">{}\n{}", ROOM, lines)).unwrap()
    }

    const MOVE_REQUEST: &str = r#"|request|{"active":[{"moves":[{"move":"Flamethrower","id":"flamethrower","pp":15,"maxpp":24}]}],"side":{"name":"Me","id":"p1","pokemon":[{"ident":"p1: Zard","details":"Charizard","condition":"100/100","active":true}]},"rqid":3}"#;

    #[tokio::test]
    async fn test_turn_then_win() {
        let mut h = start();

        h.frames
            .send(frame(&format!(
                "|player|p1|Me|1\n|player|p2|Rival|2\n|switch|p1a: Zard|Charizard|100/100\n{}\n|turn|1",
                MOVE_REQUEST
            )))
            .await
            .unwrap();
        assert_eq!(
            h.wire.recv().await.unwrap(),
            "battle-gen9ou-1|/choose move flamethrower|3"
        );

        h.frames.send(frame("|win|Me")).await.unwrap();
        let end = h.task.await.unwrap().unwrap();

        assert!(matches!(end, MatchEnd::Finished(MatchOutcome::Win { .. })));
        assert_eq!(h.wire.recv().await.unwrap(), "|/leave battle-gen9ou-1");
        assert!(!h.registry.is_active(ROOM));
        assert_eq!(h.audit.decisions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_team_preview_order() {
        let mut h = start();

        h.frames
            .send(frame(concat!(
                "|player|p1|Me|1\n",
                "|teampreview\n",
                r#"|request|{"teamPreview":true,"side":{"name":"Me","id":"p1","pokemon":[{"ident":"p1: Zard","details":"Charizard","condition":"100/100"},{"ident":"p1: Tank","details":"Blissey","condition":"100/100"},{"ident":"p1: Chomp","details":"Garchomp","condition":"100/100"}]},"rqid":1}"#
            )))
            .await
            .unwrap();

        assert_eq!(h.wire.recv().await.unwrap(), "battle-gen9ou-1|/team 123|1");
        let record = h.audit.latest_decision().unwrap().unwrap();
        assert!(record.team_preview);
    }

    #[tokio::test]
    async fn test_turn_regression_continues() {
        let mut h = start();

        h.frames
            .send(frame("|player|p1|Me|1\n|turn|5\n|turn|3"))
            .await
            .unwrap();
        h.frames.send(frame("|tie")).await.unwrap();

        let end = h.task.await.unwrap().unwrap();
        assert_eq!(end, MatchEnd::Finished(MatchOutcome::Tie));
        assert_eq!(h.wire.recv().await.unwrap(), "|/leave battle-gen9ou-1");

        let faults = h.audit.faults().unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::TurnOrderViolation);
    }

    #[tokio::test]
    async fn test_desync_forfeits() {
        let mut h = start();

        h.frames
            .send(frame(concat!(
                "|player|p1|Me|1\n",
                r#"|request|{"active":[{"moves":[{"move":"Flamethrower","id":"flamethrower","pp":0,"maxpp":24}],"trapped":true}],"side":{"name":"Me","id":"p1","pokemon":[{"ident":"p1: Zard","details":"Charizard","condition":"100/100","active":true}]},"rqid":7}"#,
                "\n|turn|2"
            )))
            .await
            .unwrap();

        let end = h.task.await.unwrap().unwrap();
        assert_eq!(end, MatchEnd::Forfeited);
        assert_eq!(h.wire.recv().await.unwrap(), "battle-gen9ou-1|/forfeit");
        assert_eq!(h.wire.recv().await.unwrap(), "|/leave battle-gen9ou-1");
        assert!(!h.registry.is_active(ROOM));
        assert_eq!(h.audit.faults().unwrap()[0].kind, FaultKind::StateDesync);
    }

    #[tokio::test]
    async fn test_unreadable_request_forfeits() {
        let mut h = start();

        h.frames
            .send(frame("|player|p1|Me|1\n|request|{\"active\":[oops"))
            .await
            .unwrap();

        let end = h.task.await.unwrap().unwrap();
        assert_eq!(end, MatchEnd::Forfeited);
        assert_eq!(h.wire.recv().await.unwrap(), "battle-gen9ou-1|/forfeit");
        assert_eq!(h.audit.faults().unwrap()[0].kind, FaultKind::ProtocolViolation);
    }

    const RETRY_REQUEST: &str = r#"|request|{"active":[{"moves":[{"move":"Flamethrower","id":"flamethrower","pp":15,"maxpp":24},{"move":"Air Slash","id":"airslash","pp":20,"maxpp":24}]}],"side":{"name":"Me","id":"p1","pokemon":[{"ident":"p1: Zard","details":"Charizard","condition":"100/100","active":true}]},"rqid":4}"#;

    async fn first_turn(h: &mut Harness) {
        h.frames
            .send(frame(&format!(
                "|player|p1|Me|1\n|switch|p1a: Zard|Charizard|100/100\n{}\n|turn|1",
                MOVE_REQUEST
            )))
            .await
            .unwrap();
        assert_eq!(
            h.wire.recv().await.unwrap(),
            "battle-gen9ou-1|/choose move flamethrower|3"
        );
    }

    #[tokio::test]
    async fn test_unavailable_choice_answers_new_request() {
        let mut h = start();
        first_turn(&mut h).await;

        h.frames
            .send(frame(&format!(
                "|error|[Unavailable choice] Can't move: Charizard's Flamethrower is disabled\n{}",
                RETRY_REQUEST
            )))
            .await
            .unwrap();

        let resent = tokio::time::timeout(Duration::from_millis(500), h.wire.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resent, "battle-gen9ou-1|/choose move airslash|4");

        let decisions = h.audit.decisions().unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[1].rationale, Rationale::Substitute);
        assert_eq!(decisions[1].search_action.as_deref(), Some("flamethrower"));
        assert_eq!(h.audit.faults().unwrap()[0].kind, FaultKind::IllegalAction);
    }

    #[tokio::test]
    async fn test_invalid_choice_reanswers_same_request() {
        let mut h = start();
        first_turn(&mut h).await;

        h.frames
            .send(frame("|error|[Invalid choice] Can't move: Charizard can't use Flamethrower"))
            .await
            .unwrap();

        let resent = tokio::time::timeout(Duration::from_millis(500), h.wire.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resent, "battle-gen9ou-1|/choose move flamethrower|3");
        assert_eq!(h.audit.decisions().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_disconnects() {
        let h = start();
        drop(h.wire);

        h.frames
            .send(frame(&format!("|player|p1|Me|1\n{}\n|turn|1", MOVE_REQUEST)))
            .await
            .unwrap();

        let end = h.task.await.unwrap().unwrap();
        assert_eq!(end, MatchEnd::Disconnected);
        assert!(!h.registry.is_active(ROOM));
    }

    #[tokio::test]
    async fn test_stream_close_releases_slot() {
        let h = start();
        drop(h.frames);

        let end = h.task.await.unwrap().unwrap();
        assert_eq!(end, MatchEnd::Disconnected);
        assert!(!h.registry.is_active(ROOM));
    }

    #[test]
    fn test_team_order() {
        assert_eq!(team_order(1, 6), "123456");
        assert_eq!(team_order(4, 6), "412356");
        assert_eq!(team_order(9, 3), "123");
        assert_eq!(team_order(1, 0), "");
    }
}
