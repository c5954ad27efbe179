//! Routes inbound frames to per-match tasks

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tactician_battle::BattleState;
use tactician_protocol::{ServerFrame, ServerMessage};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};

use crate::error::AgentError;
use crate::match_loop::{MatchEnd, MatchLoop};
use crate::orchestrator::Orchestrator;
use crate::recovery::ErrorClassifier;
use crate::registry::MatchRegistry;
use crate::transport::Outbox;

const MATCH_QUEUE: usize = 64;

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Handed to a running match
    Forwarded,
    /// Started a new match
    Admitted,
    /// New match, but no slot was free
    Declined,
    /// Not a battle room, or the match is over
    Ignored,
}

type MatchResult = Result<MatchEnd, AgentError>;

pub struct Dispatcher {
    username: String,
    orchestrator: Arc<Orchestrator>,
    classifier: Arc<ErrorClassifier>,
    outbox: Outbox,
    registry: MatchRegistry,
    routes: HashMap<String, mpsc::Sender<ServerFrame>>,
    /// Rooms whose match is over; dropped again on `|deinit`
    finished: HashSet<String>,
    tasks: JoinSet<MatchResult>,
    task_rooms: HashMap<Id, String>,
}

impl Dispatcher {
    pub fn new(
        username: impl Into<String>,
        orchestrator: Arc<Orchestrator>,
        classifier: Arc<ErrorClassifier>,
        outbox: Outbox,
        registry: MatchRegistry,
    ) -> Self {
        Self {
            username: username.into(),
            orchestrator,
            classifier,
            outbox,
            registry,
            routes: HashMap::new(),
            finished: HashSet::new(),
            tasks: JoinSet::new(),
            task_rooms: HashMap::new(),
        }
    }

    /// Route frames until `inbound` closes, then wait for running matches
    ///
    /// Returns early with the error of any match loop that fails.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ServerFrame>) -> Result<(), AgentError> {
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(frame) => {
                        self.route(frame).await;
                    }
                    None => break,
                },
                Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
                    self.reap(joined)?;
                }
            }
        }

        tracing::info!(running = self.tasks.len(), "Inbound stream closed");
        self.routes.clear();
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.reap(joined)?;
        }
        Ok(())
    }

    pub async fn route(&mut self, frame: ServerFrame) -> Routing {
        let Some(room) = frame.room_id.clone().filter(|_| frame.is_battle_room()) else {
            return Routing::Ignored;
        };
        if self.finished.contains(&room) {
            if frame.messages.contains(&ServerMessage::Deinit) {
                self.finished.remove(&room);
            }
            return Routing::Ignored;
        }

        if let Some(route) = self.routes.get(&room) {
            if route.send(frame).await.is_ok() {
                return Routing::Forwarded;
            }
            // Loop already returned; its result is reaped separately
            self.routes.remove(&room);
            self.finished.insert(room);
            return Routing::Ignored;
        }

        if !self.registry.try_admit(&room) {
            tracing::warn!(
                match_id = %room,
                active = self.registry.active_count(),
                capacity = self.registry.capacity(),
                "Declining match, at capacity"
            );
            return Routing::Declined;
        }

        let (tx, rx) = mpsc::channel(MATCH_QUEUE);
        let match_loop = MatchLoop::new(
            BattleState::new(room.clone(), &self.username),
            self.orchestrator.clone(),
            self.classifier.clone(),
            self.outbox.clone(),
            self.registry.clone(),
            rx,
        );
        self.track(room.clone(), match_loop.run());

        if tx.send(frame).await.is_err() {
            tracing::warn!(match_id = %room, "Match loop exited before its first frame");
        }
        self.routes.insert(room, tx);
        Routing::Admitted
    }

    fn track<F>(&mut self, room: String, task: F)
    where
        F: Future<Output = MatchResult> + Send + 'static,
    {
        let handle = self.tasks.spawn(task);
        self.task_rooms.insert(handle.id(), room);
    }

    fn reap(&mut self, joined: Result<(Id, MatchResult), JoinError>) -> Result<(), AgentError> {
        let (id, result) = match joined {
            Ok((id, result)) => (id, Ok(result)),
            Err(e) => (e.id(), Err(e)),
        };
        let Some(room) = self.task_rooms.remove(&id) else {
            tracing::warn!(task = %id, "Reaped a task with no room");
            return Ok(());
        };

        self.routes.remove(&room);
        self.finished.insert(room.clone());

        match result {
            Ok(Ok(end)) => {
                tracing::debug!(match_id = %room, end = ?end, "Match task reaped");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            // The loop never reached its own release
            Err(e) => {
                self.registry.release(&room);
                tracing::error!(match_id = %room, error = %e, "Match task panicked");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::strategy::{FallbackEngine, Strategy};
    use crate::transport::ChannelTransport;
    use std::time::Duration;
    use tactician_protocol::{GuardHandle, GuardMode, parse_server_frame};

    fn dispatcher(capacity: usize) -> (Dispatcher, mpsc::UnboundedReceiver<String>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(FallbackEngine),
            audit.clone(),
            Strategy::LocalSearch,
            Duration::from_secs(5),
        ));
        let classifier = Arc::new(ErrorClassifier::new(audit));
        let (transport, wire) = ChannelTransport::channel();
        let outbox = Outbox::new(Arc::new(transport), GuardHandle::new(GuardMode::Strict));

        (
            Dispatcher::new(
                "Me",
                orchestrator,
                classifier,
                outbox,
                MatchRegistry::new(capacity),
            ),
            wire,
        )
    }

    fn frame(room: &str, lines: &str) -> ServerFrame {
        parse_server_frame(&format!(">{}\n{}", room, lines)).unwrap()
    }

    #[tokio::test]
    async fn test_second_match_waits_for_slot() {
        let (mut dispatcher, mut wire) = dispatcher(1);

        let start = "|init|battle\n|player|p1|Me|1\n|player|p2|Rival|2";
        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-1", start)).await,
            Routing::Admitted
        );
        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-2", start)).await,
            Routing::Declined
        );
        assert!(!dispatcher.registry.is_active("battle-gen9ou-2"));

        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-1", "|win|Me")).await,
            Routing::Forwarded
        );
        let joined = dispatcher.tasks.join_next_with_id().await.unwrap();
        dispatcher.reap(joined).unwrap();
        assert_eq!(wire.recv().await.unwrap(), "|/leave battle-gen9ou-1");

        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-1", "|c|Rival|gg")).await,
            Routing::Ignored
        );
        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-2", start)).await,
            Routing::Admitted
        );
    }

    async fn crashing_match() -> MatchResult {
        panic!("engine crashed")
    }

    #[tokio::test]
    async fn test_panicked_match_frees_slot() {
        let (mut dispatcher, _wire) = dispatcher(1);
        assert!(dispatcher.registry.try_admit("battle-gen9ou-1"));
        dispatcher.track("battle-gen9ou-1".to_string(), crashing_match());

        let joined = dispatcher.tasks.join_next_with_id().await.unwrap();
        assert!(joined.is_err());
        dispatcher.reap(joined).unwrap();

        assert!(!dispatcher.registry.is_active("battle-gen9ou-1"));
        assert!(dispatcher.task_rooms.is_empty());
        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-1", "|turn|2")).await,
            Routing::Ignored
        );
        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-2", "|init|battle")).await,
            Routing::Admitted
        );
    }

    #[tokio::test]
    async fn test_deinit_forgets_finished_room() {
        let (mut dispatcher, mut wire) = dispatcher(1);

        dispatcher
            .route(frame("battle-gen9ou-1", "|player|p1|Me|1\n|tie"))
            .await;
        let joined = dispatcher.tasks.join_next_with_id().await.unwrap();
        dispatcher.reap(joined).unwrap();
        assert_eq!(wire.recv().await.unwrap(), "|/leave battle-gen9ou-1");
        assert!(dispatcher.finished.contains("battle-gen9ou-1"));

        assert_eq!(
            dispatcher.route(frame("battle-gen9ou-1", "|deinit")).await,
            Routing::Ignored
        );
        assert!(dispatcher.finished.is_empty());
    }

    #[tokio::test]
    async fn test_non_battle_rooms_ignored() {
        let (mut dispatcher, _wire) = dispatcher(1);

        assert_eq!(
            dispatcher.route(frame("lobby", "|c|Someone|hi")).await,
            Routing::Ignored
        );
        assert_eq!(
            dispatcher
                .route(parse_server_frame("|updateuser|Me|1|1").unwrap())
                .await,
            Routing::Ignored
        );
        assert_eq!(dispatcher.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_run_drains_on_close() {
        let (dispatcher, mut wire) = dispatcher(2);
        let registry = dispatcher.registry.clone();
        let (tx, rx) = mpsc::channel(8);

        tx.send(frame("battle-gen9ou-1", "|player|p1|Me|1")).await.unwrap();
        tx.send(frame("battle-gen9ou-1", "|tie")).await.unwrap();
        drop(tx);

        dispatcher.run(rx).await.unwrap();
        assert_eq!(wire.recv().await.unwrap(), "|/leave battle-gen9ou-1");
        assert_eq!(registry.active_count(), 0);
    }
}
