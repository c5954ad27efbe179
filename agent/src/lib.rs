//! Decision-making core of a Pokemon Showdown agent.
//!
//! Frames arrive already split by room. The [`Dispatcher`] admits matches up
//! to the configured cap and feeds each one to its own [`MatchLoop`], which
//! keeps a [`BattleState`](tactician_battle::BattleState) current and asks
//! the [`Orchestrator`] for a choice whenever the server wants one. Faults
//! raised along the way go to the [`ErrorClassifier`]; everything sent back
//! passes the outbound guard inside [`Outbox`].

use std::sync::Arc;

use tactician_protocol::{GuardHandle, ServerFrame};
use tokio::sync::mpsc;

pub mod advisory;
pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fault;
pub mod match_loop;
pub mod orchestrator;
pub mod recovery;
pub mod registry;
pub mod strategy;
pub mod transport;

pub use advisory::{Advisor, AdvisoryRequest, HttpAdvisor, normalize_response};
pub use audit::{AuditSink, DecisionMode, DecisionRecord, JsonlAuditSink, MemoryAuditSink, Rationale};
pub use config::AgentConfig;
pub use dispatcher::{Dispatcher, Routing};
pub use error::AgentError;
pub use fault::{FaultEvent, FaultKind, Severity};
pub use match_loop::{MatchEnd, MatchLoop, team_order};
pub use orchestrator::{Decision, Orchestrator, arbitrate};
pub use recovery::{ErrorClassifier, RecoveryAction};
pub use registry::MatchRegistry;
pub use strategy::{FallbackEngine, Proposal, SearchEngine, Strategy};
pub use transport::{ChannelTransport, Outbox, Transport};

/// Wire up every component from `config` and play until `inbound` closes
pub async fn run(
    config: AgentConfig,
    engine: Arc<dyn SearchEngine>,
    transport: Arc<dyn Transport>,
    inbound: mpsc::Receiver<ServerFrame>,
) -> Result<(), AgentError> {
    config.validate()?;

    let audit: Arc<dyn AuditSink> = Arc::new(
        JsonlAuditSink::open(config.audit_dir.clone())
            .map_err(|e| AgentError::Config(format!("{:#}", e)))?,
    );

    let mut orchestrator = Orchestrator::new(
        engine,
        audit.clone(),
        config.strategy,
        config.decision_deadline(),
    );
    if config.advisory_enabled {
        let advisor = HttpAdvisor::new(&config.advisory_url, config.advisory_timeout())
            .map_err(|e| AgentError::Config(format!("{:#}", e)))?;
        orchestrator = orchestrator.with_advisor(Arc::new(advisor), config.advisory_timeout());
    }

    tracing::info!(
        username = %config.username,
        strategy = %config.strategy,
        mode = ?orchestrator.mode(),
        max_matches = config.max_concurrent_matches,
        guard = %config.guard_mode,
        audit_dir = %config.audit_dir.display(),
        "Agent starting"
    );

    let dispatcher = Dispatcher::new(
        config.username.clone(),
        Arc::new(orchestrator),
        Arc::new(ErrorClassifier::new(audit)),
        Outbox::new(transport, GuardHandle::new(config.guard_mode)),
        MatchRegistry::new(config.max_concurrent_matches),
    );
    dispatcher.run(inbound).await
}
