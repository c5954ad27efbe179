//! Runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tactician_protocol::GuardMode;

use crate::error::AgentError;
use crate::strategy::Strategy;

pub const DEFAULT_ADVISORY_URL: &str = "http://127.0.0.1:8787/infer";
pub const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 900;
pub const DEFAULT_DECISION_DEADLINE_MS: u64 = 5000;

/// Settings the agent reads but never changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Our account name, used to find our side
    pub username: String,

    /// Primary decision strategy
    pub strategy: Strategy,

    /// Race the advisory service against the primary strategy
    pub advisory_enabled: bool,

    pub advisory_url: String,

    pub advisory_timeout_ms: u64,

    /// Longest the primary strategy may take before its result is stale
    pub decision_deadline_ms: u64,

    pub max_concurrent_matches: usize,

    pub guard_mode: GuardMode,

    /// Where decisions.jsonl and faults.jsonl are written
    pub audit_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            strategy: Strategy::default(),
            advisory_enabled: false,
            advisory_url: DEFAULT_ADVISORY_URL.to_string(),
            advisory_timeout_ms: DEFAULT_ADVISORY_TIMEOUT_MS,
            decision_deadline_ms: DEFAULT_DECISION_DEADLINE_MS,
            max_concurrent_matches: 1,
            guard_mode: GuardMode::Strict,
            audit_dir: PathBuf::from("logs"),
        }
    }
}

impl AgentConfig {
    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_millis(self.advisory_timeout_ms)
    }

    pub fn decision_deadline(&self) -> Duration {
        Duration::from_millis(self.decision_deadline_ms)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        self.strategy.check_primary()?;

        if self.max_concurrent_matches == 0 {
            return Err(AgentError::Config(
                "max_concurrent_matches must be at least 1".to_string(),
            ));
        }
        if self.decision_deadline_ms == 0 {
            return Err(AgentError::Config(
                "decision_deadline_ms must be positive".to_string(),
            ));
        }
        if self.advisory_enabled && self.advisory_url.trim().is_empty() {
            return Err(AgentError::Config(
                "advisory is enabled but no advisory_url is set".to_string(),
            ));
        }
        Ok(())
    }
}
