//! Client for the external advisory service
//!
//! The service is best-effort. Every failure here is folded into "no
//! advisory result" by the orchestrator.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tactician_battle::{BattleState, Combatant};

use crate::strategy::Proposal;

/// Response keys naming the move, highest priority first
pub const MOVE_KEYS: [&str; 6] = [
    "bestMoveName",
    "best_move_name",
    "bestMove",
    "moveName",
    "move",
    "action",
];

/// Response keys carrying confidence, highest priority first
pub const CONFIDENCE_KEYS: [&str; 4] = ["confidence", "probability", "score", "certainty"];

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSummary {
    pub species: String,
    pub hp: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<&Combatant> for ActiveSummary {
    fn from(c: &Combatant) -> Self {
        Self {
            species: c.species.clone(),
            hp: c.hp_percent,
            status: c.status.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub active: Option<ActiveSummary>,
    pub opponent_active: Option<ActiveSummary>,
    pub legal_actions: Vec<String>,
    pub team_preview: bool,
}

/// Body of the advisory POST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryRequest {
    pub match_id: String,
    pub turn: u32,
    pub format: String,
    pub state: StateSummary,
}

impl AdvisoryRequest {
    pub fn from_state(state: &BattleState) -> Self {
        let legal = state.legal_actions();
        Self {
            match_id: state.match_id.clone(),
            turn: state.turn,
            format: state.format.clone(),
            state: StateSummary {
                active: state.me().and_then(|s| s.active()).map(ActiveSummary::from),
                opponent_active: state
                    .opponent()
                    .and_then(|s| s.active())
                    .map(ActiveSummary::from),
                legal_actions: legal.labels(),
                team_preview: legal.team_preview,
            },
        }
    }
}

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, request: &AdvisoryRequest) -> Result<Proposal>;
}

/// POSTs the request as JSON and normalises whatever comes back
pub struct HttpAdvisor {
    client: reqwest::Client,
    url: String,
}

impl HttpAdvisor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build advisory HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn advise(&self, request: &AdvisoryRequest) -> Result<Proposal> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .context("Advisory request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Advisory service returned {}", status));
        }

        let body: Value = response
            .json()
            .await
            .context("Advisory response is not JSON")?;

        normalize_response(&body)
            .ok_or_else(|| anyhow!("Advisory response has no move: {}", preview(&body)))
    }
}

/// Extract a proposal from a loosely shaped response body
///
/// Keys are tried in [`MOVE_KEYS`] order at the top level, then inside a
/// nested `data` object. Confidence is read from the same object the move
/// came from.
pub fn normalize_response(body: &Value) -> Option<Proposal> {
    if let Some(proposal) = from_object(body) {
        return Some(proposal);
    }
    body.get("data").and_then(from_object)
}

fn from_object(obj: &Value) -> Option<Proposal> {
    let action = MOVE_KEYS.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })?;

    let confidence = CONFIDENCE_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(as_number))
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    Some(Proposal::new(action, Some(confidence)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn preview(body: &Value) -> String {
    body.to_string().chars().take(80).collect()
}
