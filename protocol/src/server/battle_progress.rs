//! Battle progress message parsers
//!
//! These messages track the flow and state of a battle.

use super::ServerMessage;
use super::request::BattleRequest;
use crate::ParseError;
use anyhow::Result;

/// Parse |request|REQUEST (JSON)
///
/// An empty payload is a valid "nothing to do" request.
pub fn parse_request(parts: &[&str]) -> Result<ServerMessage> {
    // JSON may itself contain | characters
    let json_str = parts.get(2..).map(|rest| rest.join("|")).unwrap_or_default();
    let json_str = if json_str.trim().is_empty() {
        "{}"
    } else {
        json_str.as_str()
    };
    let request: BattleRequest = serde_json::from_str(json_str)?;
    Ok(ServerMessage::Request(Box::new(request)))
}

/// Parse |upkeep
pub fn parse_upkeep(_parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Upkeep)
}

/// Parse |turn|NUMBER
pub fn parse_turn(parts: &[&str]) -> Result<ServerMessage> {
    let turn = parts
        .get(2)
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| ParseError::MissingField("turn number".to_string()))?;

    Ok(ServerMessage::Turn(turn))
}

/// Parse |win|USER
pub fn parse_win(parts: &[&str]) -> Result<ServerMessage> {
    let user = parts.get(2).unwrap_or(&"").trim().to_string();
    Ok(ServerMessage::Win(user))
}

/// Parse |tie
pub fn parse_tie(_parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Tie)
}
