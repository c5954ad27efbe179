//! Minor battle action message parsers
//!
//! These are secondary effects in battle: damage, status, weather, field and
//! side conditions. In the official client, they're usually displayed in
//! smaller font.

use super::ServerMessage;
use super::battle::{Side, parse_pokemon, require_hp_status};
use crate::ParseError;
use anyhow::Result;

/// Parse |-damage|POKEMON|HP STATUS
pub fn parse_damage(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let hp_status = require_hp_status(parts, 3)?;

    Ok(ServerMessage::Damage { pokemon, hp_status })
}

/// Parse |-heal|POKEMON|HP STATUS
pub fn parse_heal(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let hp_status = require_hp_status(parts, 3)?;

    Ok(ServerMessage::Heal { pokemon, hp_status })
}

/// Parse |-sethp|POKEMON|HP
pub fn parse_sethp(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let hp_status = require_hp_status(parts, 3)?;

    Ok(ServerMessage::SetHp { pokemon, hp_status })
}

/// Parse |-status|POKEMON|STATUS
pub fn parse_status(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let status = parts
        .get(3)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField("status".to_string()))?
        .to_string();

    Ok(ServerMessage::Status { pokemon, status })
}

/// Parse |-curestatus|POKEMON|STATUS
pub fn parse_curestatus(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let status = parts.get(3).unwrap_or(&"").to_string();

    Ok(ServerMessage::CureStatus { pokemon, status })
}

/// Parse |-weather|WEATHER or |-weather|WEATHER|[upkeep]
pub fn parse_weather(parts: &[&str]) -> Result<ServerMessage> {
    let weather = parts.get(2).unwrap_or(&"none").to_string();
    let upkeep = parts.iter().any(|p| *p == "[upkeep]");

    Ok(ServerMessage::Weather { weather, upkeep })
}

/// Parse |-fieldstart|CONDITION
pub fn parse_fieldstart(parts: &[&str]) -> Result<ServerMessage> {
    let condition = parts
        .get(2)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField("field condition".to_string()))?;
    Ok(ServerMessage::FieldStart(condition.to_string()))
}

/// Parse |-fieldend|CONDITION
pub fn parse_fieldend(parts: &[&str]) -> Result<ServerMessage> {
    let condition = parts
        .get(2)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField("field condition".to_string()))?;
    Ok(ServerMessage::FieldEnd(condition.to_string()))
}

/// Parse |-sidestart|SIDE|CONDITION
pub fn parse_sidestart(parts: &[&str]) -> Result<ServerMessage> {
    let side = parts
        .get(2)
        .and_then(|s| Side::parse(s))
        .ok_or_else(|| ParseError::MissingField("side".to_string()))?;
    let condition = parts.get(3).unwrap_or(&"").to_string();

    Ok(ServerMessage::SideStart { side, condition })
}

/// Parse |-sideend|SIDE|CONDITION
pub fn parse_sideend(parts: &[&str]) -> Result<ServerMessage> {
    let side = parts
        .get(2)
        .and_then(|s| Side::parse(s))
        .ok_or_else(|| ParseError::MissingField("side".to_string()))?;
    let condition = parts.get(3).unwrap_or(&"").to_string();

    Ok(ServerMessage::SideEnd { side, condition })
}
