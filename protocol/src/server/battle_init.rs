//! Battle initialization message parsers
//!
//! These messages are sent at the start of a battle to set up the game state.

use super::ServerMessage;
use super::battle::{Player, PokemonDetails};
use crate::ParseError;
use anyhow::Result;

/// Parse |player|PLAYER|USERNAME|AVATAR|RATING
pub fn parse_player(parts: &[&str]) -> Result<ServerMessage> {
    let player = parts
        .get(2)
        .and_then(|s| Player::parse(s))
        .ok_or_else(|| ParseError::MissingField("player".to_string()))?;

    let username = parts.get(3).unwrap_or(&"").to_string();
    let avatar = parts.get(4).unwrap_or(&"").to_string();
    let rating = parts.get(5).and_then(|s| s.parse().ok());

    Ok(ServerMessage::BattlePlayer {
        player,
        username,
        avatar,
        rating,
    })
}

/// Parse |tier|FORMATNAME
pub fn parse_tier(parts: &[&str]) -> Result<ServerMessage> {
    let format = parts.get(2).unwrap_or(&"").to_string();
    Ok(ServerMessage::Tier(format))
}

/// Parse |poke|PLAYER|DETAILS|ITEM
pub fn parse_poke(parts: &[&str]) -> Result<ServerMessage> {
    let player = parts
        .get(2)
        .and_then(|s| Player::parse(s))
        .ok_or_else(|| ParseError::MissingField("player".to_string()))?;
    let details = parts
        .get(3)
        .filter(|s| !s.is_empty())
        .map(|s| PokemonDetails::parse(s))
        .ok_or_else(|| ParseError::MissingField("details".to_string()))?;
    let has_item = parts.get(4).is_some_and(|s| *s == "item");

    Ok(ServerMessage::Poke {
        player,
        details,
        has_item,
    })
}

/// Parse |teampreview or |teampreview|NUMBER
pub fn parse_teampreview(parts: &[&str]) -> Result<ServerMessage> {
    let count = parts.get(2).and_then(|s| s.parse().ok());
    Ok(ServerMessage::TeamPreview(count))
}

/// Parse |start
pub fn parse_start(_parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::BattleStart)
}
