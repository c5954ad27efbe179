//! Major battle action message parsers
//!
//! These are the primary actions in battle: moves, switches, faints.

use super::ServerMessage;
use super::battle::{Pokemon, parse_details, parse_hp_status, parse_pokemon};
use crate::ParseError;
use anyhow::Result;

/// Parse |move|POKEMON|MOVE|TARGET with optional tags
pub fn parse_move(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let move_name = parts
        .get(3)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField("move".to_string()))?
        .to_string();
    let target = parts.get(4).and_then(|s| Pokemon::parse(s));

    // Check for optional tags in remaining parts
    let mut miss = false;
    let mut still = false;
    let mut anim = None;

    for part in parts.iter().skip(5) {
        if *part == "[miss]" {
            miss = true;
        } else if *part == "[still]" {
            still = true;
        } else if let Some(anim_move) = part.strip_prefix("[anim] ") {
            anim = Some(anim_move.to_string());
        }
    }

    Ok(ServerMessage::Move {
        pokemon,
        move_name,
        target,
        miss,
        still,
        anim,
    })
}

/// Parse |switch|POKEMON|DETAILS|HP STATUS
pub fn parse_switch(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let details = parse_details(parts, 3);
    let hp_status = parse_hp_status(parts, 4);

    Ok(ServerMessage::Switch {
        pokemon,
        details,
        hp_status,
    })
}

/// Parse |drag|POKEMON|DETAILS|HP STATUS
pub fn parse_drag(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let details = parse_details(parts, 3);
    let hp_status = parse_hp_status(parts, 4);

    Ok(ServerMessage::Drag {
        pokemon,
        details,
        hp_status,
    })
}

/// Parse |replace|POKEMON|DETAILS|HP STATUS
pub fn parse_replace(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let details = parse_details(parts, 3);
    let hp_status = parse_hp_status(parts, 4);

    Ok(ServerMessage::Replace {
        pokemon,
        details,
        hp_status,
    })
}

/// Parse |faint|POKEMON
pub fn parse_faint(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    Ok(ServerMessage::Faint(pokemon))
}
