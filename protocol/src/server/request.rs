//! Battle request types
//!
//! These types represent the JSON structure of |request| messages.

use super::battle::Player;
use serde::{Deserialize, Serialize};

/// A battle request asking the player to make a decision
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRequest {
    /// Request ID echoed back with the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rqid: Option<u64>,

    /// Active pokemon and their available moves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<Vec<ActivePokemon>>,

    /// Information about the player's side/team
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<SideInfo>,

    /// Which slots need to switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_switch: Option<Vec<bool>>,

    #[serde(default)]
    pub team_preview: bool,

    /// Opponent still has to move; nothing to decide
    #[serde(default)]
    pub wait: bool,

    #[serde(default)]
    pub no_cancel: bool,
}

impl BattleRequest {
    /// Check if this request requires a decision
    pub fn needs_decision(&self) -> bool {
        !self.wait && (self.team_preview || self.is_force_switch() || self.has_moves())
    }

    /// Check if this is a force switch request
    pub fn is_force_switch(&self) -> bool {
        self.force_switch
            .as_ref()
            .map(|fs| fs.iter().any(|&b| b))
            .unwrap_or(false)
    }

    /// Whether the request offers at least one active slot with moves
    pub fn has_moves(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.iter().any(|a| !a.moves.is_empty()))
    }

    /// First active slot, the only one that matters in singles
    pub fn first_active(&self) -> Option<&ActivePokemon> {
        self.active.as_ref().and_then(|a| a.first())
    }

    /// Get available pokemon to switch to, with their 1-based roster slot
    pub fn available_switches(&self) -> Vec<(usize, &SidePokemon)> {
        self.side
            .as_ref()
            .map(|s| {
                s.pokemon
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| !p.active && !p.is_fainted())
                    .map(|(i, p)| (i + 1, p))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Information about an active pokemon in battle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePokemon {
    #[serde(default)]
    pub moves: Vec<MoveSlot>,

    #[serde(default)]
    pub trapped: bool,

    #[serde(default)]
    pub maybe_trapped: bool,
}

impl ActivePokemon {
    /// Get usable moves with their 1-based slot
    pub fn available_moves(&self) -> Vec<(usize, &MoveSlot)> {
        self.moves
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_usable())
            .map(|(i, m)| (i + 1, m))
            .collect()
    }

    /// Check if the pokemon can switch out
    pub fn can_switch(&self) -> bool {
        !self.trapped && !self.maybe_trapped
    }
}

/// A move slot on an active pokemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSlot {
    /// Display name of the move
    #[serde(rename = "move")]
    pub name: String,

    /// Move ID (lowercase, no spaces)
    pub id: String,

    /// Remaining PP. Absent for moves like Struggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp: Option<u32>,

    #[serde(rename = "maxpp", default, skip_serializing_if = "Option::is_none")]
    pub max_pp: Option<u32>,

    #[serde(default)]
    pub target: String,

    #[serde(default)]
    pub disabled: bool,
}

impl MoveSlot {
    pub fn is_usable(&self) -> bool {
        !self.disabled && self.pp.is_none_or(|pp| pp > 0)
    }
}

/// Information about the player's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideInfo {
    /// Player's display name
    pub name: String,

    /// Player ID (p1, p2, etc.)
    pub id: String,

    #[serde(default)]
    pub pokemon: Vec<SidePokemon>,
}

impl SideInfo {
    pub fn player(&self) -> Option<Player> {
        Player::parse(&self.id)
    }
}

/// A pokemon on the player's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidePokemon {
    /// Pokemon identifier (e.g., "p1: Pikachu")
    pub ident: String,

    /// Details string (species, level, gender, shiny)
    pub details: String,

    /// Current condition (HP/MaxHP status)
    pub condition: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub moves: Vec<String>,

    #[serde(default)]
    pub ability: String,

    #[serde(default)]
    pub item: String,
}

impl SidePokemon {
    pub fn is_fainted(&self) -> bool {
        self.condition == "0 fnt" || self.condition.ends_with(" fnt")
    }

    /// Get current HP as a fraction (current, max)
    pub fn hp(&self) -> Option<(u32, u32)> {
        let hp_part = self.condition.split_whitespace().next()?;
        let (current, max) = hp_part.split_once('/')?;
        Some((current.parse().ok()?, max.parse().ok()?))
    }

    /// Get the status condition (if any)
    pub fn status(&self) -> Option<&str> {
        self.condition.split_whitespace().nth(1)
    }

    /// Get the species name from details
    pub fn species(&self) -> &str {
        self.details
            .split(',')
            .next()
            .unwrap_or(&self.details)
            .trim()
    }

    /// Nickname part of the ident ("p1: Pikachu" -> "Pikachu")
    pub fn name(&self) -> &str {
        self.ident
            .split_once(": ")
            .map(|(_, name)| name)
            .unwrap_or(&self.ident)
    }
}
