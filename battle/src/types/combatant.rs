//! Roster entries

use serde::{Deserialize, Serialize};
use tactician_protocol::{HpStatus, to_id};

/// Convert a protocol HP reading to a percentage in [0, 100]
///
/// `current/max` is rounded to the nearest integer, `max == 0` yields 0, and a
/// reading without a max is already a percentage.
pub fn hp_percent(current: u32, max: Option<u32>) -> u8 {
    match max {
        Some(0) => 0,
        Some(max) => {
            let pct = (f64::from(current) / f64::from(max) * 100.0).round();
            pct.clamp(0.0, 100.0) as u8
        }
        None => current.min(100) as u8,
    }
}

/// One revealed member of a side's roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    /// Species name (including forme, e.g. "Rotom-Wash")
    pub species: String,

    /// Nickname as shown in protocol identifiers
    pub nickname: String,

    /// Remaining HP in percent
    pub hp_percent: u8,

    /// Non-volatile status (par, slp, brn, psn, tox, frz)
    pub status: Option<String>,

    pub active: bool,

    pub fainted: bool,

    /// Revealed moves, as ids
    pub known_moves: Vec<String>,
}

impl Combatant {
    /// A freshly revealed combatant at full HP with no status
    pub fn new(species: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            nickname: nickname.into(),
            hp_percent: 100,
            status: None,
            active: false,
            fainted: false,
            known_moves: Vec::new(),
        }
    }

    /// Whether this record is the same creature as `name` (species or nickname)
    pub fn matches(&self, name: &str) -> bool {
        let id = to_id(name);
        !id.is_empty() && (to_id(&self.species) == id || to_id(&self.nickname) == id)
    }

    pub fn is_alive(&self) -> bool {
        !self.fainted
    }

    /// Apply a `CURRENT/MAX [STATUS]` reading
    pub fn apply_hp_status(&mut self, hp: &HpStatus) {
        self.hp_percent = hp_percent(hp.current, hp.max);

        match hp.status.as_deref() {
            Some("fnt") => self.faint(),
            Some(status) => self.status = Some(status.to_string()),
            None => {}
        }

        if self.hp_percent == 0 {
            self.fainted = true;
        }
    }

    pub fn faint(&mut self) {
        self.fainted = true;
        self.hp_percent = 0;
    }

    /// Record a move as known (stored as an id, deduplicated)
    pub fn record_move(&mut self, move_name: &str) {
        let id = to_id(move_name);
        if !id.is_empty() && !self.known_moves.contains(&id) {
            self.known_moves.push(id);
        }
    }
}
