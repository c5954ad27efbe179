//! Legal actions derived from the pending request

use serde::{Deserialize, Serialize};
use tactician_protocol::{BattleRequest, to_id};

/// One thing we can do this turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Action {
    /// Use the move in `slot` (1-based)
    Move { slot: usize, id: String },
    /// Bring in the roster member in `slot` (1-based)
    Switch { slot: usize, species: String },
}

impl Action {
    /// Canonical text: the move id, or `switch <species id>`
    pub fn label(&self) -> String {
        match self {
            Action::Move { id, .. } => id.clone(),
            Action::Switch { species, .. } => format!("switch {}", to_id(species)),
        }
    }

    /// Text for `/choose`
    pub fn choice(&self) -> String {
        match self {
            Action::Move { id, .. } => format!("move {}", id),
            Action::Switch { slot, .. } => format!("switch {}", slot),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Everything the current request allows, moves first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalActions {
    pub moves: Vec<Action>,
    pub switches: Vec<Action>,
    /// Switches stand for lead choices rather than in-battle switches
    pub team_preview: bool,
}

impl LegalActions {
    pub fn from_request(request: &BattleRequest) -> Self {
        if request.wait {
            return Self::default();
        }

        if request.team_preview {
            let switches = request
                .side
                .iter()
                .flat_map(|side| side.pokemon.iter().enumerate())
                .map(|(i, member)| Action::Switch {
                    slot: i + 1,
                    species: member.species().to_string(),
                })
                .collect();
            return Self {
                moves: Vec::new(),
                switches,
                team_preview: true,
            };
        }

        let switches = request
            .available_switches()
            .into_iter()
            .map(|(slot, member)| Action::Switch {
                slot,
                species: member.species().to_string(),
            })
            .collect::<Vec<_>>();

        if request.is_force_switch() {
            return Self {
                moves: Vec::new(),
                switches,
                team_preview: false,
            };
        }

        let active = request.first_active();
        let moves = active
            .map(|a| {
                a.available_moves()
                    .into_iter()
                    .map(|(slot, m)| Action::Move {
                        slot,
                        id: m.id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let can_switch = active.is_none_or(|a| a.can_switch());

        Self {
            moves,
            switches: if can_switch { switches } else { Vec::new() },
            team_preview: false,
        }
    }

    pub fn all(&self) -> Vec<Action> {
        self.moves.iter().chain(self.switches.iter()).cloned().collect()
    }

    pub fn first(&self) -> Option<&Action> {
        self.moves.first().or_else(|| self.switches.first())
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.switches.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.moves
            .iter()
            .chain(self.switches.iter())
            .map(Action::label)
            .collect()
    }

    /// Match free-form action text against the legal set
    ///
    /// Accepts a move name or id (`"Flamethrower"`, `"move flamethrower"`,
    /// `"move 2"`) or a switch by species or slot (`"switch Garchomp"`,
    /// `"switch 3"`).
    pub fn resolve(&self, text: &str) -> Option<Action> {
        let text = text.trim();
        let lower = text.to_ascii_lowercase();

        if let Some(target) = lower.strip_prefix("switch ") {
            return find_switch(&self.switches, target);
        }

        let target = lower.strip_prefix("move ").unwrap_or(&lower);
        if let Ok(slot) = target.trim().parse::<usize>() {
            return self
                .moves
                .iter()
                .find(|a| matches!(a, Action::Move { slot: s, .. } if *s == slot))
                .cloned();
        }

        let id = to_id(target);
        self.moves
            .iter()
            .find(|a| matches!(a, Action::Move { id: move_id, .. } if *move_id == id))
            .cloned()
            // Team preview answers may name a species without a "switch" prefix
            .or_else(|| find_switch(&self.switches, target))
    }
}

fn find_switch(switches: &[Action], target: &str) -> Option<Action> {
    let target = target.trim();
    if let Ok(wanted) = target.parse::<usize>() {
        return switches
            .iter()
            .find(|a| matches!(a, Action::Switch { slot, .. } if *slot == wanted))
            .cloned();
    }
    let id = to_id(target);
    switches
        .iter()
        .find(|a| matches!(a, Action::Switch { species, .. } if to_id(species) == id))
        .cloned()
}
