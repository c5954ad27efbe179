//! BattleState - per-match battle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tactician_protocol::{BattleRequest, Player, to_id};

use crate::query::LegalActions;
use crate::types::{Combatant, FieldState, MoveLog, SideState};

/// How a match ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum MatchOutcome {
    Win {
        winner: String,
        /// Side of the winner, when their username was announced
        side: Option<Player>,
    },
    Tie,
}

/// What the server expects from us next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TeamPreview,
    ForceSwitch,
    Move,
}

/// A match being tracked from server messages
///
/// State is rebuilt from the protocol stream of one battle room and seen
/// from the perspective of one player, resolved once from the stream.
#[derive(Debug, Clone)]
pub struct BattleState {
    /// Room id, e.g. `battle-gen9randombattle-123`
    pub match_id: String,

    /// Format/tier name
    pub format: String,

    /// Current turn number (0 = not started)
    pub turn: u32,

    /// Weather, terrain and side effects
    pub field: FieldState,

    /// Most recent moves
    pub moves: MoveLog,

    /// The last request received, if any
    pub request: Option<BattleRequest>,

    pub outcome: Option<MatchOutcome>,

    pub updated_at: DateTime<Utc>,

    pub(crate) sides: [SideState; 2],

    /// Which player we are
    perspective: Option<Player>,

    /// Our username as a Showdown id
    pub(crate) username_id: String,

    /// A move request is waiting for its `|turn|` line
    pub(crate) awaiting_turn: bool,

    /// The server refused our last choice; answer the next request at once
    pub(crate) retry_choice: bool,
}

impl BattleState {
    /// Create a tracker for `match_id`, playing as `username`
    pub fn new(match_id: impl Into<String>, username: &str) -> Self {
        Self {
            match_id: match_id.into(),
            format: String::new(),
            turn: 0,
            field: FieldState::new(),
            moves: MoveLog::new(),
            request: None,
            outcome: None,
            updated_at: Utc::now(),
            sides: [
                SideState::new(Player::P1, ""),
                SideState::new(Player::P2, ""),
            ],
            perspective: None,
            username_id: to_id(username),
            awaiting_turn: false,
            retry_choice: false,
        }
    }

    /// Fix our side. Later calls are ignored.
    pub fn set_perspective(&mut self, player: Player) -> bool {
        if side_index(player).is_none() {
            return false;
        }
        match self.perspective {
            None => {
                self.perspective = Some(player);
                tracing::debug!(match_id = %self.match_id, side = %player, "Resolved our side");
                true
            }
            Some(existing) => {
                if existing != player {
                    tracing::warn!(
                        match_id = %self.match_id,
                        fixed = %existing,
                        claimed = %player,
                        "Ignoring conflicting side identity"
                    );
                }
                false
            }
        }
    }

    pub fn perspective(&self) -> Option<Player> {
        self.perspective
    }

    /// Our side (based on perspective)
    pub fn me(&self) -> Option<&SideState> {
        self.perspective.and_then(|p| self.side(p))
    }

    pub fn me_mut(&mut self) -> Option<&mut SideState> {
        self.perspective.and_then(|p| self.side_mut(p))
    }

    pub fn opponent(&self) -> Option<&SideState> {
        self.perspective.and_then(|p| self.side(p.opponent()))
    }

    pub fn side(&self, player: Player) -> Option<&SideState> {
        side_index(player).map(|idx| &self.sides[idx])
    }

    pub fn side_mut(&mut self, player: Player) -> Option<&mut SideState> {
        side_index(player).map(|idx| &mut self.sides[idx])
    }

    pub fn sides(&self) -> impl Iterator<Item = &SideState> {
        self.sides.iter()
    }

    /// Side whose announced username matches `username`
    pub fn side_of_user(&self, username: &str) -> Option<Player> {
        let id = to_id(username);
        if id.is_empty() {
            return None;
        }
        self.sides
            .iter()
            .find(|side| to_id(&side.username) == id)
            .map(|side| side.player)
    }

    pub fn ended(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.turn > 0 && !self.ended()
    }

    /// Whether we won, once the match is over
    pub fn won(&self) -> Option<bool> {
        match self.outcome.as_ref()? {
            MatchOutcome::Win { winner, .. } => {
                Some(!self.username_id.is_empty() && to_id(winner) == self.username_id)
            }
            MatchOutcome::Tie => Some(false),
        }
    }

    /// Legal actions offered by the pending request
    pub fn legal_actions(&self) -> LegalActions {
        self.request
            .as_ref()
            .map(LegalActions::from_request)
            .unwrap_or_default()
    }

    /// Copy of this state with an active combatant on every side
    ///
    /// During team preview nobody is on the field yet; the first revealed
    /// roster member stands in, or an unknown placeholder when the roster is
    /// empty.
    pub fn with_placeholder_actives(&self) -> BattleState {
        let mut state = self.clone();

        if let Some(player) = state.perspective
            && let Some(request) = state.request.clone()
            && let Some(info) = request.side.as_ref()
            && let Some(side) = state.side_mut(player)
        {
            for member in &info.pokemon {
                side.find_or_reveal(member.species(), member.name());
            }
        }

        for side in state.sides.iter_mut() {
            if side.active().is_some() {
                continue;
            }
            if side.roster.is_empty() {
                side.roster.push(Combatant::new("Unknown", "Unknown"));
            }
            side.set_active(0);
        }

        state
    }
}

/// Array index of a player in a two-sided battle
pub fn side_index(player: Player) -> Option<usize> {
    match player {
        Player::P1 => Some(0),
        Player::P2 => Some(1),
        Player::P3 | Player::P4 => None,
    }
}
