//! Battle state tracking for Pokemon Showdown matches.
//!
//! `tactician-battle` sits between `tactician-protocol` (wire format) and the
//! agent that plays:
//!
//! ```text
//! tactician-protocol (wire format)
//!        │
//!        ▼
//! tactician-battle (domain types + tracking)
//!        │
//!        ▼
//! tactician-agent (decisions, recovery, match loop)
//! ```
//!
//! # Main Types
//!
//! - [`BattleState`] - one match, rebuilt from the protocol stream
//! - [`SideState`] - one player's roster and active pointer
//! - [`FieldState`] - weather, terrain and timed side effects
//! - [`MoveLog`] - the last ten moves
//! - [`LegalActions`] - what the pending request allows
//!
//! # Example Usage
//!
//! ```ignore
//! use tactician_battle::{ActionKind, BattleState};
//! use tactician_protocol::parse_server_frame;
//!
//! let mut battle = BattleState::new("battle-gen9randombattle-1", "MyBot");
//! let update = battle.apply_frame(&parse_server_frame(raw)?);
//!
//! if update.action == Some(ActionKind::Move) {
//!     let legal = battle.legal_actions();
//!     println!("Can choose from {:?}", legal.labels());
//! }
//! ```

pub mod query;
pub mod tracking;
pub mod types;

pub use query::{Action, LegalActions};
pub use tracking::{ActionKind, BattleState, FrameUpdate, MatchOutcome, TrackError, side_index};
pub use types::{
    Combatant, FieldState, MOVE_LOG_CAPACITY, MoveEntry, MoveLog, SideCondition,
    SideConditionState, SideState, hp_percent,
};

// Re-export commonly used protocol types
pub use tactician_protocol::Player;
