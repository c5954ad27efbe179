//! Battle state tracking from server messages

mod battle;
mod updater;

pub use battle::{ActionKind, BattleState, MatchOutcome, side_index};
pub use updater::{FrameUpdate, TrackError};
