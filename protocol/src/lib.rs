//! Wire format for Pokemon Showdown battle rooms.
//!
//! Inbound frames are split into typed [`ServerMessage`]s; outbound choices are
//! built as [`ClientCommand`]s, bundled into an [`OutboundMessage`] and filtered by
//! the [`guard`] before they reach the transport.

use thiserror::Error;

pub mod client;
pub mod guard;
pub mod server;

pub use client::{ClientCommand, OutboundMessage};
pub use guard::{GuardHandle, GuardMode};
pub use server::{
    ActivePokemon, BattleRequest, ChoiceRejection, HpStatus, MoveSlot, Player, Pokemon,
    PokemonDetails, RoomType, ServerFrame, ServerMessage, Side, SideInfo, SidePokemon,
    parse_server_frame, parse_server_message,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Empty message")]
    EmptyMessage,
}

/// Normalize a name to a Showdown id: lowercase ASCII alphanumerics only.
///
/// `"Flamethrower"`, `"flame thrower"` and `"Flame-Thrower"` all become `"flamethrower"`.
pub fn to_id(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
