//! Update logic for applying ServerMessages to battle state

use chrono::Utc;
use tactician_protocol::{
    BattleRequest, ChoiceRejection, Pokemon, PokemonDetails, ServerFrame, ServerMessage, to_id,
};
use thiserror::Error;

use super::battle::{ActionKind, BattleState, MatchOutcome};
use crate::types::{Combatant, MoveEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("turn went backwards: at {current}, received {received}")]
    TurnRegression { current: u32, received: u32 },
}

/// Result of applying one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    /// Set when the frame leaves us with a decision to make
    pub action: Option<ActionKind>,
    /// Set when the frame ended the match
    pub ended: Option<MatchOutcome>,
    /// Lines that were dropped as out of order
    pub errors: Vec<TrackError>,
    /// Set when the server refused our last choice
    pub rejected: Option<ChoiceRejection>,
}

impl BattleState {
    /// Apply every message of a frame addressed to this match, in order
    ///
    /// Frames for other rooms are ignored entirely, so a `|win|` relayed
    /// from elsewhere can never end this match.
    pub fn apply_frame(&mut self, frame: &ServerFrame) -> FrameUpdate {
        let mut update = FrameUpdate::default();

        if frame.room_id.as_deref() != Some(self.match_id.as_str()) {
            tracing::debug!(
                match_id = %self.match_id,
                room = ?frame.room_id,
                "Ignoring frame for another room"
            );
            return update;
        }

        if self.ended() {
            return update;
        }

        let mut turn_seen = false;

        for message in &frame.messages {
            match self.apply_message(message) {
                Ok(Some(kind)) => update.action = Some(kind),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(match_id = %self.match_id, error = %e, "Dropped protocol line");
                    update.errors.push(e);
                }
            }

            match message {
                ServerMessage::Turn(_) => turn_seen = true,
                ServerMessage::Error(text) => {
                    if let Some(rejection) = ChoiceRejection::parse(text) {
                        update.rejected = Some(rejection);
                    }
                }
                // Turn already arrived in this frame, so the move request is due now
                ServerMessage::Request(_) if turn_seen && self.awaiting_turn => {
                    self.awaiting_turn = false;
                    update.action = Some(ActionKind::Move);
                }
                _ => {}
            }

            if self.ended() {
                update.ended = self.outcome.clone();
                update.action = None;
                break;
            }
        }

        update
    }

    /// Apply one message
    ///
    /// Returns the kind of decision now required, if this message triggers one.
    pub fn apply_message(&mut self, msg: &ServerMessage) -> Result<Option<ActionKind>, TrackError> {
        self.updated_at = Utc::now();

        match msg {
            // === Battle Initialization ===
            ServerMessage::BattlePlayer {
                player, username, ..
            } => {
                if let Some(side) = self.side_mut(*player) {
                    side.username = username.clone();
                }
                if !self.username_id.is_empty() && to_id(username) == self.username_id {
                    self.set_perspective(*player);
                }
            }

            ServerMessage::Tier(tier) => {
                self.format = tier.clone();
            }

            ServerMessage::Poke {
                player, details, ..
            } => {
                if let Some(side) = self.side_mut(*player) {
                    side.find_or_reveal(&details.species, &details.species);
                }
            }

            ServerMessage::Turn(turn) => return self.handle_turn(*turn),

            ServerMessage::Request(request) => return Ok(self.handle_request(request)),

            ServerMessage::Error(text) => return Ok(self.handle_error(text)),

            // === Major Actions ===
            ServerMessage::Switch {
                pokemon, details, ..
            }
            | ServerMessage::Drag {
                pokemon, details, ..
            }
            | ServerMessage::Replace {
                pokemon, details, ..
            } => {
                self.handle_switch(pokemon, details);
            }

            ServerMessage::Faint(pokemon) => {
                if let Some(mon) = self.target_mut(pokemon) {
                    mon.faint();
                }
            }

            ServerMessage::Move {
                pokemon, move_name, ..
            } => {
                if let Some(mon) = self
                    .side_mut(pokemon.player)
                    .and_then(|side| side.active_mut())
                {
                    mon.record_move(move_name);
                }
                self.moves.push(MoveEntry {
                    turn: self.turn,
                    player: pokemon.player,
                    actor: pokemon.name.clone(),
                    move_name: move_name.clone(),
                });
            }

            // === HP Changes ===
            // Always the active record: nicknames can collide, the pointer can't
            ServerMessage::Damage { pokemon, hp_status }
            | ServerMessage::Heal { pokemon, hp_status }
            | ServerMessage::SetHp { pokemon, hp_status } => {
                match self
                    .side_mut(pokemon.player)
                    .and_then(|side| side.active_mut())
                {
                    Some(mon) => mon.apply_hp_status(hp_status),
                    None => tracing::debug!(
                        match_id = %self.match_id,
                        pokemon = %pokemon.name,
                        "HP change with no active combatant"
                    ),
                }
            }

            // === Status ===
            ServerMessage::Status { pokemon, status } => {
                if let Some(mon) = self.target_mut(pokemon) {
                    mon.status = Some(status.clone());
                }
            }

            ServerMessage::CureStatus { pokemon, .. } => {
                if let Some(mon) = self.target_mut(pokemon) {
                    mon.status = None;
                }
            }

            // === Field Conditions ===
            ServerMessage::Weather { weather, upkeep } => {
                if !upkeep {
                    self.field.set_weather(weather);
                }
            }

            ServerMessage::FieldStart(condition) => {
                self.field.apply_field_start(condition);
            }

            ServerMessage::FieldEnd(condition) => {
                self.field.apply_field_end(condition);
            }

            ServerMessage::SideStart { side, condition } => {
                self.field.add_side_effect(side.player, condition);
            }

            ServerMessage::SideEnd { side, condition } => {
                self.field.remove_side_effect(side.player, condition);
            }

            // === Battle End ===
            ServerMessage::Win(winner) => {
                let side = self.side_of_user(winner);
                self.awaiting_turn = false;
                self.outcome = Some(MatchOutcome::Win {
                    winner: winner.clone(),
                    side,
                });
            }

            ServerMessage::Tie => {
                self.awaiting_turn = false;
                self.outcome = Some(MatchOutcome::Tie);
            }

            // Chat, room metadata and anything without a parser
            _ => {}
        }

        Ok(None)
    }

    fn handle_turn(&mut self, turn: u32) -> Result<Option<ActionKind>, TrackError> {
        if turn < self.turn {
            return Err(TrackError::TurnRegression {
                current: self.turn,
                received: turn,
            });
        }

        let advanced = turn - self.turn;
        if advanced > 0 {
            self.field.tick(advanced);
        }
        self.turn = turn;

        if self.awaiting_turn {
            self.awaiting_turn = false;
            return Ok(Some(ActionKind::Move));
        }
        Ok(None)
    }

    fn handle_request(&mut self, request: &BattleRequest) -> Option<ActionKind> {
        if let Some(player) = request.side.as_ref().and_then(|s| s.player()) {
            self.set_perspective(player);
        }

        self.sync_roster(request);
        self.request = Some(request.clone());
        self.awaiting_turn = false;

        let kind = self.pending_kind()?;
        if kind != ActionKind::Move || std::mem::take(&mut self.retry_choice) {
            return Some(kind);
        }

        // Moves are answered once the turn marker for this request arrives
        self.awaiting_turn = true;
        None
    }

    /// `[Invalid choice]` leaves the stored request open, so it is answered
    /// again now. `[Unavailable choice]` is followed by a fresh request,
    /// which must be answered without waiting for a turn marker.
    fn handle_error(&mut self, text: &str) -> Option<ActionKind> {
        let rejection = ChoiceRejection::parse(text)?;
        tracing::warn!(match_id = %self.match_id, error = text, "Choice rejected by server");

        match rejection {
            ChoiceRejection::Invalid => {
                self.awaiting_turn = false;
                self.pending_kind()
            }
            ChoiceRejection::Unavailable => {
                self.retry_choice = true;
                None
            }
        }
    }

    /// Kind of answer the stored request wants, if any
    fn pending_kind(&self) -> Option<ActionKind> {
        let request = self.request.as_ref()?;
        if request.wait || !request.needs_decision() {
            None
        } else if request.team_preview {
            Some(ActionKind::TeamPreview)
        } else if request.is_force_switch() {
            Some(ActionKind::ForceSwitch)
        } else {
            Some(ActionKind::Move)
        }
    }

    /// Reveal our roster from the request and copy over known moves
    fn sync_roster(&mut self, request: &BattleRequest) {
        let Some(info) = request.side.as_ref() else {
            return;
        };
        let Some(player) = self.perspective() else {
            return;
        };
        if info.player() != Some(player) {
            return;
        }
        let Some(side) = self.side_mut(player) else {
            return;
        };

        for member in &info.pokemon {
            let idx = side.find_or_reveal(member.species(), member.name());
            let mon = &mut side.roster[idx];
            for move_id in &member.moves {
                mon.record_move(move_id);
            }
        }
    }

    fn handle_switch(&mut self, pokemon: &Pokemon, details: &PokemonDetails) {
        let Some(side) = self.side_mut(pokemon.player) else {
            return;
        };

        let species = if details.species.is_empty() {
            pokemon.name.as_str()
        } else {
            details.species.as_str()
        };

        let idx = side.find_or_reveal(species, &pokemon.name);
        side.set_active(idx);
    }

    /// Active record for a positioned identifier, otherwise a roster lookup by name
    fn target_mut(&mut self, pokemon: &Pokemon) -> Option<&mut Combatant> {
        let side = self.side_mut(pokemon.player)?;
        if pokemon.position.is_some() {
            side.active_mut()
        } else {
            side.find_mut(&pokemon.name)
        }
    }
}
