mod battle;
mod battle_init;
mod battle_major;
mod battle_minor;
mod battle_progress;
mod request;
mod room;

pub use battle::{HpStatus, Player, Pokemon, PokemonDetails, Side};
pub use request::{ActivePokemon, BattleRequest, MoveSlot, SideInfo, SidePokemon};

use crate::ParseError;
use anyhow::Result;

/// Kind of room announced by `|init|`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomType {
    Chat,
    Battle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    // === Room ===
    /// |init|ROOMTYPE
    Init(RoomType),
    /// |title|TITLE
    Title(String),
    /// |deinit, the room is closed for us
    Deinit,
    /// |error|MESSAGE
    Error(String),
    /// |c|USER|MESSAGE, |c:|TIMESTAMP|USER|MESSAGE, |chat|USER|MESSAGE
    Chat {
        user: String,
        message: String,
        timestamp: Option<i64>,
    },

    // === Battle initialization ===
    BattlePlayer {
        player: Player,
        username: String,
        avatar: String,
        rating: Option<u32>,
    },
    Tier(String),
    /// |poke|PLAYER|DETAILS|ITEM, one line per team member during team preview
    Poke {
        player: Player,
        details: PokemonDetails,
        has_item: bool,
    },
    TeamPreview(Option<u32>),
    BattleStart,

    // === Major actions ===
    Move {
        pokemon: Pokemon,
        move_name: String,
        target: Option<Pokemon>,
        miss: bool,
        still: bool,
        anim: Option<String>,
    },
    Switch {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    Drag {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    Replace {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    Faint(Pokemon),

    // === Minor actions ===
    Damage {
        pokemon: Pokemon,
        hp_status: HpStatus,
    },
    Heal {
        pokemon: Pokemon,
        hp_status: HpStatus,
    },
    SetHp {
        pokemon: Pokemon,
        hp_status: HpStatus,
    },
    Status {
        pokemon: Pokemon,
        status: String,
    },
    CureStatus {
        pokemon: Pokemon,
        status: String,
    },
    Weather {
        weather: String,
        upkeep: bool,
    },
    FieldStart(String),
    FieldEnd(String),
    SideStart {
        side: Side,
        condition: String,
    },
    SideEnd {
        side: Side,
        condition: String,
    },

    // === Battle progress ===
    Request(Box<BattleRequest>),
    Upkeep,
    Turn(u32),
    Win(String),
    Tie,

    /// Anything without a dedicated parser. Kept verbatim so newer protocol
    /// additions flow through untouched.
    Raw(String),
}

/// Why the server refused our last choice, from `|error|[...] ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceRejection {
    /// Malformed or illegal choice; the pending request still stands
    Invalid,
    /// The choice became unavailable; an updated request follows
    Unavailable,
}

impl ChoiceRejection {
    pub fn parse(message: &str) -> Option<Self> {
        let message = message.trim_start();
        if message.starts_with("[Invalid choice]") {
            Some(ChoiceRejection::Invalid)
        } else if message.starts_with("[Unavailable choice]") {
            Some(ChoiceRejection::Unavailable)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerFrame {
    pub room_id: Option<String>,
    pub messages: Vec<ServerMessage>,
    /// Lines that failed to parse, with the reason. The rest of the frame is kept.
    pub skipped: Vec<(String, String)>,
}

impl ServerFrame {
    /// Whether the frame is addressed to a battle room
    pub fn is_battle_room(&self) -> bool {
        self.room_id
            .as_deref()
            .is_some_and(|room| room.starts_with("battle-"))
    }
}

/// Parse a complete WebSocket frame into structured messages
///
/// Malformed lines do not fail the frame: they are collected in
/// [`ServerFrame::skipped`] so one bad payload never poisons a whole burst.
pub fn parse_server_frame(frame: &str) -> Result<ServerFrame> {
    if frame.trim().is_empty() {
        return Err(ParseError::EmptyMessage.into());
    }

    let mut lines = frame.lines();
    let mut room_id = None;

    // Check if first line is >ROOMID
    if let Some(first_line) = lines.clone().next()
        && let Some(room) = first_line.strip_prefix('>')
    {
        room_id = Some(room.trim().to_string());
        lines.next();
    }

    let mut messages = Vec::new();
    let mut skipped = Vec::new();

    for line in lines.filter(|line| !line.trim().is_empty()) {
        match parse_server_message(line) {
            Ok(message) => messages.push(message),
            Err(e) => {
                tracing::debug!(line = line, error = %e, "Skipping malformed protocol line");
                skipped.push((line.to_string(), e.to_string()));
            }
        }
    }

    Ok(ServerFrame {
        room_id,
        messages,
        skipped,
    })
}

/// Parse a single line from the server into a ServerMessage
pub fn parse_server_message(line: &str) -> Result<ServerMessage> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.trim().is_empty() {
        return Ok(ServerMessage::Raw(String::new()));
    }

    if !line.starts_with('|') {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    let parts: Vec<&str> = line.split('|').collect();

    if parts.len() < 2 {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    match parts[1] {
        // Room
        "init" => room::parse_init(&parts),
        "title" => room::parse_title(&parts),
        "deinit" => Ok(ServerMessage::Deinit),
        "error" => room::parse_error(&parts),
        "c" | "chat" => room::parse_chat(&parts),
        "c:" => room::parse_timestamped_chat(&parts),

        // Initialization
        "player" => battle_init::parse_player(&parts),
        "tier" => battle_init::parse_tier(&parts),
        "poke" => battle_init::parse_poke(&parts),
        "teampreview" => battle_init::parse_teampreview(&parts),
        "start" => battle_init::parse_start(&parts),

        // Major
        "move" => battle_major::parse_move(&parts),
        "switch" => battle_major::parse_switch(&parts),
        "drag" => battle_major::parse_drag(&parts),
        "replace" => battle_major::parse_replace(&parts),
        "faint" => battle_major::parse_faint(&parts),

        // Minor
        "-damage" => battle_minor::parse_damage(&parts),
        "-heal" => battle_minor::parse_heal(&parts),
        "-sethp" => battle_minor::parse_sethp(&parts),
        "-status" => battle_minor::parse_status(&parts),
        "-curestatus" => battle_minor::parse_curestatus(&parts),
        "-weather" => battle_minor::parse_weather(&parts),
        "-fieldstart" => battle_minor::parse_fieldstart(&parts),
        "-fieldend" => battle_minor::parse_fieldend(&parts),
        "-sidestart" => battle_minor::parse_sidestart(&parts),
        "-sideend" => battle_minor::parse_sideend(&parts),

        // Progress
        "request" => battle_progress::parse_request(&parts),
        "upkeep" => battle_progress::parse_upkeep(&parts),
        "turn" => battle_progress::parse_turn(&parts),
        "win" => battle_progress::parse_win(&parts),
        "tie" => battle_progress::parse_tie(&parts),

        _ => Ok(ServerMessage::Raw(line.to_string())),
    }
}
