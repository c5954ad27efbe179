use super::{RoomType, ServerMessage};
use crate::ParseError;
use anyhow::Result;

pub fn parse_init(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("init fields".to_string()).into());
    }

    let room_type = match parts[2] {
        "chat" => RoomType::Chat,
        "battle" => RoomType::Battle,
        _ => return Err(ParseError::InvalidFormat(format!("unknown room type: {}", parts[2])).into()),
    };

    Ok(ServerMessage::Init(room_type))
}

pub fn parse_title(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 3 {
        return Err(ParseError::MissingField("title field".to_string()).into());
    }

    Ok(ServerMessage::Title(parts[2..].join("|")))
}

/// |error|MESSAGE, where MESSAGE may itself contain pipes
pub fn parse_error(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Error(
        parts.get(2..).map(|rest| rest.join("|")).unwrap_or_default(),
    ))
}

pub fn parse_chat(parts: &[&str]) -> Result<ServerMessage> {
    if parts.len() < 4 {
        return Err(ParseError::MissingField("chat fields".to_string()).into());
    }

    // MESSAGE can contain | characters, so join everything after parts[2]
    Ok(ServerMessage::Chat {
        user: parts[2].trim().to_string(),
        message: parts[3..].join("|"),
        timestamp: None,
    })
}

pub fn parse_timestamped_chat(parts: &[&str]) -> Result<ServerMessage> {
    // |c:|TIMESTAMP|USER|MESSAGE
    if parts.len() < 5 {
        return Err(ParseError::MissingField("timestamped chat fields".to_string()).into());
    }

    let timestamp = parts[2]
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidFormat("invalid timestamp".to_string()))?;

    Ok(ServerMessage::Chat {
        user: parts[3].trim().to_string(),
        message: parts[4..].join("|"),
        timestamp: Some(timestamp),
    })
}
