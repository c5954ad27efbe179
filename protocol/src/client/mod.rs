/// Commands that clients can send to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// /choose CHOICE (e.g. "move flamethrower", "switch 3")
    Choose(String),

    /// /team ORDER (team preview lead order, e.g. "312456")
    Team(String),

    /// /forfeit
    Forfeit,

    /// /leave ROOMID
    LeaveRoom(String),

    /// Free text, which the guard rejects unless disabled
    Chat(String),
}

impl ClientCommand {
    /// Serialize command to protocol format
    pub fn to_protocol_string(&self) -> String {
        match self {
            Self::Choose(choice) => format!("/choose {}", choice),
            Self::Team(order) => format!("/team {}", order),
            Self::Forfeit => "/forfeit".to_string(),
            Self::LeaveRoom(room) => format!("/leave {}", room),
            Self::Chat(message) => message.clone(),
        }
    }

    /// Whether the server expects the request id echoed after this command
    pub fn carries_rqid(&self) -> bool {
        matches!(self, Self::Choose(_) | Self::Team(_))
    }
}

/// A batch of commands bound for one room
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub room_id: String,
    pub commands: Vec<ClientCommand>,
    /// Request id from the `|request|` being answered
    pub rqid: Option<u64>,
}

impl OutboundMessage {
    pub fn new(room_id: impl Into<String>, commands: Vec<ClientCommand>, rqid: Option<u64>) -> Self {
        Self {
            room_id: room_id.into(),
            commands,
            rqid,
        }
    }

    /// Single command without a request id
    pub fn single(room_id: impl Into<String>, command: ClientCommand) -> Self {
        Self::new(room_id, vec![command], None)
    }

    /// Command texts in order, with `|RQID` appended to choice commands
    pub fn command_strings(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| {
                let text = command.to_protocol_string();
                match self.rqid {
                    Some(rqid) if command.carries_rqid() => format!("{}|{}", text, rqid),
                    _ => text,
                }
            })
            .collect()
    }

    /// Serialize a (guarded) command text to wire format: ROOMID|TEXT
    pub fn to_wire_format(&self, command_text: &str) -> String {
        format!("{}|{}", self.room_id, command_text)
    }
}
