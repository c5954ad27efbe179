//! Bounded history of moves used in a match

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tactician_protocol::Player;

/// Entries kept before the oldest is evicted
pub const MOVE_LOG_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEntry {
    pub turn: u32,
    pub player: Player,
    /// Nickname of the user
    pub actor: String,
    pub move_name: String,
}

/// FIFO log of the most recent moves, oldest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveLog {
    entries: VecDeque<MoveEntry>,
}

impl MoveLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MOVE_LOG_CAPACITY),
        }
    }

    pub fn push(&mut self, entry: MoveEntry) {
        if self.entries.len() == MOVE_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&MoveEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoveEntry> {
        self.entries.iter()
    }
}
