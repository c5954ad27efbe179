//! Outbound message guard
//!
//! Every string bound for the server passes through [`GuardHandle::filter`].
//! In strict mode only game commands on a fixed whitelist get through, so
//! nothing the agent composes can turn into chat.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Command prefixes allowed in strict mode
pub const ALLOWED_PREFIXES: &[&str] = &[
    "/choose",
    "/move",
    "/switch",
    "/team",
    "/undo",
    "/search",
    "/cancelsearch",
    "/accept",
    "/reject",
    "/challenge",
    "/forfeit",
    "/timer",
    "/savereplay",
    "/leave",
    "/trn",
    "/logout",
    "/join",
    "/utm",
    "/useteam",
];

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// Pass everything through
    Disabled,
    /// Any slash command, no free text
    Permissive,
    /// Whitelisted commands only
    #[default]
    Strict,
}

impl GuardMode {
    fn to_u8(self) -> u8 {
        match self {
            GuardMode::Disabled => 0,
            GuardMode::Permissive => 1,
            GuardMode::Strict => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => GuardMode::Disabled,
            1 => GuardMode::Permissive,
            _ => GuardMode::Strict,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Some(GuardMode::Disabled),
            "permissive" | "lax" => Some(GuardMode::Permissive),
            "strict" | "hard" => Some(GuardMode::Strict),
            _ => None,
        }
    }

    /// Whether a single trimmed message is allowed under this mode
    pub fn allows(self, message: &str) -> bool {
        match self {
            GuardMode::Disabled => true,
            GuardMode::Permissive => message.starts_with('/'),
            GuardMode::Strict => is_whitelisted(message),
        }
    }
}

impl std::str::FromStr for GuardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GuardMode::parse(s).ok_or_else(|| format!("unknown guard mode: {}", s))
    }
}

impl std::fmt::Display for GuardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GuardMode::Disabled => "disabled",
            GuardMode::Permissive => "permissive",
            GuardMode::Strict => "strict",
        };
        f.write_str(name)
    }
}

/// A prefix only counts when followed by whitespace, `|` or the end of the text
fn is_whitelisted(message: &str) -> bool {
    ALLOWED_PREFIXES.iter().any(|prefix| {
        message.strip_prefix(prefix).is_some_and(|rest| {
            rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '|')
        })
    })
}

fn preview(message: &str) -> String {
    message.chars().take(PREVIEW_CHARS).collect()
}

/// Shared, runtime-adjustable guard mode
#[derive(Debug, Clone)]
pub struct GuardHandle {
    mode: Arc<AtomicU8>,
}

impl Default for GuardHandle {
    fn default() -> Self {
        Self::new(GuardMode::default())
    }
}

impl GuardHandle {
    pub fn new(mode: GuardMode) -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(mode.to_u8())),
        }
    }

    pub fn mode(&self) -> GuardMode {
        GuardMode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn set_mode(&self, mode: GuardMode) {
        let previous = GuardMode::from_u8(self.mode.swap(mode.to_u8(), Ordering::SeqCst));
        if previous != mode {
            tracing::info!(from = %previous, to = %mode, "Outbound guard mode changed");
        }
    }

    /// Return the allowed subset of `messages`, trimmed, in input order
    pub fn filter<S: AsRef<str>>(&self, messages: &[S]) -> Vec<String> {
        let mode = self.mode();
        messages
            .iter()
            .map(|m| m.as_ref().trim())
            .filter(|m| {
                let allowed = mode.allows(m);
                if !allowed {
                    tracing::warn!(mode = %mode, preview = %preview(m), "Blocked outbound message");
                }
                allowed
            })
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_whitelist() {
        let guard = GuardHandle::new(GuardMode::Strict);
        let allowed = guard.filter(&["/choose move flamethrower|123", "hello opponent"]);
        assert_eq!(allowed, vec!["/choose move flamethrower|123"]);
    }

    #[test]
    fn test_disabled_passes_everything() {
        let guard = GuardHandle::new(GuardMode::Disabled);
        let allowed = guard.filter(&["/choose move flamethrower|123", "hello opponent"]);
        assert_eq!(allowed.len(), 2);
    }

    #[test]
    fn test_permissive_rejects_free_text() {
        let guard = GuardHandle::new(GuardMode::Permissive);
        let allowed = guard.filter(&["/msg someone hi", "gg", "  /forfeit  "]);
        assert_eq!(allowed, vec!["/msg someone hi", "/forfeit"]);
    }

    #[test]
    fn test_word_boundary() {
        let guard = GuardHandle::default();
        let allowed = guard.filter(&["/teamfoo", "/team 123456|4", "/timer", "/msg x hi"]);
        assert_eq!(allowed, vec!["/team 123456|4", "/timer"]);
    }

    #[test]
    fn test_mode_change_is_shared() {
        let guard = GuardHandle::new(GuardMode::Strict);
        let clone = guard.clone();
        clone.set_mode(GuardMode::Disabled);

        assert_eq!(guard.mode(), GuardMode::Disabled);
        assert_eq!(guard.filter(&["hello"]), vec!["hello"]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("lax".parse::<GuardMode>(), Ok(GuardMode::Permissive));
        assert_eq!(GuardMode::parse("STRICT"), Some(GuardMode::Strict));
        assert!(GuardMode::parse("maybe").is_none());
    }
}
