//! Side conditions

use serde::{Deserialize, Serialize};

/// Side conditions (hazards, screens, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideCondition {
    // Screens
    Reflect,
    LightScreen,
    AuroraVeil,

    // Entry hazards
    Spikes,      // Stackable 1-3
    ToxicSpikes, // Stackable 1-2
    StealthRock,
    StickyWeb,

    // Other
    Tailwind,
    Safeguard,
    Mist,
}

impl SideCondition {
    /// Parse from protocol string
    pub fn from_protocol(s: &str) -> Option<Self> {
        let clean = s.strip_prefix("move: ").unwrap_or(s);
        let normalized = tactician_protocol::to_id(clean);

        match normalized.as_str() {
            "reflect" => Some(SideCondition::Reflect),
            "lightscreen" => Some(SideCondition::LightScreen),
            "auroraveil" => Some(SideCondition::AuroraVeil),
            "spikes" => Some(SideCondition::Spikes),
            "toxicspikes" => Some(SideCondition::ToxicSpikes),
            "stealthrock" => Some(SideCondition::StealthRock),
            "stickyweb" => Some(SideCondition::StickyWeb),
            "tailwind" => Some(SideCondition::Tailwind),
            "safeguard" => Some(SideCondition::Safeguard),
            "mist" => Some(SideCondition::Mist),
            _ => None,
        }
    }

    /// Get maximum layers for this condition
    pub fn max_layers(&self) -> u8 {
        match self {
            SideCondition::Spikes => 3,
            SideCondition::ToxicSpikes => 2,
            _ => 1,
        }
    }

    /// Turns the condition lasts when set without an extender; hazards persist
    pub fn default_duration(&self) -> Option<u8> {
        match self {
            SideCondition::Reflect
            | SideCondition::LightScreen
            | SideCondition::AuroraVeil
            | SideCondition::Safeguard
            | SideCondition::Mist => Some(5),
            SideCondition::Tailwind => Some(4),
            _ => None,
        }
    }

    pub fn is_screen(&self) -> bool {
        matches!(
            self,
            SideCondition::Reflect | SideCondition::LightScreen | SideCondition::AuroraVeil
        )
    }

    pub fn is_hazard(&self) -> bool {
        matches!(
            self,
            SideCondition::Spikes
                | SideCondition::ToxicSpikes
                | SideCondition::StealthRock
                | SideCondition::StickyWeb
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SideCondition::Reflect => "Reflect",
            SideCondition::LightScreen => "Light Screen",
            SideCondition::AuroraVeil => "Aurora Veil",
            SideCondition::Spikes => "Spikes",
            SideCondition::ToxicSpikes => "Toxic Spikes",
            SideCondition::StealthRock => "Stealth Rock",
            SideCondition::StickyWeb => "Sticky Web",
            SideCondition::Tailwind => "Tailwind",
            SideCondition::Safeguard => "Safeguard",
            SideCondition::Mist => "Mist",
        }
    }
}

impl std::fmt::Display for SideCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State for a side condition: layers for hazards, remaining turns for timed effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideConditionState {
    pub layers: u8,
    pub turns_left: Option<u8>,
}

impl SideConditionState {
    pub fn new(condition: SideCondition) -> Self {
        Self {
            layers: 1,
            turns_left: condition.default_duration(),
        }
    }

    /// Add a layer, returns true if successful
    pub fn add_layer(&mut self, condition: SideCondition) -> bool {
        if self.layers < condition.max_layers() {
            self.layers += 1;
            true
        } else {
            false
        }
    }

    /// Count down `turns` turns; returns false once the effect has run out
    pub fn tick(&mut self, turns: u32) -> bool {
        match self.turns_left {
            Some(left) => {
                let remaining = u32::from(left).saturating_sub(turns);
                self.turns_left = Some(remaining as u8);
                remaining > 0
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_condition_from_protocol() {
        assert_eq!(
            SideCondition::from_protocol("Stealth Rock"),
            Some(SideCondition::StealthRock)
        );
        assert_eq!(
            SideCondition::from_protocol("move: Reflect"),
            Some(SideCondition::Reflect)
        );
        assert_eq!(
            SideCondition::from_protocol("move: Light Screen"),
            Some(SideCondition::LightScreen)
        );
        assert_eq!(SideCondition::from_protocol("Lucky Chant"), None);
    }

    #[test]
    fn test_default_durations() {
        assert_eq!(SideCondition::Reflect.default_duration(), Some(5));
        assert_eq!(SideCondition::AuroraVeil.default_duration(), Some(5));
        assert_eq!(SideCondition::Tailwind.default_duration(), Some(4));
        assert_eq!(SideCondition::StealthRock.default_duration(), None);
    }

    #[test]
    fn test_layers() {
        let mut state = SideConditionState::new(SideCondition::Spikes);
        assert!(state.add_layer(SideCondition::Spikes));
        assert!(state.add_layer(SideCondition::Spikes));
        assert!(!state.add_layer(SideCondition::Spikes));
        assert_eq!(state.layers, 3);
    }

    #[test]
    fn test_tick() {
        let mut tailwind = SideConditionState::new(SideCondition::Tailwind);
        assert!(tailwind.tick(3));
        assert_eq!(tailwind.turns_left, Some(1));
        assert!(!tailwind.tick(1));

        let mut rocks = SideConditionState::new(SideCondition::StealthRock);
        assert!(rocks.tick(50));
    }
}
