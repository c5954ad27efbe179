//! Global field state

use std::collections::{BTreeSet, HashMap};

use tactician_protocol::{Player, to_id};

use super::conditions::{SideCondition, SideConditionState};

/// Field conditions affecting the whole battle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldState {
    /// Current weather, as named by the server (e.g. "RainDance")
    pub weather: Option<String>,

    /// Current terrain (e.g. "Electric Terrain")
    pub terrain: Option<String>,

    /// Other field-wide effects (Trick Room, Gravity, ...)
    pub pseudo_weather: BTreeSet<String>,

    /// Per-side effects with remaining duration
    side_effects: HashMap<Player, HashMap<SideCondition, SideConditionState>>,
}

fn strip_effect_prefix(condition: &str) -> &str {
    condition.strip_prefix("move: ").unwrap_or(condition).trim()
}

fn is_terrain(condition: &str) -> bool {
    to_id(condition).ends_with("terrain")
}

impl FieldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the weather; "none" clears it
    pub fn set_weather(&mut self, weather: &str) {
        let weather = weather.trim();
        if weather.is_empty() || weather.eq_ignore_ascii_case("none") {
            self.weather = None;
        } else {
            self.weather = Some(weather.to_string());
        }
    }

    pub fn apply_field_start(&mut self, condition: &str) {
        let clean = strip_effect_prefix(condition);
        if is_terrain(clean) {
            self.terrain = Some(clean.to_string());
        } else {
            self.pseudo_weather.insert(clean.to_string());
        }
    }

    pub fn apply_field_end(&mut self, condition: &str) {
        let clean = strip_effect_prefix(condition);
        if is_terrain(clean) {
            self.terrain = None;
        } else {
            self.pseudo_weather.remove(clean);
        }
    }

    /// Start (or stack) a side effect. Unknown conditions are ignored.
    pub fn add_side_effect(&mut self, player: Player, condition: &str) -> Option<SideCondition> {
        let cond = SideCondition::from_protocol(condition)?;
        let effects = self.side_effects.entry(player).or_default();
        match effects.get_mut(&cond) {
            Some(state) => {
                state.add_layer(cond);
            }
            None => {
                effects.insert(cond, SideConditionState::new(cond));
            }
        }
        Some(cond)
    }

    pub fn remove_side_effect(&mut self, player: Player, condition: &str) -> Option<SideCondition> {
        let cond = SideCondition::from_protocol(condition)?;
        self.side_effects
            .get_mut(&player)
            .and_then(|effects| effects.remove(&cond))
            .map(|_| cond)
    }

    pub fn side_effect(&self, player: Player, cond: SideCondition) -> Option<&SideConditionState> {
        self.side_effects.get(&player)?.get(&cond)
    }

    pub fn has_side_effect(&self, player: Player, cond: SideCondition) -> bool {
        self.side_effect(player, cond).is_some()
    }

    /// All effects on one side
    pub fn side_effects(
        &self,
        player: Player,
    ) -> impl Iterator<Item = (&SideCondition, &SideConditionState)> {
        self.side_effects.get(&player).into_iter().flatten()
    }

    /// Advance timed side effects by `turns`, dropping the expired ones
    pub fn tick(&mut self, turns: u32) {
        for effects in self.side_effects.values_mut() {
            effects.retain(|_, state| state.tick(turns));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather() {
        let mut field = FieldState::new();
        field.set_weather("RainDance");
        assert_eq!(field.weather.as_deref(), Some("RainDance"));

        field.set_weather("SunnyDay");
        assert_eq!(field.weather.as_deref(), Some("SunnyDay"));

        field.set_weather("none");
        assert!(field.weather.is_none());
    }

    #[test]
    fn test_terrain_and_rooms() {
        let mut field = FieldState::new();
        field.apply_field_start("move: Electric Terrain");
        field.apply_field_start("move: Trick Room");
        assert_eq!(field.terrain.as_deref(), Some("Electric Terrain"));
        assert!(field.pseudo_weather.contains("Trick Room"));

        field.apply_field_start("move: Grassy Terrain");
        assert_eq!(field.terrain.as_deref(), Some("Grassy Terrain"));

        field.apply_field_end("move: Grassy Terrain");
        field.apply_field_end("move: Trick Room");
        assert!(field.terrain.is_none());
        assert!(field.pseudo_weather.is_empty());
    }

    #[test]
    fn test_side_effects_expire() {
        let mut field = FieldState::new();
        field.add_side_effect(Player::P1, "move: Reflect");
        field.add_side_effect(Player::P1, "move: Stealth Rock");
        field.add_side_effect(Player::P2, "move: Tailwind");

        field.tick(4);
        assert!(field.has_side_effect(Player::P1, SideCondition::Reflect));
        assert!(!field.has_side_effect(Player::P2, SideCondition::Tailwind));

        field.tick(1);
        assert!(!field.has_side_effect(Player::P1, SideCondition::Reflect));
        assert!(field.has_side_effect(Player::P1, SideCondition::StealthRock));
    }

    #[test]
    fn test_unknown_side_effect_ignored() {
        let mut field = FieldState::new();
        assert!(field.add_side_effect(Player::P1, "move: Lucky Chant").is_none());
        assert_eq!(field.side_effects(Player::P1).count(), 0);
    }

    #[test]
    fn test_remove_side_effect() {
        let mut field = FieldState::new();
        field.add_side_effect(Player::P2, "Spikes");
        field.add_side_effect(Player::P2, "Spikes");
        assert_eq!(
            field.side_effect(Player::P2, SideCondition::Spikes).map(|s| s.layers),
            Some(2)
        );

        assert_eq!(
            field.remove_side_effect(Player::P2, "Spikes"),
            Some(SideCondition::Spikes)
        );
        assert!(!field.has_side_effect(Player::P2, SideCondition::Spikes));
    }
}
