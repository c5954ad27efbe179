//! Decision strategies
//!
//! The rules engine and tree search live behind [`SearchEngine`]; the
//! strategies here only decide how its estimates are used.

use std::time::Duration;

use anyhow::{Result, anyhow};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tactician_battle::{Action, BattleState, Combatant, LegalActions};

use crate::error::AgentError;

/// A candidate action with optional confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub action: String,
    pub confidence: Option<f64>,
}

impl Proposal {
    pub fn new(action: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            action: action.into(),
            confidence,
        }
    }
}

/// Search and damage estimation, provided from outside this crate
///
/// Called from a blocking worker thread.
pub trait SearchEngine: Send + Sync {
    /// Pick an action for `state`; should return within `budget`
    fn search(&self, state: &BattleState, legal: &LegalActions, budget: Duration) -> Result<Proposal>;

    /// Expected damage, in percent of the defender's HP, of `move_id`
    fn expected_damage(
        &self,
        state: &BattleState,
        move_id: &str,
        attacker: &Combatant,
        defender: &Combatant,
    ) -> f64;
}

/// Engine used when no search backend is linked in: takes the first legal action
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEngine;

impl SearchEngine for FallbackEngine {
    fn search(&self, _state: &BattleState, legal: &LegalActions, _budget: Duration) -> Result<Proposal> {
        legal
            .first()
            .map(|action| Proposal::new(action.label(), None))
            .ok_or_else(|| anyhow!("no legal actions"))
    }

    fn expected_damage(&self, _: &BattleState, _: &str, _: &Combatant, _: &Combatant) -> f64 {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Delegate to the search engine
    #[default]
    LocalSearch,
    /// External advisory service; only valid as the second opinion
    RemoteAdvisory,
    /// Highest expected damage
    Greedy,
    /// Uniform among legal actions
    Random,
    /// Least expected damage taken from the opponent's known moves
    Defensive,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::LocalSearch => "local_search",
            Strategy::RemoteAdvisory => "remote_advisory",
            Strategy::Greedy => "greedy",
            Strategy::Random => "random",
            Strategy::Defensive => "defensive",
        }
    }

    pub fn check_primary(self) -> Result<(), AgentError> {
        if self == Strategy::RemoteAdvisory {
            return Err(AgentError::Config(
                "remote_advisory cannot be the primary strategy; enable advisory instead"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Run this strategy to completion. CPU-bound for `LocalSearch`.
    pub fn propose(
        self,
        engine: &dyn SearchEngine,
        state: &BattleState,
        legal: &LegalActions,
        budget: Duration,
    ) -> Result<Proposal> {
        if legal.is_empty() {
            return Err(anyhow!("no legal actions"));
        }

        match self {
            Strategy::LocalSearch => engine.search(state, legal, budget),
            Strategy::RemoteAdvisory => Err(anyhow!("remote_advisory has no local proposal")),
            Strategy::Greedy => Ok(greedy(engine, state, legal)),
            Strategy::Random => {
                let all = legal.all();
                all.choose(&mut rand::thread_rng())
                    .map(|action| Proposal::new(action.label(), None))
                    .ok_or_else(|| anyhow!("no legal actions"))
            }
            Strategy::Defensive => Ok(defensive(engine, state, legal)),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_search" | "search" | "mcts" => Ok(Strategy::LocalSearch),
            "remote_advisory" | "advisory" => Ok(Strategy::RemoteAdvisory),
            "greedy" | "max_damage" => Ok(Strategy::Greedy),
            "random" => Ok(Strategy::Random),
            "defensive" | "safe" => Ok(Strategy::Defensive),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

fn first_label(legal: &LegalActions) -> Proposal {
    Proposal::new(legal.first().map(Action::label).unwrap_or_default(), None)
}

fn greedy(engine: &dyn SearchEngine, state: &BattleState, legal: &LegalActions) -> Proposal {
    let (Some(me), Some(foe)) = (
        state.me().and_then(|s| s.active()),
        state.opponent().and_then(|s| s.active()),
    ) else {
        return first_label(legal);
    };

    let mut best: Option<(&Action, f64)> = None;
    for action in &legal.moves {
        if let Action::Move { id, .. } = action {
            let damage = engine.expected_damage(state, id, me, foe);
            if best.is_none_or(|(_, top)| damage > top) {
                best = Some((action, damage));
            }
        }
    }

    match best {
        Some((action, damage)) => {
            tracing::debug!(action = %action, damage = damage, "Greedy pick");
            Proposal::new(action.label(), None)
        }
        None => first_label(legal),
    }
}

fn defensive(engine: &dyn SearchEngine, state: &BattleState, legal: &LegalActions) -> Proposal {
    let (Some(home), Some(foe)) = (state.me(), state.opponent().and_then(|s| s.active())) else {
        return first_label(legal);
    };

    // Worst hit the opponent's revealed moves could land on `defender`
    let threat = |defender: &Combatant| -> f64 {
        foe.known_moves
            .iter()
            .map(|m| engine.expected_damage(state, m, foe, defender))
            .fold(0.0, f64::max)
    };

    let mut best: Option<(&Action, f64)> = None;
    for action in legal.moves.iter().chain(legal.switches.iter()) {
        let defender = match action {
            Action::Move { .. } => home.active(),
            Action::Switch { species, .. } => home.find(species).map(|idx| &home.roster[idx]),
        };
        let Some(defender) = defender else {
            continue;
        };
        let taken = threat(defender);
        if best.is_none_or(|(_, low)| taken < low) {
            best = Some((action, taken));
        }
    }

    match best {
        Some((action, taken)) => {
            tracing::debug!(action = %action, taken = taken, "Defensive pick");
            Proposal::new(action.label(), None)
        }
        None => first_label(legal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactician_protocol::parse_server_frame;

    /// Damage table keyed by move id; defenders named "Blissey" take a tenth
    struct TableEngine;

    impl SearchEngine for TableEngine {
        fn search(&self, _: &BattleState, _: &LegalActions, _: Duration) -> Result<Proposal> {
            Ok(Proposal::new("earthquake", Some(0.7)))
        }

        fn expected_damage(&self, _: &BattleState, move_id: &str, _: &Combatant, defender: &Combatant) -> f64 {
            let base = match move_id {
                "flamethrower" => 40.0,
                "earthquake" => 70.0,
                "closecombat" => 90.0,
                _ => 10.0,
            };
            if defender.species == "Blissey" { base / 10.0 } else { base }
        }
    }

    fn state() -> BattleState {
        let raw = concat!(
            ">battle-gen9ou-1\n",
            "|player|p1|Me|1\n",
            "|player|p2|Rival|2\n",
            "|switch|p1a: Zard|Charizard|100/100\n",
            "|switch|p2a: Chomp|Garchomp|100/100\n",
            "|move|p2a: Chomp|Close Combat|p1a: Zard\n",
            "|turn|1\n",
            r#"|request|{"active":[{"moves":[{"move":"Flamethrower","id":"flamethrower","pp":15,"maxpp":24},{"move":"Earthquake","id":"earthquake","pp":10,"maxpp":16}]}],"side":{"name":"Me","id":"p1","pokemon":[{"ident":"p1: Zard","details":"Charizard","condition":"100/100","active":true},{"ident":"p1: Tank","details":"Blissey","condition":"100/100"}]},"rqid":2}"#,
        );
        let mut battle = BattleState::new("battle-gen9ou-1", "Me");
        battle.apply_frame(&parse_server_frame(raw).unwrap());
        battle
    }

    #[test]
    fn test_greedy_picks_highest_damage() {
        let state = state();
        let proposal = Strategy::Greedy
            .propose(&TableEngine, &state, &state.legal_actions(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(proposal.action, "earthquake");
    }

    #[test]
    fn test_defensive_switches_to_wall() {
        let state = state();
        let proposal = Strategy::Defensive
            .propose(&TableEngine, &state, &state.legal_actions(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(proposal.action, "switch blissey");
    }

    #[test]
    fn test_random_is_legal() {
        let state = state();
        let legal = state.legal_actions();
        for _ in 0..20 {
            let proposal = Strategy::Random
                .propose(&TableEngine, &state, &legal, Duration::from_secs(1))
                .unwrap();
            assert!(legal.resolve(&proposal.action).is_some());
        }
    }

    #[test]
    fn test_local_search_delegates() {
        let state = state();
        let proposal = Strategy::LocalSearch
            .propose(&TableEngine, &state, &state.legal_actions(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(proposal, Proposal::new("earthquake", Some(0.7)));
    }

    #[test]
    fn test_empty_legal_set_errors() {
        let state = BattleState::new("battle-gen9ou-1", "Me");
        let result = Strategy::LocalSearch.propose(
            &FallbackEngine,
            &state,
            &LegalActions::default(),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("safe".parse::<Strategy>(), Ok(Strategy::Defensive));
        assert_eq!("local-search".parse::<Strategy>(), Ok(Strategy::LocalSearch));
        assert!("hybrid".parse::<Strategy>().is_err());
        assert!(Strategy::RemoteAdvisory.check_primary().is_err());
    }
}
