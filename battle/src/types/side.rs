//! Side (player) state

use tactician_protocol::Player;

use super::combatant::Combatant;

/// One player's side of the battle
#[derive(Debug, Clone, PartialEq)]
pub struct SideState {
    /// Player identifier (P1, P2)
    pub player: Player,

    /// Player's username, empty until `|player|` is seen
    pub username: String,

    /// Revealed combatants in reveal order
    pub roster: Vec<Combatant>,

    /// Index of the active combatant in `roster`
    active: Option<usize>,
}

impl SideState {
    pub fn new(player: Player, username: impl Into<String>) -> Self {
        Self {
            player,
            username: username.into(),
            roster: Vec::new(),
            active: None,
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Combatant> {
        self.active.and_then(|idx| self.roster.get(idx))
    }

    pub fn active_mut(&mut self) -> Option<&mut Combatant> {
        self.active.and_then(|idx| self.roster.get_mut(idx))
    }

    /// Make `index` the active combatant, clearing the previous one's flag
    pub fn set_active(&mut self, index: usize) {
        if index >= self.roster.len() {
            return;
        }

        if let Some(old) = self.active_mut() {
            old.active = false;
        }

        self.active = Some(index);
        self.roster[index].active = true;
    }

    /// Find a roster entry by species or nickname
    pub fn find(&self, name: &str) -> Option<usize> {
        self.roster.iter().position(|c| c.matches(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Combatant> {
        self.roster.iter_mut().find(|c| c.matches(name))
    }

    /// Index of `species`, appending a fresh record when it has not been seen
    pub fn find_or_reveal(&mut self, species: &str, nickname: &str) -> usize {
        if let Some(idx) = self.find(species) {
            return idx;
        }
        self.roster.push(Combatant::new(species, nickname));
        self.roster.len() - 1
    }

    /// Iterate over bench combatants (not active, not fainted)
    pub fn bench(&self) -> impl Iterator<Item = (usize, &Combatant)> {
        self.roster
            .iter()
            .enumerate()
            .filter(move |(idx, c)| Some(*idx) != self.active && c.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.roster.iter().filter(|c| c.is_alive()).count()
    }

    pub fn active_count(&self) -> usize {
        self.roster.iter().filter(|c| c.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_side() -> SideState {
        let mut side = SideState::new(Player::P1, "TestUser");
        side.roster.push(Combatant::new("Pikachu", "Sparky"));
        side.roster.push(Combatant::new("Charizard", "Charizard"));

        let mut fainted = Combatant::new("Blastoise", "Blastoise");
        fainted.faint();
        side.roster.push(fainted);

        side
    }

    #[test]
    fn test_new_side() {
        let side = SideState::new(Player::P1, "Alice");
        assert_eq!(side.player, Player::P1);
        assert_eq!(side.username, "Alice");
        assert!(side.roster.is_empty());
        assert!(side.active().is_none());
    }

    #[test]
    fn test_set_active_moves_flag() {
        let mut side = create_test_side();

        side.set_active(0);
        assert!(side.roster[0].active);
        assert_eq!(side.active_count(), 1);

        side.set_active(1);
        assert!(!side.roster[0].active);
        assert!(side.roster[1].active);
        assert_eq!(side.active_count(), 1);
        assert_eq!(side.active().map(|c| c.species.as_str()), Some("Charizard"));
    }

    #[test]
    fn test_set_active_out_of_range() {
        let mut side = create_test_side();
        side.set_active(0);
        side.set_active(9);
        assert_eq!(side.active_index(), Some(0));
    }

    #[test]
    fn test_bench() {
        let mut side = create_test_side();
        side.set_active(0);

        let bench: Vec<_> = side.bench().collect();
        assert_eq!(bench.len(), 1);
        assert_eq!(bench[0].1.species, "Charizard");
    }

    #[test]
    fn test_counts() {
        let side = create_test_side();
        assert_eq!(side.alive_count(), 2);
        assert_eq!(side.active_count(), 0);
    }

    #[test]
    fn test_find_or_reveal() {
        let mut side = create_test_side();
        assert_eq!(side.find_or_reveal("Charizard", "Charizard"), 1);
        assert_eq!(side.find("Sparky"), Some(0));

        let idx = side.find_or_reveal("Gengar", "Ghosty");
        assert_eq!(idx, 3);
        assert_eq!(side.roster[3].hp_percent, 100);
        assert!(side.roster[3].status.is_none());
    }
}
