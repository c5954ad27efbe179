//! Admission control for concurrent matches

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Shared set of match ids currently being played, bounded by `capacity`
#[derive(Debug, Clone)]
pub struct MatchRegistry {
    active: Arc<RwLock<HashSet<String>>>,
    capacity: usize,
}

impl MatchRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            active: Arc::new(RwLock::new(HashSet::new())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admit `match_id` if it is already active or a slot is free
    pub fn try_admit(&self, match_id: &str) -> bool {
        let Ok(mut active) = self.active.write() else {
            return false;
        };
        if active.contains(match_id) {
            return true;
        }
        if active.len() >= self.capacity {
            return false;
        }
        active.insert(match_id.to_string());
        true
    }

    /// Free the slot held by `match_id`. Returns whether it was held.
    pub fn release(&self, match_id: &str) -> bool {
        self.active
            .write()
            .map(|mut active| active.remove(match_id))
            .unwrap_or(false)
    }

    pub fn is_active(&self, match_id: &str) -> bool {
        self.active
            .read()
            .map(|active| active.contains(match_id))
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().map(|active| active.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_enforced() {
        let registry = MatchRegistry::new(1);

        assert!(registry.try_admit("battle-a"));
        assert!(registry.try_admit("battle-a"));
        assert!(!registry.try_admit("battle-b"));
        assert_eq!(registry.active_count(), 1);

        assert!(registry.release("battle-a"));
        assert!(!registry.release("battle-a"));
        assert!(registry.try_admit("battle-b"));
        assert!(registry.is_active("battle-b"));
        assert!(!registry.is_active("battle-a"));
    }

    #[test]
    fn test_clones_share_slots() {
        let registry = MatchRegistry::new(2);
        let other = registry.clone();

        assert!(registry.try_admit("battle-a"));
        assert!(other.try_admit("battle-b"));
        assert!(!registry.try_admit("battle-c"));
    }
}
