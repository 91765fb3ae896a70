#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::ids::{ObjectId, PlayerId};
use crate::mana::ManaPool;

/// A player in the game.
///
/// Per-player zones (library, hand, graveyard) live here; the library is
/// ordered top-last so drawing pops from the end.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub life: i32,
    pub mana_pool: ManaPool,
    pub poison_counters: u32,
    pub lands_played_this_turn: u32,
    /// Set when the player attempted to draw from an empty library.
    pub drew_from_empty_library: bool,
    /// A named loss condition raised by an effect ("you lose the game").
    pub pending_loss: Option<String>,
    pub has_lost: bool,
    pub library: Vec<ObjectId>,
    pub hand: Vec<ObjectId>,
    pub graveyard: Vec<ObjectId>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, starting_life: i32) -> Self {
        Self {
            id,
            name: name.into(),
            life: starting_life,
            mana_pool: ManaPool::new(),
            poison_counters: 0,
            lands_played_this_turn: 0,
            drew_from_empty_library: false,
            pending_loss: None,
            has_lost: false,
            library: Vec::new(),
            hand: Vec::new(),
            graveyard: Vec::new(),
        }
    }

    pub fn is_in_game(&self) -> bool {
        !self.has_lost
    }

    pub fn has_lethal_life(&self) -> bool {
        self.life <= 0
    }

    pub fn gain_life(&mut self, amount: u32) {
        self.life += amount as i32;
    }

    pub fn lose_life(&mut self, amount: u32) {
        self.life -= amount as i32;
    }

    pub fn top_of_library(&self) -> Option<ObjectId> {
        self.library.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_life_can_go_negative() {
        let mut player = Player::new(PlayerId::from_index(0), "Alice", 3);
        player.lose_life(5);
        assert_eq!(player.life, -2);
        assert!(player.has_lethal_life());
        player.gain_life(4);
        assert_eq!(player.life, 2);
        assert!(!player.has_lethal_life());
    }
}
