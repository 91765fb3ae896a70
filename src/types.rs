#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Supertype {
    Basic,
    Legendary,
    Snow,
    World,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum CardType {
    Land,
    Creature,
    Artifact,
    Enchantment,
    Planeswalker,
    Instant,
    Sorcery,
    Battle,
    Kindred,
}

impl CardType {
    /// Card types whose objects become permanents when they resolve.
    pub fn is_permanent_type(self) -> bool {
        !matches!(self, CardType::Instant | CardType::Sorcery)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Subtype {
    // Basic land types
    Plains,
    Island,
    Swamp,
    Mountain,
    Forest,

    // Creature types
    Angel,
    Bear,
    Beast,
    Cat,
    Dragon,
    Druid,
    Elf,
    Goblin,
    Golem,
    Human,
    Knight,
    Merfolk,
    Soldier,
    Spirit,
    Warrior,
    Wizard,
    Zombie,

    // Artifact / enchantment types
    Equipment,
    Aura,
    Saga,
}

impl Subtype {
    /// Returns true for the basic land types.
    pub fn is_basic_land_type(self) -> bool {
        matches!(
            self,
            Subtype::Plains | Subtype::Island | Subtype::Swamp | Subtype::Mountain | Subtype::Forest
        )
    }
}
