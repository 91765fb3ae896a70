//! Identifier newtypes.
//!
//! Identifiers are allocated by the owning game (see [`IdAllocator`]) rather than
//! from process-wide counters, so independent games in one process never share
//! or race on id space.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Player identifier, index-based for efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PlayerId(pub u8);

/// Object identifier for cards, tokens and stack objects.
///
/// Stable across zone changes; a permanent that changes zones keeps its id but
/// loses every effect, counter and marker that was attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ObjectId(pub u64);

/// Card definition identifier, references catalog data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct CardId(pub u32);

impl PlayerId {
    /// Create a player ID from a specific index.
    pub fn from_index(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ObjectId {
    /// Create an object ID from a specific value (for when you need explicit control).
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl CardId {
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Per-game monotonic counters for object ids and effect timestamps.
///
/// Object ids start at 1 (0 is reserved). Timestamps start at 1 and are strictly
/// increasing, which makes them usable as the rule 613.7 tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct IdAllocator {
    next_object: u64,
    next_timestamp: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_object: 1,
            next_timestamp: 1,
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh object id.
    pub fn next_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        id
    }

    /// Allocate the next timestamp.
    pub fn next_timestamp(&mut self) -> u64 {
        let ts = self.next_timestamp;
        self.next_timestamp += 1;
        ts
    }

    /// The most recently allocated timestamp (0 if none yet).
    pub fn last_timestamp(&self) -> u64 {
        self.next_timestamp - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_from_index() {
        let p1 = PlayerId::from_index(5);
        let p2 = PlayerId::from_index(10);
        assert_eq!(p1.index(), 5);
        assert_eq!(p2.index(), 10);
    }

    #[test]
    fn test_allocator_is_per_instance() {
        let mut a = IdAllocator::new();
        let mut b = IdAllocator::new();
        assert_eq!(a.next_object_id(), ObjectId(1));
        assert_eq!(a.next_object_id(), ObjectId(2));
        // A second game starts from the same point: no shared global state.
        assert_eq!(b.next_object_id(), ObjectId(1));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.last_timestamp(), 0);
        let t1 = alloc.next_timestamp();
        let t2 = alloc.next_timestamp();
        assert!(t2 > t1);
        assert_eq!(alloc.last_timestamp(), t2);
    }
}
