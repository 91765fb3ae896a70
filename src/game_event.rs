//! Raw low-level events recorded by the object store.
//!
//! Every mutation that a trigger could care about appends one of these to the
//! store's event log. The trigger collector drains the log once per atomic
//! mutation batch.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::game_state::Step;
use crate::ids::{ObjectId, PlayerId};
use crate::object::CounterType;
use crate::zone::Zone;

/// The target of damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum DamageTarget {
    /// Damage to a player
    Player(PlayerId),
    /// Damage to a creature or planeswalker
    Object(ObjectId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum GameEvent {
    /// An object moved between zones. `from` is `None` for newly created objects.
    ZoneChanged {
        object: ObjectId,
        from: Option<Zone>,
        to: Zone,
    },
    Tapped {
        object: ObjectId,
    },
    Untapped {
        object: ObjectId,
    },
    DamageDealt {
        source: ObjectId,
        target: DamageTarget,
        amount: u32,
    },
    CountersPut {
        object: ObjectId,
        counter: CounterType,
        count: u32,
    },
    LifeGained {
        player: PlayerId,
        amount: u32,
    },
    LifeLost {
        player: PlayerId,
        amount: u32,
    },
    CardDrawn {
        player: PlayerId,
        object: ObjectId,
    },
    SpellCast {
        spell: ObjectId,
        caster: PlayerId,
    },
    StepBegan {
        step: Step,
        active_player: PlayerId,
    },
    PlayerLost {
        player: PlayerId,
    },
}

impl GameEvent {
    /// The object this event is about, if any.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            GameEvent::ZoneChanged { object, .. }
            | GameEvent::Tapped { object }
            | GameEvent::Untapped { object }
            | GameEvent::CountersPut { object, .. }
            | GameEvent::CardDrawn { object, .. } => Some(*object),
            GameEvent::DamageDealt {
                target: DamageTarget::Object(object),
                ..
            } => Some(*object),
            GameEvent::SpellCast { spell, .. } => Some(*spell),
            _ => None,
        }
    }

    /// True for an object leaving the battlefield.
    pub fn is_leaving_battlefield(&self) -> bool {
        matches!(
            self,
            GameEvent::ZoneChanged {
                from: Some(Zone::Battlefield),
                to,
                ..
            } if *to != Zone::Battlefield
        )
    }
}
