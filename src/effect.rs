//! One-shot effects executed when a spell or ability resolves, and the
//! durations attached to the continuous effects they create.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::cards::CardDefinition;
use crate::continuous::{Aspect, Modification};
use crate::error::EngineError;
use crate::executor::ResolutionContext;
use crate::filter::ObjectFilter;
use crate::game_state::GameState;
use crate::ids::PlayerId;
use crate::mana::ManaSymbol;
use crate::object::CounterType;

/// How long a continuous effect lasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Until {
    /// Static-ability effects: removed when the source leaves the battlefield.
    WhileSourcePresent,
    /// Removed in the cleanup step.
    EndOfTurn,
    /// Removed when the named event happens.
    Event(UntilEvent),
    /// Never expires on its own; it still goes away when the object it names
    /// leaves the battlefield.
    Forever,
}

impl Until {
    /// Binds controller-relative events to a concrete player.
    pub fn bind(&self, controller: PlayerId) -> Until {
        match self {
            Until::Event(UntilEvent::ControllersNextTurn) => {
                Until::Event(UntilEvent::NextTurnOf(controller))
            }
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum UntilEvent {
    /// "Until your next turn", bound to the effect's controller on creation.
    ControllersNextTurn,
    /// Fires when the given player's turn begins.
    NextTurnOf(PlayerId),
    /// A host-defined event, fired by [`Effect::SignalEvent`].
    Named(String),
}

/// Reference to an object from inside an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    /// The spell or the source of the ability.
    Source,
    /// The object chosen for the target slot with this index.
    Target(usize),
    /// The permanent the source is attached to.
    AttachedToSource,
}

/// Reference to a player from inside an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerRef {
    You,
    Target(usize),
    EachOpponent,
    EachPlayer,
    ControllerOfTarget(usize),
}

/// What damage is dealt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Whatever was chosen for the target slot, object or player.
    Target(usize),
    Object(ObjectRef),
    Player(PlayerRef),
}

/// Which objects a created continuous effect applies to.
///
/// Filters are evaluated once at resolution (rule 611.2c) and the effect is
/// locked to the objects that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affected {
    Object(ObjectRef),
    Matching(ObjectFilter),
}

/// A scripted effect body supplied by the card catalog.
#[derive(Clone)]
pub struct CustomEffect {
    pub name: String,
    #[allow(clippy::type_complexity)]
    pub run:
        Arc<dyn Fn(&mut GameState, &ResolutionContext) -> Result<(), EngineError> + Send + Sync>,
}

impl CustomEffect {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&mut GameState, &ResolutionContext) -> Result<(), EngineError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Arc::new(run),
        }
    }
}

impl fmt::Debug for CustomEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEffect")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomEffect {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.run, &other.run)
    }
}

/// A one-shot effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    DealDamage {
        amount: u32,
        to: Recipient,
    },
    GainLife {
        player: PlayerRef,
        amount: u32,
    },
    LoseLife {
        player: PlayerRef,
        amount: u32,
    },
    DrawCards {
        player: PlayerRef,
        count: u32,
    },
    Destroy {
        object: ObjectRef,
    },
    Exile {
        object: ObjectRef,
    },
    Tap {
        object: ObjectRef,
    },
    Untap {
        object: ObjectRef,
    },
    PutCounters {
        object: ObjectRef,
        counter: CounterType,
        count: u32,
    },
    AddMana {
        symbol: ManaSymbol,
        amount: u32,
    },
    CreateTokens {
        definition: Box<CardDefinition>,
        count: u32,
    },
    /// Create a continuous effect with the given duration.
    ApplyContinuous {
        affected: Affected,
        modification: Modification,
        duration: Until,
        reads: Vec<Aspect>,
    },
    /// Attach the source (an Aura or Equipment) to an object.
    AttachSourceTo {
        object: ObjectRef,
    },
    /// Counter the target spell.
    CounterSpell {
        target: usize,
    },
    /// Raise a named loss condition for a player.
    LoseTheGame {
        player: PlayerRef,
    },
    /// Fire a named [`UntilEvent`], expiring effects waiting on it.
    SignalEvent(String),
    Custom(CustomEffect),
}

impl Effect {
    pub fn deal_damage_to_target(amount: u32, target: usize) -> Self {
        Effect::DealDamage {
            amount,
            to: Recipient::Target(target),
        }
    }

    /// "Target creature gets +N/+M until end of turn."
    pub fn pump_target(target: usize, power: i32, toughness: i32) -> Self {
        Effect::ApplyContinuous {
            affected: Affected::Object(ObjectRef::Target(target)),
            modification: Modification::ModifyPowerToughness { power, toughness },
            duration: Until::EndOfTurn,
            reads: Vec::new(),
        }
    }

    pub fn is_mana_effect(&self) -> bool {
        matches!(self, Effect::AddMana { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_controllers_next_turn() {
        let bob = PlayerId::from_index(1);
        let until = Until::Event(UntilEvent::ControllersNextTurn);
        assert_eq!(until.bind(bob), Until::Event(UntilEvent::NextTurnOf(bob)));
        assert_eq!(Until::EndOfTurn.bind(bob), Until::EndOfTurn);
    }

    #[test]
    fn test_custom_effect_equality_is_identity() {
        let a = CustomEffect::new("noop", |_, _| Ok(()));
        let b = a.clone();
        let c = CustomEffect::new("noop", |_, _| Ok(()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
