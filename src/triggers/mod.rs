//! Triggered abilities.
//!
//! ```text
//! triggers/
//!   mod.rs            - Trigger wrapper and factory methods
//!   matcher_trait.rs  - TriggerMatcher trait and TriggerContext
//!   check.rs          - collect(), TriggeredAbilityEntry, TriggerQueue
//!   zone_changes.rs   - ETB, dies, LTB triggers
//!   phase_step.rs     - Upkeep, end step triggers
//!   other.rs          - Tap, damage, counters, spell cast, custom
//! ```

pub mod check;
pub mod matcher_trait;
pub mod other;
pub mod phase_step;
pub mod zone_changes;

use std::sync::Arc;

pub use check::{TriggerQueue, TriggeredAbilityEntry, collect};
pub use matcher_trait::{TriggerContext, TriggerMatcher};
pub use other::{
    BecomesTappedTrigger, CountersPutOnThisTrigger, CustomTrigger, IsDealtDamageTrigger,
    SpellCastTrigger,
};
pub use phase_step::BeginningOfStepTrigger;
pub use zone_changes::ZoneChangeTrigger;

use crate::filter::{ObjectFilter, PlayerFilter};
use crate::game_event::GameEvent;
use crate::object::CounterType;

/// Wrapper around a boxed TriggerMatcher for ergonomic usage.
#[derive(Debug)]
pub struct Trigger(pub Box<dyn TriggerMatcher>);

impl Clone for Trigger {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        // Triggers have no identity of their own; compare by text.
        self.display() == other.display()
    }
}

impl Trigger {
    pub fn new<T: TriggerMatcher + 'static>(matcher: T) -> Self {
        Self(Box::new(matcher))
    }

    pub fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        self.0.matches(event, ctx)
    }

    pub fn display(&self) -> String {
        self.0.display()
    }

    pub fn uses_snapshot(&self) -> bool {
        self.0.uses_snapshot()
    }

    // === Zone Change Triggers ===

    pub fn this_enters_battlefield() -> Self {
        Self::new(ZoneChangeTrigger::this_enters_battlefield())
    }

    pub fn enters_battlefield(filter: ObjectFilter) -> Self {
        Self::new(ZoneChangeTrigger::enters_battlefield(filter))
    }

    pub fn this_dies() -> Self {
        Self::new(ZoneChangeTrigger::this_dies())
    }

    pub fn dies(filter: ObjectFilter) -> Self {
        Self::new(ZoneChangeTrigger::dies(filter))
    }

    pub fn this_leaves_battlefield() -> Self {
        Self::new(ZoneChangeTrigger::this_leaves_battlefield())
    }

    // === Phase/Step Triggers ===

    pub fn beginning_of_upkeep(player: PlayerFilter) -> Self {
        Self::new(BeginningOfStepTrigger::new(
            crate::game_state::Step::Upkeep,
            player,
        ))
    }

    pub fn beginning_of_end_step(player: PlayerFilter) -> Self {
        Self::new(BeginningOfStepTrigger::new(
            crate::game_state::Step::End,
            player,
        ))
    }

    // === Other Triggers ===

    pub fn becomes_tapped() -> Self {
        Self::new(BecomesTappedTrigger)
    }

    pub fn is_dealt_damage() -> Self {
        Self::new(IsDealtDamageTrigger)
    }

    pub fn counters_put_on_this(counter: Option<CounterType>) -> Self {
        Self::new(CountersPutOnThisTrigger { counter })
    }

    pub fn spell_cast(caster: PlayerFilter, filter: Option<ObjectFilter>) -> Self {
        Self::new(SpellCastTrigger { caster, filter })
    }

    pub fn custom(
        text: impl Into<String>,
        predicate: impl Fn(&GameEvent, &TriggerContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(CustomTrigger {
            text: text.into(),
            predicate: Arc::new(predicate),
            looks_back: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_equality_by_text() {
        assert_eq!(Trigger::this_dies(), Trigger::this_dies());
        assert_ne!(Trigger::this_dies(), Trigger::this_enters_battlefield());
        let cloned = Trigger::beginning_of_upkeep(PlayerFilter::You).clone();
        assert_eq!(cloned.display(), "At the beginning of your upkeep");
    }
}
