//! Trigger matcher trait.
//!
//! Each trigger condition (ETB, dies, upkeep, etc.) implements
//! [`TriggerMatcher`] with its own matching logic.

use crate::filter::FilterContext;
use crate::game_event::GameEvent;
use crate::ids::{ObjectId, PlayerId};
use crate::projection::{ProjectedObject, ProjectedView};

/// Context provided to trigger matchers for determining if they match an event.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    /// The object that has this triggered ability.
    pub source_id: ObjectId,

    /// The controller of the triggered ability source.
    pub controller: PlayerId,

    /// The view before the mutation batch.
    pub old_view: &'a ProjectedView,

    /// The view after the mutation batch.
    pub new_view: &'a ProjectedView,
}

impl<'a> TriggerContext<'a> {
    pub fn filter_ctx(&self) -> FilterContext {
        FilterContext::new(self.controller, Some(self.source_id))
    }

    /// How the event's object looked for matching purposes: before the batch
    /// for objects that left the battlefield, after it otherwise.
    pub fn event_object(&self, event: &GameEvent) -> Option<&'a ProjectedObject> {
        let id = event.object()?;
        if event.is_leaving_battlefield() {
            self.old_view.object(id)
        } else {
            self.new_view.object(id)
        }
    }
}

/// Trait for matching game events to trigger conditions.
///
/// # Example
///
/// ```ignore
/// impl TriggerMatcher for MyTrigger {
///     fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
///         matches!(event, GameEvent::SpellCast { .. })
///     }
///
///     fn display(&self) -> String {
///         "Whenever a spell is cast".to_string()
///     }
///
///     fn clone_box(&self) -> Box<dyn TriggerMatcher> {
///         Box::new(self.clone())
///     }
/// }
/// ```
pub trait TriggerMatcher: std::fmt::Debug + Send + Sync {
    /// Check if this trigger matches the given game event.
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool;

    /// Human-readable display text for this trigger.
    fn display(&self) -> String;

    /// Clone this trigger into a boxed trait object.
    fn clone_box(&self) -> Box<dyn TriggerMatcher>;

    /// Leaves-the-battlefield triggers look back in time (rule 603.10a): they
    /// are checked against the permanents and abilities of the old view.
    fn uses_snapshot(&self) -> bool {
        false
    }
}

impl Clone for Box<dyn TriggerMatcher> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct AlwaysMatchTrigger;

    impl TriggerMatcher for AlwaysMatchTrigger {
        fn matches(&self, _event: &GameEvent, _ctx: &TriggerContext) -> bool {
            true
        }

        fn display(&self) -> String {
            "Always trigger".to_string()
        }

        fn clone_box(&self) -> Box<dyn TriggerMatcher> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_trigger_matcher_clone() {
        let trigger: Box<dyn TriggerMatcher> = Box::new(AlwaysMatchTrigger);
        let cloned = trigger.clone();
        assert_eq!(trigger.display(), cloned.display());
        assert!(!cloned.uses_snapshot());
    }
}
