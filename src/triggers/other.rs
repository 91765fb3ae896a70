//! Tap, damage, counter, spell-cast and scripted triggers.

use std::fmt;
use std::sync::Arc;

use crate::filter::{ObjectFilter, PlayerFilter};
use crate::game_event::{DamageTarget, GameEvent};
use crate::object::CounterType;

use super::matcher_trait::{TriggerContext, TriggerMatcher};

/// "Whenever this permanent becomes tapped."
#[derive(Debug, Clone, PartialEq)]
pub struct BecomesTappedTrigger;

impl TriggerMatcher for BecomesTappedTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        matches!(event, GameEvent::Tapped { object } if *object == ctx.source_id)
    }

    fn display(&self) -> String {
        "Whenever this permanent becomes tapped".to_string()
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }
}

/// "Whenever this creature is dealt damage."
#[derive(Debug, Clone, PartialEq)]
pub struct IsDealtDamageTrigger;

impl TriggerMatcher for IsDealtDamageTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        matches!(
            event,
            GameEvent::DamageDealt {
                target: DamageTarget::Object(object),
                amount,
                ..
            } if *object == ctx.source_id && *amount > 0
        )
    }

    fn display(&self) -> String {
        "Whenever this creature is dealt damage".to_string()
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }
}

/// "Whenever one or more [counter] counters are put on this permanent."
#[derive(Debug, Clone, PartialEq)]
pub struct CountersPutOnThisTrigger {
    pub counter: Option<CounterType>,
}

impl TriggerMatcher for CountersPutOnThisTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        let GameEvent::CountersPut {
            object, counter, ..
        } = event
        else {
            return false;
        };
        *object == ctx.source_id && self.counter.is_none_or(|wanted| wanted == *counter)
    }

    fn display(&self) -> String {
        match self.counter {
            Some(counter) => {
                format!("Whenever one or more {counter:?} counters are put on this permanent")
            }
            None => "Whenever one or more counters are put on this permanent".to_string(),
        }
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }
}

/// "Whenever [player] casts a [filter] spell."
#[derive(Debug, Clone, PartialEq)]
pub struct SpellCastTrigger {
    pub caster: PlayerFilter,
    pub filter: Option<ObjectFilter>,
}

impl TriggerMatcher for SpellCastTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        let GameEvent::SpellCast { caster, .. } = event else {
            return false;
        };
        if !self.caster.matches(*caster, &ctx.filter_ctx()) {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) => ctx
                .event_object(event)
                .is_some_and(|spell| filter.matches(spell, &ctx.filter_ctx())),
        }
    }

    fn display(&self) -> String {
        let who = match self.caster {
            PlayerFilter::You => "you cast",
            PlayerFilter::Opponent => "an opponent casts",
            _ => "a player casts",
        };
        match &self.filter {
            Some(filter) => format!("Whenever {who} a {} spell", filter.describe()),
            None => format!("Whenever {who} a spell"),
        }
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }
}

/// A trigger condition supplied by the card catalog as a predicate.
#[derive(Clone)]
pub struct CustomTrigger {
    pub text: String,
    #[allow(clippy::type_complexity)]
    pub predicate: Arc<dyn Fn(&GameEvent, &TriggerContext) -> bool + Send + Sync>,
    pub looks_back: bool,
}

impl fmt::Debug for CustomTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomTrigger")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl TriggerMatcher for CustomTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        (self.predicate)(event, ctx)
    }

    fn display(&self) -> String {
        self.text.clone()
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }

    fn uses_snapshot(&self) -> bool {
        self.looks_back
    }
}
