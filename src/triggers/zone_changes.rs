//! Zone change triggers: enters the battlefield, dies, leaves the battlefield.

use crate::filter::ObjectFilter;
use crate::game_event::GameEvent;
use crate::zone::Zone;

use super::matcher_trait::{TriggerContext, TriggerMatcher};

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChangeTrigger {
    pub from: Option<Zone>,
    pub to: Option<Zone>,
    pub filter: Option<ObjectFilter>,
    /// Only the source itself.
    pub this: bool,
}

impl ZoneChangeTrigger {
    pub fn new() -> Self {
        Self {
            from: None,
            to: None,
            filter: None,
            this: false,
        }
    }

    pub fn from(mut self, zone: Zone) -> Self {
        self.from = Some(zone);
        self
    }

    pub fn to(mut self, zone: Zone) -> Self {
        self.to = Some(zone);
        self
    }

    pub fn matching(mut self, filter: ObjectFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn this(mut self) -> Self {
        self.this = true;
        self
    }

    pub fn this_enters_battlefield() -> Self {
        Self::new().to(Zone::Battlefield).this()
    }

    pub fn enters_battlefield(filter: ObjectFilter) -> Self {
        Self::new().to(Zone::Battlefield).matching(filter)
    }

    pub fn this_dies() -> Self {
        Self::new()
            .from(Zone::Battlefield)
            .to(Zone::Graveyard)
            .this()
    }

    pub fn dies(filter: ObjectFilter) -> Self {
        Self::new()
            .from(Zone::Battlefield)
            .to(Zone::Graveyard)
            .matching(filter)
    }

    pub fn this_leaves_battlefield() -> Self {
        Self::new().from(Zone::Battlefield).this()
    }
}

fn with_article(noun: &str) -> String {
    match noun.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {noun}"),
        _ => format!("a {noun}"),
    }
}

impl Default for ZoneChangeTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerMatcher for ZoneChangeTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        let GameEvent::ZoneChanged { object, from, to } = event else {
            return false;
        };
        if from == &Some(*to) {
            return false;
        }
        if let Some(required) = self.from
            && *from != Some(required)
        {
            return false;
        }
        if let Some(required) = self.to
            && *to != required
        {
            return false;
        }
        if self.this && *object != ctx.source_id {
            return false;
        }
        if let Some(filter) = &self.filter {
            let Some(obj) = ctx.event_object(event) else {
                return false;
            };
            if !filter.matches(obj, &ctx.filter_ctx()) {
                return false;
            }
        }
        true
    }

    fn display(&self) -> String {
        let subject = if self.this {
            "this permanent".to_string()
        } else {
            self.filter
                .as_ref()
                .map(|f| with_article(&f.describe()))
                .unwrap_or_else(|| "an object".to_string())
        };
        match (self.from, self.to) {
            (Some(Zone::Battlefield), Some(Zone::Graveyard)) => format!("When {subject} dies"),
            (Some(Zone::Battlefield), _) => format!("When {subject} leaves the battlefield"),
            (_, Some(Zone::Battlefield)) => format!("When {subject} enters the battlefield"),
            (from, to) => format!("When {subject} moves from {from:?} to {to:?}"),
        }
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }

    fn uses_snapshot(&self) -> bool {
        self.from == Some(Zone::Battlefield)
    }
}
